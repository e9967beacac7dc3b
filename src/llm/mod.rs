pub mod gemini;
pub mod media;

pub use gemini::GeminiImageEditor;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditRequestError {
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Model(String),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct EditRequest<'a> {
    pub image_bytes: &'a [u8],
    pub mime_type: &'a str,
    pub prompt: &'a str,
    pub aspect_ratio: Option<&'a str>,
}

#[allow(async_fn_in_trait)]
pub trait ImageEditor {
    async fn edit_image(&self, request: &EditRequest<'_>) -> anyhow::Result<Vec<u8>>;
}

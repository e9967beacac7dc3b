use std::path::Path;

use anyhow::anyhow;
use tracing::{error, info};

use crate::controls::{ControlError, ControlField, ControlState};
use crate::image_store::{save_png, ImageState};
use crate::llm::{EditRequest, EditRequestError, ImageEditor};
use crate::prompt::build_prompt;

pub const NO_IMAGE_MESSAGE: &str = "Please upload an image first.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("{}", NO_IMAGE_MESSAGE)]
    NoImage,
    #[error("{0}")]
    Request(String),
    #[error("{}", UNKNOWN_ERROR_MESSAGE)]
    Unknown,
}

impl GenerateError {
    fn classify(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<EditRequestError>() {
            Some(request_error) => GenerateError::Request(request_error.to_string()),
            None => GenerateError::Unknown,
        }
    }
}

#[derive(Debug, Default)]
pub struct EditorSession {
    controls: ControlState,
    original: Option<ImageState>,
    edited: Option<Vec<u8>>,
    busy: bool,
    last_error: Option<String>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn original(&self) -> Option<&ImageState> {
        self.original.as_ref()
    }

    pub fn edited(&self) -> Option<&[u8]> {
        self.edited.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn upload(&mut self, image: ImageState) {
        self.original = Some(image);
        self.edited = None;
        self.last_error = None;
    }

    pub fn set_control(&mut self, field: ControlField, value: &str) -> Result<(), ControlError> {
        self.controls.apply(field, value)
    }

    pub fn replace_controls(&mut self, mut controls: ControlState) {
        controls.clamp_ranges();
        self.controls = controls;
    }

    pub fn reset_controls(&mut self) {
        self.controls = ControlState::default();
    }

    pub fn preview_prompt(&self) -> String {
        build_prompt(&self.controls)
    }

    pub fn can_generate(&self) -> bool {
        self.original.is_some() && !self.busy
    }

    pub async fn generate<E: ImageEditor>(&mut self, editor: &E) -> Result<&[u8], GenerateError> {
        let Some(original) = self.original.as_ref() else {
            self.last_error = Some(GenerateError::NoImage.to_string());
            return Err(GenerateError::NoImage);
        };
        // The `&mut self` borrow is the real guard against overlapping requests.
        self.busy = true;
        self.last_error = None;
        self.edited = None;

        let prompt = build_prompt(&self.controls);
        let aspect_ratio = if self.controls.lock_aspect_ratio {
            original.nearest_aspect_ratio()
        } else {
            None
        };
        let request = EditRequest {
            image_bytes: &original.bytes,
            mime_type: &original.mime_type,
            prompt: &prompt,
            aspect_ratio,
        };
        info!(
            "Requesting edit (mime={}, bytes={}, aspect_ratio={:?}, prompt_chars={})",
            request.mime_type,
            request.image_bytes.len(),
            request.aspect_ratio,
            prompt.chars().count()
        );

        let result = editor.edit_image(&request).await;
        self.busy = false;

        match result {
            Ok(bytes) if bytes.is_empty() => {
                error!("Image editor returned an empty image");
                self.last_error = Some(GenerateError::Unknown.to_string());
                Err(GenerateError::Unknown)
            }
            Ok(bytes) => Ok(self.edited.insert(bytes).as_slice()),
            Err(err) => {
                error!("Edit request failed: {err:#}");
                let generate_error = GenerateError::classify(&err);
                self.last_error = Some(generate_error.to_string());
                Err(generate_error)
            }
        }
    }

    pub async fn save_edited(&self, path: &Path) -> anyhow::Result<()> {
        let Some(edited) = self.edited.as_deref() else {
            return Err(anyhow!("There is no edited image to save yet."));
        };
        save_png(edited, path).await
    }

    pub fn continue_with_result(&mut self) -> bool {
        let Some(edited) = self.edited.take() else {
            return false;
        };
        self.original = Some(ImageState::from_edit_result(edited));
        self.last_error = None;
        self.controls = ControlState::default();
        true
    }
}

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::{debug, info};

use crate::llm::media::{detect_mime_type, is_image_mime, mime_type_from_extension};

/// Edited images always come back from the model as PNG.
pub const EDIT_RESULT_MIME: &str = "image/png";

const ASPECT_RATIO_OPTIONS: [(&str, f64, f64); 10] = [
    ("1:1", 1.0, 1.0),
    ("4:3", 4.0, 3.0),
    ("3:4", 3.0, 4.0),
    ("16:9", 16.0, 9.0),
    ("9:16", 9.0, 16.0),
    ("21:9", 21.0, 9.0),
    ("3:2", 3.0, 2.0),
    ("2:3", 2.0, 3.0),
    ("5:4", 5.0, 4.0),
    ("4:5", 4.0, 5.0),
];

#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("{path} is not an image (detected type: {mime_type})")]
    NotAnImage { path: PathBuf, mime_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageState {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageState {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ImageState {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_edit_result(bytes: Vec<u8>) -> Self {
        ImageState::new(bytes, EDIT_RESULT_MIME)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        ImageReader::new(Cursor::new(self.bytes.as_slice()))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    pub fn nearest_aspect_ratio(&self) -> Option<&'static str> {
        let (width, height) = self.dimensions()?;
        nearest_aspect_ratio(width, height)
    }
}

pub fn nearest_aspect_ratio(width: u32, height: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        return None;
    }
    let actual = (width as f64 / height as f64).ln();
    ASPECT_RATIO_OPTIONS
        .iter()
        .map(|(label, w, h)| (*label, (actual - (w / h).ln()).abs()))
        .min_by(|left, right| left.1.total_cmp(&right.1))
        .map(|(label, _)| label)
}

pub async fn load_from_path(path: &Path) -> Result<ImageState, ImageLoadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ImageLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(ImageLoadError::Empty(path.to_path_buf()));
    }

    let mime_type = detect_mime_type(&bytes)
        .or_else(|| mime_type_from_extension(path))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if !is_image_mime(&mime_type) {
        return Err(ImageLoadError::NotAnImage {
            path: path.to_path_buf(),
            mime_type,
        });
    }

    info!(
        "Loaded image {} ({} bytes, {})",
        path.display(),
        bytes.len(),
        mime_type
    );
    Ok(ImageState::new(bytes, mime_type))
}

pub async fn save_png(bytes: &[u8], path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, bytes).await?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    pub fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "image_controller_{}_{}_{name}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{png_bytes, scratch_path};
    use super::*;

    #[test]
    fn reads_dimensions_and_ratio_from_png() {
        let state = ImageState::new(png_bytes(40, 30), "image/png");
        assert_eq!(state.dimensions(), Some((40, 30)));
        assert_eq!(state.nearest_aspect_ratio(), Some("4:3"));
    }

    #[test]
    fn nearest_ratio_picks_closest_option() {
        assert_eq!(nearest_aspect_ratio(1920, 1080), Some("16:9"));
        assert_eq!(nearest_aspect_ratio(1080, 1920), Some("9:16"));
        assert_eq!(nearest_aspect_ratio(1000, 990), Some("1:1"));
        assert_eq!(nearest_aspect_ratio(2560, 1080), Some("21:9"));
        assert_eq!(nearest_aspect_ratio(0, 10), None);
    }

    #[test]
    fn undecodable_bytes_have_no_dimensions() {
        let state = ImageState::new(b"not an image".to_vec(), "image/heic");
        assert_eq!(state.dimensions(), None);
        assert_eq!(state.nearest_aspect_ratio(), None);
    }

    #[test]
    fn edit_results_are_typed_png() {
        let state = ImageState::from_edit_result(vec![1, 2, 3]);
        assert_eq!(state.mime_type, "image/png");
    }

    #[tokio::test]
    async fn loads_image_and_sniffs_type() {
        let path = scratch_path("photo.bin");
        tokio::fs::write(&path, png_bytes(2, 2)).await.unwrap();
        let state = load_from_path(&path).await.unwrap();
        assert_eq!(state.mime_type, "image/png");
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_non_images_and_empty_files() {
        let text_path = scratch_path("notes.txt");
        tokio::fs::write(&text_path, b"hello there").await.unwrap();
        assert!(matches!(
            load_from_path(&text_path).await,
            Err(ImageLoadError::NotAnImage { .. })
        ));
        tokio::fs::remove_file(&text_path).await.unwrap();

        let empty_path = scratch_path("empty.png");
        tokio::fs::write(&empty_path, b"").await.unwrap();
        assert!(matches!(
            load_from_path(&empty_path).await,
            Err(ImageLoadError::Empty(_))
        ));
        tokio::fs::remove_file(&empty_path).await.unwrap();

        assert!(matches!(
            load_from_path(&scratch_path("missing.png")).await,
            Err(ImageLoadError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = scratch_path("out");
        let path = dir.join("nested").join("edited-image.png");
        save_png(&[9, 9, 9], &path).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![9, 9, 9]);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}

use std::path::Path;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn mime_type_from_extension(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime_type.to_string())
}

pub fn normalize_gemini_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

pub fn gemini_supports_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_signature() {
        let png = [
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
        ];
        assert_eq!(detect_mime_type(&png).as_deref(), Some("image/png"));
    }

    #[test]
    fn sniffs_heic_brand() {
        let mut heic = vec![0, 0, 0, 24];
        heic.extend_from_slice(b"ftypheic");
        heic.extend_from_slice(&[0; 8]);
        assert_eq!(detect_mime_type(&heic).as_deref(), Some("image/heic"));
    }

    #[test]
    fn unknown_bytes_have_no_mime() {
        assert_eq!(detect_mime_type(b"just some text"), None);
    }

    #[test]
    fn extension_fallback_is_case_insensitive() {
        assert_eq!(
            mime_type_from_extension(Path::new("photo.JPG")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(mime_type_from_extension(Path::new("notes.txt")), None);
        assert_eq!(mime_type_from_extension(Path::new("no_extension")), None);
    }

    #[test]
    fn normalizes_legacy_jpeg_alias() {
        assert_eq!(normalize_gemini_mime_type(" Image/JPG "), "image/jpeg");
        assert!(gemini_supports_image_mime(&normalize_gemini_mime_type("image/jpg")));
        assert!(!gemini_supports_image_mime("image/gif"));
    }
}

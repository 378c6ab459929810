//! Image encoding: page image file → base64 `ImageData`.
//!
//! Vision APIs take images as base64 data embedded in the JSON request.
//! Files are sent as-is; the MIME type follows the file extension.
//! `detail: "high"` keeps small handwriting legible to GPT-4-class models.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// Page image extensions (lower-case) and their MIME types.
pub const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

/// MIME type for an image path, or `None` if the extension is not supported.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|&(_, mime)| mime)
}

/// Read and base64-encode one page image.
pub async fn encode_image_file(path: &Path) -> std::io::Result<ImageData> {
    let mime = mime_for_path(path).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unsupported image type: {}", path.display()),
        )
    })?;
    let bytes = tokio::fs::read(path).await?;
    Ok(encode_bytes(&bytes, mime))
}

/// Wrap raw image bytes for the vision API.
pub fn encode_bytes(bytes: &[u8], mime: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime, b64.len());
    ImageData::new(b64, mime).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_by_extension() {
        assert_eq!(mime_for_path(Path::new("page1.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("page1.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("page1.bmp")), None);
        assert_eq!(mime_for_path(Path::new("page1")), None);
    }

    #[test]
    fn every_listed_type_resolves() {
        for (ext, mime) in IMAGE_TYPES {
            let path = format!("page1.{}", ext.to_ascii_uppercase());
            assert_eq!(mime_for_path(Path::new(&path)), Some(*mime));
        }
    }

    #[test]
    fn encode_bytes_is_base64() {
        let data = encode_bytes(b"\x89PNG\r\n\x1a\n", "image/png");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn encode_rejects_unknown_extension() {
        let err = encode_image_file(Path::new("scan.tiff")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}

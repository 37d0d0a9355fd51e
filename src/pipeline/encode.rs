//! Image encoding: page PNG on disk → base64 string for the upload form.
//!
//! ImgBB accepts the image as a base64 form field, so the file bytes are
//! sent exactly as rendered (no re-encoding, no resizing).

use crate::error::Pdf2OcrError;
use crate::output::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Read a rendered page from disk and base64-encode it.
pub async fn encode_page(image: &PageImage) -> Result<String, Pdf2OcrError> {
    let bytes = tokio::fs::read(&image.path)
        .await
        .map_err(|e| Pdf2OcrError::PublishFailed {
            page: image.index,
            reason: format!("cannot read {}: {}", image.path.display(), e),
        })?;
    let b64 = encode_bytes(&bytes);
    debug!(
        "Encoded page {} → {} bytes base64",
        image.index,
        b64.len()
    );
    Ok(b64)
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[tokio::test]
    async fn encode_rendered_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let page = PageImage {
            index: 1,
            dpi: 200,
            width: 10,
            height: 10,
            path: path.clone(),
        };
        let b64 = encode_page(&page).await.expect("encode should succeed");
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(decoded, std::fs::read(&path).unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_a_publish_failure() {
        let page = PageImage {
            index: 7,
            dpi: 200,
            width: 0,
            height: 0,
            path: "/nope/page_7.png".into(),
        };
        let err = encode_page(&page).await.unwrap_err();
        assert!(matches!(err, Pdf2OcrError::PublishFailed { page: 7, .. }));
    }
}

//! Image publishing: make a page image reachable through a public URL.
//!
//! The OCR service only accepts images by URL, so every rendered page is
//! first uploaded to ImgBB. Both transport failures and responses whose
//! `success` flag is not `true` surface as
//! [`Pdf2OcrError::PublishFailed`], which the retry policy treats alike.

use crate::error::Pdf2OcrError;
use crate::output::PageImage;
use crate::pipeline::encode::encode_page;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Uploads a page image and returns its public URL.
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn publish(&self, image: &PageImage) -> Result<String, Pdf2OcrError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

/// [`ImagePublisher`] for the ImgBB upload API.
#[derive(Debug, Clone)]
pub struct ImgbbPublisher {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ImgbbPublisher {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Pdf2OcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Pdf2OcrError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ImagePublisher for ImgbbPublisher {
    async fn publish(&self, image: &PageImage) -> Result<String, Pdf2OcrError> {
        let page = image.index;
        let fail = |reason: String| Pdf2OcrError::PublishFailed { page, reason };

        let encoded = encode_page(image).await?;

        debug!("Uploading page {} to {}", page, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("key", self.api_key.as_str()), ("image", encoded.as_str())])
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| fail(format!("failed to read response body (HTTP {status}): {e}")))?;

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|_| fail(format!("HTTP {status}: unexpected response: {}", snippet(&body))))?;

        match parsed {
            UploadResponse {
                success: true,
                data: Some(data),
            } if !data.url.is_empty() => Ok(data.url),
            _ => Err(fail(format!("upload rejected (HTTP {status}): {}", snippet(&body)))),
        }
    }
}

/// First 300 characters of a response body, for error messages.
fn snippet(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

//! Text recognition: send a public image URL to Mistral OCR and collect the
//! returned Markdown.
//!
//! The service answers with one entry per logical page it found in the
//! image; those are joined in order with a blank line. Inline image
//! payloads are explicitly not requested, only text is needed.

use crate::error::Pdf2OcrError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Extracts text from an image reachable at a URL.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image_url: &str) -> Result<String, Pdf2OcrError>;
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument<'a>,
    include_image_base64: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OcrDocument<'a> {
    ImageUrl { image_url: &'a str },
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: String,
}

/// Join per-page Markdown in service order with a blank line.
fn join_pages(pages: &[OcrPage]) -> String {
    pages
        .iter()
        .map(|p| p.markdown.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// [`TextRecognizer`] for the Mistral OCR API.
#[derive(Debug, Clone)]
pub struct MistralOcrRecognizer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl MistralOcrRecognizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
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
            model: model.into(),
        })
    }
}

#[async_trait]
impl TextRecognizer for MistralOcrRecognizer {
    async fn recognize(&self, image_url: &str) -> Result<String, Pdf2OcrError> {
        let fail = |reason: String| Pdf2OcrError::RecognitionFailed {
            url: image_url.to_string(),
            reason,
        };

        let request = OcrRequest {
            model: &self.model,
            document: OcrDocument::ImageUrl { image_url },
            include_image_base64: false,
        };

        debug!("OCR request for {} (model {})", image_url, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail("request timed out".to_string())
                } else {
                    fail(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(fail(format!("HTTP {status}: {}", body.trim())));
        }

        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("failed to parse OCR response: {e}")))?;

        debug!("OCR returned {} page(s) for {}", parsed.pages.len(), image_url);
        Ok(join_pages(&parsed.pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn recognizer(server: &MockServer) -> MistralOcrRecognizer {
        MistralOcrRecognizer::new(
            format!("{}/v1/ocr", server.uri()),
            "test-api-key",
            "mistral-ocr-latest",
            10,
        )
        .unwrap()
    }

    #[test]
    fn request_shape() {
        let req = OcrRequest {
            model: "mistral-ocr-latest",
            document: OcrDocument::ImageUrl {
                image_url: "https://a.png",
            },
            include_image_base64: false,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "model": "mistral-ocr-latest",
                "document": { "type": "image_url", "image_url": "https://a.png" },
                "include_image_base64": false
            })
        );
    }

    #[tokio::test]
    async fn joins_pages_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ocr"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "mistral-ocr-latest",
                "document": { "type": "image_url", "image_url": "https://i.ibb.co/p1.png" },
                "include_image_base64": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pages": [
                    { "index": 0, "markdown": "# Title", "images": [] },
                    { "index": 1, "markdown": "Body text", "images": [] }
                ],
                "model": "mistral-ocr-latest",
                "usage_info": { "pages_processed": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = recognizer(&server)
            .recognize("https://i.ibb.co/p1.png")
            .await
            .unwrap();
        assert_eq!(text, "# Title\n\nBody text");
    }

    #[tokio::test]
    async fn no_pages_is_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pages": []
            })))
            .mount(&server)
            .await;

        let text = recognizer(&server).recognize("https://a.png").await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn http_error_is_recognition_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"message\":\"Unauthorized\"}"))
            .mount(&server)
            .await;

        let err = recognizer(&server)
            .recognize("https://a.png")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Pdf2OcrError::RecognitionFailed { .. }));
        assert!(msg.contains("401"), "got: {msg}");
        assert!(msg.contains("Unauthorized"), "got: {msg}");
    }

    #[tokio::test]
    async fn malformed_body_is_recognition_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = recognizer(&server)
            .recognize("https://a.png")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}

//! Streaming API for the direct URL flow: emit one result per URL as soon
//! as it is recognised.
//!
//! URLs are processed one after another in list order, so items arrive in
//! input order. A failed URL yields a [`UrlResult`] with `error` set and the
//! stream carries on with the next one; nothing here ever short-circuits.

use crate::config::OcrConfig;
use crate::convert::recognizer_from_config;
use crate::error::{PageError, Pdf2OcrError, Stage};
use crate::output::UrlResult;
use crate::pipeline::input::parse_url_list;
use crate::pipeline::recognize::TextRecognizer;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::retry::RetryPolicy;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-URL results.
pub type UrlStream = Pin<Box<dyn Stream<Item = UrlResult> + Send>>;

/// Recognise `urls` one at a time, yielding each result when it is ready.
pub fn recognize_url_stream(
    recognizer: Arc<dyn TextRecognizer>,
    retry: RetryPolicy,
    urls: Vec<String>,
    progress: ProgressCallback,
) -> UrlStream {
    let total = urls.len();

    let s = stream::iter(urls.into_iter().enumerate()).then(move |(pos, url)| {
        let recognizer = Arc::clone(&recognizer);
        let progress = Arc::clone(&progress);
        async move {
            let index = pos + 1;
            progress.on_url_start(index, total);

            let mut attempts = 0u32;
            let result = retry
                .run(|| {
                    attempts += 1;
                    recognizer.recognize(&url)
                })
                .await;

            match result {
                Ok(text) => {
                    info!("URL {}/{}: OCR complete ({} chars)", index, total, text.len());
                    progress.on_url_complete(index, total, text.len());
                    UrlResult {
                        index,
                        url,
                        text,
                        attempts,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("URL {}/{} ({}) failed: {}", index, total, url, e);
                    progress.on_url_error(index, total, &e.to_string());
                    UrlResult {
                        index,
                        error: Some(PageError::from_stage(Stage::Recognize, index, attempts, &e)),
                        url,
                        text: String::new(),
                        attempts,
                    }
                }
            }
        }
    });

    Box::pin(s)
}

/// Parse a newline/comma separated URL list and stream its OCR results.
///
/// # Returns
/// - `Ok(UrlStream)`: one item per valid `https://` entry (possibly none)
/// - `Err(Pdf2OcrError)`: the OCR API key is missing
///
/// # Example
/// ```rust,no_run
/// use pdf2ocr::{ocr_url_stream, Credentials, OcrConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::builder()
///     .credentials(Credentials::from_env())
///     .build()?;
/// let mut results = ocr_url_stream("https://a.png, https://b.png", &config)?;
/// while let Some(r) = results.next().await {
///     match r.error {
///         None => println!("{}: {} chars", r.url, r.text.len()),
///         Some(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn ocr_url_stream(list: &str, config: &OcrConfig) -> Result<UrlStream, Pdf2OcrError> {
    let recognizer = recognizer_from_config(config)?;
    let urls = parse_url_list(list);
    let progress = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));
    Ok(recognize_url_stream(
        recognizer,
        config.retry_policy(),
        urls,
        progress,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailOn(&'static str);

    #[async_trait]
    impl TextRecognizer for FailOn {
        async fn recognize(&self, image_url: &str) -> Result<String, Pdf2OcrError> {
            if image_url == self.0 {
                Err(Pdf2OcrError::RecognitionFailed {
                    url: image_url.to_string(),
                    reason: "HTTP 500".to_string(),
                })
            } else {
                Ok(format!("text of {image_url}"))
            }
        }
    }

    #[tokio::test]
    async fn yields_in_input_order_and_isolates_failures() {
        let urls = vec![
            "https://a.png".to_string(),
            "https://bad.png".to_string(),
            "https://c.png".to_string(),
        ];
        let results: Vec<UrlResult> = recognize_url_stream(
            Arc::new(FailOn("https://bad.png")),
            RetryPolicy::new(2, Duration::ZERO),
            urls,
            Arc::new(NoopProgressCallback),
        )
        .collect()
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(results[0].text, "text of https://a.png");
        assert!(results[0].is_ok());
        assert_eq!(results[0].attempts, 1);

        assert!(!results[1].is_ok());
        assert_eq!(results[1].attempts, 2);
        assert!(results[1].text.is_empty());

        assert_eq!(results[2].text, "text of https://c.png");
    }

    #[tokio::test]
    async fn empty_list_is_empty_stream() {
        let results: Vec<UrlResult> = recognize_url_stream(
            Arc::new(FailOn("")),
            RetryPolicy::no_retry(),
            Vec::new(),
            Arc::new(NoopProgressCallback),
        )
        .collect()
        .await;
        assert!(results.is_empty());
    }

    #[test]
    fn ocr_url_stream_requires_ocr_key() {
        let err = ocr_url_stream("https://a.png", &OcrConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("MISTRAL_API_KEY"));
    }
}

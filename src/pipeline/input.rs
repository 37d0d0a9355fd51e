//! Input resolution: turn a path, URL or byte buffer into a [`Document`],
//! and turn free-form text into a list of image URLs.
//!
//! PDF bytes are validated by their `%PDF` magic before anything else runs,
//! so callers get a meaningful error rather than a pdfium failure deep in
//! the rasteriser.

use crate::error::Pdf2OcrError;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Raw bytes of a PDF plus a label naming where they came from.
#[derive(Clone)]
pub struct Document {
    source: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.source)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap in-memory bytes, checking the PDF magic.
    pub fn from_bytes(source: impl Into<String>, bytes: Vec<u8>) -> Result<Self, Pdf2OcrError> {
        let source = source.into();
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(Pdf2OcrError::NotAPdf {
                source_name: source,
                magic: bytes.iter().take(4).copied().collect(),
            });
        }
        Ok(Self { source, bytes })
    }

    /// Label used in logs and errors (file path or URL).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 of the content; identifies the document across runs.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a PDF from a local path or an HTTP/HTTPS URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Document, Pdf2OcrError> {
    if is_url(input) {
        download_document(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Document, Pdf2OcrError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2OcrError::PermissionDenied { path: path.clone() },
        _ => Pdf2OcrError::FileNotFound { path: path.clone() },
    })?;
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(path.display().to_string(), bytes)
}

async fn download_document(url: &str, timeout_secs: u64) -> Result<Document, Pdf2OcrError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2OcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2OcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2OcrError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2OcrError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2OcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Document::from_bytes(url, bytes.to_vec())
}

/// Split free-form text on newlines and commas, keeping trimmed entries
/// that start with `https://`, in input order.
///
/// Anything else (blank entries, `http://`, bare words) is dropped.
pub fn parse_url_list(input: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for entry in input.lines().flat_map(|line| line.split(',')) {
        let entry = entry.trim();
        if entry.starts_with("https://") {
            urls.push(entry.to_string());
        } else if !entry.is_empty() {
            warn!("Ignoring '{}': image URLs must start with https://", entry);
        }
    }
    urls
}

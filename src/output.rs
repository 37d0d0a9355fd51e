//! Values produced by the pipeline stages and the per-run reports.

use crate::error::{PageError, Pdf2OcrError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One rasterised page saved on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-based page number.
    pub index: usize,
    pub dpi: u32,
    pub width: u32,
    pub height: u32,
    /// Location of the PNG file.
    pub path: PathBuf,
}

/// Public URL of an uploaded page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedUrl {
    pub index: usize,
    pub url: String,
}

/// OCR text for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub index: usize,
    pub text: String,
}

/// Join recognised pages into one document with `--- Page N ---` markers.
///
/// The result is trimmed, so it never starts or ends with blank lines.
pub fn accumulate(texts: &[RecognizedText]) -> String {
    let mut out = String::new();
    for page in texts {
        out.push_str(&format!("\n\n--- Page {} ---\n\n{}", page.index, page.text));
    }
    out.trim().to_string()
}

/// Counters for one orchestrator invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages in `Done` state at the end of the run (resumed included).
    pub completed_pages: usize,
    /// Pages skipped because an earlier run of the session completed them.
    pub resumed_pages: usize,
    /// Upload attempts issued by this run, retries included.
    pub publish_attempts: u32,
    /// OCR attempts issued by this run, retries included.
    pub recognize_attempts: u32,
    /// True when pages were rasterised by this run rather than reused.
    pub rasterized: bool,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Outcome of one PDF pipeline run.
///
/// Returned even when a page failed: `text` then holds every page
/// completed before the failure and `failure` says which page stopped the
/// run and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfRunReport {
    /// Accumulated text of all completed pages.
    pub text: String,
    /// Completed pages in ascending order.
    pub pages: Vec<RecognizedText>,
    /// Directory holding the page images.
    pub image_dir: Option<PathBuf>,
    /// Saved page images.
    pub images: Vec<PageImage>,
    pub failure: Option<PageError>,
    pub stats: RunStats,
}

impl PdfRunReport {
    /// True when every page reached `Done`.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.stats.completed_pages == self.stats.total_pages
    }

    /// Write the accumulated text to `path` atomically.
    pub async fn save_text(&self, path: impl AsRef<Path>) -> Result<(), Pdf2OcrError> {
        write_text_atomic(path.as_ref(), &self.text).await
    }
}

/// Outcome for one entry of the direct URL flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResult {
    /// 1-based position in the URL list.
    pub index: usize,
    pub url: String,
    /// Extracted text; empty when `error` is set.
    pub text: String,
    pub attempts: u32,
    pub error: Option<PageError>,
}

impl UrlResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Default file name for this URL's text, `ocr_output_{N}.txt`.
    pub fn file_name(&self) -> String {
        format!("ocr_output_{}.txt", self.index)
    }
}

/// Write `text` to `path` via a temp file and rename, creating parent
/// directories as needed.
pub async fn write_text_atomic(path: &Path, text: &str) -> Result<(), Pdf2OcrError> {
    let write_err = |e| Pdf2OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, text).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

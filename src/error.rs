//! Error types for the pdf2ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2OcrError`]: **Fatal** for the operation that returned it: the
//!   document cannot be read, a credential is missing, or a single remote
//!   call failed. Adapters and the retry policy return it as-is.
//!
//! * [`PageError`]: **Recorded**: one page (or one URL) failed after all
//!   retry attempts. Stored inside [`crate::output::PdfRunReport`] and
//!   [`crate::output::UrlResult`] so callers keep the pages that did succeed.
//!
//! Every variant maps onto one [`ErrorKind`], the coarse taxonomy the CLI
//! and tests reason about.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2ocr library.
#[derive(Debug, Error)]
pub enum Pdf2OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{source_name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' is corrupt: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// The document opened fine but has nothing to render.
    #[error("PDF '{source_name}' has no pages")]
    EmptyDocument { source_name: String },

    /// pdfium could not render or save a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide, or\n\
set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Remote service errors ─────────────────────────────────────────────
    /// The image host could not be reached or refused the upload.
    #[error("Upload of page {page} failed: {reason}")]
    PublishFailed { page: usize, reason: String },

    /// The OCR service could not be reached or returned an error.
    #[error("OCR failed for '{url}': {reason}")]
    RecognitionFailed { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// A credential required by the requested flow is not set.
    #[error("{service} API key is not configured.\nSet {var} in the environment or in a .env file.")]
    MissingCredential {
        service: &'static str,
        var: &'static str,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the run directory or save a page image.
    #[error("Failed to prepare image directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write an output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`Pdf2OcrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unreadable, corrupt or unrenderable input.
    Document,
    /// Image hosting call failed or was rejected.
    Publish,
    /// OCR call failed.
    Recognition,
    /// Missing credentials or invalid settings.
    Configuration,
    /// Local file-system failure while writing results.
    Io,
    Internal,
}

impl Pdf2OcrError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::DownloadFailed { .. }
            | Self::DownloadTimeout { .. }
            | Self::NotAPdf { .. }
            | Self::CorruptPdf { .. }
            | Self::PasswordRequired { .. }
            | Self::WrongPassword { .. }
            | Self::EmptyDocument { .. }
            | Self::RasterisationFailed { .. }
            | Self::PdfiumBindingFailed(_) => ErrorKind::Document,
            Self::PublishFailed { .. } => ErrorKind::Publish,
            Self::RecognitionFailed { .. } => ErrorKind::Recognition,
            Self::MissingCredential { .. } | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::OutputDirFailed { .. } | Self::OutputWriteFailed { .. } => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Which step of the per-page state machine failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Publish,
    Recognize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Publish => f.write_str("upload"),
            Stage::Recognize => f.write_str("OCR"),
        }
    }
}

/// A page or URL that failed after all retry attempts.
///
/// `detail` is the `Display` text of the final underlying
/// [`Pdf2OcrError`], unchanged.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PageError {
    /// Uploading the page image failed.
    #[error("Page {page}: upload failed after {attempts} attempt(s): {detail}")]
    PublishFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// OCR of the page (or URL) failed.
    #[error("Page {page}: OCR failed after {attempts} attempt(s): {detail}")]
    RecognitionFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },
}

impl PageError {
    /// Build the recorded error for `stage` from the final underlying error.
    pub fn from_stage(stage: Stage, page: usize, attempts: u32, err: &Pdf2OcrError) -> Self {
        let detail = err.to_string();
        match stage {
            Stage::Publish => PageError::PublishFailed {
                page,
                attempts,
                detail,
            },
            Stage::Recognize => PageError::RecognitionFailed {
                page,
                attempts,
                detail,
            },
        }
    }

    /// 1-based index of the failing page or URL.
    pub fn page(&self) -> usize {
        match self {
            PageError::PublishFailed { page, .. } | PageError::RecognitionFailed { page, .. } => {
                *page
            }
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PageError::PublishFailed { .. } => Stage::Publish,
            PageError::RecognitionFailed { .. } => Stage::Recognize,
        }
    }

    /// The original error message.
    pub fn detail(&self) -> &str {
        match self {
            PageError::PublishFailed { detail, .. } | PageError::RecognitionFailed { detail, .. } => {
                detail
            }
        }
    }
}

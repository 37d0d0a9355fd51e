//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to receive events
//! as the orchestrator works through pages or URLs. The CLI renders them
//! with a terminal progress bar; library users can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use pdf2ocr::{OcrConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page: usize, total: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} chars)", page, total, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes a document or URL list.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed one at a time, so events for a
/// run always arrive in page order.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once the page images are available (rendered or reused).
    ///
    /// * `total_pages`  : pages in the document
    /// * `resumed_pages`: pages already `Done` from an earlier run
    fn on_run_start(&self, total_pages: usize, resumed_pages: usize) {
        let _ = (total_pages, resumed_pages);
    }

    /// A `Done` page was skipped and its earlier text reused.
    fn on_page_resumed(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Upload of a page image is about to start.
    fn on_publish_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// A page image is now publicly reachable at `url`.
    fn on_page_published(&self, page: usize, total_pages: usize, url: &str) {
        let _ = (page, total_pages, url);
    }

    /// OCR of a page is about to start.
    fn on_recognize_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// A page reached `Done`.
    fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
        let _ = (page, total_pages, text_len);
    }

    /// A page failed after all retries; the run stops here.
    fn on_page_error(&self, page: usize, total_pages: usize, error: &str) {
        let _ = (page, total_pages, error);
    }

    /// Called once at the end of a PDF run.
    fn on_run_complete(&self, total_pages: usize, completed_pages: usize) {
        let _ = (total_pages, completed_pages);
    }

    /// OCR of URL `index` (1-based) is about to start.
    fn on_url_start(&self, index: usize, total_urls: usize) {
        let _ = (index, total_urls);
    }

    /// OCR of URL `index` succeeded.
    fn on_url_complete(&self, index: usize, total_urls: usize, text_len: usize) {
        let _ = (index, total_urls, text_len);
    }

    /// OCR of URL `index` failed after all retries; remaining URLs continue.
    fn on_url_error(&self, index: usize, total_urls: usize, error: &str) {
        let _ = (index, total_urls, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

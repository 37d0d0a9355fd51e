//! # pdf2ocr
//!
//! Turn PDF documents into plain text by rendering every page to an image,
//! publishing the image to a public host and running a hosted OCR model on
//! its URL.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      local file or URL, checked for the %PDF magic
//!  ├─ 2. Render     every page → page_{n}.png at 200 DPI (pdfium, spawn_blocking)
//!  ├─ 3. Publish    base64 upload to ImgBB → public URL      ┐ per page,
//!  ├─ 4. Recognize  Mistral OCR on the URL → Markdown text   ┘ in order
//!  └─ 5. Output     "--- Page N ---" blocks, trimmed
//! ```
//!
//! Each publish and OCR call is wrapped in a [`RetryPolicy`] (3 attempts,
//! 2 s apart by default). The first page that still fails stops the run; the
//! [`Session`] keeps everything completed so far and a later run on the same
//! session only does the remaining work.
//!
//! A second flow skips rendering entirely and OCRs a list of image URLs you
//! already host. There every URL is independent: a failure is reported and
//! the next URL is tried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2ocr::{Credentials, Document, OcrConfig, OcrPipeline, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads MISTRAL_API_KEY and IMGBB_API_KEY
//!     let config = OcrConfig::builder()
//!         .credentials(Credentials::from_env())
//!         .build()?;
//!     let pipeline = OcrPipeline::from_config(&config)?;
//!
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let document = Document::from_bytes("scan.pdf", bytes)?;
//!     let mut session = Session::new();
//!
//!     let mut report = pipeline.process_document(&mut session, &document).await?;
//!     if !report.is_complete() {
//!         // Picks up at the page that failed.
//!         report = pipeline.process_document(&mut session, &document).await?;
//!     }
//!     println!("{}", report.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2ocr` binary (clap + anyhow + indicatif + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, OcrConfig, OcrConfigBuilder};
pub use convert::{ocr_pdf, ocr_pdf_to_file, ocr_urls, recognize_urls, OcrPipeline};
pub use error::{ErrorKind, PageError, Pdf2OcrError, Stage};
pub use output::{PageImage, PdfRunReport, PublishedUrl, RecognizedText, RunStats, UrlResult};
pub use pipeline::input::{load_document, parse_url_list, Document};
pub use pipeline::publish::{ImagePublisher, ImgbbPublisher};
pub use pipeline::recognize::{MistralOcrRecognizer, TextRecognizer};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use retry::RetryPolicy;
pub use session::{PageState, PipelineState, Session};
pub use stream::{ocr_url_stream, recognize_url_stream, UrlStream};

//! Pipeline stages for PDF → text conversion.
//!
//! Each submodule implements exactly one step. The three remote/FFI-backed
//! steps sit behind traits ([`render::Rasterizer`],
//! [`publish::ImagePublisher`], [`recognize::TextRecognizer`]) so the
//! orchestrator in [`crate::convert`] can be driven by in-memory fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ publish ──▶ recognize
//! (path/URL) (pdfium)  (base64)   (ImgBB)     (Mistral OCR)
//! ```
//!
//! 1. [`input`]    : load PDF bytes from a path or URL; parse URL lists
//! 2. [`render`]   : rasterise every page to PNG in a per-run directory
//! 3. [`encode`]   : base64 the PNG for the upload form
//! 4. [`publish`]  : upload the image and return its public URL
//! 5. [`recognize`]: OCR the public URL into Markdown text

pub mod encode;
pub mod input;
pub mod publish;
pub mod recognize;
pub mod render;

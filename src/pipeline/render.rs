//! PDF rasterisation: render every page to a PNG on disk via pdfium.
//!
//! pdfium keeps thread-local state and is CPU-bound, so the work runs in
//! `tokio::task::spawn_blocking`. Pages are rendered at a fixed DPI (scale
//! factor `dpi / 72`) and written as `page_{N}.png` into a per-run directory
//! named after the wall-clock time, e.g. `output_images/pdf_20250101_120000`.

use crate::error::Pdf2OcrError;
use crate::output::PageImage;
use crate::pipeline::input::Document;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a document into ordered page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `document` into `output_dir`.
    ///
    /// Returns one [`PageImage`] per page, index 1..=N in ascending order.
    async fn rasterize(
        &self,
        document: &Document,
        output_dir: &Path,
    ) -> Result<Vec<PageImage>, Pdf2OcrError>;
}

/// [`Rasterizer`] backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, password: Option<String>) -> Self {
        Self { dpi, password }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        document: &Document,
        output_dir: &Path,
    ) -> Result<Vec<PageImage>, Pdf2OcrError> {
        let bytes = document.bytes().to_vec();
        let source = document.source().to_string();
        let dir = output_dir.to_path_buf();
        let dpi = self.dpi;
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&bytes, &source, dpi, password.as_deref(), &dir)
        })
        .await
        .map_err(|e| Pdf2OcrError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` if set, else a library next to the
/// working directory, else the system library.
fn bind_pdfium() -> Result<Pdfium, Pdf2OcrError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2OcrError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    bytes: &[u8],
    source: &str,
    dpi: u32,
    password: Option<&str>,
    output_dir: &Path,
) -> Result<Vec<PageImage>, Pdf2OcrError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    Pdf2OcrError::WrongPassword {
                        source_name: source.to_string(),
                    }
                } else {
                    Pdf2OcrError::PasswordRequired {
                        source_name: source.to_string(),
                    }
                }
            } else {
                Pdf2OcrError::CorruptPdf {
                    source_name: source.to_string(),
                    detail: err_str,
                }
            }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(Pdf2OcrError::EmptyDocument {
            source_name: source.to_string(),
        });
    }
    info!("PDF loaded: {} pages, rendering at {} DPI", total_pages, dpi);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let mut results = Vec::with_capacity(total_pages);

    for (i, page) in pages.iter().enumerate() {
        let index = i + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2OcrError::RasterisationFailed {
                page: index,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        let path = output_dir.join(format!("page_{}.png", index));
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| Pdf2OcrError::RasterisationFailed {
                page: index,
                detail: format!("saving {}: {}", path.display(), e),
            })?;

        debug!(
            "Rendered page {} → {}x{} px at {}",
            index,
            image.width(),
            image.height(),
            path.display()
        );

        results.push(PageImage {
            index,
            dpi,
            width: image.width(),
            height: image.height(),
            path,
        });
    }

    Ok(results)
}

/// Create a fresh, timestamp-named directory under `root` for one run.
///
/// `pdf_{YYYYMMDD_HHMMSS}` is used as-is when free; otherwise `_2`, `_3`, …
/// are appended until an unused name is found.
pub async fn create_run_dir(root: &Path) -> Result<PathBuf, Pdf2OcrError> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    create_run_dir_with_stamp(root, &stamp).await
}

async fn create_run_dir_with_stamp(root: &Path, stamp: &str) -> Result<PathBuf, Pdf2OcrError> {
    let dir_err = |path: &Path, e| Pdf2OcrError::OutputDirFailed {
        path: path.to_path_buf(),
        source: e,
    };

    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| dir_err(root, e))?;

    let base = format!("pdf_{}", stamp);
    let mut suffix = 1u32;
    loop {
        let name = if suffix == 1 {
            base.clone()
        } else {
            format!("{}_{}", base, suffix)
        };
        let candidate = root.join(name);
        // create_dir (not _all) fails on an existing directory, which is
        // what makes the name unique.
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => {
                debug!("Created run directory {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(dir_err(&candidate, e)),
        }
    }
}

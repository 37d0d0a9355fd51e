//! The pipeline orchestrator and its convenience entry points.
//!
//! [`OcrPipeline`] drives Rasterize → (per page: Publish → Recognize) →
//! Accumulate against a caller-owned [`Session`]. Pages run strictly one
//! after another in ascending order. The first page that still fails after
//! its retry budget stops the run; everything completed before it is kept
//! in the session and returned in the report, and the next run on the same
//! session picks up exactly where this one stopped.
//!
//! The direct URL flow ([`OcrPipeline::process_urls`], [`ocr_urls`]) has
//! the opposite failure policy: every URL is attempted and each failure is
//! reported on its own.

use crate::config::OcrConfig;
use crate::error::{PageError, Pdf2OcrError, Stage};
use crate::output::{PdfRunReport, PublishedUrl, RecognizedText, RunStats, UrlResult};
use crate::pipeline::input::{self, parse_url_list, Document};
use crate::pipeline::publish::{ImagePublisher, ImgbbPublisher};
use crate::pipeline::recognize::{MistralOcrRecognizer, TextRecognizer};
use crate::pipeline::render::{self, PdfiumRasterizer, Rasterizer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::retry::RetryPolicy;
use crate::session::{PageState, Session};
use crate::stream::recognize_url_stream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates the PDF and URL flows over pluggable stage implementations.
pub struct OcrPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    publisher: Arc<dyn ImagePublisher>,
    recognizer: Arc<dyn TextRecognizer>,
    retry: RetryPolicy,
    resume: bool,
    output_root: PathBuf,
    progress: ProgressCallback,
}

impl OcrPipeline {
    /// Assemble a pipeline from explicit stage implementations.
    ///
    /// Retry, resume, output root and progress reporting come from `config`;
    /// its credentials and endpoints are not used.
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        publisher: Arc<dyn ImagePublisher>,
        recognizer: Arc<dyn TextRecognizer>,
        config: &OcrConfig,
    ) -> Self {
        Self {
            rasterizer,
            publisher,
            recognizer,
            retry: config.retry_policy(),
            resume: config.resume,
            output_root: config.output_root.clone(),
            progress: progress_of(config),
        }
    }

    /// Build the production pipeline: pdfium, ImgBB and Mistral OCR.
    ///
    /// Fails immediately if either API key is missing.
    pub fn from_config(config: &OcrConfig) -> Result<Self, Pdf2OcrError> {
        let recognizer = recognizer_from_config(config)?;
        let publisher = ImgbbPublisher::new(
            config.image_host_endpoint.clone(),
            config.credentials.image_host_api_key()?,
            config.request_timeout_secs,
        )?;
        let rasterizer = PdfiumRasterizer::new(config.dpi, config.password.clone());
        Ok(Self::new(
            Arc::new(rasterizer),
            Arc::new(publisher),
            recognizer,
            config,
        ))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run the PDF flow for `document` within `session`.
    ///
    /// # Returns
    /// `Ok(PdfRunReport)` whenever the page images exist, even if a page
    /// failed (check `report.failure`). Pages already `Done` in `session`
    /// for the same document are skipped and their text reused.
    ///
    /// # Errors
    /// Only for failures before any page is processed: rasterisation
    /// (unreadable/corrupt PDF, pdfium unavailable) or the image directory
    /// cannot be created.
    pub async fn process_document(
        &self,
        session: &mut Session,
        document: &Document,
    ) -> Result<PdfRunReport, Pdf2OcrError> {
        let total_start = Instant::now();
        let run = session.begin_run();
        let fingerprint = document.fingerprint();
        info!("Run {} for '{}'", run, document.source());

        let mut stats = RunStats::default();

        // ── Step 1: Page images (render or reuse) ────────────────────────────
        if self.resume && session.state().matches(&fingerprint) {
            info!(
                "Reusing {} page images from {}",
                session.state().images().len(),
                session
                    .state()
                    .image_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        } else {
            let render_start = Instant::now();
            let dir = render::create_run_dir(&self.output_root).await?;
            let images = self.rasterizer.rasterize(document, &dir).await?;
            if let Some((pos, bad)) = images
                .iter()
                .enumerate()
                .find(|(pos, img)| img.index != pos + 1)
            {
                return Err(Pdf2OcrError::Internal(format!(
                    "rasteriser returned page {} at position {}",
                    bad.index,
                    pos + 1
                )));
            }
            info!("Rendered {} pages into {}", images.len(), dir.display());
            session.state_mut().reset(fingerprint, dir, images);
            stats.rasterized = true;
            stats.render_duration_ms = render_start.elapsed().as_millis() as u64;
        }

        let total = session.state().images().len();
        let resumed = session.state().done_count();
        stats.total_pages = total;
        stats.resumed_pages = resumed;
        if resumed > 0 {
            info!("Resuming: {}/{} pages already done", resumed, total);
        }
        self.progress.on_run_start(total, resumed);

        // ── Step 2: Per-page publish → recognize ─────────────────────────────
        let mut failure: Option<PageError> = None;

        for page in 1..=total {
            let state = session
                .state()
                .page_state(page)
                .ok_or_else(|| Pdf2OcrError::Internal(format!("page {page} vanished")))?;

            let url = match state {
                PageState::Done => {
                    debug!("Page {}: already done, skipping", page);
                    self.progress.on_page_resumed(page, total);
                    continue;
                }
                PageState::Published => {
                    let url = session
                        .state()
                        .url_for(page)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            Pdf2OcrError::Internal(format!("page {page} published without URL"))
                        })?;
                    debug!("Page {}: reusing uploaded image {}", page, url);
                    url
                }
                PageState::Imaged => {
                    let image = session.state().images()[page - 1].clone();
                    self.progress.on_publish_start(page, total);
                    let mut attempts = 0u32;
                    let result = self
                        .retry
                        .run(|| {
                            attempts += 1;
                            self.publisher.publish(&image)
                        })
                        .await;
                    stats.publish_attempts += attempts;

                    match result {
                        Ok(url) => {
                            info!("Page {}: uploaded to {}", page, url);
                            session.state_mut().record_published(PublishedUrl {
                                index: page,
                                url: url.clone(),
                            })?;
                            self.progress.on_page_published(page, total, &url);
                            url
                        }
                        Err(e) => {
                            failure =
                                Some(self.page_failed(Stage::Publish, page, total, attempts, &e));
                            break;
                        }
                    }
                }
            };

            self.progress.on_recognize_start(page, total);
            let mut attempts = 0u32;
            let result = self
                .retry
                .run(|| {
                    attempts += 1;
                    self.recognizer.recognize(&url)
                })
                .await;
            stats.recognize_attempts += attempts;

            match result {
                Ok(text) => {
                    let text_len = text.len();
                    session.state_mut().record_recognized(RecognizedText {
                        index: page,
                        text,
                    })?;
                    info!("Page {}: OCR complete ({} chars)", page, text_len);
                    self.progress.on_page_complete(page, total, text_len);
                }
                Err(e) => {
                    failure =
                        Some(self.page_failed(Stage::Recognize, page, total, attempts, &e));
                    break;
                }
            }
        }

        // ── Step 3: Report ───────────────────────────────────────────────────
        let state = session.state();
        stats.completed_pages = state.done_count();
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Run {} finished: {}/{} pages done, {}ms",
            run, stats.completed_pages, total, stats.total_duration_ms
        );
        self.progress.on_run_complete(total, stats.completed_pages);

        Ok(PdfRunReport {
            text: state.accumulated_text(),
            pages: state.texts().to_vec(),
            image_dir: state.image_dir().map(Path::to_path_buf),
            images: state.images().to_vec(),
            failure,
            stats,
        })
    }

    /// Run the direct URL flow: OCR every URL independently.
    ///
    /// Results are in input order; a failed URL never stops the others.
    pub async fn process_urls(&self, urls: &[String]) -> Vec<UrlResult> {
        recognize_urls(
            Arc::clone(&self.recognizer),
            self.retry,
            urls,
            Arc::clone(&self.progress),
        )
        .await
    }

    fn page_failed(
        &self,
        stage: Stage,
        page: usize,
        total: usize,
        attempts: u32,
        err: &Pdf2OcrError,
    ) -> PageError {
        warn!(
            "Page {}: {} failed after {} attempt(s), stopping run: {}",
            page, stage, attempts, err
        );
        self.progress.on_page_error(page, total, &err.to_string());
        PageError::from_stage(stage, page, attempts, err)
    }
}

fn progress_of(config: &OcrConfig) -> ProgressCallback {
    config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback))
}

/// Build the Mistral OCR recogniser from `config`.
///
/// Fails immediately if the OCR API key is missing.
pub fn recognizer_from_config(
    config: &OcrConfig,
) -> Result<Arc<dyn TextRecognizer>, Pdf2OcrError> {
    let recognizer = MistralOcrRecognizer::new(
        config.ocr_endpoint.clone(),
        config.credentials.ocr_api_key()?,
        config.ocr_model.clone(),
        config.request_timeout_secs,
    )?;
    Ok(Arc::new(recognizer))
}

/// OCR each URL with `retry`, independently and in order.
pub async fn recognize_urls(
    recognizer: Arc<dyn TextRecognizer>,
    retry: RetryPolicy,
    urls: &[String],
    progress: ProgressCallback,
) -> Vec<UrlResult> {
    recognize_url_stream(recognizer, retry, urls.to_vec(), progress)
        .collect()
        .await
}

/// Convert a PDF file or URL to text in a one-off session.
///
/// Requires both API keys; checked before the PDF is loaded.
///
/// # Example
/// ```rust,no_run
/// use pdf2ocr::{ocr_pdf, Credentials, OcrConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::builder()
///     .credentials(Credentials::from_env())
///     .build()?;
/// let report = ocr_pdf("scan.pdf", &config).await?;
/// println!("{}", report.text);
/// if let Some(failure) = report.failure {
///     eprintln!("stopped early: {failure}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn ocr_pdf(
    input_str: impl AsRef<str>,
    config: &OcrConfig,
) -> Result<PdfRunReport, Pdf2OcrError> {
    let pipeline = OcrPipeline::from_config(config)?;
    let document = input::load_document(input_str.as_ref(), config.download_timeout_secs).await?;
    let mut session = Session::new();
    pipeline.process_document(&mut session, &document).await
}

/// Like [`ocr_pdf`], then write the accumulated text to `output_path`.
///
/// Partial text is written too when a page failed.
pub async fn ocr_pdf_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<PdfRunReport, Pdf2OcrError> {
    let report = ocr_pdf(input_str, config).await?;
    if !report.text.is_empty() {
        report.save_text(output_path).await?;
    }
    Ok(report)
}

/// OCR a newline/comma separated list of `https://` image URLs.
///
/// Entries not starting with `https://` are dropped; an input with no valid
/// entry yields an empty vector. Only the OCR API key is required.
pub async fn ocr_urls(list: &str, config: &OcrConfig) -> Result<Vec<UrlResult>, Pdf2OcrError> {
    let recognizer = recognizer_from_config(config)?;
    let urls = parse_url_list(list);
    if urls.is_empty() {
        warn!("No valid https:// image URL in input");
        return Ok(Vec::new());
    }
    Ok(recognize_urls(recognizer, config.retry_policy(), &urls, progress_of(config)).await)
}

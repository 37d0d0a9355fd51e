//! Orchestrator behaviour against in-memory stage implementations.
//!
//! No network and no pdfium: the fakes below count every call so the tests
//! can check exactly which remote work a run did or skipped.

use async_trait::async_trait;
use pdf2ocr::{
    Credentials, Document, ErrorKind, ImagePublisher, OcrConfig, OcrPipeline, PageError,
    PageImage, PageState, Pdf2OcrError, PipelineProgressCallback, Rasterizer, Session, Stage,
    TextRecognizer,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const ALWAYS: u32 = u32::MAX;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeRasterizer {
    pages: usize,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        _document: &Document,
        output_dir: &Path,
    ) -> Result<Vec<PageImage>, Pdf2OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((1..=self.pages)
            .map(|index| PageImage {
                index,
                dpi: 200,
                width: 1654,
                height: 2339,
                path: output_dir.join(format!("page_{index}.png")),
            })
            .collect())
    }
}

/// Publishes page N as `https://img.test/N.png`, failing on demand.
#[derive(Default)]
struct FakePublisher {
    calls: Mutex<Vec<usize>>,
    /// page → failures still to return before succeeding
    failures: Mutex<HashMap<usize, u32>>,
}

impl FakePublisher {
    fn failing(page: usize, times: u32) -> Arc<Self> {
        let p = Self::default();
        p.failures.lock().unwrap().insert(page, times);
        Arc::new(p)
    }

    fn calls_for(&self, page: usize) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| **p == page).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ImagePublisher for FakePublisher {
    async fn publish(&self, image: &PageImage) -> Result<String, Pdf2OcrError> {
        self.calls.lock().unwrap().push(image.index);
        if let Some(left) = self.failures.lock().unwrap().get_mut(&image.index) {
            if *left > 0 {
                *left = left.saturating_sub(1);
                return Err(Pdf2OcrError::PublishFailed {
                    page: image.index,
                    reason: "HTTP 503: service unavailable".to_string(),
                });
            }
        }
        Ok(page_url(image.index))
    }
}

/// Recognises URL u as `text of u`, failing on demand.
#[derive(Default)]
struct FakeRecognizer {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u32>>,
}

impl FakeRecognizer {
    fn failing(url: &str, times: u32) -> Arc<Self> {
        let r = Self::default();
        r.failures.lock().unwrap().insert(url.to_string(), times);
        Arc::new(r)
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(&self, image_url: &str) -> Result<String, Pdf2OcrError> {
        self.calls.lock().unwrap().push(image_url.to_string());
        if let Some(left) = self.failures.lock().unwrap().get_mut(image_url) {
            if *left > 0 {
                *left = left.saturating_sub(1);
                return Err(Pdf2OcrError::RecognitionFailed {
                    url: image_url.to_string(),
                    reason: "HTTP 429: rate limited".to_string(),
                });
            }
        }
        Ok(format!("text of {image_url}"))
    }
}

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for RecordingCallback {
    fn on_run_start(&self, total: usize, resumed: usize) {
        self.events.lock().unwrap().push(format!("start {total} {resumed}"));
    }
    fn on_page_resumed(&self, page: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("resumed {page}"));
    }
    fn on_page_published(&self, page: usize, _total: usize, _url: &str) {
        self.events.lock().unwrap().push(format!("published {page}"));
    }
    fn on_page_complete(&self, page: usize, _total: usize, _len: usize) {
        self.events.lock().unwrap().push(format!("done {page}"));
    }
    fn on_page_error(&self, page: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("error {page}"));
    }
    fn on_run_complete(&self, total: usize, completed: usize) {
        self.events.lock().unwrap().push(format!("complete {completed}/{total}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn page_url(page: usize) -> String {
    format!("https://img.test/{page}.png")
}

fn config(root: &tempfile::TempDir) -> OcrConfig {
    OcrConfig::builder()
        .output_root(root.path())
        .retry_delay_ms(0)
        .build()
        .unwrap()
}

fn doc(label: &str) -> Document {
    Document::from_bytes(label, format!("%PDF-1.7 {label}").into_bytes()).unwrap()
}

fn expected_text(pages: &[usize]) -> String {
    pages
        .iter()
        .map(|p| format!("--- Page {p} ---\n\ntext of {}", page_url(*p)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── PDF flow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_accumulates_pages_in_order() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(3);
    let publisher = Arc::new(FakePublisher::default());
    let recognizer = Arc::new(FakeRecognizer::default());
    let pipeline = OcrPipeline::new(
        raster.clone(),
        publisher.clone(),
        recognizer.clone(),
        &config(&root),
    );

    let mut session = Session::new();
    let report = pipeline.process_document(&mut session, &doc("a")).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.text, expected_text(&[1, 2, 3]));
    assert_eq!(
        report.pages.iter().map(|p| p.index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(*publisher.calls.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(
        *recognizer.calls.lock().unwrap(),
        vec![page_url(1), page_url(2), page_url(3)]
    );

    let image_dir = report.image_dir.clone().unwrap();
    assert!(image_dir.starts_with(root.path()));
    assert!(image_dir.is_dir());
    assert!(image_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("pdf_"));

    assert_eq!(report.stats.total_pages, 3);
    assert_eq!(report.stats.completed_pages, 3);
    assert_eq!(report.stats.resumed_pages, 0);
    assert_eq!(report.stats.publish_attempts, 3);
    assert_eq!(report.stats.recognize_attempts, 3);
    assert!(report.stats.rasterized);
    assert_eq!(session.runs(), 1);
}

#[tokio::test]
async fn rerun_of_finished_document_does_no_work() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(3);
    let publisher = Arc::new(FakePublisher::default());
    let recognizer = Arc::new(FakeRecognizer::default());
    let pipeline = OcrPipeline::new(
        raster.clone(),
        publisher.clone(),
        recognizer.clone(),
        &config(&root),
    );

    let document = doc("a");
    let mut session = Session::new();
    let first = pipeline.process_document(&mut session, &document).await.unwrap();
    let second = pipeline.process_document(&mut session, &document).await.unwrap();

    assert_eq!(first.text, second.text);
    assert_eq!(raster.calls(), 1);
    assert_eq!(publisher.total_calls(), 3);
    assert_eq!(recognizer.total_calls(), 3);
    assert!(!second.stats.rasterized);
    assert_eq!(second.stats.resumed_pages, 3);
    assert_eq!(second.stats.publish_attempts, 0);
    assert_eq!(second.image_dir, first.image_dir);
    assert_eq!(session.runs(), 2);
}

#[tokio::test]
async fn publish_failure_stops_the_run() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(3);
    let publisher = FakePublisher::failing(2, ALWAYS);
    let recognizer = Arc::new(FakeRecognizer::default());
    let pipeline = OcrPipeline::new(
        raster.clone(),
        publisher.clone(),
        recognizer.clone(),
        &config(&root),
    );

    let mut session = Session::new();
    let report = pipeline.process_document(&mut session, &doc("a")).await.unwrap();

    assert!(!report.is_complete());
    let failure = report.failure.clone().unwrap();
    assert_eq!(failure.page(), 2);
    assert_eq!(failure.stage(), Stage::Publish);
    assert!(matches!(failure, PageError::PublishFailed { attempts: 3, .. }));
    assert!(failure.detail().contains("HTTP 503"), "got: {}", failure.detail());

    // Page 2 used its whole budget, page 3 was never touched.
    assert_eq!(publisher.calls_for(2), 3);
    assert_eq!(publisher.calls_for(3), 0);
    assert_eq!(recognizer.calls_for(&page_url(3)), 0);

    assert_eq!(report.text, expected_text(&[1]));
    assert_eq!(report.stats.completed_pages, 1);
    assert_eq!(session.state().page_state(1), Some(PageState::Done));
    assert_eq!(session.state().page_state(2), Some(PageState::Imaged));
    assert_eq!(session.state().page_state(3), Some(PageState::Imaged));
}

#[tokio::test]
async fn resume_after_ocr_failure_reuses_uploaded_image() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(3);
    let publisher = Arc::new(FakePublisher::default());
    // Exactly one budget's worth of failures: the first run gives up, the
    // resumed run succeeds on its first attempt.
    let recognizer = FakeRecognizer::failing(&page_url(2), 3);
    let pipeline = OcrPipeline::new(
        raster.clone(),
        publisher.clone(),
        recognizer.clone(),
        &config(&root),
    );

    let document = doc("a");
    let mut session = Session::new();

    let first = pipeline.process_document(&mut session, &document).await.unwrap();
    let failure = first.failure.clone().unwrap();
    assert_eq!(failure.stage(), Stage::Recognize);
    assert_eq!(failure.page(), 2);
    assert_eq!(session.state().page_state(2), Some(PageState::Published));
    assert_eq!(session.state().url_for(2), Some(page_url(2).as_str()));

    let second = pipeline.process_document(&mut session, &document).await.unwrap();
    assert!(second.is_complete());
    assert_eq!(second.text, expected_text(&[1, 2, 3]));
    assert_eq!(second.stats.resumed_pages, 1);

    // Nothing re-rendered, page 1 and page 2 uploaded once each.
    assert_eq!(raster.calls(), 1);
    assert_eq!(publisher.calls_for(1), 1);
    assert_eq!(publisher.calls_for(2), 1);
    assert_eq!(recognizer.calls_for(&page_url(1)), 1);
    assert_eq!(recognizer.calls_for(&page_url(2)), 4);
}

#[tokio::test]
async fn transient_failures_recover_within_budget() {
    let root = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::failing(1, 2);
    let recognizer = FakeRecognizer::failing(&page_url(2), 1);
    let pipeline = OcrPipeline::new(
        FakeRasterizer::new(2),
        publisher.clone(),
        recognizer.clone(),
        &config(&root),
    );

    let mut session = Session::new();
    let report = pipeline.process_document(&mut session, &doc("a")).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.text, expected_text(&[1, 2]));
    assert_eq!(report.stats.publish_attempts, 4);
    assert_eq!(report.stats.recognize_attempts, 3);
}

#[tokio::test]
async fn single_attempt_disables_retry() {
    let root = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::failing(1, 1);
    let config = OcrConfig::builder()
        .output_root(root.path())
        .max_attempts(1)
        .retry_delay_ms(0)
        .build()
        .unwrap();
    let pipeline = OcrPipeline::new(
        FakeRasterizer::new(2),
        publisher.clone(),
        Arc::new(FakeRecognizer::default()),
        &config,
    );

    let mut session = Session::new();
    let report = pipeline.process_document(&mut session, &doc("a")).await.unwrap();

    assert!(matches!(
        report.failure,
        Some(PageError::PublishFailed { page: 1, attempts: 1, .. })
    ));
    assert_eq!(publisher.total_calls(), 1);
    assert_eq!(report.text, "");
}

#[tokio::test]
async fn different_document_starts_over() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(2);
    let publisher = Arc::new(FakePublisher::default());
    let pipeline = OcrPipeline::new(
        raster.clone(),
        publisher.clone(),
        Arc::new(FakeRecognizer::default()),
        &config(&root),
    );

    let mut session = Session::new();
    pipeline.process_document(&mut session, &doc("a")).await.unwrap();
    let report = pipeline.process_document(&mut session, &doc("b")).await.unwrap();

    assert_eq!(raster.calls(), 2);
    assert_eq!(publisher.total_calls(), 4);
    assert_eq!(report.stats.resumed_pages, 0);
    assert!(report.stats.rasterized);
}

#[tokio::test]
async fn resume_disabled_redoes_every_page() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(2);
    let publisher = Arc::new(FakePublisher::default());
    let recognizer = Arc::new(FakeRecognizer::default());
    let config = OcrConfig::builder()
        .output_root(root.path())
        .retry_delay_ms(0)
        .resume(false)
        .build()
        .unwrap();
    let pipeline = OcrPipeline::new(raster.clone(), publisher.clone(), recognizer.clone(), &config);

    let document = doc("a");
    let mut session = Session::new();
    let first = pipeline.process_document(&mut session, &document).await.unwrap();
    let second = pipeline.process_document(&mut session, &document).await.unwrap();

    assert_eq!(first.text, second.text);
    assert_eq!(raster.calls(), 2);
    assert_eq!(publisher.total_calls(), 4);
    assert_eq!(recognizer.total_calls(), 4);
    assert_ne!(first.image_dir, second.image_dir);
}

#[tokio::test]
async fn cleared_session_starts_over() {
    let root = tempfile::tempdir().unwrap();
    let raster = FakeRasterizer::new(1);
    let pipeline = OcrPipeline::new(
        raster.clone(),
        Arc::new(FakePublisher::default()),
        Arc::new(FakeRecognizer::default()),
        &config(&root),
    );

    let document = doc("a");
    let mut session = Session::new();
    pipeline.process_document(&mut session, &document).await.unwrap();
    session.clear();
    pipeline.process_document(&mut session, &document).await.unwrap();
    assert_eq!(raster.calls(), 2);
}

#[tokio::test]
async fn progress_events_follow_page_order() {
    let root = tempfile::tempdir().unwrap();
    let events = Arc::new(RecordingCallback::default());
    let config = OcrConfig::builder()
        .output_root(root.path())
        .retry_delay_ms(0)
        .progress_callback(events.clone())
        .build()
        .unwrap();
    let pipeline = OcrPipeline::new(
        FakeRasterizer::new(2),
        FakePublisher::failing(2, ALWAYS),
        Arc::new(FakeRecognizer::default()),
        &config,
    );

    let document = doc("a");
    let mut session = Session::new();
    pipeline.process_document(&mut session, &document).await.unwrap();
    pipeline.process_document(&mut session, &document).await.unwrap();

    assert_eq!(
        *events.events.lock().unwrap(),
        vec![
            "start 2 0",
            "published 1",
            "done 1",
            "error 2",
            "complete 1/2",
            "start 2 1",
            "resumed 1",
            "error 2",
            "complete 1/2",
        ]
    );
}

// ── URL flow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn url_failures_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let recognizer = FakeRecognizer::failing("https://b.png", ALWAYS);
    let pipeline = OcrPipeline::new(
        FakeRasterizer::new(0),
        Arc::new(FakePublisher::default()),
        recognizer.clone(),
        &config(&root),
    );

    let urls = pdf2ocr::parse_url_list("https://a.png,https://b.png,https://c.png");
    let results = pipeline.process_urls(&urls).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].text, "text of https://a.png");
    assert!(results[0].is_ok());
    assert!(!results[1].is_ok());
    assert_eq!(results[1].attempts, 3);
    assert_eq!(
        results[1].error.as_ref().map(|e| e.stage()),
        Some(Stage::Recognize)
    );
    assert_eq!(results[2].text, "text of https://c.png");
    assert_eq!(results[2].file_name(), "ocr_output_3.txt");

    assert_eq!(recognizer.calls_for("https://b.png"), 3);
    assert_eq!(recognizer.calls_for("https://c.png"), 1);
}

// ── Credentials ──────────────────────────────────────────────────────────────

#[test]
fn production_pipeline_needs_both_keys() {
    let none = OcrPipeline::from_config(&OcrConfig::default()).err().unwrap();
    assert_eq!(none.kind(), ErrorKind::Configuration);

    let ocr_only = OcrConfig::builder()
        .credentials(Credentials::new("m-key", ""))
        .build()
        .unwrap();
    let err = OcrPipeline::from_config(&ocr_only).err().unwrap();
    assert!(err.to_string().contains("IMGBB_API_KEY"));

    let both = OcrConfig::builder()
        .credentials(Credentials::new("m-key", "i-key"))
        .build()
        .unwrap();
    assert!(OcrPipeline::from_config(&both).is_ok());
}

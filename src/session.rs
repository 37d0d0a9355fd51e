//! Session-scoped pipeline state.
//!
//! A [`Session`] is created when a user starts working on a document and
//! dropped when they are done. It owns the [`PipelineState`] that lets a
//! repeated run skip pages already uploaded or recognised. Nothing here is
//! persisted; two sessions never share state.

use crate::error::Pdf2OcrError;
use crate::output::{accumulate, PageImage, PublishedUrl, RecognizedText};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Where a page stands in the `Imaged → Published → Done` progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Rendered to disk, not uploaded yet.
    Imaged,
    /// Uploaded; URL recorded, no text yet.
    Published,
    /// Text recorded.
    Done,
}

/// Per-page artefacts of one document, in page order.
///
/// Pages advance strictly in ascending order, so URLs and texts always
/// cover a prefix of the images: `texts.len() <= urls.len() <= images.len()`.
/// The `record_*` methods refuse any update that would break this.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    fingerprint: Option<String>,
    image_dir: Option<PathBuf>,
    images: Vec<PageImage>,
    urls: Vec<PublishedUrl>,
    texts: Vec<RecognizedText>,
}

impl PipelineState {
    /// Forget everything and start over with freshly rendered `images`.
    pub fn reset(&mut self, fingerprint: String, image_dir: PathBuf, images: Vec<PageImage>) {
        *self = Self {
            fingerprint: Some(fingerprint),
            image_dir: Some(image_dir),
            images,
            urls: Vec::new(),
            texts: Vec::new(),
        };
    }

    /// True if the state was built from the document with this fingerprint.
    pub fn matches(&self, fingerprint: &str) -> bool {
        self.fingerprint.as_deref() == Some(fingerprint) && !self.images.is_empty()
    }

    pub fn image_dir(&self) -> Option<&Path> {
        self.image_dir.as_deref()
    }

    pub fn images(&self) -> &[PageImage] {
        &self.images
    }

    pub fn urls(&self) -> &[PublishedUrl] {
        &self.urls
    }

    pub fn texts(&self) -> &[RecognizedText] {
        &self.texts
    }

    /// State of the 1-based page `index`, or `None` if no such image.
    pub fn page_state(&self, index: usize) -> Option<PageState> {
        if index == 0 || index > self.images.len() {
            None
        } else if index <= self.texts.len() {
            Some(PageState::Done)
        } else if index <= self.urls.len() {
            Some(PageState::Published)
        } else {
            Some(PageState::Imaged)
        }
    }

    /// The recorded URL for page `index`, if it was published.
    pub fn url_for(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.urls.get(i))
            .map(|u| u.url.as_str())
    }

    /// Number of pages in `Done`.
    pub fn done_count(&self) -> usize {
        self.texts.len()
    }

    /// Record the URL of the next page to publish.
    pub fn record_published(&mut self, published: PublishedUrl) -> Result<(), Pdf2OcrError> {
        let expected = self.urls.len() + 1;
        if published.index != expected || expected > self.images.len() {
            return Err(Pdf2OcrError::Internal(format!(
                "out-of-order publish: got page {}, expected page {} of {}",
                published.index,
                expected,
                self.images.len()
            )));
        }
        self.urls.push(published);
        Ok(())
    }

    /// Record the text of the next page to recognise.
    pub fn record_recognized(&mut self, text: RecognizedText) -> Result<(), Pdf2OcrError> {
        let expected = self.texts.len() + 1;
        if text.index != expected || expected > self.urls.len() {
            return Err(Pdf2OcrError::Internal(format!(
                "out-of-order OCR result: got page {}, expected page {} with {} published",
                text.index,
                expected,
                self.urls.len()
            )));
        }
        self.texts.push(text);
        Ok(())
    }

    /// Accumulated text of every `Done` page.
    pub fn accumulated_text(&self) -> String {
        accumulate(&self.texts)
    }
}

/// One user's working session.
#[derive(Debug)]
pub struct Session {
    started_at: SystemTime,
    runs: u32,
    state: PipelineState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            started_at: SystemTime::now(),
            runs: 0,
            state: PipelineState::default(),
        }
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// How many times the orchestrator ran against this session.
    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    pub(crate) fn begin_run(&mut self) -> u32 {
        self.runs += 1;
        self.runs
    }

    /// Drop all cached pages; the next run starts from scratch.
    pub fn clear(&mut self) {
        self.state = PipelineState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> Vec<PageImage> {
        (1..=n)
            .map(|index| PageImage {
                index,
                dpi: 200,
                width: 1654,
                height: 2339,
                path: PathBuf::from(format!("run/page_{index}.png")),
            })
            .collect()
    }

    fn url(index: usize) -> PublishedUrl {
        PublishedUrl {
            index,
            url: format!("https://i.ibb.co/{index}.png"),
        }
    }

    fn text(index: usize) -> RecognizedText {
        RecognizedText {
            index,
            text: format!("page {index}"),
        }
    }

    fn state_with(n: usize) -> PipelineState {
        let mut s = PipelineState::default();
        s.reset("abc".into(), PathBuf::from("run"), images(n));
        s
    }

    #[test]
    fn page_states_follow_recorded_prefixes() {
        let mut s = state_with(3);
        s.record_published(url(1)).unwrap();
        s.record_recognized(text(1)).unwrap();
        s.record_published(url(2)).unwrap();

        assert_eq!(s.page_state(0), None);
        assert_eq!(s.page_state(1), Some(PageState::Done));
        assert_eq!(s.page_state(2), Some(PageState::Published));
        assert_eq!(s.page_state(3), Some(PageState::Imaged));
        assert_eq!(s.page_state(4), None);
        assert_eq!(s.url_for(2), Some("https://i.ibb.co/2.png"));
        assert_eq!(s.url_for(3), None);
        assert_eq!(s.done_count(), 1);
    }

    #[test]
    fn text_without_url_is_rejected() {
        let mut s = state_with(2);
        assert!(s.record_recognized(text(1)).is_err());
        assert!(s.texts().is_empty());
    }

    #[test]
    fn url_beyond_images_is_rejected() {
        let mut s = state_with(1);
        s.record_published(url(1)).unwrap();
        assert!(s.record_published(url(2)).is_err());
    }

    #[test]
    fn out_of_order_publish_is_rejected() {
        let mut s = state_with(3);
        assert!(s.record_published(url(2)).is_err());
        assert!(s.urls().is_empty());
    }

    #[test]
    fn matches_requires_same_fingerprint() {
        let s = state_with(2);
        assert!(s.matches("abc"));
        assert!(!s.matches("def"));
        assert!(!PipelineState::default().matches("abc"));
    }

    #[test]
    fn accumulated_text_uses_page_markers() {
        let mut s = state_with(2);
        s.record_published(url(1)).unwrap();
        s.record_recognized(text(1)).unwrap();
        assert_eq!(s.accumulated_text(), "--- Page 1 ---\n\npage 1");
    }

    #[test]
    fn session_clear_drops_state() {
        let mut session = Session::new();
        session
            .state_mut()
            .reset("abc".into(), PathBuf::from("run"), images(2));
        assert_eq!(session.begin_run(), 1);
        session.clear();
        assert!(session.state().images().is_empty());
        assert_eq!(session.runs(), 1);
    }
}

//! Configuration types for the PDF → image host → OCR pipeline.
//!
//! All pipeline behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. Credentials live in [`Credentials`], loaded once at
//! process start with [`Credentials::from_env`].

use crate::error::Pdf2OcrError;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the Mistral API key.
pub const OCR_API_KEY_VAR: &str = "MISTRAL_API_KEY";

/// Environment variable holding the ImgBB API key.
pub const IMAGE_HOST_API_KEY_VAR: &str = "IMGBB_API_KEY";

/// Default Mistral OCR endpoint.
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.mistral.ai/v1/ocr";

/// Default ImgBB upload endpoint.
pub const DEFAULT_IMAGE_HOST_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

/// Default OCR model identifier.
pub const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";

/// API credentials for the two remote services.
///
/// Both are optional at load time; each flow asks for the ones it needs via
/// [`Credentials::ocr_api_key`] / [`Credentials::image_host_api_key`] before
/// doing any work, so a missing key fails fast instead of at the first
/// remote call.
#[derive(Clone, Default)]
pub struct Credentials {
    ocr_api_key: Option<String>,
    image_host_api_key: Option<String>,
}

impl Credentials {
    pub fn new(ocr_api_key: impl Into<String>, image_host_api_key: impl Into<String>) -> Self {
        Self {
            ocr_api_key: non_empty(ocr_api_key.into()),
            image_host_api_key: non_empty(image_host_api_key.into()),
        }
    }

    /// Read `MISTRAL_API_KEY` and `IMGBB_API_KEY` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read credentials through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            ocr_api_key: lookup(OCR_API_KEY_VAR).and_then(non_empty),
            image_host_api_key: lookup(IMAGE_HOST_API_KEY_VAR).and_then(non_empty),
        }
    }

    pub fn ocr_api_key(&self) -> Result<&str, Pdf2OcrError> {
        self.ocr_api_key
            .as_deref()
            .ok_or(Pdf2OcrError::MissingCredential {
                service: "Mistral OCR",
                var: OCR_API_KEY_VAR,
            })
    }

    pub fn image_host_api_key(&self) -> Result<&str, Pdf2OcrError> {
        self.image_host_api_key
            .as_deref()
            .ok_or(Pdf2OcrError::MissingCredential {
                service: "ImgBB",
                var: IMAGE_HOST_API_KEY_VAR,
            })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("ocr_api_key", &redact(&self.ocr_api_key))
            .field("image_host_api_key", &redact(&self.image_host_api_key))
            .finish()
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Configuration for a pipeline run.
///
/// Built via [`OcrConfig::builder()`] or using [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2ocr::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .dpi(300)
///     .max_attempts(5)
///     .retry_delay_ms(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.retry_policy().max_attempts(), 5);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Rendering DPI for each PDF page. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory under which each rasterisation gets its own
    /// `pdf_{timestamp}` folder. Default: `output_images`.
    pub output_root: PathBuf,

    /// Total attempts per publish/OCR call, first try included. Default: 3.
    ///
    /// `1` disables retry.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds. Default: 2000.
    pub retry_delay_ms: u64,

    /// Reuse pages already completed in the same session. Default: true.
    ///
    /// When false every run re-rasterises and re-processes every page.
    pub resume: bool,

    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub ocr_model: String,

    /// OCR endpoint URL.
    pub ocr_endpoint: String,

    /// Image hosting upload endpoint URL.
    pub image_host_endpoint: String,

    /// Timeout for each HTTP call to the image host or OCR service, in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// API keys for the remote services.
    pub credentials: Credentials,

    /// Optional per-page progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            password: None,
            output_root: PathBuf::from("output_images"),
            max_attempts: 3,
            retry_delay_ms: 2000,
            resume: true,
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            image_host_endpoint: DEFAULT_IMAGE_HOST_ENDPOINT.to_string(),
            request_timeout_secs: 120,
            download_timeout_secs: 120,
            credentials: Credentials::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("dpi", &self.dpi)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("output_root", &self.output_root)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("resume", &self.resume)
            .field("ocr_model", &self.ocr_model)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("image_host_endpoint", &self.image_host_endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("credentials", &self.credentials)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// The retry policy wrapped around every publish and OCR call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = dir.into();
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn resume(mut self, v: bool) -> Self {
        self.config.resume = v;
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = url.into();
        self
    }

    pub fn image_host_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.image_host_endpoint = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, Pdf2OcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(Pdf2OcrError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_attempts == 0 {
            return Err(Pdf2OcrError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.ocr_model.trim().is_empty() {
            return Err(Pdf2OcrError::InvalidConfig("OCR model must not be empty".into()));
        }
        for (name, url) in [
            ("OCR endpoint", &c.ocr_endpoint),
            ("image host endpoint", &c.image_host_endpoint),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Pdf2OcrError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

//! CLI binary for pdf2ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! drives the PDF or URL flow and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2ocr::output::write_text_atomic;
use pdf2ocr::{
    load_document, parse_url_list, Credentials, OcrConfig, OcrPipeline, PdfRunReport,
    PipelineProgressCallback, ProgressCallback, Session, UrlResult,
};
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page or URL.
///
/// Reused across resumed runs of the same session; `on_run_start` resets it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page or URL currently in flight.
    item_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            item_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, unit: &str, prefix: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn start_item(&self, msg: String) {
        if let Ok(mut started) = self.item_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(msg);
    }

    fn item_elapsed(&self) -> String {
        let ms = self
            .item_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        format!("{:.1}s", ms as f64 / 1000.0)
    }

    fn log_ok(&self, label: &str, n: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} {label} {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            n,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&self.item_elapsed()),
        ));
        self.bar.inc(1);
    }

    fn log_err(&self, label: &str, n: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {label} {:>3}/{:<3}  {}  {}",
            red("✗"),
            n,
            total,
            red(&truncate(error, 80)),
            dim(&self.item_elapsed()),
        ));
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize, resumed_pages: usize) {
        self.activate_bar(total_pages, "pages", "OCR");
        self.bar.set_position(resumed_pages as u64);
        let line = if resumed_pages > 0 {
            format!("Resuming at page {} of {total_pages}…", resumed_pages + 1)
        } else {
            format!("Starting OCR of {total_pages} pages…")
        };
        self.bar.println(format!("{} {}", cyan("◆"), bold(&line)));
    }

    fn on_publish_start(&self, page: usize, _total: usize) {
        self.start_item(format!("page {page}: uploading"));
    }

    fn on_recognize_start(&self, page: usize, _total: usize) {
        // Keep the timer running if the upload already started it.
        if let Ok(mut started) = self.item_started.lock() {
            started.get_or_insert_with(Instant::now);
        }
        self.bar.set_message(format!("page {page}: OCR"));
    }

    fn on_page_complete(&self, page: usize, total: usize, text_len: usize) {
        self.log_ok("Page", page, total, text_len);
    }

    fn on_page_error(&self, page: usize, total: usize, error: &str) {
        self.log_err("Page", page, total, error);
    }

    fn on_run_complete(&self, total_pages: usize, completed_pages: usize) {
        self.bar.finish_and_clear();
        if completed_pages == total_pages {
            eprintln!(
                "{} {} pages recognised",
                green("✔"),
                bold(&completed_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages recognised, run stopped at page {}",
                yellow("⚠"),
                bold(&completed_pages.to_string()),
                total_pages,
                completed_pages + 1,
            );
        }
    }

    fn on_url_start(&self, index: usize, total: usize) {
        if index == 1 {
            self.activate_bar(total, "URLs", "OCR");
        }
        self.start_item(format!("URL {index}"));
    }

    fn on_url_complete(&self, index: usize, total: usize, text_len: usize) {
        self.log_ok("URL", index, total, text_len);
        if index == total {
            self.bar.finish_and_clear();
        }
    }

    fn on_url_error(&self, index: usize, total: usize, error: &str) {
        self.log_err("URL", index, total, error);
        self.bar.inc(1);
        if index == total {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a scanned PDF (stdout)
  pdf2ocr pdf scan.pdf

  # Write the text to a file and list the rendered page images
  pdf2ocr pdf scan.pdf -o scan.txt --show-images

  # PDF from a URL, machine-readable report
  pdf2ocr pdf https://example.com/report.pdf --json > report.json

  # OCR images that are already hosted, one file per URL
  pdf2ocr urls https://i.ibb.co/a.png https://i.ibb.co/b.png --out-dir out/

  # URL list from a file (newline or comma separated)
  pdf2ocr urls --from-file urls.txt

OUTPUT FORMAT:
  Pages are joined as

    --- Page 1 ---

    <text of page 1>

    --- Page 2 ---
    ...

RETRIES & RESUME:
  Every upload and OCR call is tried up to --max-attempts times, waiting
  --retry-delay-ms between attempts. In the pdf flow the first page that
  still fails stops the run; text of the pages before it is kept. In a
  terminal you are then asked whether to resume, which retries from the
  failed page without re-rendering or re-uploading finished pages.

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY    Mistral API key (required by both flows)
  IMGBB_API_KEY      ImgBB API key (required by the pdf flow)
  PDFIUM_LIB_PATH    Path to libpdfium, if not next to the binary or installed
  RUST_LOG           Override the log filter (e.g. pdf2ocr=debug)

  A .env file in the working directory is loaded if present.
"#;

/// OCR scanned PDFs and hosted images with Mistral OCR.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2ocr",
    version,
    about = "OCR scanned PDFs and hosted images with Mistral OCR",
    long_about = "Render each PDF page to an image, publish it to ImgBB and extract its text \
with Mistral OCR. Pages run in order with retries; an interrupted run can be resumed without \
redoing finished pages. Images you already host can be OCR'd directly.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a PDF, upload every page and OCR it.
    Pdf(PdfArgs),
    /// OCR images that are already publicly hosted.
    Urls(UrlsArgs),
}

#[derive(Args, Debug)]
struct PdfArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the text to this file instead of stdout.
    #[arg(short, long, env = "PDF2OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// List the saved page images after the run.
    #[arg(long)]
    show_images: bool,

    /// Re-render and redo every page instead of resuming.
    #[arg(long, env = "PDF2OCR_NO_RESUME")]
    no_resume: bool,

    /// Never ask to resume after a failed page.
    #[arg(long, env = "PDF2OCR_NO_PROMPT")]
    no_prompt: bool,

    /// Print the run report as JSON instead of plain text.
    #[arg(long, env = "PDF2OCR_JSON")]
    json: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2OCR_PASSWORD")]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct UrlsArgs {
    /// Image URLs (https:// only). Commas inside an argument also separate.
    urls: Vec<String>,

    /// Read URLs from this file (newline or comma separated).
    #[arg(long, value_name = "FILE")]
    from_file: Option<PathBuf>,

    /// Write each result to DIR/ocr_output_{N}.txt instead of stdout.
    #[arg(long, value_name = "DIR", env = "PDF2OCR_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, env = "PDF2OCR_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Rendering DPI (72–600).
    #[arg(long, global = true, env = "PDF2OCR_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Directory under which each run's page images are saved.
    #[arg(long, global = true, env = "PDF2OCR_OUTPUT_ROOT", default_value = "output_images")]
    output_root: PathBuf,

    /// Attempts per upload/OCR call; 1 disables retries.
    #[arg(long, global = true, env = "PDF2OCR_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Wait between attempts, in milliseconds.
    #[arg(long, global = true, env = "PDF2OCR_RETRY_DELAY_MS", default_value_t = 2000)]
    retry_delay_ms: u64,

    /// OCR model ID.
    #[arg(long, global = true, env = "PDF2OCR_MODEL", default_value = pdf2ocr::config::DEFAULT_OCR_MODEL)]
    model: String,

    /// OCR API endpoint.
    #[arg(long, global = true, env = "PDF2OCR_OCR_ENDPOINT",
          default_value = pdf2ocr::config::DEFAULT_OCR_ENDPOINT)]
    ocr_endpoint: String,

    /// Image host upload endpoint.
    #[arg(long, global = true, env = "PDF2OCR_IMAGE_HOST_ENDPOINT",
          default_value = pdf2ocr::config::DEFAULT_IMAGE_HOST_ENDPOINT)]
    image_host_endpoint: String,

    /// Per-request timeout for upload and OCR calls, in seconds.
    #[arg(long, global = true, env = "PDF2OCR_REQUEST_TIMEOUT", default_value_t = 120)]
    request_timeout: u64,

    /// PDF download timeout in seconds.
    #[arg(long, global = true, env = "PDF2OCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2OCR_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDF2OCR_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Missing .env is fine; real environment variables win either way.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let g = &cli.global;

    let json = match &cli.command {
        Command::Pdf(a) => a.json,
        Command::Urls(a) => a.json,
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-page feedback, so INFO logs are
    // suppressed while it is shown.
    let show_progress = !g.quiet && !g.no_progress && !json && io::stderr().is_terminal();
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Pdf(args) => {
            let config = build_config(g, args.password.clone(), !args.no_resume, progress_cb)?;
            run_pdf(args, g, &config).await
        }
        Command::Urls(args) => {
            let config = build_config(g, None, true, progress_cb)?;
            run_urls(args, g, &config).await
        }
    }
}

/// Map CLI args to `OcrConfig`.
fn build_config(
    g: &GlobalArgs,
    password: Option<String>,
    resume: bool,
    progress: Option<ProgressCallback>,
) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .dpi(g.dpi)
        .output_root(&g.output_root)
        .max_attempts(g.max_attempts)
        .retry_delay_ms(g.retry_delay_ms)
        .resume(resume)
        .ocr_model(&g.model)
        .ocr_endpoint(&g.ocr_endpoint)
        .image_host_endpoint(&g.image_host_endpoint)
        .request_timeout_secs(g.request_timeout)
        .download_timeout_secs(g.download_timeout)
        .credentials(Credentials::from_env());

    if let Some(pwd) = password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

// ── pdf ──────────────────────────────────────────────────────────────────────

async fn run_pdf(args: &PdfArgs, g: &GlobalArgs, config: &OcrConfig) -> Result<ExitCode> {
    // Both API keys are checked here, before the PDF is even loaded.
    let pipeline = OcrPipeline::from_config(config)?;
    let document = load_document(&args.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load '{}'", args.input))?;

    let interactive = !args.no_prompt && !args.json && io::stdin().is_terminal();
    let mut session = Session::new();

    let report = loop {
        let report = pipeline
            .process_document(&mut session, &document)
            .await
            .context("OCR failed")?;

        let Some(ref failure) = report.failure else {
            break report;
        };

        eprintln!("{} {}", red("✘"), failure);
        if !interactive {
            break report;
        }
        let done = report.stats.completed_pages;
        let question = format!(
            "{}/{} pages done. Resume from page {}?",
            done,
            report.stats.total_pages,
            failure.page()
        );
        if !tokio::task::block_in_place(|| confirm(&question))? {
            break report;
        }
    };

    emit_pdf_report(&report, args, g).await?;

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn emit_pdf_report(report: &PdfRunReport, args: &PdfArgs, g: &GlobalArgs) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
    } else if let Some(ref path) = args.output {
        if report.text.is_empty() {
            eprintln!("{} no text recognised, {} not written", yellow("⚠"), path.display());
        } else {
            report
                .save_text(path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !g.quiet {
                eprintln!(
                    "{}  {}/{} pages  {}ms  →  {}",
                    if report.is_complete() { green("✔") } else { yellow("⚠") },
                    report.stats.completed_pages,
                    report.stats.total_pages,
                    report.stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
    } else if !report.text.is_empty() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(report.text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").context("Failed to write to stdout")?;
    }

    if args.show_images && !args.json {
        if let Some(ref dir) = report.image_dir {
            eprintln!("{} {}", cyan("◆"), bold(&format!("Page images in {}", dir.display())));
        }
        for image in &report.images {
            eprintln!(
                "  page {:>3}  {}x{} @ {} DPI  {}",
                image.index,
                image.width,
                image.height,
                image.dpi,
                dim(&image.path.display().to_string()),
            );
        }
    }

    if !g.quiet && !args.json && report.stats.resumed_pages > 0 {
        eprintln!(
            "   {} pages reused from an earlier run",
            dim(&report.stats.resumed_pages.to_string())
        );
    }
    Ok(())
}

/// Ask a yes/no question on stderr; anything but y/yes is "no".
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush().context("Failed to flush stderr")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read answer")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// ── urls ─────────────────────────────────────────────────────────────────────

async fn run_urls(args: &UrlsArgs, g: &GlobalArgs, config: &OcrConfig) -> Result<ExitCode> {
    // Only the OCR key is needed here; fail before reading any input.
    let recognizer = pdf2ocr::convert::recognizer_from_config(config)?;

    let mut raw = args.urls.join("\n");
    if let Some(ref file) = args.from_file {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read URL list from {}", file.display()))?;
        raw.push('\n');
        raw.push_str(&content);
    }
    if args.urls.is_empty() && args.from_file.is_none() && !io::stdin().is_terminal() {
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read URL list from stdin")?;
    }

    let urls = parse_url_list(&raw);
    if urls.is_empty() {
        eprintln!(
            "{} no valid image URL given (each must start with https://)",
            yellow("⚠")
        );
        return Ok(ExitCode::FAILURE);
    }

    let progress = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(pdf2ocr::NoopProgressCallback));
    let results =
        pdf2ocr::recognize_urls(recognizer, config.retry_policy(), &urls, progress).await;

    emit_url_results(&results, args, g).await?;

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    if !g.quiet && !args.json {
        eprintln!(
            "{} {}/{} URLs recognised",
            if failed == 0 { green("✔") } else { yellow("⚠") },
            results.len() - failed,
            results.len()
        );
    }
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn emit_url_results(results: &[UrlResult], args: &UrlsArgs, g: &GlobalArgs) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(results).context("Failed to serialise results")?;
        println!("{json}");
        return Ok(());
    }

    for r in results {
        if let Some(ref err) = r.error {
            eprintln!("{} {} ({})", red("✗"), err, r.url);
            continue;
        }
        match args.out_dir {
            Some(ref dir) => {
                let path = dir.join(r.file_name());
                write_text_atomic(&path, &r.text)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !g.quiet {
                    eprintln!("{} {}  →  {}", green("✓"), r.url, bold(&path.display().to_string()));
                }
            }
            None => {
                println!("--- URL {}: {} ---\n", r.index, r.url);
                println!("{}\n", r.text.trim());
            }
        }
    }
    Ok(())
}

//! CLI binary for arabicpdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig`, runs the batch and writes the artifact.

use anyhow::{Context, Result};
use arabicpdf::{
    process_paths, write_artifact, BatchProgressCallback, BatchSummary, FailureFallback,
    FileDisposition, FileReport, InputFormat, OutputMode, PipelineConfig, ProgressCallback,
    DEFAULT_RULES,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Truncate to `max` characters, never splitting a code point.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

/// One line per file: status glyph, name, extraction method, time, and
/// the first error if any.
fn status_line(report: &FileReport, total: usize) -> String {
    let glyph = match report.disposition {
        FileDisposition::FullyProcessed => green("✓"),
        FileDisposition::Empty => dim("∅"),
        FileDisposition::Degraded => yellow("⚠"),
        FileDisposition::Failed => red("✗"),
    };
    let mut line = format!(
        "  {} {:>3}/{:<3}  {}  {}  {}",
        glyph,
        report.index + 1,
        total,
        truncate(&report.source_name, 40),
        dim(&format!("[{}]", report.method)),
        dim(&format!("{:.1}s", report.duration_ms as f64 / 1000.0)),
    );
    if let Some(e) = report.errors.first() {
        line.push_str("  ");
        line.push_str(&red(&truncate(&e.to_string(), 80)));
    }
    line
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per file.
/// Files may complete out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    total: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.total.store(total_files, Ordering::SeqCst);
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} files…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, source_name: &str) {
        self.bar.set_message(truncate(source_name, 30));
    }

    fn on_file_error(&self, _index: usize, _source_name: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_complete(&self, report: &FileReport) {
        self.bar
            .println(status_line(report, self.total.load(Ordering::SeqCst)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _summary: &BatchSummary) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge several scans into one Word document
  arabicpdf scan1.pdf scan2.pdf scan3.pdf -o merged.docx

  # One Word file per PDF, zipped
  arabicpdf --mode archive *.pdf -o words.zip

  # Custom correction rules, Gemini model
  arabicpdf --rules-file rules.txt --provider gemini --model gemini-2.0-flash book.pdf

  # Local OCR only (no Google Cloud Vision)
  arabicpdf --no-cloud-ocr --dpi 400 scan.pdf

  # Keep the raw extracted text when the LLM refuses or fails
  arabicpdf --raw-text-fallback report.pdf

  # Machine-readable per-file report
  arabicpdf --json a.pdf b.pdf > report.json

EXTRACTION ORDER (per PDF, first non-empty result wins):
  1. Embedded text layer (pdfium)
  2. Local OCR: pages rendered at --dpi, read by tesseract (-l --lang)
  3. Google Cloud Vision document OCR (needs --vision-api-key)

FILE STATUS:
  ✓  extracted and rewritten
  ∅  no text found; a placeholder page stands in
  ⚠  extracted, but the LLM refused or failed; placeholder (or raw text)
  ✗  extraction failed; file left out

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  GOOGLE_VISION_API_KEY   Google Cloud Vision API key
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Arabic PDF → right-to-left Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "arabicpdf",
    version,
    about = "Extract Arabic text from PDFs, correct it with an LLM, and build RTL Word documents",
    long_about = "Extract text from Arabic PDF documents (text layer, tesseract OCR, or Google \
Cloud Vision), rewrite it with an LLM under configurable correction rules, and assemble \
right-to-left Word documents, merged into one file or zipped individually.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or DOCX paths or HTTP/HTTPS URLs, in output order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Artifact path. Default: merged_documents.docx or arabic_pdf_word_files.zip.
    #[arg(short, long, env = "ARABICPDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Merge into one document, or zip one document per input.
    #[arg(long, env = "ARABICPDF_MODE", value_enum, default_value = "merge")]
    mode: ModeArg,

    /// Text file with the correction rules sent to the LLM.
    #[arg(long, env = "ARABICPDF_RULES_FILE")]
    rules_file: Option<PathBuf>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// OCR rendering DPI (200–600).
    #[arg(long, env = "ARABICPDF_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(200..=600))]
    dpi: u32,

    /// Tesseract language(s), e.g. ara or ara+eng.
    #[arg(long, env = "ARABICPDF_LANG", default_value = "ara")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "ARABICPDF_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Skip Google Cloud Vision as the last extraction step.
    #[arg(long, env = "ARABICPDF_NO_CLOUD_OCR")]
    no_cloud_ocr: bool,

    /// Google Cloud Vision API key.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,

    /// Path to libpdfium (file or containing directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Use the extracted text when the LLM refuses or fails.
    #[arg(long, env = "ARABICPDF_RAW_TEXT_FALLBACK")]
    raw_text_fallback: bool,

    /// How to read inputs: auto, pdf, docx.
    #[arg(long, env = "ARABICPDF_INPUT_FORMAT", value_enum, default_value = "auto")]
    input_format: InputFormatArg,

    /// Font family for Latin and Arabic text.
    #[arg(long, env = "ARABICPDF_FONT", default_value = "Arial")]
    font: String,

    /// Font size in points.
    #[arg(long, env = "ARABICPDF_FONT_SIZE", default_value_t = 14)]
    font_size: u32,

    /// Files processed at once.
    #[arg(short, long, env = "ARABICPDF_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ARABICPDF_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per file.
    #[arg(long, env = "ARABICPDF_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call LLM and cloud OCR timeout in seconds.
    #[arg(long, env = "ARABICPDF_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ARABICPDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "ARABICPDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ARABICPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARABICPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ARABICPDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Merge,
    Archive,
}

impl From<ModeArg> for OutputMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Merge => OutputMode::Merge,
            ModeArg::Archive => OutputMode::Archive,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum InputFormatArg {
    Auto,
    Pdf,
    Docx,
}

impl From<InputFormatArg> for InputFormat {
    fn from(v: InputFormatArg) -> Self {
        match v {
            InputFormatArg::Auto => InputFormat::Auto,
            InputFormatArg::Pdf => InputFormat::Pdf,
            InputFormatArg::Docx => InputFormat::Docx,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run batch ────────────────────────────────────────────────────────
    let output = process_paths(&cli.inputs, &config)
        .await
        .context("Batch failed")?;

    if !cli.quiet && !show_progress && !cli.json {
        let total = output.reports.len();
        for report in &output.reports {
            eprintln!("{}", status_line(report, total));
        }
    }

    // ── Write artifact ───────────────────────────────────────────────────
    let written = match output.artifact {
        Some(ref artifact) => {
            let path = cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&artifact.filename));
            write_artifact(artifact, &path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        let s = &output.summary;
        let glyph = if s.fully_processed == s.total_files {
            green("✔")
        } else if s.failed == s.total_files {
            red("✘")
        } else {
            cyan("⚠")
        };
        let mut extra = Vec::new();
        if s.empty > 0 {
            extra.push(format!("{} empty", s.empty));
        }
        if s.degraded > 0 {
            extra.push(format!("{} degraded", s.degraded));
        }
        if s.failed > 0 {
            extra.push(red(&format!("{} failed", s.failed)));
        }
        if s.skipped_at_composition > 0 {
            extra.push(format!("{} skipped at composition", s.skipped_at_composition));
        }
        let extra = if extra.is_empty() {
            String::new()
        } else {
            format!("  ({})", extra.join(", "))
        };

        match written {
            Some(path) => eprintln!(
                "{} {}{}  {}ms  →  {}",
                glyph,
                bold(&s.to_string()),
                extra,
                s.total_duration_ms,
                bold(&path.display().to_string()),
            ),
            None => eprintln!(
                "{} {}{}  {}",
                glyph,
                bold(&s.to_string()),
                extra,
                red("no document produced"),
            ),
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let rules = match cli.rules_file {
        Some(ref path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read rules from {:?}", path))?,
        None => DEFAULT_RULES.to_string(),
    };

    let fallback = if cli.raw_text_fallback {
        FailureFallback::RawText
    } else {
        FailureFallback::Placeholder
    };

    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .ocr_language(cli.lang.clone())
        .page_seg_mode(cli.psm)
        .tesseract_path(cli.tesseract.clone())
        .cloud_ocr(!cli.no_cloud_ocr)
        .rules(rules)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency)
        .input_format(cli.input_format.into())
        .output_mode(cli.mode.into())
        .failure_fallback(fallback)
        .font_family(cli.font.clone())
        .font_size_pt(cli.font_size);

    if let Some(ref key) = cli.vision_api_key {
        builder = builder.cloud_ocr_api_key(key.clone());
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

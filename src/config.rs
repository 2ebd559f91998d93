//! Configuration types for a batch run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Credentials are explicit fields, and the
//! library never writes the process environment. When no LLM provider is
//! injected, provider auto-detection reads the usual provider variables
//! (`EDGEQUAKE_LLM_PROVIDER`, `EDGEQUAKE_MODEL`, `GEMINI_API_KEY`, …).

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_RULES;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default name of the composite document in [`OutputMode::Merge`].
pub const DEFAULT_MERGED_FILENAME: &str = "merged_documents.docx";

/// Default name of the zip archive in [`OutputMode::Archive`].
pub const DEFAULT_ARCHIVE_FILENAME: &str = "arabic_pdf_word_files.zip";

/// Configuration for a batch run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use arabicpdf::{OutputMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .ocr_language("ara")
///     .output_mode(OutputMode::Archive)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rasterisation DPI for local OCR. Range: 200–600. Default: 300.
    ///
    /// Tesseract's Arabic model is trained on ~300 DPI scans; below 200 the
    /// dots that separate ب/ت/ث are lost.
    pub dpi: u32,

    /// Maximum rendered page dimension in pixels. Default: 5000.
    ///
    /// Caps either edge of the raster, scaling the other proportionally.
    pub max_rendered_pixels: u32,

    /// Tesseract language pack(s), e.g. "ara" or "ara+eng". Default: "ara".
    pub ocr_language: String,

    /// Tesseract executable. Default: "tesseract" (looked up on `PATH`).
    pub tesseract_path: PathBuf,

    /// Tesseract page segmentation mode. Default: 6 (one uniform text block).
    pub page_seg_mode: u8,

    /// Whether the cloud document-OCR method is part of the chain. Default: true.
    pub cloud_ocr: bool,

    /// Google Cloud Vision API key. Without it, a scan that reaches cloud
    /// OCR fails with a configuration error; disable `cloud_ocr` to opt out.
    pub cloud_ocr_api_key: Option<String>,

    /// Language hints sent with cloud OCR requests. Default: `["ar"]`.
    pub cloud_ocr_language_hints: Vec<String>,

    /// Override for the Vision `files:annotate` endpoint.
    pub cloud_ocr_endpoint: Option<String>,

    /// The pdfium shared library, or the directory containing it. `None`
    /// uses the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// LLM model identifier, e.g. "gemini-2.0-flash". If None, uses the
    /// provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per file. Default: 8192.
    pub max_tokens: usize,

    /// Cleanup instructions sent with every file's text.
    /// Default: [`DEFAULT_RULES`].
    pub rules: String,

    /// Per-remote-call timeout (LLM and cloud OCR) in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Number of files processed at once. Default: 1.
    pub concurrency: usize,

    /// How to interpret input bytes. Default: [`InputFormat::Auto`].
    pub input_format: InputFormat,

    /// Merged document or zip archive. Default: [`OutputMode::Merge`].
    pub output_mode: OutputMode,

    /// What a degraded file renders. Default: [`FailureFallback::Placeholder`].
    pub failure_fallback: FailureFallback,

    /// Font used for both Latin and complex-script text. Default: "Arial".
    pub font_family: String,

    /// Font size in points. Default: 14.
    pub font_size_pt: u32,

    /// Artifact name in merge mode.
    pub merged_filename: String,

    /// Artifact name in archive mode.
    pub archive_filename: String,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 5000,
            ocr_language: "ara".to_string(),
            tesseract_path: PathBuf::from("tesseract"),
            page_seg_mode: 6,
            cloud_ocr: true,
            cloud_ocr_api_key: None,
            cloud_ocr_language_hints: vec!["ar".to_string()],
            cloud_ocr_endpoint: None,
            pdfium_lib_path: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            rules: DEFAULT_RULES.to_string(),
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            concurrency: 1,
            input_format: InputFormat::default(),
            output_mode: OutputMode::default(),
            failure_fallback: FailureFallback::default(),
            font_family: "Arial".to_string(),
            font_size_pt: 14,
            merged_filename: DEFAULT_MERGED_FILENAME.to_string(),
            archive_filename: DEFAULT_ARCHIVE_FILENAME.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("page_seg_mode", &self.page_seg_mode)
            .field("cloud_ocr", &self.cloud_ocr)
            .field(
                "cloud_ocr_api_key",
                &self.cloud_ocr_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("rules_len", &self.rules.len())
            .field("concurrency", &self.concurrency)
            .field("input_format", &self.input_format)
            .field("output_mode", &self.output_mode)
            .field("failure_fallback", &self.failure_fallback)
            .field("font_family", &self.font_family)
            .field("font_size_pt", &self.font_size_pt)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Name of the artifact for the configured output mode.
    pub fn artifact_filename(&self) -> &str {
        match self.output_mode {
            OutputMode::Merge => &self.merged_filename,
            OutputMode::Archive => &self.archive_filename,
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(200, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(500);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn page_seg_mode(mut self, psm: u8) -> Self {
        self.config.page_seg_mode = psm;
        self
    }

    pub fn cloud_ocr(mut self, enabled: bool) -> Self {
        self.config.cloud_ocr = enabled;
        self
    }

    pub fn cloud_ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.cloud_ocr_api_key = Some(key.into());
        self
    }

    pub fn cloud_ocr_language_hints(mut self, hints: Vec<String>) -> Self {
        self.config.cloud_ocr_language_hints = hints;
        self
    }

    pub fn cloud_ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.cloud_ocr_endpoint = Some(url.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn rules(mut self, rules: impl Into<String>) -> Self {
        self.config.rules = rules.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn input_format(mut self, format: InputFormat) -> Self {
        self.config.input_format = format;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self
    }

    pub fn failure_fallback(mut self, fallback: FailureFallback) -> Self {
        self.config.failure_fallback = fallback;
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.config.font_family = family.into();
        self
    }

    pub fn font_size_pt(mut self, pt: u32) -> Self {
        self.config.font_size_pt = pt;
        self
    }

    pub fn merged_filename(mut self, name: impl Into<String>) -> Self {
        self.config.merged_filename = name.into();
        self
    }

    pub fn archive_filename(mut self, name: impl Into<String>) -> Self {
        self.config.archive_filename = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.dpi < 200 || c.dpi > 600 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 200–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.page_seg_mode > 13 {
            return Err(PipelineError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                c.page_seg_mode
            )));
        }
        if c.font_family.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Font family must not be empty".into(),
            ));
        }
        if !(1..=200).contains(&c.font_size_pt) {
            return Err(PipelineError::InvalidConfig(format!(
                "Font size must be 1–200 pt, got {}",
                c.font_size_pt
            )));
        }
        if c.merged_filename.trim().is_empty() || c.archive_filename.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Artifact filenames must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How input bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputFormat {
    /// Detect by magic bytes, then by extension. (default)
    #[default]
    Auto,
    Pdf,
    Docx,
}

/// What the batch produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// One composite DOCX with a page break between sources. (default)
    #[default]
    Merge,
    /// A zip holding one DOCX per source.
    Archive,
}

/// What a file renders when its LLM rewrite is blocked or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureFallback {
    /// The "no content extracted" placeholder. (default)
    #[default]
    Placeholder,
    /// The extracted text, un-rewritten.
    RawText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.ocr_language, "ara");
        assert_eq!(c.page_seg_mode, 6);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.output_mode, OutputMode::Merge);
        assert_eq!(c.failure_fallback, FailureFallback::Placeholder);
        assert_eq!(c.artifact_filename(), "merged_documents.docx");
        assert_eq!(c.rules, DEFAULT_RULES);
    }

    #[test]
    fn builder_clamps_dpi_and_concurrency() {
        let c = PipelineConfig::builder()
            .dpi(72)
            .concurrency(0)
            .build()
            .expect("valid");
        assert_eq!(c.dpi, 200);
        assert_eq!(c.concurrency, 1);

        let c = PipelineConfig::builder().dpi(1200).build().expect("valid");
        assert_eq!(c.dpi, 600);
    }

    #[test]
    fn build_rejects_bad_values() {
        assert!(PipelineConfig::builder().page_seg_mode(14).build().is_err());
        assert!(PipelineConfig::builder().font_size_pt(0).build().is_err());
        assert!(PipelineConfig::builder().ocr_language(" ").build().is_err());
        assert!(PipelineConfig::builder().font_family("").build().is_err());
        assert!(matches!(
            PipelineConfig::builder().api_timeout_secs(0).build(),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(PipelineConfig::builder().api_timeout_secs(1).build().is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = PipelineConfig::builder()
            .cloud_ocr_api_key("secret-key")
            .build()
            .expect("valid");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn archive_mode_uses_archive_filename() {
        let c = PipelineConfig::builder()
            .output_mode(OutputMode::Archive)
            .build()
            .expect("valid");
        assert_eq!(c.artifact_filename(), "arabic_pdf_word_files.zip");
    }
}

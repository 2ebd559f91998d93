//! # arabicpdf
//!
//! Turn batches of Arabic PDFs (scanned or digital) into right-to-left Word
//! documents, merged into one file or zipped individually.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    text layer → local OCR (tesseract) → cloud OCR (Vision)
//!  ├─ 3. Transform  one LLM call per file under the correction rules
//!  ├─ 4. Build      one RTL paragraph per line, or a placeholder
//!  └─ 5. Output     merged DOCX with page breaks, or a zip of DOCX files
//! ```
//!
//! Per-file problems never stop the batch: they are recorded in each
//! [`FileReport`] and the file is degraded or left out. Only configuration
//! problems (no OCR engine, no credentials) abort.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arabicpdf::{process_paths, write_artifact, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = PipelineConfig::default();
//!     let inputs = vec!["scan1.pdf".to_string(), "scan2.pdf".to_string()];
//!     let output = process_paths(&inputs, &config).await?;
//!     println!("{}", output.summary);
//!     if let Some(artifact) = &output.artifact {
//!         write_artifact(artifact, &artifact.filename).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arabicpdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! arabicpdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod docx;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_batch, process_batch_sync, process_paths, write_artifact, Pipeline};
pub use config::{
    FailureFallback, InputFormat, OutputMode, PipelineConfig, PipelineConfigBuilder,
    DEFAULT_ARCHIVE_FILENAME, DEFAULT_MERGED_FILENAME,
};
pub use error::{FileError, PipelineError};
pub use output::{
    ArtifactKind, BatchOutput, BatchSummary, ExtractionMethod, ExtractionResult,
    ExtractionStatus, FailureKind, FileDisposition, FileReport, OutputArtifact, TransformResult,
    TransformStatus,
};
pub use pipeline::build::{DocumentBuilder, RenderedDocument};
pub use pipeline::compose::{merge, CompositeDocument, MergeUnit};
pub use pipeline::extract::TextExtractor;
pub use pipeline::input::SourceFile;
pub use pipeline::transform::TextTransformer;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::DEFAULT_RULES;

//! Error types for the arabicpdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the call cannot proceed at all (bad
//!   input, empty merge set, OCR engine or credentials missing, provider not
//!   configured). Returned as `Err(PipelineError)`.
//!
//! * [`FileError`] — **Non-fatal**: a single source file degraded (nothing
//!   could be extracted, the LLM refused or failed, its document could not be
//!   appended) but the batch carries on. Stored inside
//!   [`crate::output::FileReport`] for end-of-batch reporting.
//!
//! Configuration problems are the one per-file condition that is promoted to
//! a fatal error: a missing OCR binary or API key would fail every remaining
//! file the same way.

use crate::docx::DocxError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the arabicpdf library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Malformed arguments: empty merge set, non-contiguous ordinals, empty
    /// archive, an input string that is neither a path nor a URL.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF nor a DOCX package.
    #[error("Unsupported file '{name}': not a PDF or DOCX (first bytes: {magic:?})")]
    UnsupportedFormat { name: String, magic: [u8; 4] },

    // ── Configuration errors ──────────────────────────────────────────────
    /// A required dependency or credential is missing; escalated because it
    /// would recur for every file.
    #[error("Configuration error: {detail}")]
    Configuration { detail: String },

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Install libpdfium system-wide, or place it next to the executable.\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Composition errors ────────────────────────────────────────────────
    /// No merge unit could be decoded; there is nothing to compose.
    #[error("Composition failed: {detail}")]
    CompositionFailed { detail: String },

    /// A document could not be packed or unpacked.
    #[error(transparent)]
    Document(#[from] DocxError),

    /// The output zip archive could not be written.
    #[error("Failed to build archive: {0}")]
    Archive(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(e: zip::result::ZipError) -> Self {
        PipelineError::Archive(e.to_string())
    }
}

/// A non-fatal error for a single source file.
///
/// Collected in [`crate::output::FileReport::errors`]. The batch continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Every extraction method failed; the file is left out of the output.
    #[error("'{file}': text extraction failed: {detail}")]
    ExtractionFailed { file: String, detail: String },

    /// The LLM refused the content on policy grounds.
    #[error("'{file}': LLM blocked the content: {reason}")]
    TransformBlocked { file: String, reason: String },

    /// Transport, auth, quota or timeout error from the LLM.
    #[error("'{file}': LLM call failed: {reason}")]
    TransformFailed { file: String, reason: String },

    /// The LLM answered with nothing.
    #[error("'{file}': LLM returned no content")]
    TransformEmpty { file: String },

    /// The file's document could not be appended to the composite.
    #[error("'{file}': document could not be merged: {detail}")]
    CompositionFailed { file: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display() {
        let e = PipelineError::Configuration {
            detail: "tesseract not found".into(),
        };
        assert!(e.to_string().contains("tesseract not found"));
    }

    #[test]
    fn unsupported_format_display() {
        let e = PipelineError::UnsupportedFormat {
            name: "notes.txt".into(),
            magic: *b"hell",
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
    }

    #[test]
    fn docx_error_is_transparent() {
        let e: PipelineError = DocxError::MissingPart("word/document.xml".into()).into();
        assert!(e.to_string().contains("word/document.xml"));
    }

    #[test]
    fn file_error_names_the_file() {
        let e = FileError::TransformBlocked {
            file: "a.pdf".into(),
            reason: "SAFETY".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.pdf"));
        assert!(msg.contains("SAFETY"));
    }

    #[test]
    fn file_error_serialises() {
        let e = FileError::TransformEmpty {
            file: "b.pdf".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("TransformEmpty"));
    }
}

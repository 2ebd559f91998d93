//! Result types: per-stage outcomes, per-file reports, and the batch output.
//!
//! Stage results are tagged unions so "nothing was found" and "this could not
//! be processed" can never be confused: an empty extraction is
//! [`ExtractionResult::EmptyText`], never a missing value, and every failure
//! carries its reason.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Extraction ───────────────────────────────────────────────────────────

/// Which extraction method produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    /// Text layer parsed directly (PDF) or paragraph text read (DOCX).
    Structural,
    /// Pages rasterised and recognised by the local OCR engine.
    LocalOcr,
    /// Original bytes recognised by the cloud document-OCR service.
    CloudOcr,
    /// No method produced text.
    None,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionMethod::Structural => "structural",
            ExtractionMethod::LocalOcr => "local-ocr",
            ExtractionMethod::CloudOcr => "cloud-ocr",
            ExtractionMethod::None => "none",
        };
        f.write_str(s)
    }
}

/// Flat status view of an [`ExtractionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionStatus {
    Success,
    EmptyText,
    Failure,
}

/// Why an extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The file itself could not be processed (corrupt, unreadable).
    Processing,
    /// A dependency or credential is missing; needs a human to fix setup.
    Configuration,
}

/// Outcome of [`crate::pipeline::extract::TextExtractor::extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractionResult {
    /// Non-empty text produced by `method`.
    Success {
        text: String,
        method: ExtractionMethod,
    },
    /// Every method ran and found only whitespace (e.g. a blank page).
    EmptyText,
    /// Nothing could be processed.
    Failure { detail: String, kind: FailureKind },
}

impl ExtractionResult {
    pub fn status(&self) -> ExtractionStatus {
        match self {
            ExtractionResult::Success { .. } => ExtractionStatus::Success,
            ExtractionResult::EmptyText => ExtractionStatus::EmptyText,
            ExtractionResult::Failure { .. } => ExtractionStatus::Failure,
        }
    }

    /// `Some(non-empty)` on success, `Some("")` when empty, `None` on failure.
    pub fn text(&self) -> Option<&str> {
        match self {
            ExtractionResult::Success { text, .. } => Some(text),
            ExtractionResult::EmptyText => Some(""),
            ExtractionResult::Failure { .. } => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match self {
            ExtractionResult::Failure { detail, .. } => Some(detail),
            _ => None,
        }
    }

    pub fn method_used(&self) -> ExtractionMethod {
        match self {
            ExtractionResult::Success { method, .. } => *method,
            _ => ExtractionMethod::None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExtractionResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ── Transformation ───────────────────────────────────────────────────────

/// Flat status view of a [`TransformResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformStatus {
    Success,
    Blocked,
    Empty,
    Failure,
}

/// Outcome of [`crate::pipeline::transform::TextTransformer::transform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformResult {
    Success { text: String },
    /// Refused by the service's content policy.
    Blocked { reason: String },
    /// No input, or the service answered with nothing.
    Empty,
    /// Transport, auth, quota, timeout or any other error.
    Failure { reason: String },
}

impl TransformResult {
    pub fn status(&self) -> TransformStatus {
        match self {
            TransformResult::Success { .. } => TransformStatus::Success,
            TransformResult::Blocked { .. } => TransformStatus::Blocked,
            TransformResult::Empty => TransformStatus::Empty,
            TransformResult::Failure { .. } => TransformStatus::Failure,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            TransformResult::Success { text } => Some(text),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TransformResult::Blocked { reason } | TransformResult::Failure { reason } => {
                Some(reason)
            }
            _ => None,
        }
    }
}

// ── Per-file report ──────────────────────────────────────────────────────

/// Final disposition of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileDisposition {
    /// Text extracted and rewritten; real content in the output.
    FullyProcessed,
    /// Nothing to extract; a placeholder stands in for the file.
    Empty,
    /// Extracted, but the rewrite was blocked, failed, or came back empty;
    /// a placeholder (or the raw text, if configured) stands in.
    Degraded,
    /// Extraction failed or the document could not be merged; the file is
    /// absent from the output.
    Failed,
}

impl fmt::Display for FileDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileDisposition::FullyProcessed => "processed",
            FileDisposition::Empty => "empty",
            FileDisposition::Degraded => "degraded",
            FileDisposition::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything the caller needs to report one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    /// Position in the caller's input order (0-based).
    pub index: usize,
    pub source_name: String,
    /// Intended output document name (`<stem>.docx`).
    pub output_name: String,
    pub extraction: ExtractionStatus,
    pub method: ExtractionMethod,
    /// `None` when the transformer was not called.
    pub transform: Option<TransformStatus>,
    pub disposition: FileDisposition,
    pub errors: Vec<FileError>,
    pub duration_ms: u64,
}

impl FileReport {
    /// True when the file contributes a document to the output.
    pub fn contributes(&self) -> bool {
        self.disposition != FileDisposition::Failed
    }
}

// ── Batch output ─────────────────────────────────────────────────────────

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub fully_processed: usize,
    pub empty: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Units dropped by the composer because their document was unreadable.
    pub skipped_at_composition: usize,
    pub total_duration_ms: u64,
}

impl BatchSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let count = |d: FileDisposition| reports.iter().filter(|r| r.disposition == d).count();
        Self {
            total_files: reports.len(),
            fully_processed: count(FileDisposition::FullyProcessed),
            empty: count(FileDisposition::Empty),
            degraded: count(FileDisposition::Degraded),
            failed: count(FileDisposition::Failed),
            skipped_at_composition: 0,
            total_duration_ms: 0,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} files fully processed",
            self.fully_processed, self.total_files
        )
    }
}

/// What the batch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// One composite DOCX.
    Merged,
    /// A zip of one DOCX per source.
    Archive,
}

/// The downloadable result of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub filename: String,
    pub kind: ArtifactKind,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Complete output of [`crate::batch::process_batch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One report per input, in input order.
    pub reports: Vec<FileReport>,
    pub summary: BatchSummary,
    /// `None` when no file contributed a document.
    pub artifact: Option<OutputArtifact>,
}

//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator processes each file.
//!
//! # Example
//!
//! ```rust
//! use arabicpdf::{BatchProgressCallback, FileReport, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, report: &FileReport) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {} → {}", report.source_name, report.disposition);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(cb as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchSummary, FileReport};
use std::sync::Arc;

/// Called by the orchestrator as it processes each file.
///
/// All methods have default no-op implementations. With `concurrency > 1`,
/// the per-file methods may be called from different tasks at once.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before extraction starts for a file.
    ///
    /// # Arguments
    /// * `index`       — 0-based position in input order
    /// * `total_files` — files in the batch
    /// * `source_name` — file name as given
    fn on_file_start(&self, index: usize, total_files: usize, source_name: &str) {
        let _ = (index, total_files, source_name);
    }

    /// Called when a file has a final disposition (including `Failed`).
    fn on_file_complete(&self, report: &FileReport) {
        let _ = report;
    }

    /// Called for each non-fatal error a file hit, before `on_file_complete`.
    fn on_file_error(&self, index: usize, source_name: &str, error: &str) {
        let _ = (index, source_name, error);
    }

    /// Called once after the artifact is built.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ExtractionMethod, ExtractionStatus, FileDisposition};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.total.store(total_files, Ordering::SeqCst);
        }

        fn on_file_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _report: &FileReport) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn report() -> FileReport {
        FileReport {
            index: 0,
            source_name: "a.pdf".into(),
            output_name: "a.docx".into(),
            extraction: ExtractionStatus::Success,
            method: ExtractionMethod::Structural,
            transform: None,
            disposition: FileDisposition::FullyProcessed,
            errors: Vec::new(),
            duration_ms: 3,
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start(0, 2, "a.pdf");
        cb.on_file_error(0, "a.pdf", "boom");
        cb.on_file_complete(&report());
        cb.on_batch_complete(&BatchSummary::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(2);
        tracker.on_file_start(0, 2, "a.pdf");
        tracker.on_file_complete(&report());
        tracker.on_file_start(1, 2, "b.pdf");
        tracker.on_file_error(1, "b.pdf", "LLM timeout");

        assert_eq!(tracker.total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_file_complete(&report());
    }
}

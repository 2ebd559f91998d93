//! Batch entry points: many sources in, one artifact out.
//!
//! Each file runs extract → transform → build on its own. Files may run
//! concurrently (`concurrency`), but their results are re-sorted into input
//! order before ordinals are assigned, so the output never depends on
//! completion order. Only a configuration failure aborts the batch; every
//! other problem is recorded in the file's [`FileReport`].

use crate::config::{FailureFallback, OutputMode, PipelineConfig};
use crate::error::{FileError, PipelineError};
use crate::output::{
    ArtifactKind, BatchOutput, BatchSummary, ExtractionMethod, ExtractionResult, FailureKind,
    FileDisposition, FileReport, OutputArtifact, TransformResult,
};
use crate::pipeline::build::{DocumentBuilder, RenderedDocument};
use crate::pipeline::cloud::GoogleVisionOcr;
use crate::pipeline::compose::{self, MergeUnit};
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::input::{self, SourceFile};
use crate::pipeline::ocr::TesseractCli;
use crate::pipeline::render::PdfiumEngine;
use crate::pipeline::transform::{LlmGenerator, TextTransformer};
use crate::pipeline::archive;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The configured stages, shared by every file of a batch.
pub struct Pipeline {
    extractor: TextExtractor,
    transformer: TextTransformer,
    builder: DocumentBuilder,
    rules: String,
    fallback: FailureFallback,
    output_mode: OutputMode,
    merged_filename: String,
    archive_filename: String,
    concurrency: usize,
    callback: Option<ProgressCallback>,
}

impl Pipeline {
    /// Assemble a pipeline from injected stages, with default settings.
    pub fn new(
        extractor: TextExtractor,
        transformer: TextTransformer,
        builder: DocumentBuilder,
    ) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            extractor,
            transformer,
            builder,
            rules: defaults.rules,
            fallback: defaults.failure_fallback,
            output_mode: defaults.output_mode,
            merged_filename: defaults.merged_filename,
            archive_filename: defaults.archive_filename,
            concurrency: defaults.concurrency,
            callback: None,
        }
    }

    /// Bind pdfium, locate tesseract, build the cloud OCR client (if
    /// enabled) and resolve the LLM provider.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let pdfium = Arc::new(PdfiumEngine::new(
            config.pdfium_lib_path.as_deref(),
            config.max_rendered_pixels,
        )?);

        let tesseract = Arc::new(TesseractCli::new(
            config.tesseract_path.clone(),
            config.page_seg_mode,
        ));
        if !tesseract.is_available() {
            warn!(
                "Tesseract not found at '{}'; scanned PDFs will fail",
                config.tesseract_path.display()
            );
        }

        let mut extractor = TextExtractor::new()
            .with_structural(pdfium.clone())
            .with_local_ocr(pdfium, tesseract, config.dpi, config.ocr_language.clone())
            .with_input_format(config.input_format);
        if let Some(vision) = cloud_ocr_service(config)? {
            extractor = extractor.with_cloud_ocr(
                Arc::new(vision),
                config.cloud_ocr_language_hints.clone(),
                config.api_timeout_secs,
            );
        }

        let generator = LlmGenerator::from_config(config)?;
        let transformer = TextTransformer::new(Arc::new(generator), config.api_timeout_secs);

        let builder = DocumentBuilder::from_config(config);
        Ok(Self::new(extractor, transformer, builder).with_config(config))
    }

    /// Copy the batch-level settings of `config` onto this pipeline.
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.rules = config.rules.clone();
        self.fallback = config.failure_fallback;
        self.output_mode = config.output_mode;
        self.merged_filename = config.merged_filename.clone();
        self.archive_filename = config.archive_filename.clone();
        self.concurrency = config.concurrency.max(1);
        self.callback = config.progress_callback.clone();
        self
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = rules.into();
        self
    }

    pub fn with_failure_fallback(mut self, fallback: FailureFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.callback = Some(cb);
        self
    }

    fn artifact_filename(&self) -> &str {
        match self.output_mode {
            OutputMode::Merge => &self.merged_filename,
            OutputMode::Archive => &self.archive_filename,
        }
    }
}

/// One file's report and, unless it failed, its document.
struct FileOutcome {
    report: FileReport,
    document: Option<RenderedDocument>,
}

/// Process `sources` in order and build the artifact.
///
/// # Returns
/// `Ok(BatchOutput)` even when some files failed (see
/// [`BatchOutput::reports`]); `artifact` is `None` when none survived.
///
/// # Errors
/// * [`PipelineError::InvalidInput`] for an empty batch.
/// * [`PipelineError::Configuration`] when a file hits a problem that
///   would recur for every file (missing OCR engine, missing credentials).
/// * Composition or archive errors for the batch as a whole.
pub async fn process_batch(
    sources: Vec<SourceFile>,
    pipeline: &Pipeline,
) -> Result<BatchOutput, PipelineError> {
    let batch_start = Instant::now();
    let total = sources.len();
    if total == 0 {
        return Err(PipelineError::InvalidInput("no input files".into()));
    }
    info!("Starting batch: {} files, concurrency {}", total, pipeline.concurrency);

    if let Some(ref cb) = pipeline.callback {
        cb.on_batch_start(total);
    }

    // ── Step 1: Per-file chain ───────────────────────────────────────────
    let mut outcomes: Vec<FileOutcome> = stream::iter(
        sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| process_file(pipeline, index, total, source)),
    )
    .buffer_unordered(pipeline.concurrency)
    .try_collect()
    .await?;

    outcomes.sort_by_key(|o| o.report.index);
    let mut reports: Vec<FileReport> = Vec::with_capacity(total);
    let mut documents: Vec<(usize, RenderedDocument)> = Vec::new();
    for outcome in outcomes {
        if let Some(document) = outcome.document {
            documents.push((reports.len(), document));
        }
        reports.push(outcome.report);
    }

    // ── Step 2: Artifact ─────────────────────────────────────────────────
    let (artifact, skipped) = if documents.is_empty() {
        warn!("No file produced a document; nothing to write");
        (None, 0)
    } else {
        match pipeline.output_mode {
            OutputMode::Merge => build_merged(pipeline, documents, &mut reports).await?,
            OutputMode::Archive => build_archive(pipeline, documents, &mut reports).await?,
        }
    };

    // ── Step 3: Summary ──────────────────────────────────────────────────
    let mut summary = BatchSummary::from_reports(&reports);
    summary.skipped_at_composition = skipped;
    summary.total_duration_ms = batch_start.elapsed().as_millis() as u64;

    info!("{} ({}ms)", summary, summary.total_duration_ms);
    if let Some(ref cb) = pipeline.callback {
        cb.on_batch_complete(&summary);
    }

    Ok(BatchOutput {
        reports,
        summary,
        artifact,
    })
}

/// Synchronous wrapper around [`process_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_batch_sync(
    sources: Vec<SourceFile>,
    pipeline: &Pipeline,
) -> Result<BatchOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_batch(sources, pipeline))
}

/// Resolve every path or URL in `inputs`, then run the batch configured by
/// `config`.
///
/// An unreadable input is fatal: the caller named it explicitly.
pub async fn process_paths(
    inputs: &[String],
    config: &PipelineConfig,
) -> Result<BatchOutput, PipelineError> {
    let mut sources = Vec::with_capacity(inputs.len());
    for item in inputs {
        sources.push(input::resolve_input(item, config.download_timeout_secs).await?);
    }
    let pipeline = Pipeline::from_config(config)?;
    process_batch(sources, &pipeline).await
}

/// Write `artifact` to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_artifact(
    artifact: &OutputArtifact,
    path: impl AsRef<Path>,
) -> Result<(), PipelineError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, &artifact.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), artifact.bytes.len());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The Vision client when cloud OCR is enabled.
///
/// A missing key still yields a client: a scan that reaches it then fails
/// with a configuration error instead of passing as blank.
fn cloud_ocr_service(config: &PipelineConfig) -> Result<Option<GoogleVisionOcr>, PipelineError> {
    if !config.cloud_ocr {
        return Ok(None);
    }
    let has_key = config
        .cloud_ocr_api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if !has_key {
        warn!("Cloud OCR is enabled but no API key is set; scans that need it will fail");
    }
    GoogleVisionOcr::new(
        config.cloud_ocr_api_key.clone(),
        config.cloud_ocr_endpoint.clone(),
        config.api_timeout_secs,
    )
    .map(Some)
    .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))
}

async fn process_file(
    pipeline: &Pipeline,
    index: usize,
    total: usize,
    source: SourceFile,
) -> Result<FileOutcome, PipelineError> {
    let start = Instant::now();
    let name = source.name.clone();
    if let Some(ref cb) = pipeline.callback {
        cb.on_file_start(index, total, &name);
    }

    let extraction = pipeline.extractor.extract(&source).await;
    let mut report = FileReport {
        index,
        source_name: name.clone(),
        output_name: source.output_name(),
        extraction: extraction.status(),
        method: extraction.method_used(),
        transform: None,
        disposition: FileDisposition::Failed,
        errors: Vec::new(),
        duration_ms: 0,
    };

    let document = match extraction {
        ExtractionResult::Failure {
            detail,
            kind: FailureKind::Configuration,
        } => {
            error!("'{}': aborting batch: {}", name, detail);
            return Err(PipelineError::Configuration {
                detail: format!("'{name}': {detail}"),
            });
        }
        ExtractionResult::Failure { detail, .. } => {
            report.errors.push(FileError::ExtractionFailed {
                file: name.clone(),
                detail,
            });
            None
        }
        ExtractionResult::EmptyText => {
            report.disposition = FileDisposition::Empty;
            Some(pipeline.builder.build("", &name))
        }
        ExtractionResult::Success { text, method } => {
            Some(transform_and_build(pipeline, &name, &text, method, &mut report).await)
        }
    };

    report.duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        "'{}': {} in {}ms",
        name, report.disposition, report.duration_ms
    );

    if let Some(ref cb) = pipeline.callback {
        for e in &report.errors {
            cb.on_file_error(index, &name, &e.to_string());
        }
        cb.on_file_complete(&report);
    }

    Ok(FileOutcome { report, document })
}

async fn transform_and_build(
    pipeline: &Pipeline,
    name: &str,
    text: &str,
    method: ExtractionMethod,
    report: &mut FileReport,
) -> RenderedDocument {
    let result = pipeline.transformer.transform(text, &pipeline.rules).await;
    report.transform = Some(result.status());

    let fallback = match pipeline.fallback {
        FailureFallback::Placeholder => "",
        FailureFallback::RawText => text,
    };

    let body = match result {
        TransformResult::Success { text: rewritten } => {
            report.disposition = FileDisposition::FullyProcessed;
            info!("'{}': processed (extracted via {})", name, method);
            return pipeline.builder.build(&rewritten, name);
        }
        TransformResult::Blocked { reason } => {
            report.errors.push(FileError::TransformBlocked {
                file: name.to_string(),
                reason,
            });
            fallback
        }
        TransformResult::Failure { reason } => {
            report.errors.push(FileError::TransformFailed {
                file: name.to_string(),
                reason,
            });
            fallback
        }
        TransformResult::Empty => {
            report.errors.push(FileError::TransformEmpty {
                file: name.to_string(),
            });
            ""
        }
    };

    report.disposition = FileDisposition::Degraded;
    warn!("'{}': degraded", name);
    pipeline.builder.build(body, name)
}

/// Merge the surviving documents; unreadable ones are marked `Failed`.
async fn build_merged(
    pipeline: &Pipeline,
    documents: Vec<(usize, RenderedDocument)>,
    reports: &mut [FileReport],
) -> Result<(Option<OutputArtifact>, usize), PipelineError> {
    let report_of: Vec<usize> = documents.iter().map(|(r, _)| *r).collect();
    let units: Vec<MergeUnit> = documents
        .into_iter()
        .enumerate()
        .map(|(ordinal, (r, document))| {
            MergeUnit::new(reports[r].source_name.clone(), document, ordinal)
        })
        .collect();

    let (bytes, skipped) = tokio::task::spawn_blocking(move || {
        let composite = compose::merge(units)?;
        let cursor = composite.save()?;
        Ok::<_, PipelineError>((cursor.into_inner(), composite.skipped().to_vec()))
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("merge task: {e}")))??;

    for unit in &skipped {
        mark_skipped(pipeline, &mut reports[report_of[unit.ordinal]], unit.detail.clone());
    }

    Ok((
        Some(OutputArtifact {
            filename: pipeline.artifact_filename().to_string(),
            kind: ArtifactKind::Merged,
            bytes,
        }),
        skipped.len(),
    ))
}

/// Zip the surviving documents individually.
async fn build_archive(
    pipeline: &Pipeline,
    documents: Vec<(usize, RenderedDocument)>,
    reports: &mut [FileReport],
) -> Result<(Option<OutputArtifact>, usize), PipelineError> {
    let saved = tokio::task::spawn_blocking(move || {
        documents
            .into_iter()
            .map(|(r, document)| (r, document.filename().to_string(), document.to_bytes()))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("archive task: {e}")))?;

    let mut packed = Vec::with_capacity(saved.len());
    let mut skipped = 0;
    for (r, filename, bytes) in saved {
        match bytes {
            Ok(bytes) => packed.push((r, filename, bytes)),
            Err(e) => {
                mark_skipped(pipeline, &mut reports[r], e.to_string());
                skipped += 1;
            }
        }
    }

    if packed.is_empty() {
        warn!("No document could be saved; nothing to write");
        return Ok((None, skipped));
    }

    // Sources sharing a stem (a.pdf + a.docx, x/a.pdf + y/a.pdf) get numbered
    // entries; the report carries the name actually stored.
    let names = archive::unique_names(packed.iter().map(|(_, name, _)| name.clone()));
    let mut entries = Vec::with_capacity(packed.len());
    for ((r, filename, bytes), name) in packed.into_iter().zip(names) {
        if name != filename {
            info!("'{}': stored as '{}'", reports[r].source_name, name);
        }
        reports[r].output_name = name.clone();
        entries.push((name, bytes));
    }

    let bytes = tokio::task::spawn_blocking(move || archive::pack(entries))
        .await
        .map_err(|e| PipelineError::Internal(format!("archive task: {e}")))??;

    Ok((
        Some(OutputArtifact {
            filename: pipeline.artifact_filename().to_string(),
            kind: ArtifactKind::Archive,
            bytes,
        }),
        skipped,
    ))
}

fn mark_skipped(pipeline: &Pipeline, report: &mut FileReport, detail: String) {
    warn!("'{}': left out of the output: {}", report.source_name, detail);
    let e = FileError::CompositionFailed {
        file: report.source_name.clone(),
        detail,
    };
    if let Some(ref cb) = pipeline.callback {
        cb.on_file_error(report.index, &report.source_name, &e.to_string());
    }
    report.errors.push(e);
    report.disposition = FileDisposition::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::transform::{Generation, GenerationError, TextGenerator};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
            Ok(Generation::Text(prompt.to_string()))
        }
    }

    fn docx_source(name: &str, text: &str) -> SourceFile {
        let bytes = DocumentBuilder::default()
            .build(text, name)
            .to_bytes()
            .unwrap();
        SourceFile::new(name, bytes)
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            TextExtractor::new(),
            TextTransformer::new(Arc::new(Echo), 5),
            DocumentBuilder::default(),
        )
        .with_rules("")
    }

    #[tokio::test]
    async fn empty_batch_is_invalid_input() {
        let err = process_batch(vec![], &pipeline()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unrecognised_input_fails_only_that_file() {
        let sources = vec![
            docx_source("a.docx", "نص"),
            SourceFile::new("notes.txt", b"plain".to_vec()),
        ];
        let out = process_batch(sources, &pipeline()).await.unwrap();
        assert_eq!(out.reports[0].disposition, FileDisposition::FullyProcessed);
        assert_eq!(out.reports[1].disposition, FileDisposition::Failed);
        assert!(matches!(
            out.reports[1].errors[0],
            FileError::ExtractionFailed { .. }
        ));
        assert_eq!(out.summary.to_string(), "1 of 2 files fully processed");
        assert_eq!(out.artifact.unwrap().kind, ArtifactKind::Merged);
    }

    #[tokio::test]
    async fn all_failed_gives_no_artifact() {
        let sources = vec![SourceFile::new("x.bin", vec![0u8; 8])];
        let out = process_batch(sources, &pipeline()).await.unwrap();
        assert!(out.artifact.is_none());
        assert_eq!(out.summary.failed, 1);
    }

    #[tokio::test]
    async fn cloud_ocr_without_key_stays_in_the_chain() {
        use crate::pipeline::cloud::CloudOcr;
        use crate::pipeline::extract::MethodError;

        let config = PipelineConfig::default();
        assert!(config.cloud_ocr);
        let vision = cloud_ocr_service(&config).unwrap().expect("cloud OCR enabled");
        let err = vision
            .annotate(Arc::from(&b"%PDF-1.7"[..]), "application/pdf", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MethodError::Unavailable(_)));
    }

    #[test]
    fn cloud_ocr_can_be_switched_off() {
        let config = PipelineConfig::builder().cloud_ocr(false).build().unwrap();
        assert!(cloud_ocr_service(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn write_artifact_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.docx");
        let artifact = OutputArtifact {
            filename: "out.docx".into(),
            kind: ArtifactKind::Merged,
            bytes: b"PK".to_vec(),
        };
        write_artifact(&artifact, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
        assert!(!dir.path().join("nested").join("out.docx.tmp").exists());
    }
}

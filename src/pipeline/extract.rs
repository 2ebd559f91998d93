//! Text extraction with a layered fallback chain.
//!
//! For PDFs the methods are tried in order, stopping at the first one that
//! yields non-whitespace text:
//!
//! ```text
//! structural (text layer) ──▶ local OCR (raster + tesseract) ──▶ cloud OCR
//! ```
//!
//! A method that errors is logged and skipped. A local method whose engine
//! is unavailable is skipped too, but if no later method finds text the
//! chain ends with a configuration failure, because every later file would
//! hit the same wall. Missing or rejected cloud credentials end the chain
//! immediately. DOCX sources are read directly from their paragraphs.
//!
//! Local OCR renders and recognises one page at a time, so only one page
//! raster is alive at once.

use super::cloud::CloudOcr;
use super::input::{detect_kind, SourceFile, SourceKind};
use super::ocr::OcrEngine;
use crate::config::InputFormat;
use crate::docx::Document;
use crate::output::{ExtractionMethod, ExtractionResult, FailureKind};
use image::DynamicImage;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a single extraction method produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    /// The engine, its data files, or its credentials are missing.
    #[error("{0}")]
    Unavailable(String),
    /// This document could not be processed by this method.
    #[error("{0}")]
    Failed(String),
}

/// Reads the embedded text layer of a PDF, one string per page.
pub trait StructuralParser: Send + Sync {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, MethodError>;
}

/// Callback receiving each rendered page (0-based index, raster).
pub type PageSink<'a> = dyn FnMut(usize, DynamicImage) -> Result<(), MethodError> + 'a;

/// Renders the pages of a PDF to images at `dpi`.
pub trait PageRasterizer: Send + Sync {
    /// Render pages in document order, handing each to `on_page` before the
    /// next one is rendered. An error from `on_page` stops the walk.
    fn rasterize(&self, bytes: &[u8], dpi: u32, on_page: &mut PageSink<'_>)
        -> Result<(), MethodError>;
}

struct LocalOcrMethod {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
    dpi: u32,
    language: String,
}

struct CloudOcrMethod {
    service: Arc<dyn CloudOcr>,
    language_hints: Vec<String>,
    timeout: Duration,
}

/// PDF / DOCX → text.
///
/// Methods are optional: one that is not configured is absent from the
/// chain.
pub struct TextExtractor {
    structural: Option<Arc<dyn StructuralParser>>,
    local_ocr: Option<LocalOcrMethod>,
    cloud_ocr: Option<CloudOcrMethod>,
    input_format: InputFormat,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor {
    /// An extractor with no PDF methods; DOCX input still works.
    pub fn new() -> Self {
        Self {
            structural: None,
            local_ocr: None,
            cloud_ocr: None,
            input_format: InputFormat::Auto,
        }
    }

    pub fn with_structural(mut self, parser: Arc<dyn StructuralParser>) -> Self {
        self.structural = Some(parser);
        self
    }

    pub fn with_local_ocr(
        mut self,
        rasterizer: Arc<dyn PageRasterizer>,
        engine: Arc<dyn OcrEngine>,
        dpi: u32,
        language: impl Into<String>,
    ) -> Self {
        self.local_ocr = Some(LocalOcrMethod {
            rasterizer,
            engine,
            dpi,
            language: language.into(),
        });
        self
    }

    pub fn with_cloud_ocr(
        mut self,
        service: Arc<dyn CloudOcr>,
        language_hints: Vec<String>,
        timeout_secs: u64,
    ) -> Self {
        self.cloud_ocr = Some(CloudOcrMethod {
            service,
            language_hints,
            timeout: Duration::from_secs(timeout_secs),
        });
        self
    }

    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

    /// Buffer a non-seekable stream once, then extract from the buffer.
    pub async fn extract_reader(&self, name: &str, mut reader: impl Read) -> ExtractionResult {
        let mut bytes = Vec::new();
        if let Err(e) = reader.read_to_end(&mut bytes) {
            return ExtractionResult::Failure {
                detail: format!("reading '{name}': {e}"),
                kind: FailureKind::Processing,
            };
        }
        self.extract(&SourceFile::new(name, bytes)).await
    }

    /// Extract the text of `source`.
    pub async fn extract(&self, source: &SourceFile) -> ExtractionResult {
        match detect_kind(source, self.input_format) {
            Some(SourceKind::Pdf) => self.extract_pdf(source).await,
            Some(SourceKind::Docx) => extract_docx(source).await,
            None => ExtractionResult::Failure {
                detail: format!("'{}' is neither a PDF nor a DOCX document", source.name),
                kind: FailureKind::Processing,
            },
        }
    }

    async fn extract_pdf(&self, source: &SourceFile) -> ExtractionResult {
        let mut any_empty = false;
        let mut last_error: Option<String> = None;
        let mut unavailable: Option<String> = None;

        for method in [
            ExtractionMethod::Structural,
            ExtractionMethod::LocalOcr,
            ExtractionMethod::CloudOcr,
        ] {
            let Some(outcome) = self.run_method(method, &source.bytes).await else {
                continue;
            };

            match outcome {
                Ok(pages) => {
                    let text = join_pages(&pages);
                    if !text.is_empty() {
                        info!(
                            "'{}': {} chars via {} ({} pages)",
                            source.name,
                            text.chars().count(),
                            method,
                            pages.len()
                        );
                        return ExtractionResult::Success { text, method };
                    }
                    debug!("'{}': {} found no text", source.name, method);
                    any_empty = true;
                }
                Err(MethodError::Unavailable(detail)) if method == ExtractionMethod::CloudOcr => {
                    error!("'{}': {} unavailable: {}", source.name, method, detail);
                    return ExtractionResult::Failure {
                        detail,
                        kind: FailureKind::Configuration,
                    };
                }
                Err(MethodError::Unavailable(detail)) => {
                    warn!(
                        "'{}': {} unavailable, trying next method: {}",
                        source.name, method, detail
                    );
                    unavailable = Some(detail);
                }
                Err(MethodError::Failed(detail)) => {
                    warn!("'{}': {} failed: {}", source.name, method, detail);
                    last_error = Some(detail);
                }
            }
        }

        if let Some(detail) = unavailable {
            error!("'{}': no text found; unavailable engine: {}", source.name, detail);
            return ExtractionResult::Failure {
                detail,
                kind: FailureKind::Configuration,
            };
        }
        if any_empty {
            info!("'{}': no text found by any method", source.name);
            return ExtractionResult::EmptyText;
        }
        match last_error {
            Some(detail) => ExtractionResult::Failure {
                detail,
                kind: FailureKind::Processing,
            },
            None => ExtractionResult::Failure {
                detail: "no PDF extraction method is enabled".into(),
                kind: FailureKind::Configuration,
            },
        }
    }

    /// `None` when the method is not configured.
    async fn run_method(
        &self,
        method: ExtractionMethod,
        bytes: &Arc<[u8]>,
    ) -> Option<Result<Vec<String>, MethodError>> {
        match method {
            ExtractionMethod::Structural => {
                let parser = Arc::clone(self.structural.as_ref()?);
                let bytes = Arc::clone(bytes);
                Some(blocking(move || parser.pages(&bytes)).await)
            }
            ExtractionMethod::LocalOcr => {
                let m = self.local_ocr.as_ref()?;
                let rasterizer = Arc::clone(&m.rasterizer);
                let engine = Arc::clone(&m.engine);
                let (dpi, language) = (m.dpi, m.language.clone());
                let bytes = Arc::clone(bytes);
                Some(
                    blocking(move || {
                        let mut texts = Vec::new();
                        rasterizer.rasterize(&bytes, dpi, &mut |idx, image| {
                            let text = engine.recognize(&image, &language)?;
                            debug!("OCR page {}: {} chars", idx + 1, text.len());
                            texts.push(text);
                            Ok(())
                        })?;
                        Ok(texts)
                    })
                    .await,
                )
            }
            ExtractionMethod::CloudOcr => {
                let m = self.cloud_ocr.as_ref()?;
                let call = m
                    .service
                    .annotate(Arc::clone(bytes), "application/pdf", &m.language_hints);
                Some(match tokio::time::timeout(m.timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(MethodError::Failed(format!(
                        "cloud OCR timed out after {}s",
                        m.timeout.as_secs()
                    ))),
                })
            }
            ExtractionMethod::None => None,
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, MethodError>
where
    F: FnOnce() -> Result<T, MethodError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MethodError::Failed(format!("extraction task panicked: {e}")))?
}

/// Trim each page, drop blank ones, join with a blank line.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn extract_docx(source: &SourceFile) -> ExtractionResult {
    let bytes = Arc::clone(&source.bytes);
    let decoded = tokio::task::spawn_blocking(move || Document::from_bytes(&bytes)).await;

    let document = match decoded {
        Ok(Ok(doc)) => doc,
        Ok(Err(e)) => {
            warn!("'{}': cannot read DOCX: {}", source.name, e);
            return ExtractionResult::Failure {
                detail: e.to_string(),
                kind: FailureKind::Processing,
            };
        }
        Err(e) => {
            return ExtractionResult::Failure {
                detail: format!("DOCX task panicked: {e}"),
                kind: FailureKind::Processing,
            }
        }
    };

    let text = document.text().trim().to_string();
    if text.is_empty() {
        ExtractionResult::EmptyText
    } else {
        info!(
            "'{}': {} paragraphs read from DOCX",
            source.name,
            document.paragraph_count()
        );
        ExtractionResult::Success {
            text,
            method: ExtractionMethod::Structural,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{Paragraph, Run, StyleDefaults};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Pages(Result<Vec<String>, MethodError>);

    impl StructuralParser for Pages {
        fn pages(&self, _bytes: &[u8]) -> Result<Vec<String>, MethodError> {
            self.0.clone()
        }
    }

    struct Raster(usize);

    impl PageRasterizer for Raster {
        fn rasterize(
            &self,
            _bytes: &[u8],
            _dpi: u32,
            on_page: &mut PageSink<'_>,
        ) -> Result<(), MethodError> {
            for idx in 0..self.0 {
                on_page(idx, DynamicImage::new_luma8(2, 2))?;
            }
            Ok(())
        }
    }

    struct Ocr(Result<String, MethodError>);

    impl OcrEngine for Ocr {
        fn recognize(&self, _image: &DynamicImage, _lang: &str) -> Result<String, MethodError> {
            self.0.clone()
        }
    }

    /// Rasteriser and OCR engine that log into the same event list.
    struct Traced(Arc<Mutex<Vec<String>>>);

    impl PageRasterizer for Traced {
        fn rasterize(
            &self,
            _bytes: &[u8],
            _dpi: u32,
            on_page: &mut PageSink<'_>,
        ) -> Result<(), MethodError> {
            for idx in 0..3 {
                self.0.lock().unwrap().push(format!("render {idx}"));
                on_page(idx, DynamicImage::new_luma8(2, 2))?;
            }
            Ok(())
        }
    }

    impl OcrEngine for Traced {
        fn recognize(&self, _image: &DynamicImage, _lang: &str) -> Result<String, MethodError> {
            let mut events = self.0.lock().unwrap();
            let n = events.len();
            events.push("ocr".into());
            Ok(format!("page{n}"))
        }
    }

    struct Cloud {
        result: Result<Vec<String>, MethodError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CloudOcr for Cloud {
        async fn annotate(
            &self,
            _bytes: Arc<[u8]>,
            _mime: &str,
            _hints: &[String],
        ) -> Result<Vec<String>, MethodError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn pdf() -> SourceFile {
        SourceFile::new("doc.pdf", b"%PDF-1.7 fake".to_vec())
    }

    fn pages(texts: &[&str]) -> Arc<Pages> {
        Arc::new(Pages(Ok(texts.iter().map(|s| s.to_string()).collect())))
    }

    #[tokio::test]
    async fn structural_text_wins() {
        let ex = TextExtractor::new()
            .with_structural(pages(&["  السلام  ", "", "عليكم\n"]))
            .with_local_ocr(Arc::new(Raster(1)), Arc::new(Ocr(Ok("ocr".into()))), 300, "ara");
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.method_used(), ExtractionMethod::Structural);
        assert_eq!(r.text(), Some("السلام\n\nعليكم"));
    }

    #[tokio::test]
    async fn empty_text_layer_falls_through_to_local_ocr() {
        let ex = TextExtractor::new()
            .with_structural(pages(&[" ", "\n"]))
            .with_local_ocr(Arc::new(Raster(2)), Arc::new(Ocr(Ok("نص".into()))), 300, "ara");
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.method_used(), ExtractionMethod::LocalOcr);
        assert_eq!(r.text(), Some("نص\n\nنص"));
    }

    #[tokio::test]
    async fn structural_error_then_ocr_success() {
        let ex = TextExtractor::new()
            .with_structural(Arc::new(Pages(Err(MethodError::Failed("bad xref".into())))))
            .with_local_ocr(Arc::new(Raster(1)), Arc::new(Ocr(Ok("نص".into()))), 300, "ara");
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.status(), crate::output::ExtractionStatus::Success);
        assert_eq!(r.method_used(), ExtractionMethod::LocalOcr);
    }

    #[tokio::test]
    async fn cloud_used_when_structural_and_ocr_are_empty() {
        let cloud = Arc::new(Cloud {
            result: Ok(vec!["سحابة".into()]),
            calls: AtomicUsize::new(0),
        });
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), Arc::new(Ocr(Ok("   ".into()))), 300, "ara")
            .with_cloud_ocr(cloud.clone(), vec!["ar".into()], 5);
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.method_used(), ExtractionMethod::CloudOcr);
        assert_eq!(r.text(), Some("سحابة"));
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_document_is_empty_not_failure() {
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), Arc::new(Ocr(Ok("\n".into()))), 300, "ara");
        assert_eq!(ex.extract(&pdf()).await, ExtractionResult::EmptyText);
    }

    #[tokio::test]
    async fn all_methods_erroring_reports_last_error() {
        let cloud = Arc::new(Cloud {
            result: Err(MethodError::Failed("quota".into())),
            calls: AtomicUsize::new(0),
        });
        let ex = TextExtractor::new()
            .with_structural(Arc::new(Pages(Err(MethodError::Failed("xref".into())))))
            .with_local_ocr(
                Arc::new(Raster(1)),
                Arc::new(Ocr(Err(MethodError::Failed("psm".into())))),
                300,
                "ara",
            )
            .with_cloud_ocr(cloud, vec![], 5);
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.error_detail(), Some("quota"));
        assert_eq!(r.failure_kind(), Some(FailureKind::Processing));
        assert_eq!(r.text(), None);
    }

    fn missing_tesseract() -> Arc<Ocr> {
        Arc::new(Ocr(Err(MethodError::Unavailable("no tesseract".into()))))
    }

    #[tokio::test]
    async fn missing_local_ocr_falls_through_to_cloud() {
        let cloud = Arc::new(Cloud {
            result: Ok(vec!["سحابة".into()]),
            calls: AtomicUsize::new(0),
        });
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), missing_tesseract(), 300, "ara")
            .with_cloud_ocr(cloud.clone(), vec![], 5);
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.status(), crate::output::ExtractionStatus::Success);
        assert_eq!(r.method_used(), ExtractionMethod::CloudOcr);
        assert_eq!(r.text(), Some("سحابة"));
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_local_ocr_without_later_text_is_configuration_failure() {
        let cloud = Arc::new(Cloud {
            result: Ok(vec!["  ".into()]),
            calls: AtomicUsize::new(0),
        });
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), missing_tesseract(), 300, "ara")
            .with_cloud_ocr(cloud.clone(), vec![], 5);
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Configuration));
        assert_eq!(r.error_detail(), Some("no tesseract"));
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_local_ocr_without_cloud_is_configuration_failure() {
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), missing_tesseract(), 300, "ara");
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Configuration));
    }

    #[tokio::test]
    async fn unavailable_cloud_ocr_short_circuits() {
        let cloud = Arc::new(Cloud {
            result: Err(MethodError::Unavailable("API key rejected".into())),
            calls: AtomicUsize::new(0),
        });
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), Arc::new(Ocr(Ok(" ".into()))), 300, "ara")
            .with_cloud_ocr(cloud, vec![], 5);
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Configuration));
        assert_eq!(r.error_detail(), Some("API key rejected"));
    }

    #[tokio::test]
    async fn cloud_ocr_without_key_is_not_silently_empty() {
        let vision = super::super::cloud::GoogleVisionOcr::new(None, None, 5).unwrap();
        let ex = TextExtractor::new()
            .with_structural(pages(&[""]))
            .with_local_ocr(Arc::new(Raster(1)), Arc::new(Ocr(Ok("\n".into()))), 300, "ara")
            .with_cloud_ocr(Arc::new(vision), vec!["ar".into()], 5);
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Configuration));
        assert_eq!(r.error_detail(), Some("cloud OCR API key is not configured"));
    }

    #[tokio::test]
    async fn pages_are_recognised_as_they_are_rendered() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let traced = Arc::new(Traced(events.clone()));
        let ex = TextExtractor::new().with_local_ocr(traced.clone(), traced, 300, "ara");
        let r = ex.extract(&pdf()).await;
        assert_eq!(r.text(), Some("page1\n\npage3\n\npage5"));
        assert_eq!(
            *events.lock().unwrap(),
            vec!["render 0", "ocr", "render 1", "ocr", "render 2", "ocr"]
        );
    }

    #[tokio::test]
    async fn no_methods_is_configuration_failure() {
        let r = TextExtractor::new().extract(&pdf()).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Configuration));
    }

    #[tokio::test]
    async fn reader_is_buffered_once() {
        let ex = TextExtractor::new().with_structural(pages(&["x"]));
        let r = ex
            .extract_reader("r.pdf", std::io::Cursor::new(b"%PDF-1.4".to_vec()))
            .await;
        assert_eq!(r.text(), Some("x"));
    }

    #[tokio::test]
    async fn docx_paragraph_text_is_read() {
        let mut doc = Document::new(StyleDefaults::default());
        doc.add_paragraph(Paragraph::new().add_run(Run::text("سطر أول")))
            .add_paragraph(Paragraph::new().add_run(Run::text("سطر ثان")));
        let source = SourceFile::new("in.docx", doc.to_bytes().unwrap());

        let r = TextExtractor::new().extract(&source).await;
        assert_eq!(r.method_used(), ExtractionMethod::Structural);
        assert_eq!(r.text(), Some("سطر أول\nسطر ثان"));
    }

    #[tokio::test]
    async fn empty_docx_is_empty_text() {
        let doc = Document::new(StyleDefaults::default());
        let source = SourceFile::new("in.docx", doc.to_bytes().unwrap());
        assert_eq!(
            TextExtractor::new().extract(&source).await,
            ExtractionResult::EmptyText
        );
    }

    #[tokio::test]
    async fn corrupt_docx_is_processing_failure() {
        let source = SourceFile::new("in.docx", b"PK\x03\x04 truncated".to_vec());
        let r = TextExtractor::new().extract(&source).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Processing));
    }

    #[test]
    fn join_pages_keeps_internal_whitespace() {
        let p = vec!["  a  b \n".to_string(), "   ".to_string(), "c\n\nd".to_string()];
        assert_eq!(join_pages(&p), "a  b\n\nc\n\nd");
    }
}

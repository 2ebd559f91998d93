//! pdfium-backed structural text layer and page rasterisation.
//!
//! Both operations are blocking and are driven from `spawn_blocking` by the
//! extractor. pdfium keeps process-global state, so calls through one engine
//! are serialised by an internal lock. Rasterisation hands each page to the
//! caller as soon as it is rendered, so a long scan holds one page image at
//! a time.

use super::extract::{MethodError, PageRasterizer, PageSink, StructuralParser};
use crate::error::PipelineError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Pages rendered at 72 DPI are 1:1 with PDF points.
const POINTS_PER_INCH: f32 = 72.0;

/// Structural text and page rasters from a pdfium library.
#[derive(Debug)]
pub struct PdfiumEngine {
    lib_path: Option<PathBuf>,
    max_rendered_pixels: u32,
    lock: Mutex<()>,
}

impl PdfiumEngine {
    /// Validate that pdfium can be bound, then return an engine that binds
    /// the same library for each call.
    ///
    /// `lib_path` may be the library file itself or the directory holding
    /// it. `None` uses the system library.
    pub fn new(lib_path: Option<&Path>, max_rendered_pixels: u32) -> Result<Self, PipelineError> {
        let engine = Self {
            lib_path: lib_path.map(Path::to_path_buf),
            max_rendered_pixels,
            lock: Mutex::new(()),
        };
        engine
            .bind()
            .map_err(|e| PipelineError::PdfiumBindingFailed(e.to_string()))?;
        info!(
            "pdfium bound ({})",
            engine
                .lib_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "system library".to_string())
        );
        Ok(engine)
    }

    fn bind(&self) -> Result<Pdfium, MethodError> {
        let bindings = match self.lib_path {
            Some(ref p) if p.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
            }
            Some(ref p) => Pdfium::bind_to_library(p),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| MethodError::Unavailable(format!("pdfium library not available: {e:?}")))?;
        Ok(Pdfium::new(bindings))
    }

    /// Run `f` with a freshly bound pdfium and the loaded document.
    fn with_document<T>(
        &self,
        bytes: &[u8],
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, MethodError>,
    ) -> Result<T, MethodError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| MethodError::Failed("pdfium lock poisoned".into()))?;
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| MethodError::Failed(format!("cannot open PDF: {e:?}")))?;
        f(&document)
    }
}

impl StructuralParser for PdfiumEngine {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, MethodError> {
        self.with_document(bytes, |document| {
            let mut texts = Vec::with_capacity(document.pages().len() as usize);
            for (idx, page) in document.pages().iter().enumerate() {
                let text = page
                    .text()
                    .map_err(|e| {
                        MethodError::Failed(format!("text layer of page {}: {e:?}", idx + 1))
                    })?
                    .all();
                debug!("Page {}: {} chars in text layer", idx + 1, text.len());
                texts.push(text);
            }
            Ok(texts)
        })
    }
}

impl PageRasterizer for PdfiumEngine {
    fn rasterize(
        &self,
        bytes: &[u8],
        dpi: u32,
        on_page: &mut PageSink<'_>,
    ) -> Result<(), MethodError> {
        let max_pixels = self.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
            .set_maximum_width(max_pixels)
            .set_maximum_height(max_pixels);

        self.with_document(bytes, |document| {
            for (idx, page) in document.pages().iter().enumerate() {
                let image = page
                    .render_with_config(&render_config)
                    .map_err(|e| {
                        MethodError::Failed(format!("rasterising page {}: {e:?}", idx + 1))
                    })?
                    .as_image();
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                on_page(idx, image)?;
            }
            Ok(())
        })
    }
}

//! Local OCR: recognise text in a page raster.
//!
//! [`TesseractCli`] shells out to the `tesseract` binary. The raster is
//! written to a temporary PNG and the recognised text read from stdout.

use super::extract::MethodError;
use image::{DynamicImage, ImageFormat};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// A local OCR engine.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text in `image` using `language` (e.g. "ara").
    ///
    /// Returns [`MethodError::Unavailable`] when the engine or its language
    /// data is not installed.
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, MethodError>;
}

/// Tesseract invoked as `tesseract <png> stdout -l <lang> --psm <mode>`.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    path: PathBuf,
    page_seg_mode: u8,
}

impl TesseractCli {
    pub fn new(path: impl Into<PathBuf>, page_seg_mode: u8) -> Self {
        Self {
            path: path.into(),
            page_seg_mode,
        }
    }

    /// True when `tesseract --version` runs.
    pub fn is_available(&self) -> bool {
        Command::new(&self.path)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", 6)
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, MethodError> {
        let file = tempfile::Builder::new()
            .prefix("arabicpdf-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| MethodError::Failed(format!("temp file for OCR: {e}")))?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| MethodError::Failed(format!("encoding page raster: {e}")))?;

        let output = Command::new(&self.path)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => MethodError::Unavailable(
                    format!("tesseract not runnable at '{}': {e}", self.path.display()),
                ),
                _ => MethodError::Failed(format!("running tesseract: {e}")),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, language, output.status.code()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract recognised {} chars", text.len());
        Ok(text)
    }
}

/// Missing language data is a setup problem, everything else is per-image.
fn classify_failure(stderr: &str, language: &str, code: Option<i32>) -> MethodError {
    let stderr = stderr.trim();
    if stderr.contains("Failed loading language")
        || stderr.contains("Error opening data file")
        || stderr.contains("Could not initialize tesseract")
    {
        MethodError::Unavailable(format!(
            "tesseract language data '{language}' is not installed: {stderr}"
        ))
    } else {
        MethodError::Failed(format!(
            "tesseract exited with {}: {stderr}",
            code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = TesseractCli::new("/nonexistent/tesseract", 6);
        assert!(!engine.is_available());
        let img = DynamicImage::new_luma8(4, 4);
        let err = engine.recognize(&img, "ara").unwrap_err();
        assert!(matches!(err, MethodError::Unavailable(_)), "got {err:?}");
    }

    #[test]
    fn missing_language_data_is_unavailable() {
        let err = classify_failure(
            "Error opening data file /usr/share/tessdata/ara.traineddata\nFailed loading language 'ara'",
            "ara",
            Some(1),
        );
        assert!(matches!(err, MethodError::Unavailable(ref m) if m.contains("ara")));
    }

    #[test]
    fn other_failures_fall_through() {
        let err = classify_failure("Image too small to scale", "ara", Some(1));
        assert!(matches!(err, MethodError::Failed(_)));
    }
}

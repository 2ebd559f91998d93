//! Input resolution: turn a user-supplied path or URL into an in-memory
//! [`SourceFile`].
//!
//! Every extraction method reads from the same buffer, so the bytes are held
//! once behind an `Arc<[u8]>`. Magic bytes are validated here so callers get
//! a meaningful error rather than a pdfium or zip failure further down.

use crate::config::InputFormat;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// `%PDF`
const PDF_MAGIC: &[u8; 4] = b"%PDF";
/// Local file header of a zip package (DOCX).
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// A source document held in memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name as given (last path or URL segment), e.g. `report.pdf`.
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Output document name: the source stem plus `.docx`.
    pub fn output_name(&self) -> String {
        output_name_for(&self.name)
    }
}

/// `<stem>.docx` for a source file name.
pub fn output_name_for(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{stem}.docx")
}

/// Concrete kind of a source after format resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Docx,
}

/// Resolve the kind of `source` under `format`.
///
/// `Auto` checks magic bytes first, then the extension. Returns `None` when
/// neither identifies a supported format.
pub fn detect_kind(source: &SourceFile, format: InputFormat) -> Option<SourceKind> {
    match format {
        InputFormat::Pdf => return Some(SourceKind::Pdf),
        InputFormat::Docx => return Some(SourceKind::Docx),
        InputFormat::Auto => {}
    }

    if source.bytes.starts_with(PDF_MAGIC) {
        return Some(SourceKind::Pdf);
    }
    if source.bytes.starts_with(ZIP_MAGIC) {
        return Some(SourceKind::Docx);
    }

    let ext = Path::new(&source.name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => Some(SourceKind::Pdf),
        Some("docx") => Some(SourceKind::Docx),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory source.
///
/// URLs are downloaded; local paths are read after an existence and
/// permission check.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceFile, PipelineError> {
    let source = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_magic(&source)?;
    Ok(source)
}

fn check_magic(source: &SourceFile) -> Result<(), PipelineError> {
    if source.bytes.starts_with(PDF_MAGIC) || source.bytes.starts_with(ZIP_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = source.bytes.len().min(4);
    magic[..n].copy_from_slice(&source.bytes[..n]);
    Err(PipelineError::UnsupportedFormat {
        name: source.name.clone(),
        magic,
    })
}

async fn read_local(path_str: &str) -> Result<SourceFile, PipelineError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied { path });
        }
        Err(_) => return Err(PipelineError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local source: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceFile, PipelineError> {
    info!("Downloading source from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(SourceFile::new(name, bytes.to_vec()))
}

/// Last non-empty path segment containing a dot, or `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

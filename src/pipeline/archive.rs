//! Zip archive of per-source documents.

use crate::error::PipelineError;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack `(name, bytes)` entries into a deflate-compressed zip.
///
/// Entries are stored verbatim and in order. A repeated name is numbered
/// (see [`unique_names`]) so no payload is lost.
pub fn pack(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, PipelineError> {
    if entries.is_empty() {
        return Err(PipelineError::InvalidInput(
            "archive requires at least one entry".into(),
        ));
    }

    let names = unique_names(entries.iter().map(|(name, _)| name.clone()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for ((original, bytes), name) in entries.iter().zip(&names) {
        if name != original {
            warn!("Duplicate archive entry '{}': stored as '{}'", original, name);
        }
        zip.start_file(name.as_str(), options)?;
        zip.write_all(bytes)
            .map_err(|e| PipelineError::Archive(format!("writing '{name}': {e}")))?;
    }
    let archive = zip.finish()?.into_inner();

    debug!("Packed {} entries → {} bytes", names.len(), archive.len());
    Ok(archive)
}

/// Number repeated names in order: `a.docx`, `a (2).docx`, `a (3).docx`.
///
/// The first occurrence keeps its name; a numbered name never collides with
/// one already taken.
pub fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = numbered(&name, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn numbered(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

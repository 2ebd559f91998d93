//! Splice per-source documents into one composite document.
//!
//! The first decodable unit is the base: its document defaults (font, size,
//! direction, alignment) become the composite's. Every later unit is appended
//! after a page-break paragraph, keeping its own paragraph and run
//! formatting. Tables, images, headers, footers and section properties of
//! later units are not carried.

use super::build::RenderedDocument;
use crate::docx::{Document, Paragraph};
use crate::error::PipelineError;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// One source's document and its position in the output.
#[derive(Debug, Clone)]
pub struct MergeUnit {
    pub source_name: String,
    pub document: RenderedDocument,
    /// 0-based; a merge set must be contiguous from 0.
    pub ordinal: usize,
}

impl MergeUnit {
    pub fn new(source_name: impl Into<String>, document: RenderedDocument, ordinal: usize) -> Self {
        Self {
            source_name: source_name.into(),
            document,
            ordinal,
        }
    }
}

/// A unit left out because its document could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub ordinal: usize,
    pub source_name: String,
    pub detail: String,
}

/// The merged result. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompositeDocument {
    document: Document,
    merged: usize,
    skipped: Vec<SkippedUnit>,
}

impl CompositeDocument {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Units whose content made it into the composite.
    pub fn merged_count(&self) -> usize {
        self.merged
    }

    pub fn skipped(&self) -> &[SkippedUnit] {
        &self.skipped
    }

    /// Serialise to DOCX bytes in a cursor positioned at offset 0.
    pub fn save(&self) -> Result<Cursor<Vec<u8>>, PipelineError> {
        let bytes = self.document.to_bytes()?;
        Ok(Cursor::new(bytes))
    }
}

/// Merge `units` in ordinal order.
///
/// # Errors
/// * [`PipelineError::InvalidInput`] for an empty set or ordinals that are
///   not exactly `0..n`.
/// * [`PipelineError::CompositionFailed`] when no unit can be decoded.
pub fn merge(mut units: Vec<MergeUnit>) -> Result<CompositeDocument, PipelineError> {
    if units.is_empty() {
        return Err(PipelineError::InvalidInput(
            "merge requires at least one document".into(),
        ));
    }

    units.sort_by_key(|u| u.ordinal);
    if let Some((expected, unit)) = units
        .iter()
        .enumerate()
        .find(|(i, u)| u.ordinal != *i)
    {
        return Err(PipelineError::InvalidInput(format!(
            "merge ordinals must be contiguous from 0: expected {expected}, found {} ('{}')",
            unit.ordinal, unit.source_name
        )));
    }

    let total = units.len();
    let mut base: Option<Document> = None;
    let mut merged = 0usize;
    let mut skipped = Vec::new();

    for unit in units {
        let document = match unit.document.into_document() {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "Skipping '{}' (ordinal {}): {}",
                    unit.source_name, unit.ordinal, e
                );
                skipped.push(SkippedUnit {
                    ordinal: unit.ordinal,
                    source_name: unit.source_name,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        match base.as_mut() {
            None => base = Some(document),
            Some(composite) => {
                composite.add_paragraph(Paragraph::page_break());
                composite.paragraphs.extend(document.paragraphs);
            }
        }
        merged += 1;
        debug!("Merged '{}' (ordinal {})", unit.source_name, unit.ordinal);
    }

    let document = base.ok_or_else(|| PipelineError::CompositionFailed {
        detail: format!("none of the {total} documents could be decoded"),
    })?;

    info!(
        "Composed {} of {} documents ({} paragraphs)",
        merged,
        total,
        document.paragraph_count()
    );
    Ok(CompositeDocument {
        document,
        merged,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build::DocumentBuilder;

    fn unit(text: &str, ordinal: usize) -> MergeUnit {
        let name = format!("f{ordinal}.pdf");
        let doc = DocumentBuilder::default().build(text, &name);
        MergeUnit::new(name, doc, ordinal)
    }

    #[test]
    fn empty_merge_is_invalid_input() {
        assert!(matches!(merge(vec![]), Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn gaps_in_ordinals_are_invalid_input() {
        let err = merge(vec![unit("a", 0), unit("b", 2)]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(ref m) if m.contains("expected 1")));
    }

    #[test]
    fn single_unit_has_no_page_breaks() {
        let c = merge(vec![unit("a\nb", 0)]).unwrap();
        assert_eq!(c.document().page_break_count(), 0);
        assert_eq!(c.document().paragraph_count(), 2);
    }

    #[test]
    fn breaks_precede_each_later_unit() {
        // Supplied out of order; merged by ordinal.
        let c = merge(vec![unit("c", 2), unit("a1\na2", 0), unit("b", 1)]).unwrap();
        let paras = &c.document().paragraphs;
        assert_eq!(c.document().page_break_count(), 2);
        let texts: Vec<String> = paras.iter().map(Paragraph::text).collect();
        assert_eq!(texts, vec!["a1", "a2", "", "b", "", "c"]);
        assert!(paras[2].is_page_break());
        assert!(paras[4].is_page_break());
        assert!(!paras[0].is_page_break());
    }

    #[test]
    fn base_defaults_win() {
        let base = MergeUnit::new(
            "a.pdf",
            DocumentBuilder::new("Amiri", 18).build("a", "a.pdf"),
            0,
        );
        let c = merge(vec![base, unit("b", 1)]).unwrap();
        assert_eq!(c.document().defaults.font_family, "Amiri");
    }

    #[test]
    fn corrupt_unit_is_skipped_and_recorded() {
        let corrupt = MergeUnit::new(
            "bad.pdf",
            RenderedDocument::from_bytes("bad.docx", b"not a zip".to_vec()),
            1,
        );
        let c = merge(vec![unit("a", 0), corrupt, unit("c", 2)]).unwrap();
        assert_eq!(c.merged_count(), 2);
        assert_eq!(c.skipped().len(), 1);
        assert_eq!(c.skipped()[0].ordinal, 1);
        assert_eq!(c.document().page_break_count(), 1);
        assert_eq!(c.document().text(), "a\nc");
    }

    #[test]
    fn corrupt_first_unit_promotes_next_to_base() {
        let corrupt = MergeUnit::new(
            "bad.pdf",
            RenderedDocument::from_bytes("bad.docx", vec![]),
            0,
        );
        let c = merge(vec![corrupt, unit("b", 1)]).unwrap();
        assert_eq!(c.document().page_break_count(), 0);
        assert_eq!(c.document().text(), "b");
    }

    #[test]
    fn nothing_decodable_is_composition_failure() {
        let corrupt = MergeUnit::new("x.pdf", RenderedDocument::from_bytes("x.docx", vec![1]), 0);
        assert!(matches!(
            merge(vec![corrupt]),
            Err(PipelineError::CompositionFailed { .. })
        ));
    }

    #[test]
    fn save_round_trips_paragraph_count() {
        let units = vec![unit("a\nb", 0), unit("", 1), unit("c\nd\ne", 2)];
        let c = merge(units).unwrap();
        let cursor = c.save().unwrap();
        assert_eq!(cursor.position(), 0);

        let reopened = Document::from_bytes(cursor.get_ref()).unwrap();
        // 2 + 1 placeholder + 3 + 2 breaks
        assert_eq!(reopened.paragraph_count(), 8);
        assert_eq!(reopened.page_break_count(), 2);
        assert_eq!(reopened, *c.document());
    }
}

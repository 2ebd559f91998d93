//! Minimal WordprocessingML (DOCX) document model.
//!
//! The pipeline needs a narrow slice of Word: paragraphs of runs, italics,
//! right-to-left runs, bidirectional paragraphs, alignment, a font family
//! applied to both the Latin and the complex-script slots, explicit page
//! breaks, and document-wide defaults. General-purpose DOCX crates either
//! cannot express `w:bidi` / `w:rtl` or cannot read documents back, so this
//! module owns both directions:
//!
//! * [`write::pack`]   — `Document` → OOXML zip package bytes
//! * [`read::unpack`]  — OOXML zip package bytes → `Document`
//!
//! Anything the model does not carry (tables, images, headers, footers) is
//! flattened or dropped on read.

pub mod read;
pub mod write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while packing or unpacking a DOCX package.
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("DOCX package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("DOCX XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("DOCX I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A mandatory part (e.g. `word/document.xml`) is absent.
    #[error("DOCX package is missing part '{0}'")]
    MissingPart(String),
}

/// Paragraph alignment (`w:jc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
    /// Trailing edge for right-to-left text. (default)
    #[default]
    Right,
    Both,
}

impl Alignment {
    pub fn as_ooxml(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Both => "both",
        }
    }

    /// Parse a `w:jc/@w:val`. Logical `start`/`end` are mapped the way Word
    /// maps them for a left-to-right page.
    pub fn from_ooxml(val: &str) -> Option<Self> {
        match val {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Both),
            _ => None,
        }
    }
}

/// Document-wide defaults, written to `w:docDefaults` in `styles.xml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDefaults {
    /// Applied to `w:ascii`, `w:hAnsi`, `w:eastAsia` and `w:cs`.
    pub font_family: String,
    /// Font size in half-points (`w:sz` / `w:szCs`). 28 = 14 pt.
    pub font_size_half_points: u32,
    pub alignment: Alignment,
    /// Emits `w:bidi` on the default paragraph and `w:rtl` on the default run.
    pub right_to_left: bool,
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size_half_points: 28,
            alignment: Alignment::Right,
            right_to_left: true,
        }
    }
}

impl StyleDefaults {
    /// Word's own defaults, used when a package carries no `styles.xml`.
    pub fn word_fallback() -> Self {
        Self {
            font_family: "Calibri".to_string(),
            font_size_half_points: 22,
            alignment: Alignment::Left,
            right_to_left: false,
        }
    }
}

/// What a run holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunContent {
    Text(String),
    /// `<w:br w:type="page"/>`
    PageBreak,
}

/// A run of uniformly formatted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub content: RunContent,
    pub bold: bool,
    pub italic: bool,
    pub right_to_left: bool,
    /// Explicit font; `None` inherits the document default.
    pub font_family: Option<String>,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: RunContent::Text(text.into()),
            bold: false,
            italic: false,
            right_to_left: false,
            font_family: None,
        }
    }

    pub fn page_break() -> Self {
        Self {
            content: RunContent::PageBreak,
            ..Self::text("")
        }
    }

    pub fn bold(mut self, v: bool) -> Self {
        self.bold = v;
        self
    }

    pub fn italic(mut self, v: bool) -> Self {
        self.italic = v;
        self
    }

    pub fn right_to_left(mut self, v: bool) -> Self {
        self.right_to_left = v;
        self
    }

    pub fn font(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text(t) => Some(t),
            RunContent::PageBreak => None,
        }
    }

    pub fn is_page_break(&self) -> bool {
        matches!(self.content, RunContent::PageBreak)
    }
}

/// A paragraph (`w:p`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Explicit alignment; `None` inherits the document default.
    pub alignment: Option<Alignment>,
    pub bidi: bool,
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A paragraph holding a single page-break run.
    pub fn page_break() -> Self {
        Self::new().add_run(Run::page_break())
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn bidi(mut self, v: bool) -> Self {
        self.bidi = v;
        self
    }

    pub fn add_run(mut self, run: Run) -> Self {
        self.runs.push(run);
        self
    }

    /// Concatenated text of every text run.
    pub fn text(&self) -> String {
        self.runs.iter().filter_map(Run::as_text).collect()
    }

    /// True for a paragraph whose only content is page breaks.
    pub fn is_page_break(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(Run::is_page_break)
    }
}

/// An in-memory Word document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub defaults: StyleDefaults,
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    pub fn new(defaults: StyleDefaults) -> Self {
        Self {
            defaults,
            paragraphs: Vec::new(),
        }
    }

    pub fn add_paragraph(&mut self, paragraph: Paragraph) -> &mut Self {
        self.paragraphs.push(paragraph);
        self
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn page_break_count(&self) -> usize {
        self.paragraphs.iter().filter(|p| p.is_page_break()).count()
    }

    /// Paragraph texts joined with `\n`; page-break paragraphs are omitted.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .filter(|p| !p.is_page_break())
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialise to DOCX package bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        write::pack(self)
    }

    /// Decode DOCX package bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        read::unpack(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_round_trips_through_ooxml_names() {
        for a in [
            Alignment::Left,
            Alignment::Center,
            Alignment::Right,
            Alignment::Both,
        ] {
            assert_eq!(Alignment::from_ooxml(a.as_ooxml()), Some(a));
        }
        assert_eq!(Alignment::from_ooxml("end"), Some(Alignment::Right));
        assert_eq!(Alignment::from_ooxml("bogus"), None);
    }

    #[test]
    fn page_break_paragraph_detection() {
        assert!(Paragraph::page_break().is_page_break());
        assert!(!Paragraph::new().is_page_break());
        let mixed = Paragraph::new()
            .add_run(Run::text("x"))
            .add_run(Run::page_break());
        assert!(!mixed.is_page_break());
    }

    #[test]
    fn document_text_skips_breaks() {
        let mut doc = Document::new(StyleDefaults::default());
        doc.add_paragraph(Paragraph::new().add_run(Run::text("سطر")))
            .add_paragraph(Paragraph::page_break())
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::text("a"))
                    .add_run(Run::text("b")),
            );
        assert_eq!(doc.text(), "سطر\nab");
        assert_eq!(doc.page_break_count(), 1);
        assert_eq!(doc.paragraph_count(), 3);
    }
}

//! Text → right-to-left Word document.

use super::input::output_name_for;
use crate::config::PipelineConfig;
use crate::docx::{Alignment, Document, DocxError, Paragraph, Run, StyleDefaults};
use tracing::debug;

/// Placeholder shown for a source with no usable text.
pub fn placeholder_text(source_name: &str) -> String {
    format!("[No content extracted for '{source_name}']")
}

/// Builds one RTL document per source.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    defaults: StyleDefaults,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self {
            defaults: StyleDefaults::default(),
        }
    }
}

impl DocumentBuilder {
    /// A builder using `font_family` at `font_size_pt` for Latin and
    /// complex-script text alike.
    pub fn new(font_family: impl Into<String>, font_size_pt: u32) -> Self {
        Self {
            defaults: StyleDefaults {
                font_family: font_family.into(),
                font_size_half_points: font_size_pt * 2,
                alignment: Alignment::Right,
                right_to_left: true,
            },
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.font_family.clone(), config.font_size_pt)
    }

    pub fn defaults(&self) -> &StyleDefaults {
        &self.defaults
    }

    /// One right-aligned bidi paragraph per non-blank line of `text`; a
    /// single italic placeholder naming `source_name` when there is none.
    pub fn build(&self, text: &str, source_name: &str) -> RenderedDocument {
        let mut document = Document::new(self.defaults.clone());

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            document.add_paragraph(self.rtl_paragraph(Run::text(line)));
        }

        if document.paragraphs.is_empty() {
            document.add_paragraph(
                self.rtl_paragraph(Run::text(placeholder_text(source_name)).italic(true)),
            );
        }

        debug!(
            "Built document for '{}': {} paragraphs",
            source_name,
            document.paragraph_count()
        );
        RenderedDocument::new(output_name_for(source_name), document)
    }

    fn rtl_paragraph(&self, run: Run) -> Paragraph {
        Paragraph::new()
            .align(Alignment::Right)
            .bidi(true)
            .add_run(
                run.right_to_left(true)
                    .font(self.defaults.font_family.clone()),
            )
    }
}

#[derive(Debug, Clone)]
enum Content {
    Document(Document),
    /// Packed DOCX bytes, decoded on first use.
    Packed(Vec<u8>),
}

/// A built (or received) Word document and its output filename.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    filename: String,
    content: Content,
}

impl RenderedDocument {
    pub fn new(filename: impl Into<String>, document: Document) -> Self {
        Self {
            filename: filename.into(),
            content: Content::Document(document),
        }
    }

    /// Wrap packed DOCX bytes. They are not validated until decoded.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content: Content::Packed(bytes),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The in-memory document, if this handle was not built from bytes.
    pub fn document(&self) -> Option<&Document> {
        match &self.content {
            Content::Document(d) => Some(d),
            Content::Packed(_) => None,
        }
    }

    /// Decode (if needed) and take the document.
    pub fn into_document(self) -> Result<Document, DocxError> {
        match self.content {
            Content::Document(d) => Ok(d),
            Content::Packed(bytes) => Document::from_bytes(&bytes),
        }
    }

    /// Packed DOCX bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        match &self.content {
            Content::Document(d) => d.to_bytes(),
            Content::Packed(bytes) => Ok(bytes.clone()),
        }
    }
}

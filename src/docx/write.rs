//! `Document` → OOXML package.
//!
//! The package carries the five parts Word needs to open a document and
//! resolve its defaults: content types, package relationships, the document
//! part, its relationships, and the styles part.

use super::{Alignment, Document, DocxError, Paragraph, Run, RunContent, StyleDefaults};
use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// A4 portrait, one-inch margins.
const SECTION_PROPERTIES: &str = r#"<w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>"#;

/// Serialise a document into DOCX package bytes.
pub fn pack(doc: &Document) -> Result<Vec<u8>, DocxError> {
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
        ("word/styles.xml", styles_xml(&doc.defaults)),
        ("word/document.xml", document_xml(doc)),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(name, entry_options())?;
        zip.write_all(body.as_bytes())?;
    }
    let bytes = zip.finish()?.into_inner();

    debug!(
        "Packed DOCX: {} paragraphs → {} bytes",
        doc.paragraphs.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Render `word/styles.xml` with the document defaults.
pub fn styles_xml(defaults: &StyleDefaults) -> String {
    let font = xml_text(&defaults.font_family);
    let size = defaults.font_size_half_points;
    let rtl = if defaults.right_to_left { "<w:rtl/>" } else { "" };
    let bidi = if defaults.right_to_left { "<w:bidi/>" } else { "" };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{W_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:eastAsia="{font}" w:cs="{font}"/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/>{rtl}</w:rPr></w:rPrDefault><w:pPrDefault><w:pPr>{bidi}<w:jc w:val="{jc}"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style></w:styles>"#,
        jc = defaults.alignment.as_ooxml(),
    )
}

/// Render `word/document.xml`.
pub fn document_xml(doc: &Document) -> String {
    let mut body = String::with_capacity(256 + doc.paragraphs.len() * 160);
    for paragraph in &doc.paragraphs {
        write_paragraph(&mut body, paragraph);
    }

    let section_bidi = if doc.defaults.right_to_left {
        "<w:bidi/>"
    } else {
        ""
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body>{body}<w:sectPr>{SECTION_PROPERTIES}{section_bidi}</w:sectPr></w:body></w:document>"#
    )
}

fn write_paragraph(out: &mut String, paragraph: &Paragraph) {
    out.push_str("<w:p>");

    if paragraph.bidi || paragraph.alignment.is_some() {
        out.push_str("<w:pPr>");
        // CT_PPrBase order: bidi precedes jc.
        if paragraph.bidi {
            out.push_str("<w:bidi/>");
        }
        if let Some(alignment) = paragraph.alignment {
            push_jc(out, alignment);
        }
        out.push_str("</w:pPr>");
    }

    for run in &paragraph.runs {
        write_run(out, run);
    }

    out.push_str("</w:p>");
}

fn push_jc(out: &mut String, alignment: Alignment) {
    out.push_str(r#"<w:jc w:val=""#);
    out.push_str(alignment.as_ooxml());
    out.push_str(r#""/>"#);
}

fn write_run(out: &mut String, run: &Run) {
    out.push_str("<w:r>");

    let has_props = run.bold || run.italic || run.right_to_left || run.font_family.is_some();
    if has_props {
        out.push_str("<w:rPr>");
        // CT_RPr order: rFonts, b, bCs, i, iCs, …, rtl.
        if let Some(ref font) = run.font_family {
            let font = xml_text(font);
            out.push_str(&format!(
                r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/>"#
            ));
        }
        if run.bold {
            out.push_str("<w:b/><w:bCs/>");
        }
        if run.italic {
            out.push_str("<w:i/><w:iCs/>");
        }
        if run.right_to_left {
            out.push_str("<w:rtl/>");
        }
        out.push_str("</w:rPr>");
    }

    match &run.content {
        RunContent::Text(text) => {
            out.push_str(r#"<w:t xml:space="preserve">"#);
            out.push_str(&xml_text(text));
            out.push_str("</w:t>");
        }
        RunContent::PageBreak => out.push_str(r#"<w:br w:type="page"/>"#),
    }

    out.push_str("</w:r>");
}

/// Escape text for XML, dropping characters XML 1.0 cannot carry
/// (form feeds from OCR output, stray control bytes).
fn xml_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
        })
        .collect();
    escape(cleaned.as_str()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_carry_latin_and_complex_script_fonts() {
        let xml = styles_xml(&StyleDefaults::default());
        assert!(xml.contains(r#"w:ascii="Arial""#));
        assert!(xml.contains(r#"w:cs="Arial""#));
        assert!(xml.contains(r#"<w:szCs w:val="28"/>"#));
        assert!(xml.contains("<w:rtl/>"));
        assert!(xml.contains("<w:bidi/>"));
        assert!(xml.contains(r#"<w:jc w:val="right"/>"#));
    }

    #[test]
    fn ltr_defaults_omit_bidi() {
        let xml = styles_xml(&StyleDefaults::word_fallback());
        assert!(!xml.contains("<w:bidi/>"));
        assert!(!xml.contains("<w:rtl/>"));
    }

    #[test]
    fn text_is_escaped_and_control_chars_dropped() {
        assert_eq!(xml_text("a<b>&\"c\u{000C}"), "a&lt;b&gt;&amp;&quot;c");
    }

    #[test]
    fn page_break_run_serialises_as_typed_br() {
        let mut doc = Document::new(StyleDefaults::default());
        doc.add_paragraph(Paragraph::page_break());
        let xml = document_xml(&doc);
        assert!(xml.contains(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#));
    }

    #[test]
    fn pack_produces_zip_with_required_parts() {
        let doc = Document::new(StyleDefaults::default());
        let bytes = pack(&doc).expect("pack");
        assert_eq!(&bytes[..4], b"PK\x03\x04");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("zip");
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
            "word/document.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing {part}");
        }
    }
}

//! OOXML package → `Document`.
//!
//! Paragraphs nested in tables or text boxes are flattened into the body in
//! document order. Line breaks become `\n`, tabs become `\t`, and a
//! `<w:br w:type="page"/>` becomes its own page-break run.

use super::{Alignment, Document, DocxError, Paragraph, Run, StyleDefaults};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

/// Decode DOCX package bytes into a [`Document`].
pub fn unpack(bytes: &[u8]) -> Result<Document, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let document_xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| DocxError::MissingPart("word/document.xml".to_string()))?;
    let defaults = match read_part(&mut archive, "word/styles.xml")? {
        Some(styles) => parse_defaults(&styles)?,
        None => StyleDefaults::word_fallback(),
    };
    let paragraphs = parse_paragraphs(&document_xml)?;

    debug!("Unpacked DOCX: {} paragraphs", paragraphs.len());
    Ok(Document {
        defaults,
        paragraphs,
    })
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, DocxError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Value of the attribute named `key`, unescaped.
fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Toggle properties (`w:b`, `w:i`, `w:rtl`, `w:bidi`) are on unless
/// `w:val` says "0"/"false"/"off".
fn toggle_on(e: &BytesStart) -> bool {
    !matches!(
        get_attr(e, b"w:val").as_deref(),
        Some("0") | Some("false") | Some("off")
    )
}

/// Parse `w:docDefaults` out of `styles.xml`.
fn parse_defaults(xml: &str) -> Result<StyleDefaults, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut defaults = StyleDefaults {
        right_to_left: false,
        alignment: Alignment::Left,
        ..StyleDefaults::word_fallback()
    };
    let mut in_defaults = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:docDefaults" => in_defaults = true,
            Event::End(e) if e.name().as_ref() == b"w:docDefaults" => break,
            Event::Start(e) | Event::Empty(e) if in_defaults => match e.name().as_ref() {
                b"w:rFonts" => {
                    if let Some(font) = get_attr(&e, b"w:cs").or_else(|| get_attr(&e, b"w:ascii"))
                    {
                        defaults.font_family = font;
                    }
                }
                b"w:sz" => {
                    if let Some(size) = get_attr(&e, b"w:val").and_then(|v| v.parse().ok()) {
                        defaults.font_size_half_points = size;
                    }
                }
                b"w:rtl" | b"w:bidi" => defaults.right_to_left |= toggle_on(&e),
                b"w:jc" => {
                    if let Some(a) = get_attr(&e, b"w:val").and_then(|v| Alignment::from_ooxml(&v))
                    {
                        defaults.alignment = a;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(defaults)
}

/// Run properties collected from a `w:rPr`.
#[derive(Default, Clone)]
struct RunProps {
    bold: bool,
    italic: bool,
    right_to_left: bool,
    font_family: Option<String>,
}

impl RunProps {
    fn apply(&self, run: Run) -> Run {
        let run = run
            .bold(self.bold)
            .italic(self.italic)
            .right_to_left(self.right_to_left);
        match self.font_family {
            Some(ref f) => run.font(f.clone()),
            None => run,
        }
    }
}

#[derive(Default)]
struct BodyWalker {
    paragraphs: Vec<Paragraph>,
    paragraph: Option<Paragraph>,
    /// Inside `w:r`; holds the run's properties.
    run: Option<RunProps>,
    text: String,
    in_ppr: bool,
    in_rpr: bool,
    in_t: bool,
}

impl BodyWalker {
    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        if let (Some(p), Some(props)) = (self.paragraph.as_mut(), self.run.as_ref()) {
            p.runs.push(props.apply(Run::text(text)));
        }
    }

    fn element(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"w:pPr" => self.in_ppr = true,
            b"w:rPr" => self.in_rpr = true,
            b"w:r" => {
                self.run = Some(RunProps::default());
                self.text.clear();
            }
            b"w:t" => self.in_t = true,
            b"w:bidi" if self.in_ppr && !self.in_rpr => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.bidi = toggle_on(e);
                }
            }
            b"w:jc" if self.in_ppr && !self.in_rpr => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.alignment = get_attr(e, b"w:val").and_then(|v| Alignment::from_ooxml(&v));
                }
            }
            b"w:b" if self.in_rpr => {
                if let Some(r) = self.run.as_mut() {
                    r.bold = toggle_on(e);
                }
            }
            b"w:i" if self.in_rpr => {
                if let Some(r) = self.run.as_mut() {
                    r.italic = toggle_on(e);
                }
            }
            b"w:rtl" if self.in_rpr => {
                if let Some(r) = self.run.as_mut() {
                    r.right_to_left = toggle_on(e);
                }
            }
            b"w:rFonts" if self.in_rpr => {
                if let Some(r) = self.run.as_mut() {
                    r.font_family = get_attr(e, b"w:cs").or_else(|| get_attr(e, b"w:ascii"));
                }
            }
            b"w:br" if self.run.is_some() => {
                if get_attr(e, b"w:type").as_deref() == Some("page") {
                    self.flush_text();
                    if let (Some(p), Some(props)) = (self.paragraph.as_mut(), self.run.as_ref()) {
                        p.runs.push(props.apply(Run::page_break()));
                    }
                } else {
                    self.text.push('\n');
                }
            }
            b"w:tab" if self.run.is_some() && !self.in_ppr => self.text.push('\t'),
            _ => {}
        }
    }

    fn start(&mut self, e: &BytesStart) {
        if e.name().as_ref() == b"w:p" {
            self.paragraph = Some(Paragraph::new());
        } else {
            self.element(e);
        }
    }

    fn empty(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"w:p" => self.paragraphs.push(Paragraph::new()),
            // Self-closing containers open and close in one event.
            b"w:pPr" | b"w:rPr" | b"w:t" => {}
            b"w:r" => {}
            _ => self.element(e),
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:pPr" => self.in_ppr = false,
            b"w:rPr" => self.in_rpr = false,
            b"w:t" => self.in_t = false,
            b"w:r" => {
                self.flush_text();
                self.run = None;
            }
            b"w:p" => {
                if let Some(p) = self.paragraph.take() {
                    self.paragraphs.push(p);
                }
            }
            _ => {}
        }
    }
}

/// Walk `word/document.xml` and collect body paragraphs.
fn parse_paragraphs(xml: &str) -> Result<Vec<Paragraph>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut walker = BodyWalker::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => walker.start(&e),
            Event::Empty(e) => walker.empty(&e),
            Event::End(e) => walker.end(e.name().as_ref()),
            Event::Text(t) if walker.in_t => walker.text.push_str(&t.unescape()?),
            Event::CData(t) if walker.in_t => {
                walker.text.push_str(&String::from_utf8_lossy(&t.into_inner()))
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(walker.paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::write::pack;

    fn rtl_doc() -> Document {
        let mut doc = Document::new(StyleDefaults::default());
        doc.add_paragraph(
            Paragraph::new()
                .align(Alignment::Right)
                .bidi(true)
                .add_run(Run::text("بسم الله").right_to_left(true).font("Arial")),
        )
        .add_paragraph(Paragraph::page_break())
        .add_paragraph(
            Paragraph::new().add_run(Run::text("[placeholder]").italic(true)),
        );
        doc
    }

    #[test]
    fn pack_then_unpack_preserves_model() {
        let doc = rtl_doc();
        let bytes = pack(&doc).expect("pack");
        let back = unpack(&bytes).expect("unpack");
        assert_eq!(back, doc);
    }

    #[test]
    fn parses_foreign_markup() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:pPr><w:jc w:val="center"/><w:rPr><w:b/></w:rPr></w:pPr>
              <w:r><w:rPr><w:i w:val="0"/></w:rPr><w:t>a</w:t><w:tab/><w:t xml:space="preserve"> b</w:t><w:br/><w:t>c</w:t></w:r>
            </w:p>
            <w:p/>
            <w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell &amp; more</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
        </w:body></w:document>"#;
        let paragraphs = parse_paragraphs(xml).expect("parse");
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0].alignment, Some(Alignment::Center));
        assert_eq!(paragraphs[0].text(), "a\t b\nc");
        assert!(!paragraphs[0].runs[0].bold, "paragraph-mark rPr must not leak");
        assert!(!paragraphs[0].runs[0].italic);
        assert!(paragraphs[1].runs.is_empty());
        assert_eq!(paragraphs[2].text(), "cell & more");
    }

    #[test]
    fn missing_styles_fall_back_to_word_defaults() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(
            &mut zip,
            br#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let doc = unpack(&bytes).expect("unpack");
        assert_eq!(doc.defaults, StyleDefaults::word_fallback());
        assert_eq!(doc.text(), "x");
    }

    #[test]
    fn rejects_non_zip_bytes() {
        assert!(matches!(unpack(b"not a docx"), Err(DocxError::Zip(_))));
    }

    #[test]
    fn rejects_package_without_document_part() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(unpack(&bytes), Err(DocxError::MissingPart(_))));
    }
}

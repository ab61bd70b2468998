//! DOCX text recovery: unzip `word/document.xml` and walk the WordprocessingML.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;
use zip::ZipArchive;

use thesisforge_shared::DocumentFormat;

use crate::{ExtractionError, FormatExtractor, TextBlock};

const DOCUMENT_PART: &str = "word/document.xml";
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Extracts paragraphs from an Office Open XML word document.
///
/// Paragraphs styled `Title` or `Heading1`..`Heading6` carry their heading
/// level through to the extracted document.
pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn extract_blocks(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractionError> {
        if bytes.starts_with(&OLE_MAGIC) {
            return Err(if is_encrypted_package(bytes) {
                ExtractionError::PasswordProtected
            } else {
                ExtractionError::DocxParsing("not a zip container (legacy Word binary?)".into())
            });
        }

        let xml = read_document_part(bytes)?;
        parse_document_xml(&xml)
    }

    fn name(&self) -> &str {
        "docx"
    }
}

/// Encrypted OOXML files are OLE containers holding an `EncryptedPackage` stream.
fn is_encrypted_package(bytes: &[u8]) -> bool {
    let needle: Vec<u8> = "EncryptedPackage"
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    bytes.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn read_document_part(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::DocxParsing(format!("invalid zip container: {e}")))?;

    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::DocxParsing(format!("missing {DOCUMENT_PART}: {e}")))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::DocxParsing(format!("failed to read {DOCUMENT_PART}: {e}")))?;
    Ok(xml)
}

/// Walk `w:p` paragraphs, collecting `w:t` runs and the paragraph style.
pub(crate) fn parse_document_xml(xml: &str) -> Result<Vec<TextBlock>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut blocks = Vec::new();

    let mut paragraph = String::new();
    let mut level: Option<u8> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:p" => {
                    paragraph.clear();
                    level = None;
                }
                b"w:t" => in_text = true,
                b"w:pStyle" => level = style_level(e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:pStyle" => level = style_level(e),
                b"w:tab" => paragraph.push(' '),
                b"w:br" | b"w:cr" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| ExtractionError::DocxParsing(format!("bad text run: {err}")))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if !paragraph.trim().is_empty() {
                        blocks.push(TextBlock {
                            text: std::mem::take(&mut paragraph),
                            heading_level: level.take(),
                        });
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(position = reader.buffer_position(), "malformed document.xml: {e}");
                return Err(ExtractionError::DocxParsing(format!(
                    "malformed document.xml at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(blocks)
}

/// Map a `w:pStyle` value to a heading level.
fn style_level(e: &BytesStart<'_>) -> Option<u8> {
    let attr = e.try_get_attribute("w:val").ok().flatten()?;
    let value = attr.unescape_value().ok()?;
    heading_level_for_style(&value)
}

fn heading_level_for_style(style: &str) -> Option<u8> {
    let normalized: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if normalized == "title" {
        return Some(1);
    }

    let digits = normalized
        .strip_prefix("heading")
        .or_else(|| normalized.strip_prefix("judul"))?;
    match digits.parse::<u8>() {
        Ok(n @ 1..=6) => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn paragraph(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
            .unwrap_or_default();
        format!(r#"<w:p>{ppr}<w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    fn make_docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_paragraphs_with_heading_styles() {
        let body = [
            paragraph(Some("Heading1"), "BAB II TINJAUAN PUSTAKA"),
            paragraph(None, "Penelitian terdahulu menunjukkan hasil yang beragam."),
            paragraph(Some("Heading2"), "2.1 Landasan Teori"),
            paragraph(None, "Teori utama &amp; pendukung."),
        ]
        .concat();

        let blocks = DocxExtractor.extract_blocks(&make_docx(&body)).unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], TextBlock::heading("BAB II TINJAUAN PUSTAKA", 1));
        assert_eq!(blocks[2].heading_level, Some(2));
        assert_eq!(blocks[3].text, "Teori utama & pendukung.");
    }

    #[test]
    fn runs_tabs_and_breaks_are_joined() {
        let body = r#"<w:p><w:r><w:t>Hasil</w:t></w:r><w:r><w:tab/><w:t>uji</w:t><w:br/><w:t>lanjut</w:t></w:r></w:p>"#;
        let blocks = DocxExtractor.extract_blocks(&make_docx(body)).unwrap();
        assert_eq!(blocks, vec![TextBlock::body("Hasil uji\nlanjut")]);
    }

    #[test]
    fn empty_paragraphs_are_skipped() {
        let body = format!("<w:p/><w:p></w:p>{}", paragraph(None, "Isi"));
        let blocks = DocxExtractor.extract_blocks(&make_docx(&body)).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn non_zip_bytes_are_a_parse_error() {
        let result = DocxExtractor.extract_blocks(b"plain text, not a docx");
        assert!(matches!(result, Err(ExtractionError::DocxParsing(_))));
    }

    #[test]
    fn encrypted_ole_container_is_password_protected() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend(std::iter::repeat_n(0u8, 64));
        bytes.extend("EncryptedPackage".encode_utf16().flat_map(u16::to_le_bytes));
        let result = DocxExtractor.extract_blocks(&bytes);
        assert!(matches!(result, Err(ExtractionError::PasswordProtected)));
    }

    #[test]
    fn style_names_map_to_levels() {
        assert_eq!(heading_level_for_style("Heading1"), Some(1));
        assert_eq!(heading_level_for_style("heading 3"), Some(3));
        assert_eq!(heading_level_for_style("Title"), Some(1));
        assert_eq!(heading_level_for_style("Judul2"), Some(2));
        assert_eq!(heading_level_for_style("Heading9"), None);
        assert_eq!(heading_level_for_style("Normal"), None);
    }
}

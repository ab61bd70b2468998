//! PDF text recovery via `pdf-extract`, with a `lopdf` content-stream
//! fallback for documents its decoder rejects.

use std::panic::{AssertUnwindSafe, catch_unwind};

use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::{debug, warn};

use thesisforge_shared::DocumentFormat;

use crate::{ExtractionError, FormatExtractor, TextBlock};

/// Extracts the text layer of a PDF, one block per page.
pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract_blocks(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractionError> {
        if is_encrypted(bytes) {
            return Err(ExtractionError::PasswordProtected);
        }

        let pages = with_fallback(decode_pages(bytes), bytes)?;
        Ok(pages.into_iter().map(TextBlock::body).collect())
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

fn decode_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    // pdf-extract panics on some malformed font tables.
    catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes)))
        .map_err(|_| {
            warn!("pdf-extract panicked while decoding document");
            ExtractionError::PdfParsing("decoder panicked on malformed content".into())
        })?
        .map_err(|e| map_load_error(&e.to_string()))
}

/// Retry a failed decode by reading the string operands of each page's
/// content stream. The primary error stands when the retry finds no text.
fn with_fallback(
    primary: Result<Vec<String>, ExtractionError>,
    bytes: &[u8],
) -> Result<Vec<String>, ExtractionError> {
    let err = match primary {
        Ok(pages) => return Ok(pages),
        Err(ExtractionError::PasswordProtected) => return Err(ExtractionError::PasswordProtected),
        Err(e) => e,
    };

    match content_stream_pages(bytes) {
        Some(pages) if pages.iter().any(|p| !p.trim().is_empty()) => {
            warn!(error = %err, pages = pages.len(), "recovered PDF text from content streams");
            Ok(pages)
        }
        _ => Err(err),
    }
}

fn content_stream_pages(bytes: &[u8]) -> Option<Vec<String>> {
    let doc = Document::load_mem(bytes)
        .inspect_err(|e| debug!(error = %e, "lopdf could not load document"))
        .ok()?;

    let pages = doc
        .get_pages()
        .into_values()
        .map(|page_id| {
            let mut text = String::new();
            let Ok(raw) = doc.get_page_content(page_id) else {
                return text;
            };
            let Ok(content) = Content::decode(&raw) else {
                return text;
            };
            for op in &content.operations {
                match op.operator.as_str() {
                    "Tj" | "'" | "\"" => op.operands.iter().for_each(|o| push_string(&mut text, o)),
                    "TJ" => {
                        if let Some(Object::Array(items)) = op.operands.first() {
                            items.iter().for_each(|o| push_string(&mut text, o));
                        }
                    }
                    "Td" | "TD" | "T*" | "ET" if !text.ends_with(['\n', ' ']) && !text.is_empty() => {
                        text.push('\n');
                    }
                    _ => {}
                }
            }
            text
        })
        .collect();
    Some(pages)
}

fn push_string(out: &mut String, operand: &Object) {
    if let Object::String(bytes, _) = operand {
        out.push_str(&String::from_utf8_lossy(bytes));
    }
}

/// An `/Encrypt` entry in the trailer means the content streams are ciphered.
fn is_encrypted(bytes: &[u8]) -> bool {
    const MARKER: &[u8] = b"/Encrypt";
    bytes.windows(MARKER.len()).any(|w| w == MARKER)
}

fn map_load_error(message: &str) -> ExtractionError {
    let lower = message.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PasswordProtected
    } else {
        ExtractionError::PdfParsing(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a single-page PDF with one line of Helvetica text.
    fn make_test_pdf(text: &str) -> Vec<u8> {
        use lopdf::{Stream, dictionary};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extracts_text_layer() {
        let bytes = make_test_pdf("BAB III METODE PENELITIAN");
        let blocks = PdfExtractor.extract_blocks(&bytes).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(
            blocks[0].text.contains("METODE"),
            "expected chapter heading text, got: {:?}",
            blocks[0].text
        );
    }

    #[test]
    fn content_streams_recover_text_when_the_decoder_fails() {
        let bytes = make_test_pdf("BAB III METODE PENELITIAN");
        let failed = Err(ExtractionError::PdfParsing("missing font descriptor".into()));
        let pages = with_fallback(failed, &bytes).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("BAB III METODE PENELITIAN"), "got {:?}", pages[0]);
    }

    #[test]
    fn fallback_keeps_the_original_error_when_nothing_is_recovered() {
        let failed = Err(ExtractionError::PdfParsing("unexpected EOF".into()));
        let err = with_fallback(failed, b"not a pdf at all").unwrap_err();
        assert!(matches!(err, ExtractionError::PdfParsing(m) if m == "unexpected EOF"));
    }

    #[test]
    fn password_errors_skip_the_fallback() {
        let bytes = make_test_pdf("secret");
        let err = with_fallback(Err(ExtractionError::PasswordProtected), &bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::PasswordProtected));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = PdfExtractor.extract_blocks(b"not a pdf at all");
        assert!(matches!(result, Err(ExtractionError::PdfParsing(_))));
    }

    #[test]
    fn encrypt_dictionary_is_password_protected() {
        let bytes = b"%PDF-1.6\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R /Encrypt 2 0 R >>\n%%EOF";
        let result = PdfExtractor.extract_blocks(bytes);
        assert!(matches!(result, Err(ExtractionError::PasswordProtected)));
    }

    #[test]
    fn password_messages_map_to_protected() {
        assert!(matches!(
            map_load_error("PDF requires a Password to open"),
            ExtractionError::PasswordProtected
        ));
        assert!(matches!(
            map_load_error("unexpected EOF"),
            ExtractionError::PdfParsing(_)
        ));
    }
}

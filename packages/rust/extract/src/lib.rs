//! Text extraction for thesis chapter documents.
//!
//! Each supported input format has its own [`FormatExtractor`] strategy that
//! recovers raw text blocks. The shared finishing step then runs the cleanup
//! passes and heading detection so every format yields the same
//! [`ExtractedDocument`] contract: plain text with `\n\n` paragraph
//! boundaries plus an ordered list of detected headings.

mod cleanup;
mod doc;
mod docx;
mod headings;
mod pdf;

use tracing::{debug, instrument};

use thesisforge_shared::{DocumentFormat, RawDocument, ThesisForgeError};

pub use doc::LegacyDocExtractor;
pub use docx::DocxExtractor;
pub use headings::detect_headings;
pub use pdf::PdfExtractor;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single document could not be turned into text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("DOCX parsing failed: {0}")]
    DocxParsing(String),

    #[error("document is password-protected")]
    PasswordProtected,

    #[error("document contains no extractable text")]
    Empty,

    #[error("no extractor registered for format {0:?}")]
    UnsupportedFormat(DocumentFormat),
}

impl ExtractionError {
    /// Attach the offending filename and lift into the workspace error type.
    pub fn for_file(self, filename: &str) -> ThesisForgeError {
        ThesisForgeError::Extraction {
            filename: filename.to_string(),
            message: self.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output contract
// ---------------------------------------------------------------------------

/// A heading detected in the extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub text: String,
    /// Byte offset of the heading within [`ExtractedDocument::text`].
    pub position: usize,
    /// 1 = chapter-level, larger numbers nest deeper.
    pub level: u8,
}

/// Plain text plus structural markers recovered from one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub text: String,
    pub headings: Vec<Heading>,
}

impl ExtractedDocument {
    /// Paragraphs, split on the blank-line boundaries.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
    }

    /// Whitespace-delimited token count.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// The first `n` headings in document order.
    pub fn leading_headings(&self, n: usize) -> &[Heading] {
        &self.headings[..self.headings.len().min(n)]
    }
}

/// A block of text recovered by a format strategy, before cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
    /// Heading level declared by the source format (e.g. a DOCX paragraph style).
    pub heading_level: Option<u8>,
}

impl TextBlock {
    pub fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading_level: None,
        }
    }

    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        Self {
            text: text.into(),
            heading_level: Some(level),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy trait + registry
// ---------------------------------------------------------------------------

/// Format-specific text recovery.
pub trait FormatExtractor: Send + Sync {
    /// The input format this strategy handles.
    fn format(&self) -> DocumentFormat;

    /// Recover raw text blocks from the document bytes.
    fn extract_blocks(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractionError>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

/// Holds one extractor per supported format.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FormatExtractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with all built-in extractors.
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(PdfExtractor),
                Box::new(DocxExtractor),
                Box::new(LegacyDocExtractor),
            ],
        }
    }

    /// Look up the extractor for a format.
    pub fn for_format(&self, format: DocumentFormat) -> Option<&dyn FormatExtractor> {
        self.extractors
            .iter()
            .find(|e| e.format() == format)
            .map(|e| e.as_ref())
    }

    /// Extract text and headings from a raw document.
    #[instrument(skip_all, fields(file = %doc.filename(), format = doc.format().as_str()))]
    pub fn extract(&self, doc: &RawDocument) -> Result<ExtractedDocument, ExtractionError> {
        let extractor = self
            .for_format(doc.format())
            .ok_or(ExtractionError::UnsupportedFormat(doc.format()))?;

        let blocks = extractor.extract_blocks(doc.bytes())?;
        debug!(extractor = extractor.name(), blocks = blocks.len(), "raw text recovered");

        let extracted = finish(&blocks)?;
        debug!(
            words = extracted.word_count(),
            headings = extracted.headings.len(),
            "extraction complete"
        );
        Ok(extracted)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a document with the built-in registry.
pub fn extract(doc: &RawDocument) -> Result<ExtractedDocument, ExtractionError> {
    ExtractorRegistry::new().extract(doc)
}

/// Shared finishing step: cleanup, emptiness check, heading detection.
fn finish(blocks: &[TextBlock]) -> Result<ExtractedDocument, ExtractionError> {
    let joined = blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let text = cleanup::run_pipeline(&joined);

    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }

    let styled: Vec<(String, u8)> = blocks
        .iter()
        .filter_map(|b| {
            let level = b.heading_level?;
            let normalized = cleanup::normalize_inline(&b.text);
            (!normalized.is_empty()).then_some((normalized, level))
        })
        .collect();

    let mut headings = locate_styled_headings(&text, &styled);
    for detected in detect_headings(&text) {
        if !headings.iter().any(|h| h.position == detected.position) {
            headings.push(detected);
        }
    }
    headings.sort_by_key(|h| h.position);

    Ok(ExtractedDocument { text, headings })
}

/// Find each format-declared heading in the cleaned text, in order.
fn locate_styled_headings(text: &str, styled: &[(String, u8)]) -> Vec<Heading> {
    let mut headings = Vec::with_capacity(styled.len());
    let mut cursor = 0;

    for (heading, level) in styled {
        if let Some(idx) = text[cursor..].find(heading.as_str()) {
            let position = cursor + idx;
            headings.push(Heading {
                text: heading.clone(),
                position,
                level: *level,
            });
            cursor = position + heading.len();
        }
    }

    headings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_joins_blocks_into_paragraphs() {
        let blocks = vec![
            TextBlock::heading("BAB I  PENDAHULUAN", 1),
            TextBlock::body("Latar   belakang penelitian ini."),
            TextBlock::body("Paragraf kedua."),
        ];
        let doc = finish(&blocks).unwrap();
        assert_eq!(
            doc.text,
            "BAB I PENDAHULUAN\n\nLatar belakang penelitian ini.\n\nParagraf kedua."
        );
        assert_eq!(doc.paragraphs().count(), 3);
        assert_eq!(doc.headings[0].text, "BAB I PENDAHULUAN");
        assert_eq!(doc.headings[0].position, 0);
        assert_eq!(doc.headings[0].level, 1);
    }

    #[test]
    fn finish_rejects_whitespace_only_documents() {
        let blocks = vec![TextBlock::body("   \n\t  "), TextBlock::body("12")];
        assert!(matches!(finish(&blocks), Err(ExtractionError::Empty)));
    }

    #[test]
    fn styled_and_detected_headings_do_not_duplicate() {
        let blocks = vec![
            TextBlock::heading("DAFTAR PUSTAKA", 1),
            TextBlock::body("Brown, P. (2018). Advances. Journal of AI Research."),
        ];
        let doc = finish(&blocks).unwrap();
        let at_zero: Vec<_> = doc.headings.iter().filter(|h| h.position == 0).collect();
        assert_eq!(at_zero.len(), 1);
    }

    #[test]
    fn registry_covers_every_format() {
        let registry = ExtractorRegistry::new();
        for format in [DocumentFormat::Pdf, DocumentFormat::Docx, DocumentFormat::Doc] {
            let extractor = registry.for_format(format).expect("extractor registered");
            assert_eq!(extractor.format(), format);
        }
    }

    #[test]
    fn extraction_error_carries_filename() {
        let err = ExtractionError::PasswordProtected.for_file("BAB_II.pdf");
        let msg = err.to_string();
        assert!(msg.contains("BAB_II.pdf"));
        assert!(msg.contains("password-protected"));
    }

    #[test]
    fn leading_headings_is_bounded() {
        let doc = ExtractedDocument {
            text: String::new(),
            headings: vec![
                Heading { text: "A".into(), position: 0, level: 1 },
                Heading { text: "B".into(), position: 5, level: 2 },
            ],
        };
        assert_eq!(doc.leading_headings(5).len(), 2);
        assert_eq!(doc.leading_headings(1)[0].text, "A");
    }
}

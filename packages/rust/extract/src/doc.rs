//! Legacy Word (`.doc`) recovery.
//!
//! Many `.doc` uploads are really DOCX files with the wrong extension; those
//! go through [`DocxExtractor`]. Genuine Word 97-2003 binaries get a
//! best-effort scan for printable text runs, since the piece table is not
//! decoded.

use tracing::debug;

use thesisforge_shared::DocumentFormat;

use crate::docx::DocxExtractor;
use crate::{ExtractionError, FormatExtractor, TextBlock};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Minimum run length (in characters) kept by the scanner.
const MIN_RUN_CHARS: usize = 12;
const MIN_RUN_WORDS: usize = 3;

pub struct LegacyDocExtractor;

impl FormatExtractor for LegacyDocExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Doc
    }

    fn extract_blocks(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractionError> {
        if bytes.starts_with(ZIP_MAGIC) {
            debug!("legacy .doc is a zip container, delegating to docx");
            return DocxExtractor.extract_blocks(bytes);
        }

        if !bytes.starts_with(&OLE_MAGIC) {
            return Err(ExtractionError::DocxParsing(
                "not a Word document (no OLE or zip signature)".into(),
            ));
        }

        let wide = utf16_runs(bytes);
        let narrow = ascii_runs(bytes);
        let runs = if letter_count(&wide) >= letter_count(&narrow) {
            wide
        } else {
            narrow
        };

        Ok(runs
            .iter()
            .flat_map(|run| run.split('\r'))
            .map(str::trim)
            .filter(|p| looks_like_prose(p))
            .map(TextBlock::body)
            .collect())
    }

    fn name(&self) -> &str {
        "doc"
    }
}

fn is_text_char(c: char) -> bool {
    c == '\r' || c == '\t' || (!c.is_control() && c != '\u{fffd}')
}

/// Runs of UTF-16LE code units decoding to printable text.
fn utf16_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();

    for pair in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(u32::from(unit)).filter(|c| is_text_char(*c) && unit < 0x2500) {
            Some(c) => current.push(c),
            None => flush_run(&mut current, &mut runs),
        }
    }
    flush_run(&mut current, &mut runs);
    runs
}

/// Runs of 8-bit printable ASCII.
fn ascii_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();

    for &b in bytes {
        if b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b) {
            current.push(char::from(b));
        } else {
            flush_run(&mut current, &mut runs);
        }
    }
    flush_run(&mut current, &mut runs);
    runs
}

fn flush_run(current: &mut String, runs: &mut Vec<String>) {
    if current.chars().count() >= MIN_RUN_CHARS {
        runs.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Mostly letters and at least a few words; filters out binary noise.
fn looks_like_prose(text: &str) -> bool {
    if text.split_whitespace().count() < MIN_RUN_WORDS {
        return false;
    }
    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let letters = visible.iter().filter(|c| c.is_alphabetic()).count();
    letters * 10 >= visible.len() * 6
}

fn letter_count(runs: &[String]) -> usize {
    runs.iter()
        .filter(|r| looks_like_prose(r))
        .map(|r| r.chars().filter(|c| c.is_alphabetic()).count())
        .sum()
}

//! Post-extraction cleanup pipeline for plain text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The pipeline strips control characters, normalizes whitespace, drops page
//! numbers, and reduces blank-line runs to single paragraph boundaries.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on recovered text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = strip_control_chars(text);

    result = normalize_line_whitespace(&result);
    result = drop_page_numbers(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

/// Collapse all whitespace runs in a single line of text.
pub(crate) fn normalize_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Pass 1: Control characters
// ---------------------------------------------------------------------------

/// Drop control characters (keeping newlines) and invisible formatting marks.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' => Some('\n'),
            '\r' => None,
            '\t' | '\u{a0}' | '\u{2007}' | '\u{202f}' => Some(' '),
            '\u{feff}' | '\u{ad}' | '\u{200b}' => None,
            '\u{0c}' => Some('\n'),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 2: Line whitespace
// ---------------------------------------------------------------------------

/// Trim every line and collapse inner runs of spaces.
fn normalize_line_whitespace(text: &str) -> String {
    text.lines()
        .map(normalize_inline)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Page numbers
// ---------------------------------------------------------------------------

/// Remove lines that contain nothing but a page number.
///
/// Handles `12`, `- 12 -`, `Page 12`, `Halaman 12` and lowercase roman
/// front-matter numbering (`iv`).
fn drop_page_numbers(text: &str) -> String {
    static PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:-\s*)?(?:page|halaman|hal\.)?\s*\d{1,4}(?:\s*-)?$")
            .expect("valid regex")
    });
    static ROMAN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[ivxlc]{1,6}$").expect("valid regex"));

    text.lines()
        .filter(|line| !(PAGE_RE.is_match(line) || ROMAN_RE.is_match(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ blank lines into exactly one paragraph boundary.
fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(text, "\n\n").to_string()
}

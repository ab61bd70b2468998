//! Parse a single bibliography entry into a [`Reference`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use thesisforge_shared::{Reference, SourceType};

/// Entries shorter than this are page furniture, not references.
const MIN_ENTRY_CHARS: usize = 20;

/// Why an entry could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailure {
    TooShort,
    MissingYear,
    MissingAuthors,
    MissingTitle,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::TooShort => "entry too short to be a reference",
            Self::MissingYear => "no publication year found",
            Self::MissingAuthors => "no author found before the year",
            Self::MissingTitle => "no title found after the year",
        };
        f.write_str(msg)
    }
}

static PAREN_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})[a-z]?\)").expect("valid regex"));

static BARE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})[a-z]?\b").expect("valid regex"));

static ET_AL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),?\s*\b(?:et\s+al|dkk)\b\.?").expect("valid regex"));

static CONJUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:&|\band\b|\bdan\b)\s*").expect("valid regex"));

static INITIALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\p{Lu}\.(?:\s*-?\s*\p{Lu}\.)*$|^\p{Lu}{1,3}$").expect("valid regex")
});

static VOLUME_ISSUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*\(\d+(?:\s*[-–]\s*\d+)?\)").expect("valid regex"));

static EDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\d+(?:st|nd|rd|th)?\s*ed\.?\)|\bedisi\b|\bedition\b").expect("valid regex")
});

const JOURNAL_KEYWORDS: &[&str] = &[
    "journal",
    "jurnal",
    "quarterly",
    "review",
    "transactions",
    "letters",
    "annals",
    "bulletin",
    "acta ",
];

const CONFERENCE_KEYWORDS: &[&str] = &[
    "proceedings",
    "prosiding",
    "conference",
    "konferensi",
    "symposium",
    "simposium",
    "seminar",
    "workshop",
    "congress",
];

const BOOK_KEYWORDS: &[&str] = &[
    "press",
    "publisher",
    "publishing",
    "publications",
    "penerbit",
    "associates",
    "books",
    "alfabeta",
    "rineka cipta",
    "erlangga",
    "gramedia",
    "pustaka pelajar",
    "salemba",
    "remaja rosdakarya",
    "prenada",
    "wiley",
    "mcgraw",
    "pearson",
    "sage",
    "routledge",
];

/// Parse one cleaned entry.
pub fn parse_entry(entry: &str) -> Result<Reference, ParseFailure> {
    let entry = entry.trim();
    if entry.chars().count() < MIN_ENTRY_CHARS {
        return Err(ParseFailure::TooShort);
    }

    let (year, year_start, year_end) = find_year(entry).ok_or(ParseFailure::MissingYear)?;

    let authors = split_authors(&entry[..year_start]);
    if authors.is_empty() {
        return Err(ParseFailure::MissingAuthors);
    }

    let rest = entry[year_end..].trim_start_matches([')', '.', ',', ':', ' ']);
    let (title, source) = split_title(rest);
    if title.is_empty() {
        return Err(ParseFailure::MissingTitle);
    }

    let source_type = classify_source(&source, entry);

    Ok(Reference {
        authors,
        year,
        title,
        source,
        source_type,
        raw: entry.to_string(),
    })
}

/// First `(YYYY)` token, else the first bare 19xx/20xx token.
fn find_year(entry: &str) -> Option<(i32, usize, usize)> {
    let caps = PAREN_YEAR_RE
        .captures(entry)
        .or_else(|| BARE_YEAR_RE.captures(entry))?;
    let whole = caps.get(0)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    Some((year, whole.start(), whole.end()))
}

/// Split the author segment into one string per author, re-attaching
/// initials to their surname (`Brown, P.`) and dropping `et al.`.
fn split_authors(segment: &str) -> Vec<String> {
    let without_et_al = ET_AL_RE.replace_all(segment, "");
    let normalized = CONJUNCTION_RE.replace_all(&without_et_al, ", ");
    let trimmed = normalized.trim().trim_end_matches(['(', ',', ' ']);

    let mut authors: Vec<String> = Vec::new();
    for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match authors.last_mut() {
            Some(last) if INITIALS_RE.is_match(token) && !last.contains(',') => {
                last.push_str(", ");
                last.push_str(token);
            }
            _ => authors.push(token.to_string()),
        }
    }
    authors
}

/// Title runs to the first top-level sentence boundary; the rest is source.
fn split_title(rest: &str) -> (String, String) {
    let mut depth = 0i32;
    let mut chars = rest.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            '.' | '?' | '!' if depth <= 0 => {
                let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
                if at_boundary {
                    let keep = if c == '.' { idx } else { idx + c.len_utf8() };
                    let title = rest[..keep].trim().to_string();
                    let source = rest[idx + c.len_utf8()..]
                        .trim()
                        .trim_end_matches('.')
                        .trim()
                        .to_string();
                    return (title, source);
                }
            }
            _ => {}
        }
    }

    (rest.trim().trim_end_matches('.').trim().to_string(), String::new())
}

/// Keyword-driven source classification, first match wins.
pub fn classify_source(source: &str, raw: &str) -> SourceType {
    let source_lower = source.to_lowercase();
    let raw_lower = raw.to_lowercase();

    if JOURNAL_KEYWORDS.iter().any(|k| source_lower.contains(k)) {
        return SourceType::Journal;
    }
    if CONFERENCE_KEYWORDS.iter().any(|k| raw_lower.contains(k)) {
        return SourceType::Conference;
    }
    if VOLUME_ISSUE_RE.is_match(source) {
        return SourceType::Journal;
    }
    if EDITION_RE.is_match(raw) || BOOK_KEYWORDS.iter().any(|k| source_lower.contains(k)) {
        return SourceType::Book;
    }
    if has_url(raw) {
        return SourceType::Web;
    }
    SourceType::Other
}

fn has_url(text: &str) -> bool {
    text.split_whitespace().any(|token| {
        let token = token.trim_end_matches(['.', ',', ')', ']']);
        if token.starts_with("www.") {
            return true;
        }
        Url::parse(token).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_apa_journal_entry() {
        let r = parse_entry(
            "Brown, P., Smith, K., & Johnson, M. (2018). Advances in machine learning. Journal of AI Research, 45(2), 123-145.",
        )
        .unwrap();
        assert_eq!(r.authors, vec!["Brown, P.", "Smith, K.", "Johnson, M."]);
        assert_eq!(r.year, 2018);
        assert_eq!(r.title, "Advances in machine learning");
        assert_eq!(r.source, "Journal of AI Research, 45(2), 123-145");
        assert_eq!(r.source_type, SourceType::Journal);
        assert_eq!(r.primary_surname(), "Brown");
    }

    #[test]
    fn multi_initial_authors_and_book_edition() {
        let r = parse_entry(
            "Anderson, J. R., & Lebiere, C. (2014). The atomic components of thought. Lawrence Erlbaum Associates.",
        )
        .unwrap();
        assert_eq!(r.authors, vec!["Anderson, J. R.", "Lebiere, C."]);
        assert_eq!(r.source_type, SourceType::Book);

        let r = parse_entry(
            "Davis, R. (2019). Research methodology in social sciences (3rd ed.). Academic Press.",
        )
        .unwrap();
        assert_eq!(r.title, "Research methodology in social sciences (3rd ed.)");
        assert_eq!(r.source, "Academic Press");
        assert_eq!(r.source_type, SourceType::Book);
    }

    #[test]
    fn volume_issue_marks_a_journal() {
        let r = parse_entry(
            "Kumar, V., & Patel, S. (2021). Digital transformation in education. Technology & Learning, 25(2), 156-178.",
        )
        .unwrap();
        assert_eq!(r.source_type, SourceType::Journal);
        assert_eq!(r.authors.len(), 2);
    }

    #[test]
    fn indonesian_conjunction_and_et_al() {
        let r = parse_entry(
            "Santoso, B. dan Wijaya, A. (2020). Analisis kinerja guru. Jurnal Pendidikan Indonesia, 9(1), 10-20.",
        )
        .unwrap();
        assert_eq!(r.authors, vec!["Santoso, B.", "Wijaya, A."]);

        let r = parse_entry("Lee, H., et al. (2018). Assessment methods. Assessment in Education, 22(3).")
            .unwrap();
        assert_eq!(r.authors, vec!["Lee, H."]);
    }

    #[test]
    fn bare_year_and_conference() {
        let r = parse_entry(
            "Putra, D. 2022. Sistem rekomendasi berbasis konten. Prosiding Seminar Nasional Informatika.",
        )
        .unwrap();
        assert_eq!(r.year, 2022);
        assert_eq!(r.title, "Sistem rekomendasi berbasis konten");
        assert_eq!(r.source_type, SourceType::Conference);
    }

    #[test]
    fn web_sources() {
        let r = parse_entry(
            "World Health Organization. (2021). Global health report. Retrieved from https://www.who.int/reports",
        )
        .unwrap();
        assert_eq!(r.authors, vec!["World Health Organization."]);
        assert_eq!(r.source_type, SourceType::Web);
    }

    #[test]
    fn question_mark_titles_keep_their_mark() {
        let (title, source) = split_title("Does it work? A review. Science Letters, 3(1).");
        assert_eq!(title, "Does it work?");
        assert_eq!(source, "A review. Science Letters, 3(1)");
    }

    #[test]
    fn failures_are_classified() {
        assert_eq!(parse_entry("Halaman 45"), Err(ParseFailure::TooShort));
        assert_eq!(
            parse_entry("Anonymous. Some untitled pamphlet without a date."),
            Err(ParseFailure::MissingYear)
        );
        assert_eq!(
            parse_entry("(2019). A title with no author. Some Journal."),
            Err(ParseFailure::MissingAuthors)
        );
        assert_eq!(parse_entry("Brown, P. (2018)."), Err(ParseFailure::TooShort));
        assert_eq!(
            parse_entry("Brownington-Smythe, P. (2018)."),
            Err(ParseFailure::MissingTitle)
        );
    }
}

//! Split bibliography text into individual entries.

use std::sync::LazyLock;

use regex::Regex;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:bab|chapter)\s+[ivx\d]+\s*)?(?:daftar\s+pustaka|daftar\s+referensi|references?|referensi|bibliograph(?:y|ies)|bibliografi|pustaka|works\s+cited)\s*:?$",
    )
    .expect("valid regex")
});

static CHAPTER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:bab|chapter)\s+[ivx\d]+$").expect("valid regex"));

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[\d{1,3}\]|\(\d{1,3}\)|\d{1,3}[.)]|[•▪◦*\-–])\s+").expect("valid regex")
});

static AUTHOR_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\p{Lu}[\p{L}'’\-]+(?:\s+\p{Lu}[\p{L}'’\-]+){0,2},\s*\p{Lu}\.").expect("valid regex")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

/// Split raw bibliography text into cleaned entries.
///
/// An entry starts on a blank line, a numbering or bullet marker (`[1]`,
/// `1.`, `(1)`, `•`, `-`), or an author-start line (`Surname, I.`) once the
/// entry in progress already carries a year. Continuation lines are joined,
/// markers stripped and whitespace collapsed.
pub fn segment(text: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let line = line.trim();

        if line.is_empty() {
            flush(&mut current, &mut entries);
            continue;
        }
        if HEADER_RE.is_match(line) || CHAPTER_LINE_RE.is_match(line) {
            flush(&mut current, &mut entries);
            continue;
        }

        if let Some(marker) = MARKER_RE.find(line) {
            flush(&mut current, &mut entries);
            current.push_str(&line[marker.end()..]);
            continue;
        }

        if AUTHOR_START_RE.is_match(line) && YEAR_RE.is_match(&current) {
            flush(&mut current, &mut entries);
        }

        append_line(&mut current, line);
    }
    flush(&mut current, &mut entries);

    entries
}

/// Join a continuation line, healing words hyphenated across the break.
fn append_line(current: &mut String, line: &str) {
    if current.is_empty() {
        current.push_str(line);
        return;
    }

    let continues_word = current.ends_with('-')
        && !current.ends_with(" -")
        && line.chars().next().is_some_and(char::is_lowercase);
    if continues_word {
        current.pop();
    } else {
        current.push(' ');
    }
    current.push_str(line);
}

fn flush(current: &mut String, entries: &mut Vec<String>) {
    let entry = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !entry.is_empty() {
        entries.push(entry);
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_separate_entries_and_headers_are_skipped() {
        let text = "DAFTAR PUSTAKA\n\nBrown, P. (2018). Advances in machine\nlearning. Journal of AI Research.\n\nDavis, R. (2019). Research methodology.\nAcademic Press.";
        let entries = segment(text);
        assert_eq!(
            entries,
            vec![
                "Brown, P. (2018). Advances in machine learning. Journal of AI Research.",
                "Davis, R. (2019). Research methodology. Academic Press.",
            ]
        );
    }

    #[test]
    fn numbering_and_bullets_start_entries() {
        let text = "[1] Brown, P. (2018). Advances.\n2. Chen, X. (2020). Deep learning.\n(3) Evans, M. (2021). Data.\n• Garcia, L. (2022). Innovation.\n- Harris, D. (2020). Methods.";
        let entries = segment(text);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0], "Brown, P. (2018). Advances.");
        assert_eq!(entries[4], "Harris, D. (2020). Methods.");
    }

    #[test]
    fn author_start_splits_only_after_a_year() {
        let text = "Brown, P., Smith, K.,\nJohnson, M. (2018). Advances. Journal of AI Research.\nChen, X. (2020). Deep learning. Educational Technology Review.";
        let entries = segment(text);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].starts_with("Brown, P., Smith, K., Johnson, M. (2018)"));
        assert!(entries[1].starts_with("Chen, X."));
    }

    #[test]
    fn hyphenated_breaks_are_healed() {
        let entries = segment("Santoso, B. (2021). Penga-\nruh media sosial. Jurnal Komunikasi.");
        assert_eq!(entries, vec!["Santoso, B. (2021). Pengaruh media sosial. Jurnal Komunikasi."]);
    }

    #[test]
    fn english_header_with_chapter_prefix() {
        let entries = segment("CHAPTER VI REFERENCES:\nBrown, P. (2018). Advances.");
        assert_eq!(entries, vec!["Brown, P. (2018). Advances."]);
    }
}

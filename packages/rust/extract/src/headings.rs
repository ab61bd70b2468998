//! Heading detection over cleaned plain text.

use std::sync::LazyLock;

use regex::Regex;

use crate::Heading;

/// Section titles that commonly open a thesis chapter or subsection,
/// Indonesian and English.
const SECTION_TITLES: &[&str] = &[
    "abstrak",
    "abstract",
    "pendahuluan",
    "introduction",
    "latar belakang",
    "rumusan masalah",
    "tujuan penelitian",
    "manfaat penelitian",
    "tinjauan pustaka",
    "kajian pustaka",
    "kajian teori",
    "landasan teori",
    "kerangka pemikiran",
    "literature review",
    "metode penelitian",
    "metodologi penelitian",
    "methodology",
    "methods",
    "hasil dan pembahasan",
    "hasil penelitian",
    "pembahasan",
    "results and discussion",
    "results",
    "discussion",
    "kesimpulan dan saran",
    "kesimpulan",
    "simpulan",
    "saran",
    "penutup",
    "conclusion",
    "conclusions",
    "daftar pustaka",
    "referensi",
    "references",
    "bibliography",
    "lampiran",
    "appendix",
];

const MAX_HEADING_WORDS: usize = 12;
const MAX_SECTION_TITLE_WORDS: usize = 6;

static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:bab|chapter)\s+(?:[ivxl]+|\d{1,2})\b").expect("valid regex")
});

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}(?:\.\d{1,2})+)\.?\s+\p{Lu}[^,]*$").expect("valid regex")
});

static NUMBER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1,2}(?:\.\d{1,2})*\.?|[A-Z]\.|[IVX]+\.)\s+").expect("valid regex")
});

/// Detect headings line by line, reporting each with its byte offset.
///
/// Levels: `BAB`/`CHAPTER` lines are 1, known section titles 2, numbered
/// headings get one level per dot (`2.1` is 2, `2.1.3` is 3), and other
/// short all-caps lines 2.
pub fn detect_headings(text: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut offset = 0;

    for line in text.split('\n') {
        let trimmed = line.trim();
        if let Some(level) = heading_level(trimmed) {
            let lead = line.len() - line.trim_start().len();
            headings.push(Heading {
                text: trimmed.to_string(),
                position: offset + lead,
                level,
            });
        }
        offset += line.len() + 1;
    }

    headings
}

fn heading_level(line: &str) -> Option<u8> {
    if line.is_empty() {
        return None;
    }
    let words = line.split_whitespace().count();
    if CHAPTER_RE.is_match(line) {
        return (words <= MAX_HEADING_WORDS).then_some(1);
    }

    if words > MAX_HEADING_WORDS || line.ends_with(['.', ',', ';']) {
        return None;
    }

    if let Some(caps) = NUMBERED_RE.captures(line) {
        let depth = caps[1].matches('.').count() + 1;
        return Some(depth.min(6) as u8);
    }

    if is_section_title(line) {
        return Some(2);
    }

    if is_all_caps(line) {
        return Some(2);
    }

    None
}

fn is_section_title(line: &str) -> bool {
    let stripped = NUMBER_PREFIX_RE.replace(line, "");
    let normalized = stripped
        .trim_end_matches(':')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if normalized.split(' ').count() > MAX_SECTION_TITLE_WORDS {
        return false;
    }

    SECTION_TITLES.iter().any(|title| {
        normalized == *title
            || normalized
                .strip_prefix(title)
                .is_some_and(|rest| rest.starts_with(' '))
    })
}

/// Every cased letter is uppercase and there are enough letters to matter.
fn is_all_caps(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 4 && letters.iter().all(|c| !c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_lines_are_level_one() {
        let headings = detect_headings("BAB III\nMETODE PENELITIAN\n\nPenelitian ini kuantitatif.");
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].text, "BAB III");
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[1].text, "METODE PENELITIAN");
        assert_eq!(headings[1].position, 8);
    }

    #[test]
    fn chapter_words_in_english() {
        let headings = detect_headings("Chapter 2 Literature Review");
        assert_eq!(headings[0].level, 1);
    }

    #[test]
    fn numbered_headings_nest_by_depth() {
        let text = "2.1 Landasan Teori\n\n2.1.3 Model Regresi\n\n2.5 kg, 3.2 kg diukur";
        let headings = detect_headings(text);
        let levels: Vec<_> = headings.iter().map(|h| (h.text.as_str(), h.level)).collect();
        assert_eq!(levels, vec![("2.1 Landasan Teori", 2), ("2.1.3 Model Regresi", 3)]);
    }

    #[test]
    fn section_titles_match_case_insensitively() {
        let headings = detect_headings("Latar Belakang\n\nA. Rumusan Masalah:\n\nKesimpulan");
        assert_eq!(headings.len(), 3);
        assert!(headings.iter().all(|h| h.level == 2));
    }

    #[test]
    fn sentences_are_not_headings() {
        let text = "Hasil penelitian menunjukkan peningkatan yang signifikan.\n\nPembahasan lebih lanjut pada bagian berikut mengenai data dan analisis statistik.";
        assert!(detect_headings(text).is_empty());
    }

    #[test]
    fn positions_are_byte_offsets() {
        let text = "Pengantar singkat.\n\nDAFTAR PUSTAKA\n\nBrown, P. (2018).";
        let headings = detect_headings(text);
        assert_eq!(headings.len(), 1);
        assert_eq!(&text[headings[0].position..][..14], "DAFTAR PUSTAKA");
    }
}

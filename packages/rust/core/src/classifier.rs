//! Chapter classification from filenames, falling back to extracted headings.
//!
//! Classification is driven by a single ordered rule table. A rule is a
//! `_`-separated token pattern; it matches when its tokens appear as
//! consecutive tokens of the normalized name. Every token must be equal,
//! except that a rule marked `prefix` lets its last token match as a word
//! prefix (`reference` matches `references`, while `bab_i` never matches
//! `bab_iv`).

use serde::Serialize;
use tracing::debug;

use thesisforge_extract::ExtractedDocument;
use thesisforge_references::normalize_for_key;
use thesisforge_shared::ChapterType;

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    Filename,
    Content,
    None,
}

/// Result of classifying one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub chapter_type: ChapterType,
    pub evidence: Evidence,
    /// The rule pattern that matched, if any.
    pub rule: Option<&'static str>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            chapter_type: ChapterType::Unknown,
            evidence: Evidence::None,
            rule: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.chapter_type == ChapterType::Unknown
    }
}

struct Rule {
    pattern: &'static str,
    prefix: bool,
    chapter_type: ChapterType,
}

const fn exact(pattern: &'static str, chapter_type: ChapterType) -> Rule {
    Rule {
        pattern,
        prefix: false,
        chapter_type,
    }
}

const fn prefix(pattern: &'static str, chapter_type: ChapterType) -> Rule {
    Rule {
        pattern,
        prefix: true,
        chapter_type,
    }
}

use ChapterType::{
    Conclusion, Cover, Introduction, LiteratureReview, Methods, References, ResultsDiscussion,
};

/// Ordered rule table; the first matching rule wins.
const RULES: &[Rule] = &[
    // Cover page
    exact("sampul", Cover),
    exact("cover", Cover),
    exact("halaman_judul", Cover),
    // Numbered chapters
    exact("bab_i", Introduction),
    exact("bab_1", Introduction),
    exact("bab1", Introduction),
    exact("chapter_1", Introduction),
    exact("chapter1", Introduction),
    exact("bab_ii", LiteratureReview),
    exact("bab_2", LiteratureReview),
    exact("bab2", LiteratureReview),
    exact("chapter_2", LiteratureReview),
    exact("chapter2", LiteratureReview),
    exact("bab_iii", Methods),
    exact("bab_3", Methods),
    exact("bab3", Methods),
    exact("chapter_3", Methods),
    exact("chapter3", Methods),
    exact("bab_iv", ResultsDiscussion),
    exact("bab_4", ResultsDiscussion),
    exact("bab4", ResultsDiscussion),
    exact("chapter_4", ResultsDiscussion),
    exact("chapter4", ResultsDiscussion),
    exact("bab_v", Conclusion),
    exact("bab_5", Conclusion),
    exact("bab5", Conclusion),
    exact("chapter_5", Conclusion),
    exact("chapter5", Conclusion),
    // Explicit bibliography names
    exact("daftar_pustaka", References),
    prefix("bibliograph", References),
    prefix("reference", References),
    exact("referensi", References),
    // Section words
    exact("pendahuluan", Introduction),
    prefix("introduction", Introduction),
    exact("tinjauan", LiteratureReview),
    exact("kajian", LiteratureReview),
    exact("literature", LiteratureReview),
    prefix("metod", Methods),
    prefix("method", Methods),
    exact("hasil", ResultsDiscussion),
    prefix("result", ResultsDiscussion),
    exact("pembahasan", ResultsDiscussion),
    exact("discussion", ResultsDiscussion),
    exact("kesimpulan", Conclusion),
    exact("simpulan", Conclusion),
    prefix("conclusion", Conclusion),
    exact("penutup", Conclusion),
    // Generic bibliography words
    exact("pustaka", References),
    exact("daftar", References),
];

/// Lowercase, fold diacritics, split on anything non-alphanumeric.
fn tokenize(name: &str) -> Vec<String> {
    normalize_for_key(name)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 4 && ext.chars().all(char::is_alphanumeric) => stem,
        _ => filename,
    }
}

fn rule_matches(rule: &Rule, tokens: &[String]) -> bool {
    let pattern: Vec<&str> = rule.pattern.split('_').collect();
    if pattern.len() > tokens.len() {
        return false;
    }
    let last = pattern.len() - 1;

    tokens.windows(pattern.len()).any(|window| {
        window.iter().zip(&pattern).enumerate().all(|(i, (token, want))| {
            if i == last && rule.prefix {
                token.starts_with(want)
            } else {
                token == want
            }
        })
    })
}

fn match_tokens(tokens: &[String]) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule_matches(rule, tokens))
}

/// Classify by filename alone.
pub fn classify_filename(filename: &str) -> Option<(ChapterType, &'static str)> {
    let tokens = tokenize(strip_extension(filename));
    match_tokens(&tokens).map(|rule| (rule.chapter_type, rule.pattern))
}

/// Classify a heading line with the same table.
pub fn classify_heading(heading: &str) -> Option<(ChapterType, &'static str)> {
    match_tokens(&tokenize(heading)).map(|rule| (rule.chapter_type, rule.pattern))
}

/// Classify one document: filename first, then the first `scan_depth`
/// extracted headings, else `Unknown`.
pub fn classify(filename: &str, document: &ExtractedDocument, scan_depth: usize) -> Classification {
    if let Some((chapter_type, rule)) = classify_filename(filename) {
        debug!(filename, %chapter_type, rule, "classified by filename");
        return Classification {
            chapter_type,
            evidence: Evidence::Filename,
            rule: Some(rule),
        };
    }

    for heading in document.leading_headings(scan_depth) {
        if let Some((chapter_type, rule)) = classify_heading(&heading.text) {
            debug!(filename, heading = %heading.text, %chapter_type, rule, "classified by content");
            return Classification {
                chapter_type,
                evidence: Evidence::Content,
                rule: Some(rule),
            };
        }
    }

    debug!(filename, "no classification rule matched");
    Classification::unknown()
}

#[cfg(test)]
mod tests {
    use thesisforge_extract::Heading;

    use super::*;

    fn doc_with_headings(headings: &[&str]) -> ExtractedDocument {
        let mut text = String::new();
        let mut out = Vec::new();
        for h in headings {
            out.push(Heading {
                text: (*h).to_string(),
                position: text.len(),
                level: 1,
            });
            text.push_str(h);
            text.push_str("\n\n");
        }
        ExtractedDocument { text, headings: out }
    }

    #[test]
    fn every_filename_pattern_wins_regardless_of_content() {
        let content = doc_with_headings(&["DAFTAR PUSTAKA"]);
        let cases = [
            ("SAMPUL.pdf", Cover),
            ("cover page.docx", Cover),
            ("Halaman Judul.pdf", Cover),
            ("BAB_I_PENDAHULUAN.pdf", Introduction),
            ("bab 1.docx", Introduction),
            ("bab1.pdf", Introduction),
            ("Chapter_1.docx", Introduction),
            ("chapter1.doc", Introduction),
            ("BAB II.pdf", LiteratureReview),
            ("bab_2.pdf", LiteratureReview),
            ("chapter2.pdf", LiteratureReview),
            ("BAB_III_METODE.pdf", Methods),
            ("bab3.docx", Methods),
            ("chapter_3.pdf", Methods),
            ("BAB IV Hasil.pdf", ResultsDiscussion),
            ("bab_4.docx", ResultsDiscussion),
            ("chapter4.pdf", ResultsDiscussion),
            ("BAB_V.pdf", Conclusion),
            ("bab5.pdf", Conclusion),
            ("chapter_5.pdf", Conclusion),
            ("Daftar Pustaka.pdf", References),
            ("bibliography.docx", References),
            ("References.pdf", References),
            ("referensi.pdf", References),
            ("pendahuluan.docx", Introduction),
            ("Introduction.pdf", Introduction),
            ("tinjauan_pustaka.docx", LiteratureReview),
            ("kajian teori.pdf", LiteratureReview),
            ("literature_review.pdf", LiteratureReview),
            ("metodologi.pdf", Methods),
            ("Methods.docx", Methods),
            ("hasil_dan_pembahasan.pdf", ResultsDiscussion),
            ("results.pdf", ResultsDiscussion),
            ("pembahasan.docx", ResultsDiscussion),
            ("discussion.pdf", ResultsDiscussion),
            ("kesimpulan.pdf", Conclusion),
            ("simpulan.docx", Conclusion),
            ("conclusions.pdf", Conclusion),
            ("penutup.pdf", Conclusion),
            ("pustaka.pdf", References),
        ];

        for (filename, expected) in cases {
            let c = classify(filename, &content, 5);
            assert_eq!(c.chapter_type, expected, "{filename}");
            assert_eq!(c.evidence, Evidence::Filename, "{filename}");
        }
    }

    #[test]
    fn roman_numerals_do_not_prefix_match() {
        assert_eq!(classify_filename("bab_iv.pdf").unwrap().0, ResultsDiscussion);
        assert_eq!(classify_filename("bab_v.pdf").unwrap().0, Conclusion);
        assert_eq!(classify_filename("bab_ii.pdf").unwrap().0, LiteratureReview);
    }

    #[test]
    fn diacritics_and_separators_are_normalized() {
        assert_eq!(classify_filename("Métodologi-Penelitian.DOCX").unwrap().0, Methods);
        assert_eq!(classify_filename("BAB.III.pdf").unwrap().0, Methods);
    }

    #[test]
    fn headings_are_scanned_when_filename_is_opaque() {
        let doc = doc_with_headings(&["Universitas Negeri", "BAB III", "METODE PENELITIAN"]);
        let c = classify("scan_0042.pdf", &doc, 5);
        assert_eq!(c.chapter_type, Methods);
        assert_eq!(c.evidence, Evidence::Content);
        assert_eq!(c.rule, Some("bab_iii"));
    }

    #[test]
    fn scan_depth_limits_heading_search() {
        let doc = doc_with_headings(&["A", "B", "C", "D", "E", "KESIMPULAN"]);
        assert!(classify("file.pdf", &doc, 5).is_unknown());
        assert_eq!(classify("file.pdf", &doc, 6).chapter_type, Conclusion);
    }

    #[test]
    fn nothing_matches_is_unknown() {
        let c = classify("lampiran_kuesioner.pdf", &doc_with_headings(&["KUESIONER"]), 5);
        assert_eq!(c, Classification::unknown());
    }
}

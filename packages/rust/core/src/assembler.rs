//! Manuscript assembly.
//!
//! Turns classified documents, front matter and the validated reference
//! list into an immutable [`Manuscript`]. The only way to obtain a
//! `Manuscript` is [`assemble`], which enforces the fatal preconditions and
//! recomputes every statistic from the final content.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use thesisforge_extract::ExtractedDocument;
use thesisforge_references::render_bibliography;
use thesisforge_shared::{AssemblyError, Chapter, ChapterType, DocumentId, Language, Reference};

use crate::classifier::Classification;

/// Words kept from an extracted abstract.
const MAX_ABSTRACT_WORDS: usize = 500;
/// Lines of the cover page considered for the title.
const TITLE_SCAN_LINES: usize = 10;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One extracted document with its classification, in bundle order.
#[derive(Debug, Clone)]
pub struct ClassifiedDocument {
    pub id: DocumentId,
    pub filename: String,
    pub classification: Classification,
    pub extracted: ExtractedDocument,
}

impl ClassifiedDocument {
    pub fn chapter_type(&self) -> ChapterType {
        self.classification.chapter_type
    }
}

/// Author block supplied with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorInfo {
    pub author_name: String,
    /// Comma-separated co-author names.
    pub coauthors: String,
    pub affiliation: String,
    pub email: String,
}

impl AuthorInfo {
    /// Primary author followed by each co-author.
    pub fn names(&self) -> Vec<String> {
        std::iter::once(self.author_name.trim())
            .chain(self.coauthors.split(',').map(str::trim))
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Title, abstracts and keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: String,
    pub abstracts: BTreeMap<Language, String>,
    pub keywords: BTreeMap<Language, Vec<String>>,
}

/// A chapter type claimed by more than one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateChapter {
    pub chapter_type: ChapterType,
    pub kept: String,
    pub demoted: String,
}

/// Chapters chosen from the bundle, one per type.
#[derive(Debug, Clone, Default)]
pub struct ChapterSelection {
    pub chapters: BTreeMap<ChapterType, Chapter>,
    pub unclassified: Vec<Chapter>,
    pub duplicates: Vec<DuplicateChapter>,
}

impl ChapterSelection {
    pub fn get(&self, chapter_type: ChapterType) -> Option<&Chapter> {
        self.chapters.get(&chapter_type)
    }

    pub fn get_mut(&mut self, chapter_type: ChapterType) -> Option<&mut Chapter> {
        self.chapters.get_mut(&chapter_type)
    }

    pub fn missing_mandatory(&self) -> Vec<ChapterType> {
        ChapterType::MANDATORY
            .into_iter()
            .filter(|t| !self.chapters.contains_key(t))
            .collect()
    }
}

/// Everything [`assemble`] needs.
#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub author: AuthorInfo,
    pub front_matter: FrontMatter,
    pub selection: ChapterSelection,
    /// Deduplicated references in APA order.
    pub references: Vec<Reference>,
    pub min_references: usize,
    pub words_per_page: usize,
    /// Set when reference warnings must block assembly.
    pub policy_violation: Option<String>,
}

// ---------------------------------------------------------------------------
// Chapter selection
// ---------------------------------------------------------------------------

/// Split leading heading lines off a document's text.
///
/// A chapter line (`BAB III`) also absorbs the heading right after it when
/// that heading is not a numbered subsection.
fn split_title(doc: &ExtractedDocument) -> Option<(String, usize)> {
    let text = &doc.text;
    let start = text.len() - text.trim_start().len();
    let first = doc.headings.first().filter(|h| h.position == start)?;
    let mut title = first.text.clone();
    let mut end = first.position + first.text.len();

    if first.level == 1 {
        let rest = &text[end..];
        let next_start = end + (rest.len() - rest.trim_start().len());
        if let Some(next) = doc.headings.get(1).filter(|h| {
            h.position == next_start && !h.text.starts_with(|c: char| c.is_ascii_digit())
        }) {
            title.push(' ');
            title.push_str(&next.text);
            end = next.position + next.text.len();
        }
    }

    Some((title, end))
}

fn to_chapter(chapter_type: ChapterType, doc: &ClassifiedDocument) -> Chapter {
    match split_title(&doc.extracted) {
        Some((title, end)) => Chapter::new(chapter_type, title, doc.extracted.text[end..].trim()),
        None => {
            let title = match chapter_type {
                ChapterType::Unknown => doc.filename.clone(),
                other => other.heading().to_string(),
            };
            Chapter::new(chapter_type, title, doc.extracted.text.trim())
        }
    }
}

/// Pick one chapter per type; the first document in bundle order wins and
/// later claimants are demoted to `unclassified`.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn select_chapters(documents: &[ClassifiedDocument]) -> ChapterSelection {
    let mut selection = ChapterSelection::default();
    let mut owners: BTreeMap<ChapterType, &str> = BTreeMap::new();

    for doc in documents {
        let chapter_type = doc.chapter_type();
        if chapter_type == ChapterType::Unknown {
            selection.unclassified.push(to_chapter(ChapterType::Unknown, doc));
            continue;
        }

        if let Some(kept) = owners.get(&chapter_type) {
            debug!(%chapter_type, kept, demoted = %doc.filename, "duplicate chapter, demoting");
            selection.duplicates.push(DuplicateChapter {
                chapter_type,
                kept: (*kept).to_string(),
                demoted: doc.filename.clone(),
            });
            selection.unclassified.push(to_chapter(ChapterType::Unknown, doc));
            continue;
        }

        owners.insert(chapter_type, &doc.filename);
        selection.chapters.insert(chapter_type, to_chapter(chapter_type, doc));
    }

    debug!(
        chapters = selection.chapters.len(),
        unclassified = selection.unclassified.len(),
        "chapters selected"
    );
    selection
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

static THESIS_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:TESIS|SKRIPSI|DISERTASI|THESIS|DISSERTATION)\b").expect("valid regex")
});

static INSTITUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)universitas|university|sekolah|institut|fakultas|faculty|program studi")
        .expect("valid regex")
});

static ABSTRACT_EN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\babstract\b(.*?)(?:\bkeywords?\b|\babstrak\b|\bchapter\b|\bbab\b)")
        .expect("valid regex")
});

static ABSTRACT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\babstrak\b(.*?)(?:\bkata\s+kunci\b|\bchapter\b|\bbab\b|\blatar\b)")
        .expect("valid regex")
});

static KEYWORDS_EN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*keywords?\s*:\s*(.+)$").expect("valid regex"));

static KEYWORDS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*kata\s+kunci\s*:\s*(.+)$").expect("valid regex"));

/// Upper-case, drop thesis-type words, collapse whitespace.
pub fn clean_title(raw: &str) -> String {
    let upper = raw.to_uppercase();
    let stripped = THESIS_WORD_RE.replace_all(&upper, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First substantial non-institution line among the leading lines.
fn title_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(TITLE_SCAN_LINES)
        .find(|l| {
            l.chars().count() > 20 && l.split_whitespace().count() > 3 && !INSTITUTION_RE.is_match(l)
        })
}

fn extract_abstract(text: &str, language: Language) -> Option<String> {
    let re = match language {
        Language::English => &ABSTRACT_EN_RE,
        Language::Indonesian => &ABSTRACT_ID_RE,
    };
    let body = re.captures(text)?.get(1)?.as_str();
    let words: Vec<&str> = body.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    if words.len() > MAX_ABSTRACT_WORDS {
        Some(format!("{}...", words[..MAX_ABSTRACT_WORDS].join(" ")))
    } else {
        Some(words.join(" "))
    }
}

fn extract_keywords(text: &str, language: Language) -> Vec<String> {
    let re = match language {
        Language::English => &KEYWORDS_EN_RE,
        Language::Indonesian => &KEYWORDS_ID_RE,
    };
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split([',', ';'])
                .map(|k| k.trim().trim_end_matches('.').trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Documents searched for front matter: cover, unclassified, introduction.
fn front_matter_sources(documents: &[ClassifiedDocument]) -> Vec<&ClassifiedDocument> {
    let rank = |t: ChapterType| match t {
        ChapterType::Cover => Some(0),
        ChapterType::Unknown => Some(1),
        ChapterType::Introduction => Some(2),
        _ => None,
    };
    let mut sources: Vec<_> = documents
        .iter()
        .filter_map(|d| rank(d.chapter_type()).map(|r| (r, d)))
        .collect();
    sources.sort_by_key(|(r, d)| (*r, d.id));
    sources.into_iter().map(|(_, d)| d).collect()
}

/// Derive title, abstracts and keywords from the bundle.
#[instrument(skip_all, fields(documents = documents.len(), include_abstract))]
pub fn derive_front_matter(
    documents: &[ClassifiedDocument],
    title_override: Option<&str>,
    include_abstract: bool,
) -> FrontMatter {
    let sources = front_matter_sources(documents);

    let raw_title = title_override
        .map(str::to_string)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            sources
                .iter()
                .copied()
                .chain(documents.iter())
                .find_map(|d| title_line(&d.extracted.text))
                .map(str::to_string)
        })
        .unwrap_or_default();

    let mut front = FrontMatter {
        title: clean_title(&raw_title),
        ..FrontMatter::default()
    };

    for language in Language::ALL {
        let found = sources.iter().find_map(|d| {
            extract_abstract(&d.extracted.text, language)
                .map(|a| (a, extract_keywords(&d.extracted.text, language)))
        });
        let Some((abstract_text, keywords)) = found else {
            debug!(language = language.as_str(), "no abstract found");
            continue;
        };
        if include_abstract {
            front.abstracts.insert(language, abstract_text);
        }
        if !keywords.is_empty() {
            front.keywords.insert(language, keywords);
        }
    }

    debug!(title = %front.title, abstracts = front.abstracts.len(), "front matter derived");
    front
}

/// Closing acknowledgment sentence.
pub fn acknowledgments(affiliation: &str) -> String {
    let affiliation = affiliation.trim();
    if affiliation.is_empty() {
        "Peneliti mengucapkan terima kasih kepada semua pihak yang telah mendukung penelitian ini."
            .to_string()
    } else {
        format!(
            "Peneliti mengucapkan terima kasih kepada {affiliation} serta semua pihak yang telah mendukung penelitian ini."
        )
    }
}

// ---------------------------------------------------------------------------
// Manuscript
// ---------------------------------------------------------------------------

/// The assembled journal manuscript. Built only by [`assemble`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manuscript {
    title: String,
    authors: Vec<String>,
    affiliation: String,
    email: String,
    abstracts: BTreeMap<Language, String>,
    keywords: BTreeMap<Language, Vec<String>>,
    chapters: BTreeMap<ChapterType, Chapter>,
    unclassified: Vec<Chapter>,
    references: Vec<Reference>,
    acknowledgments: String,
    word_count: usize,
    reference_count: usize,
    estimated_pages: usize,
}

impl Manuscript {
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn authors(&self) -> &[String] {
        &self.authors
    }
    pub fn affiliation(&self) -> &str {
        &self.affiliation
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn abstracts(&self) -> &BTreeMap<Language, String> {
        &self.abstracts
    }
    pub fn abstract_text(&self, language: Language) -> Option<&str> {
        self.abstracts.get(&language).map(String::as_str)
    }
    pub fn keywords(&self, language: Language) -> &[String] {
        self.keywords.get(&language).map(Vec::as_slice).unwrap_or_default()
    }
    pub fn chapter(&self, chapter_type: ChapterType) -> Option<&Chapter> {
        self.chapters.get(&chapter_type)
    }
    /// Chapters in canonical manuscript order.
    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.values()
    }
    pub fn unclassified(&self) -> &[Chapter] {
        &self.unclassified
    }
    pub fn references(&self) -> &[Reference] {
        &self.references
    }
    pub fn acknowledgments(&self) -> &str {
        &self.acknowledgments
    }
    pub fn word_count(&self) -> usize {
        self.word_count
    }
    pub fn reference_count(&self) -> usize {
        self.reference_count
    }
    pub fn estimated_pages(&self) -> usize {
        self.estimated_pages
    }
}

/// Words across every counted chapter body plus the abstracts.
fn count_words(chapters: &BTreeMap<ChapterType, Chapter>, abstracts: &BTreeMap<Language, String>) -> usize {
    let chapter_words: usize = chapters.values().map(Chapter::word_count).sum();
    let abstract_words: usize = abstracts.values().map(|a| a.split_whitespace().count()).sum();
    chapter_words + abstract_words
}

/// Check the fatal preconditions and build the manuscript.
#[instrument(skip_all, fields(
    chapters = input.selection.chapters.len(),
    references = input.references.len(),
    min_references = input.min_references,
))]
pub fn assemble(input: AssemblyInput) -> Result<Manuscript, AssemblyError> {
    let missing = input.selection.missing_mandatory();
    if !missing.is_empty() {
        return Err(AssemblyError::MissingChapters(missing));
    }

    if input.references.len() < input.min_references {
        return Err(AssemblyError::InsufficientReferences {
            found: input.references.len(),
            required: input.min_references,
        });
    }

    if let Some(violation) = input.policy_violation {
        return Err(AssemblyError::ReferencePolicy(violation));
    }

    let AssemblyInput {
        author,
        front_matter,
        selection,
        references,
        words_per_page,
        ..
    } = input;

    let mut chapters = selection.chapters;
    if let Some(bibliography) = chapters.get_mut(&ChapterType::References) {
        bibliography.body = render_bibliography(&references).join("\n");
    }

    let word_count = count_words(&chapters, &front_matter.abstracts);
    let estimated_pages = word_count.div_ceil(words_per_page.max(1));

    let manuscript = Manuscript {
        title: front_matter.title,
        authors: author.names(),
        acknowledgments: acknowledgments(&author.affiliation),
        affiliation: author.affiliation,
        email: author.email,
        abstracts: front_matter.abstracts,
        keywords: front_matter.keywords,
        chapters,
        unclassified: selection.unclassified,
        reference_count: references.len(),
        references,
        word_count,
        estimated_pages,
    };

    info!(
        word_count = manuscript.word_count,
        reference_count = manuscript.reference_count,
        estimated_pages = manuscript.estimated_pages,
        "manuscript assembled"
    );
    Ok(manuscript)
}

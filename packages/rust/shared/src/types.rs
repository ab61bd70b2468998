//! Core domain types for ThesisForge manuscripts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ThesisForgeError};

// ---------------------------------------------------------------------------
// InvocationId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    /// Generate a new time-sortable invocation identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for InvocationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Raw input documents
// ---------------------------------------------------------------------------

/// Declared format of an uploaded chapter document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
}

impl DocumentFormat {
    /// Infer the format from a filename extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
        }
    }
}

/// One ingested file. Immutable once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct RawDocument {
    filename: String,
    bytes: Vec<u8>,
    format: DocumentFormat,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>, format: DocumentFormat) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            format,
        }
    }

    /// Build a document, inferring its format from the filename extension.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let filename = filename.into();
        let format = DocumentFormat::from_filename(&filename).ok_or_else(|| {
            ThesisForgeError::validation(format!(
                "unsupported file type: {filename} (expected .pdf, .docx or .doc)"
            ))
        })?;
        Ok(Self::new(filename, bytes, format))
    }

    /// Read a document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ThesisForgeError::validation(format!("invalid file name: {}", path.display()))
            })?
            .to_string();
        let bytes = std::fs::read(path).map_err(|e| ThesisForgeError::io(path, e))?;
        Self::from_bytes(filename, bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }
}

impl std::fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDocument")
            .field("filename", &self.filename)
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Index of a document inside its [`DocumentBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub usize);

/// The ordered, immutable set of documents owned by one invocation.
#[derive(Debug, Clone, Default)]
pub struct DocumentBundle {
    documents: Vec<RawDocument>,
}

impl DocumentBundle {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    pub fn get(&self, id: DocumentId) -> Option<&RawDocument> {
        self.documents.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, &RawDocument)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (DocumentId(i), doc))
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + use<> {
        (0..self.documents.len()).map(DocumentId)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Chapters
// ---------------------------------------------------------------------------

/// Semantic slot a thesis document is assigned to.
///
/// Declaration order is the canonical manuscript order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterType {
    Cover,
    Introduction,
    LiteratureReview,
    Methods,
    ResultsDiscussion,
    Conclusion,
    References,
    Unknown,
}

impl ChapterType {
    /// Chapters that must be present for assembly to succeed.
    pub const MANDATORY: [ChapterType; 6] = [
        ChapterType::Introduction,
        ChapterType::LiteratureReview,
        ChapterType::Methods,
        ChapterType::ResultsDiscussion,
        ChapterType::Conclusion,
        ChapterType::References,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Introduction => "introduction",
            Self::LiteratureReview => "literature_review",
            Self::Methods => "methods",
            Self::ResultsDiscussion => "results_discussion",
            Self::Conclusion => "conclusion",
            Self::References => "references",
            Self::Unknown => "unknown",
        }
    }

    /// Section heading used in the journal manuscript.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Cover => "SAMPUL",
            Self::Introduction => "PENDAHULUAN",
            Self::LiteratureReview => "TINJAUAN PUSTAKA",
            Self::Methods => "METODE PENELITIAN",
            Self::ResultsDiscussion => "HASIL DAN PEMBAHASAN",
            Self::Conclusion => "KESIMPULAN",
            Self::References => "DAFTAR PUSTAKA",
            Self::Unknown => "LAMPIRAN",
        }
    }

    pub fn is_mandatory(&self) -> bool {
        Self::MANDATORY.contains(self)
    }

    /// Position in the canonical manuscript order.
    pub fn order(&self) -> u32 {
        *self as u32
    }
}

impl std::fmt::Display for ChapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One semantic section of the source thesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub chapter_type: ChapterType,
    pub title: String,
    pub body: String,
    pub order: u32,
}

impl Chapter {
    pub fn new(chapter_type: ChapterType, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            chapter_type,
            title: title.into(),
            body: body.into(),
            order: chapter_type.order(),
        }
    }

    /// Whitespace-delimited token count of the body.
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Kind of publication a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Journal,
    Book,
    Conference,
    Web,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Book => "book",
            Self::Conference => "conference",
            Self::Web => "web",
            Self::Other => "other",
        }
    }
}

/// A parsed bibliography entry. Display fields keep their parsed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub authors: Vec<String>,
    pub year: i32,
    pub title: String,
    pub source: String,
    pub source_type: SourceType,
    /// The cleaned raw entry this reference was parsed from.
    pub raw: String,
}

const ORGANIZATION_WORDS: &[&str] = &[
    "organization", "organisation", "association", "institute", "university", "universitas",
    "ministry", "kementerian", "department", "badan", "society", "council", "agency", "bank",
];

impl Reference {
    /// Sort key of the first author.
    ///
    /// `Surname, I.` yields the text before the comma. Without a comma, a
    /// two-word personal name (`John Smith`) yields its last word; corporate
    /// and longer names (`World Health Organization`) yield their first.
    pub fn primary_surname(&self) -> &str {
        let first = self.authors.first().map(String::as_str).unwrap_or("");
        if let Some((surname, _)) = first.split_once(',') {
            return surname.trim();
        }

        let words: Vec<&str> = first.split_whitespace().collect();
        let corporate = words
            .iter()
            .any(|w| ORGANIZATION_WORDS.contains(&w.trim_end_matches('.').to_lowercase().as_str()));
        match words.as_slice() {
            [_, last] if !corporate => *last,
            [head, ..] => *head,
            [] => "",
        }
    }
}

// ---------------------------------------------------------------------------
// Settings enums
// ---------------------------------------------------------------------------

/// Abstract / keyword language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Indonesian,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Indonesian];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Indonesian => "indonesian",
        }
    }

    /// Human-readable name used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Indonesian => "Indonesian",
        }
    }
}

/// External AI provider selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Claude,
    Gpt4,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gpt4 => "gpt4",
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = ThesisForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "gpt4" | "gpt-4" | "openai" => Ok(Self::Gpt4),
            other => Err(ThesisForgeError::validation(format!(
                "unknown AI provider '{other}': expected 'claude' or 'gpt4'"
            ))),
        }
    }
}

/// Requested output artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Docx,
    Pdf,
    Markdown,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ThesisForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(ThesisForgeError::validation(format!(
                "unknown output format '{other}': expected 'docx', 'pdf' or 'markdown'"
            ))),
        }
    }
}

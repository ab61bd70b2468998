//! Error types for ThesisForge.
//!
//! Library crates use [`ThesisForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::ChapterType;

/// Top-level error type for all ThesisForge operations.
#[derive(Debug, thiserror::Error)]
pub enum ThesisForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A single document could not be turned into text.
    #[error("extraction failed for {filename}: {message}")]
    Extraction { filename: String, message: String },

    /// Every document in the bundle failed extraction.
    #[error("no usable documents: all {attempted} file(s) failed extraction")]
    NoUsableDocuments { attempted: usize },

    /// Fatal assembly precondition violated.
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// Network/HTTP error while talking to an AI provider.
    #[error("network error: {0}")]
    Network(String),

    /// AI enhancement error (provider API or response parsing).
    #[error("enhancement error: {0}")]
    Enhancement(String),

    /// Text or bibliography parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unsupported input, invalid settings, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Output artifact rendering error.
    #[error("render error: {0}")]
    Render(String),
}

/// Fatal conditions detected while assembling a manuscript.
///
/// Each variant maps to a distinct, user-visible failure reason.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    /// One or more mandatory chapters were not found in the bundle.
    #[error("missing mandatory chapter(s): {}", format_chapters(.0))]
    MissingChapters(Vec<ChapterType>),

    /// Fewer valid references than the caller's hard minimum.
    #[error("insufficient references: found {found}, minimum required is {required}")]
    InsufficientReferences { found: usize, required: usize },

    /// Reference validation warnings were escalated by a strict policy.
    #[error("reference policy violated: {0}")]
    ReferencePolicy(String),
}

fn format_chapters(chapters: &[ChapterType]) -> String {
    chapters
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ThesisForgeError>;

impl ThesisForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a whole pipeline invocation.
    pub fn is_fatal_for_invocation(&self) -> bool {
        matches!(
            self,
            Self::Assembly(_) | Self::NoUsableDocuments { .. } | Self::Io { .. } | Self::Render(_)
        )
    }
}

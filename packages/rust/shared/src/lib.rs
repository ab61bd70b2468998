//! Shared types, error model, and configuration for ThesisForge.
//!
//! This crate is the foundation depended on by all other ThesisForge crates.
//! It provides:
//! - [`ThesisForgeError`] and [`AssemblyError`]: the unified error types
//! - Domain types ([`RawDocument`], [`ChapterType`], [`Chapter`], [`Reference`])
//! - Configuration ([`AppConfig`], [`ReferencePolicyConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AiConfig, AppConfig, DefaultsConfig, ProviderConfig, ReferencePolicyConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{AssemblyError, Result, ThesisForgeError};
pub use types::{
    AiProvider, Chapter, ChapterType, DocumentBundle, DocumentFormat, DocumentId, InvocationId,
    Language, OutputFormat, RawDocument, Reference, SourceType,
};

//! Core pipeline and domain logic for ThesisForge.
//!
//! Ties extraction, classification, the reference engine, AI enhancement
//! and manuscript assembly into the single-pass [`pipeline::run`].

pub mod assembler;
pub mod classifier;
pub mod enhancement;
pub mod pipeline;
pub mod render;

//! End-to-end `build` pipeline: bundle → extract → classify → references →
//! enhance → assemble → artifacts.
//!
//! One call to [`run`] is one invocation. It owns its [`DocumentBundle`],
//! moves through [`InvocationState`] with checked transitions, and either
//! returns a fully assembled manuscript or an error; nothing partial
//! escapes. Non-fatal conditions are collected as [`Diagnostic`]s.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use thesisforge_extract::{ExtractedDocument, ExtractorRegistry};
use thesisforge_references::{ParseFailure, ReferencePolicy, ReferenceReport, ReferenceWarning};
use thesisforge_shared::{
    AiProvider, AppConfig, ChapterType, DocumentBundle, DocumentId, InvocationId, Language,
    OutputFormat, RawDocument, Result, ThesisForgeError,
};

use crate::assembler::{
    self, AssemblyInput, AuthorInfo, ClassifiedDocument, DuplicateChapter, FrontMatter, Manuscript,
};
use crate::classifier::{self, Classification, Evidence};
use crate::enhancement::prompt::summary_word_limit;
use crate::enhancement::{
    EnhancementCapability, EnhancementOutcome, Enhancer, SpanKind, UnavailableCapability,
};
use crate::render::{self, ArtifactReference};

// ---------------------------------------------------------------------------
// Request / settings
// ---------------------------------------------------------------------------

/// Everything one invocation is asked to do.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub files: Vec<RawDocument>,
    pub author_name: String,
    /// Comma-separated co-author names.
    pub coauthors: String,
    pub affiliation: String,
    pub email: String,
    pub min_references: usize,
    pub use_ai: bool,
    pub ai_provider: AiProvider,
    pub include_abstract: bool,
    pub output_format: OutputFormat,
    pub title_override: Option<String>,
    pub max_pages: Option<usize>,
}

impl PipelineRequest {
    /// A request with the documented defaults.
    pub fn new(files: Vec<RawDocument>) -> Self {
        Self {
            files,
            author_name: String::new(),
            coauthors: String::new(),
            affiliation: String::new(),
            email: String::new(),
            min_references: 15,
            use_ai: false,
            ai_provider: AiProvider::Claude,
            include_abstract: true,
            output_format: OutputFormat::Docx,
            title_override: None,
            max_pages: None,
        }
    }
}

/// Read-only settings shared by invocations.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_dir: PathBuf,
    pub words_per_page: usize,
    pub heading_scan_depth: usize,
    pub reference_policy: ReferencePolicy,
    pub ai_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.defaults.output_dir),
            words_per_page: config.defaults.words_per_page,
            heading_scan_depth: config.defaults.heading_scan_depth,
            reference_policy: ReferencePolicy::from(&config.reference_policy),
            ai_timeout: Duration::from_secs(config.ai.timeout_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum InvocationState {
    Ingested,
    Classified,
    Extracted,
    ReferencesValidated,
    Enhanced,
    EnhancementSkipped,
    Assembled,
    Failed(String),
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Assembled | Self::Failed(_))
    }

    pub fn can_transition_to(&self, next: &InvocationState) -> bool {
        use InvocationState::*;
        match (self, next) {
            (current, Failed(_)) => !current.is_terminal(),
            (Ingested, Classified)
            | (Classified, Extracted)
            | (Extracted, ReferencesValidated)
            | (ReferencesValidated, Enhanced | EnhancementSkipped)
            | (Enhanced | EnhancementSkipped, Assembled) => true,
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Ingested => "ingested",
            Self::Classified => "classified",
            Self::Extracted => "extracted",
            Self::ReferencesValidated => "references_validated",
            Self::Enhanced => "enhanced",
            Self::EnhancementSkipped => "enhancement_skipped",
            Self::Assembled => "assembled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Identity plus current state of one invocation.
#[derive(Debug)]
pub struct Invocation {
    id: InvocationId,
    state: InvocationState,
}

impl Invocation {
    pub fn new() -> Self {
        Self {
            id: InvocationId::new(),
            state: InvocationState::Ingested,
        }
    }

    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    pub fn state(&self) -> &InvocationState {
        &self.state
    }

    pub fn advance(&mut self, next: InvocationState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(ThesisForgeError::validation(format!(
                "illegal invocation transition {} -> {}",
                self.state.name(),
                next.name()
            )));
        }
        info!(invocation = %self.id, from = self.state.name(), to = next.name(), "state transition");
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, reason: String) {
        if !self.state.is_terminal() {
            warn!(invocation = %self.id, from = self.state.name(), %reason, "invocation failed");
            self.state = InvocationState::Failed(reason);
        }
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A non-fatal condition observed during an invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    ExtractionFailed { filename: String, reason: String },
    ClassificationAmbiguous { filename: String },
    ReferenceParseFailure { entry: String, reason: ParseFailure },
    ReferenceValidation { warning: ReferenceWarning },
    EnhancementDegraded { span: SpanKind, reason: String },
    DuplicateChapter(DuplicateChapter),
    PageBudgetExceeded { estimated_pages: usize, max_pages: usize },
    OutputFormatFallback { requested: OutputFormat, rendered: OutputFormat },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtractionFailed { filename, reason } => {
                write!(f, "{filename}: extraction failed ({reason}); file excluded")
            }
            Self::ClassificationAmbiguous { filename } => {
                write!(f, "{filename}: could not determine chapter type")
            }
            Self::ReferenceParseFailure { entry, reason } => write!(f, "{reason}: {entry}"),
            Self::ReferenceValidation { warning } => write!(f, "{warning}"),
            Self::EnhancementDegraded { span, reason } => {
                write!(f, "{span} kept original text: {reason}")
            }
            Self::DuplicateChapter(d) => write!(
                f,
                "{} claimed by both {} and {}; kept {}",
                d.chapter_type, d.kept, d.demoted, d.kept
            ),
            Self::PageBudgetExceeded {
                estimated_pages,
                max_pages,
            } => write!(f, "estimated {estimated_pages} pages exceeds limit of {max_pages}"),
            Self::OutputFormatFallback { requested, rendered } => write!(
                f,
                "{} output is not available, rendered {} instead",
                requested.as_str(),
                rendered.as_str()
            ),
        }
    }
}

fn report(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    warn!(%diagnostic, "non-fatal diagnostic");
    diagnostics.push(diagnostic);
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each document finishes extraction.
    fn document_extracted(&self, filename: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PipelineOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_extracted(&self, _filename: &str, _current: usize, _total: usize) {}
    fn done(&self, _outcome: &PipelineOutcome) {}
}

// ---------------------------------------------------------------------------
// Outcome / response
// ---------------------------------------------------------------------------

/// Result of a successful invocation.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub invocation_id: InvocationId,
    pub state: InvocationState,
    pub manuscript: Manuscript,
    pub artifact: ArtifactReference,
    pub diagnostics: Vec<Diagnostic>,
    pub enhancements: Vec<EnhancementOutcome>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManuscriptSummary {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub word_count: usize,
    pub reference_count: usize,
}

impl ManuscriptSummary {
    pub fn of(manuscript: &Manuscript) -> Self {
        let abstract_text = Language::ALL
            .iter()
            .find_map(|l| manuscript.abstract_text(*l))
            .unwrap_or_default()
            .to_string();
        Self {
            title: manuscript.title().to_string(),
            abstract_text,
            word_count: manuscript.word_count(),
            reference_count: manuscript.reference_count(),
        }
    }
}

/// The external response contract.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PipelineResponse {
    Success {
        success: bool,
        manuscript_summary: ManuscriptSummary,
        artifact_reference: ArtifactReference,
        diagnostics: Vec<Diagnostic>,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl PipelineResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<&Result<PipelineOutcome>> for PipelineResponse {
    fn from(result: &Result<PipelineOutcome>) -> Self {
        match result {
            Ok(outcome) => Self::Success {
                success: true,
                manuscript_summary: ManuscriptSummary::of(&outcome.manuscript),
                artifact_reference: outcome.artifact.clone(),
                diagnostics: outcome.diagnostics.clone(),
            },
            Err(e) => Self::Failure {
                success: false,
                error: e.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run one invocation.
///
/// `capability` is used only when `request.use_ai` is set; when it is
/// missing every span degrades with a recorded reason.
#[instrument(skip_all, fields(files = request.files.len(), use_ai = request.use_ai))]
pub async fn run(
    request: PipelineRequest,
    settings: &PipelineSettings,
    capability: Option<Arc<dyn EnhancementCapability>>,
    progress: &dyn ProgressReporter,
) -> Result<PipelineOutcome> {
    let mut invocation = Invocation::new();
    info!(invocation = %invocation.id(), "starting build pipeline");

    match run_stages(&mut invocation, request, settings, capability, progress).await {
        Ok(outcome) => {
            progress.done(&outcome);
            Ok(outcome)
        }
        Err(e) => {
            invocation.fail(e.to_string());
            Err(e)
        }
    }
}

async fn run_stages(
    invocation: &mut Invocation,
    request: PipelineRequest,
    settings: &PipelineSettings,
    capability: Option<Arc<dyn EnhancementCapability>>,
    progress: &dyn ProgressReporter,
) -> Result<PipelineOutcome> {
    let start = Instant::now();
    let mut diagnostics = Vec::new();

    let PipelineRequest {
        files,
        author_name,
        coauthors,
        affiliation,
        email,
        min_references,
        use_ai,
        ai_provider,
        include_abstract,
        output_format,
        title_override,
        max_pages,
    } = request;

    let bundle = Arc::new(DocumentBundle::new(files));
    if bundle.is_empty() {
        return Err(ThesisForgeError::NoUsableDocuments { attempted: 0 });
    }

    // --- Phase 1: Filename classification ---
    progress.phase("Classifying documents");
    let by_filename: Vec<Option<Classification>> = bundle
        .iter()
        .map(|(_, doc)| {
            classifier::classify_filename(doc.filename()).map(|(chapter_type, rule)| Classification {
                chapter_type,
                evidence: Evidence::Filename,
                rule: Some(rule),
            })
        })
        .collect();
    invocation.advance(InvocationState::Classified)?;

    // --- Phase 2: Extraction ---
    progress.phase("Extracting text");
    let extracted = extract_all(&bundle, progress).await;

    let mut classified = Vec::with_capacity(bundle.len());
    for ((id, doc), (result, filename_class)) in bundle.iter().zip(extracted.into_iter().zip(by_filename)) {
        let document = match result {
            Ok(document) => document,
            Err(reason) => {
                report(
                    &mut diagnostics,
                    Diagnostic::ExtractionFailed {
                        filename: doc.filename().to_string(),
                        reason,
                    },
                );
                continue;
            }
        };

        let classification = filename_class
            .unwrap_or_else(|| classifier::classify(doc.filename(), &document, settings.heading_scan_depth));
        if classification.is_unknown() {
            report(
                &mut diagnostics,
                Diagnostic::ClassificationAmbiguous {
                    filename: doc.filename().to_string(),
                },
            );
        }

        classified.push(ClassifiedDocument {
            id,
            filename: doc.filename().to_string(),
            classification,
            extracted: document,
        });
    }

    if classified.is_empty() {
        return Err(ThesisForgeError::NoUsableDocuments {
            attempted: bundle.len(),
        });
    }
    info!(extracted = classified.len(), attempted = bundle.len(), "extraction complete");
    invocation.advance(InvocationState::Extracted)?;

    // --- Phase 3: Reference engine ---
    progress.phase("Validating references");
    let mut selection = assembler::select_chapters(&classified);
    for duplicate in selection.duplicates.clone() {
        report(&mut diagnostics, Diagnostic::DuplicateChapter(duplicate));
    }

    let policy = settings.reference_policy.clone().with_min_count(min_references);
    let references = match selection.get(ChapterType::References) {
        Some(bibliography) => thesisforge_references::process(&bibliography.body, &policy),
        None => {
            debug!("no bibliography chapter, skipping reference engine");
            ReferenceReport::default()
        }
    };
    for discarded in &references.discarded {
        report(
            &mut diagnostics,
            Diagnostic::ReferenceParseFailure {
                entry: discarded.raw.clone(),
                reason: discarded.reason,
            },
        );
    }
    for warning in &references.warnings {
        report(
            &mut diagnostics,
            Diagnostic::ReferenceValidation {
                warning: warning.clone(),
            },
        );
    }
    let policy_violation = if policy.warnings_fatal {
        references.warning_summary()
    } else {
        None
    };
    invocation.advance(InvocationState::ReferencesValidated)?;

    // --- Phase 4: Enhancement ---
    let mut front_matter =
        assembler::derive_front_matter(&classified, title_override.as_deref(), include_abstract);
    let mut enhancements = Vec::new();

    if use_ai {
        progress.phase("Enhancing with AI");
        let capability = capability.unwrap_or_else(|| {
            Arc::new(UnavailableCapability::new("no AI capability configured"))
        });
        let enhancer = Enhancer::new(capability, ai_provider, settings.ai_timeout);
        enhancements = enhance(&enhancer, &mut front_matter, &mut selection).await;
        for outcome in enhancements.iter().filter(|o| o.degraded) {
            report(
                &mut diagnostics,
                Diagnostic::EnhancementDegraded {
                    span: outcome.span,
                    reason: outcome.reason.clone().unwrap_or_default(),
                },
            );
        }
        invocation.advance(InvocationState::Enhanced)?;
    } else {
        invocation.advance(InvocationState::EnhancementSkipped)?;
    }

    // --- Phase 5: Assembly ---
    progress.phase("Assembling manuscript");
    let manuscript = assembler::assemble(AssemblyInput {
        author: AuthorInfo {
            author_name,
            coauthors,
            affiliation,
            email,
        },
        front_matter,
        selection,
        references: references.references,
        min_references,
        words_per_page: settings.words_per_page,
        policy_violation,
    })?;

    if let Some(max_pages) = max_pages.filter(|max| manuscript.estimated_pages() > *max) {
        report(
            &mut diagnostics,
            Diagnostic::PageBudgetExceeded {
                estimated_pages: manuscript.estimated_pages(),
                max_pages,
            },
        );
    }

    // --- Phase 6: Artifacts ---
    progress.phase("Writing artifacts");
    let artifact = render::write_artifacts(&manuscript, &settings.output_dir, invocation.id(), output_format)?;
    if artifact.format != output_format {
        report(
            &mut diagnostics,
            Diagnostic::OutputFormatFallback {
                requested: output_format,
                rendered: artifact.format,
            },
        );
    }
    invocation.advance(InvocationState::Assembled)?;

    let elapsed = start.elapsed();
    info!(
        invocation = %invocation.id(),
        word_count = manuscript.word_count(),
        reference_count = manuscript.reference_count(),
        diagnostics = diagnostics.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "build pipeline complete"
    );

    Ok(PipelineOutcome {
        invocation_id: invocation.id().clone(),
        state: invocation.state().clone(),
        manuscript,
        artifact,
        diagnostics,
        enhancements,
        elapsed,
    })
}

/// Extract every document on the blocking pool; results come back in
/// bundle order.
async fn extract_all(
    bundle: &Arc<DocumentBundle>,
    progress: &dyn ProgressReporter,
) -> Vec<std::result::Result<ExtractedDocument, String>> {
    let registry = Arc::new(ExtractorRegistry::new());
    let total = bundle.len();

    let handles: Vec<(DocumentId, _)> = bundle
        .ids()
        .map(|id| {
            let bundle = Arc::clone(bundle);
            let registry = Arc::clone(&registry);
            let handle = tokio::task::spawn_blocking(move || bundle.get(id).map(|doc| registry.extract(doc)));
            (id, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    for (i, (id, handle)) in handles.into_iter().enumerate() {
        let filename = bundle.get(id).map(RawDocument::filename).unwrap_or_default();
        let result = match handle.await {
            Ok(Some(Ok(document))) => Ok(document),
            Ok(Some(Err(e))) => Err(e.to_string()),
            Ok(None) => Err("document missing from bundle".to_string()),
            Err(e) => Err(format!("extraction task failed: {e}")),
        };
        progress.document_extracted(filename, i + 1, total);
        results.push(result);
    }
    results
}

/// Run every span sequentially and fold successful results back in.
async fn enhance(
    enhancer: &Enhancer,
    front_matter: &mut FrontMatter,
    selection: &mut assembler::ChapterSelection,
) -> Vec<EnhancementOutcome> {
    let mut outcomes = Vec::new();

    for language in Language::ALL {
        let Some(original) = front_matter.abstracts.get(&language).cloned() else {
            continue;
        };
        let outcome = enhancer.enhance_span(SpanKind::Abstract(language), &original).await;
        if !outcome.degraded {
            front_matter.abstracts.insert(language, outcome.text.clone());
        }
        outcomes.push(outcome);
    }

    for language in Language::ALL {
        let seed = match front_matter.abstracts.get(&language) {
            Some(abstract_text) => format!("{} {abstract_text}", front_matter.title),
            None => front_matter.title.clone(),
        };
        if seed.trim().is_empty() {
            continue;
        }
        let outcome = enhancer.enhance_span(SpanKind::Keywords(language), seed.trim()).await;
        if !outcome.degraded && !outcome.keywords.is_empty() {
            front_matter.keywords.insert(language, outcome.keywords.clone());
        }
        outcomes.push(outcome);
    }

    let summarized: Vec<ChapterType> = selection
        .chapters
        .keys()
        .copied()
        .filter(|t| summary_word_limit(*t).is_some())
        .collect();
    for chapter_type in summarized {
        let Some(chapter) = selection.get_mut(chapter_type) else {
            continue;
        };
        if chapter.body.trim().is_empty() {
            continue;
        }
        let outcome = enhancer.enhance_span(SpanKind::Summary(chapter_type), &chapter.body).await;
        if !outcome.degraded {
            chapter.body = outcome.text.clone();
        }
        outcomes.push(outcome);
    }

    outcomes
}

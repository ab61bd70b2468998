//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tracing::{info, warn};

use thesisforge_core::enhancement::capability_for;
use thesisforge_core::pipeline::{
    self, PipelineOutcome, PipelineRequest, PipelineResponse, PipelineSettings, ProgressReporter,
};
use thesisforge_references::{ReferencePolicy, check_references};
use thesisforge_shared::{
    AiProvider, AppConfig, DocumentFormat, OutputFormat, RawDocument, init_config, load_config,
    resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ThesisForge: thesis chapters in, journal manuscript out.
#[derive(Parser)]
#[command(
    name = "thesisforge",
    version,
    about = "Assemble a journal-ready manuscript from thesis chapter files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ProviderArg {
    Claude,
    Gpt4,
}

impl From<ProviderArg> for AiProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Claude => AiProvider::Claude,
            ProviderArg::Gpt4 => AiProvider::Gpt4,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Docx,
    Pdf,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Docx => OutputFormat::Docx,
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a manuscript from thesis chapter files (PDF, DOCX, DOC).
    Build(BuildArgs),

    /// Parse and validate a bibliography without building a manuscript.
    CheckRefs {
        /// Bibliography file: plain text, PDF or DOCX.
        file: PathBuf,

        /// Minimum number of valid references.
        #[arg(long)]
        min_references: Option<usize>,

        /// Exit with an error when any validation warning is raised.
        #[arg(long)]
        strict: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct BuildArgs {
    /// Chapter files, in bundle order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Primary author's name.
    #[arg(long, default_value = "")]
    author: String,

    /// Comma-separated co-author names.
    #[arg(long, default_value = "")]
    coauthors: String,

    /// Author affiliation (institution).
    #[arg(long, default_value = "")]
    affiliation: String,

    /// Corresponding author email.
    #[arg(long, default_value = "")]
    email: String,

    /// Run AI enhancement of the abstract, keywords and summaries.
    #[arg(long)]
    ai: bool,

    /// AI provider (defaults to `ai.default_provider`).
    #[arg(long)]
    provider: Option<ProviderArg>,

    /// Output format (defaults to `defaults.output_format`).
    #[arg(long)]
    format: Option<FormatArg>,

    /// Hard minimum number of valid references.
    #[arg(long)]
    min_references: Option<usize>,

    /// Warn when the estimated page count exceeds this.
    #[arg(long)]
    max_pages: Option<usize>,

    /// Use this title instead of the one found on the cover.
    #[arg(long)]
    title: Option<String>,

    /// Leave abstracts and keywords out of the manuscript.
    #[arg(long)]
    no_abstract: bool,

    /// Output directory (defaults to `defaults.output_dir`).
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "thesisforge=info",
        1 => "thesisforge=debug",
        _ => "thesisforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr; stdout carries the JSON response.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => cmd_build(args).await,
        Command::CheckRefs {
            file,
            min_references,
            strict,
        } => cmd_check_refs(&file, min_references, strict).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Read one input file, enforcing the upload limit and a known extension.
fn read_document(path: &Path, max_bytes: u64) -> Result<RawDocument> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("invalid file path '{}'", path.display()))?
        .to_string();

    let format = DocumentFormat::from_filename(&filename)
        .ok_or_else(|| eyre!("unsupported file type '{filename}': expected .pdf, .docx or .doc"))?;

    let size = std::fs::metadata(path)
        .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?
        .len();
    if size > max_bytes {
        return Err(eyre!(
            "'{filename}' is {size} bytes, larger than the {max_bytes}-byte upload limit"
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    Ok(RawDocument::new(filename, bytes, format))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(args: BuildArgs) -> Result<()> {
    let config = load_config()?;

    let files = args
        .files
        .iter()
        .map(|p| read_document(p, config.defaults.max_upload_bytes))
        .collect::<Result<Vec<_>>>()?;

    let provider = args
        .provider
        .map(AiProvider::from)
        .unwrap_or(config.ai.default_provider);

    let mut request = PipelineRequest::new(files);
    request.author_name = args.author;
    request.coauthors = args.coauthors;
    request.affiliation = args.affiliation;
    request.email = args.email;
    request.min_references = args.min_references.unwrap_or(config.defaults.min_references);
    request.use_ai = args.ai;
    request.ai_provider = provider;
    request.include_abstract = !args.no_abstract;
    request.output_format = args
        .format
        .map(OutputFormat::from)
        .unwrap_or(config.defaults.output_format);
    request.title_override = args.title;
    request.max_pages = args.max_pages;

    let mut settings = PipelineSettings::from_config(&config);
    if let Some(out) = args.out {
        settings.output_dir = out;
    }

    let capability = if request.use_ai {
        let key = match resolve_api_key(&config, provider) {
            Ok(key) => Some(SecretString::from(key)),
            Err(e) => {
                warn!(error = %e, "enhancement will be skipped span by span");
                None
            }
        };
        Some(capability_for(&config.ai, provider, key))
    } else {
        None
    };

    info!(
        files = request.files.len(),
        use_ai = request.use_ai,
        provider = provider.as_str(),
        "building manuscript"
    );

    let reporter = CliProgress::new();
    let result = pipeline::run(request, &settings, capability, &reporter).await;
    reporter.spinner.finish_and_clear();

    let response = PipelineResponse::from(&result);
    println!("{}", serde_json::to_string_pretty(&response)?);

    match result {
        Ok(outcome) => {
            eprintln!(
                "Manuscript written to {} in {:.1}s",
                outcome.artifact.primary_path().display(),
                outcome.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => Err(eyre!("build failed: {e}")),
    }
}

async fn cmd_check_refs(file: &Path, min_references: Option<usize>, strict: bool) -> Result<()> {
    let config = load_config()?;

    let text = match DocumentFormat::from_filename(&file.to_string_lossy()) {
        Some(_) => {
            let doc = read_document(file, config.defaults.max_upload_bytes)?;
            thesisforge_extract::extract(&doc)
                .map_err(|e| eyre!("cannot extract '{}': {e}", file.display()))?
                .text
        }
        None => std::fs::read_to_string(file)
            .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?,
    };

    let mut policy = ReferencePolicy::from(&config.reference_policy);
    if let Some(min) = min_references {
        policy = policy.with_min_count(min);
    }
    policy.warnings_fatal |= strict;

    let check = check_references(&text, &policy);
    info!(
        total = check.total_count,
        journal = check.journal_count,
        issues = check.issues.len(),
        "bibliography checked"
    );
    println!("{}", serde_json::to_string_pretty(&check)?);

    if policy.warnings_fatal && !check.is_valid {
        return Err(eyre!("bibliography failed validation: {} issue(s)", check.issues.len()));
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_extracted(&self, filename: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Extracting [{current}/{total}] {filename}"));
    }

    fn done(&self, _outcome: &PipelineOutcome) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("thesisforge-cli-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn build_flags_parse() {
        let cli = Cli::try_parse_from([
            "thesisforge",
            "build",
            "bab_i.docx",
            "bab_ii.docx",
            "--ai",
            "--provider",
            "gpt4",
            "--format",
            "markdown",
            "--min-references",
            "20",
            "--no-abstract",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.ai && args.no_abstract);
        assert!(matches!(args.provider, Some(ProviderArg::Gpt4)));
        assert!(matches!(args.format, Some(FormatArg::Markdown)));
        assert_eq!(args.min_references, Some(20));
    }

    #[test]
    fn build_requires_files() {
        assert!(Cli::try_parse_from(["thesisforge", "build"]).is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = temp_file("notes.txt", b"hello");
        let err = read_document(&path, 1024).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let path = temp_file("bab_i.pdf", &[0u8; 64]);
        let err = read_document(&path, 16).unwrap_err();
        assert!(err.to_string().contains("upload limit"));
    }

    #[test]
    fn accepted_file_keeps_its_name() {
        let path = temp_file("Bab_I.DOCX", b"PK");
        let doc = read_document(&path, 1024).unwrap();
        assert_eq!(doc.filename(), "Bab_I.DOCX");
        assert_eq!(doc.format(), DocumentFormat::Docx);
    }
}

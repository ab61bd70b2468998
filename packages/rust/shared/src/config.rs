//! Application configuration for ThesisForge.
//!
//! User config lives at `~/.thesisforge/thesisforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThesisForgeError};
use crate::types::{AiProvider, OutputFormat};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "thesisforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".thesisforge";

// ---------------------------------------------------------------------------
// Config structs (matching thesisforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Bibliography validation thresholds.
    #[serde(default)]
    pub reference_policy: ReferencePolicyConfig,

    /// AI enhancement settings.
    #[serde(default)]
    pub ai: AiConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory rendered manuscripts are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Output artifact format.
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Hard floor on the number of references in the manuscript.
    #[serde(default = "default_min_references")]
    pub min_references: usize,

    /// Words per printed page used for the page estimate.
    #[serde(default = "default_words_per_page")]
    pub words_per_page: usize,

    /// Largest accepted input file, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// How many extracted headings the classifier inspects.
    #[serde(default = "default_heading_scan_depth")]
    pub heading_scan_depth: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_format: default_output_format(),
            min_references: default_min_references(),
            words_per_page: default_words_per_page(),
            max_upload_bytes: default_max_upload_bytes(),
            heading_scan_depth: default_heading_scan_depth(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_output_format() -> OutputFormat {
    OutputFormat::Docx
}
fn default_min_references() -> usize {
    15
}
fn default_words_per_page() -> usize {
    500
}
fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_heading_scan_depth() -> usize {
    5
}

/// `[reference_policy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePolicyConfig {
    /// Minimum number of references before a warning is raised.
    #[serde(default = "default_min_references")]
    pub min_count: usize,

    /// Minimum share of journal references (0.0..=1.0).
    #[serde(default = "default_min_journal_fraction")]
    pub min_journal_fraction: f64,

    /// Oldest acceptable reference, in years before the current year.
    #[serde(default = "default_max_age_years")]
    pub max_age_years: u32,

    /// Minimum share of entries already in `Author (Year)` form.
    #[serde(default = "default_min_apa_fraction")]
    pub min_apa_fraction: f64,

    /// Escalate validation warnings to a fatal assembly error.
    #[serde(default)]
    pub warnings_fatal: bool,
}

impl Default for ReferencePolicyConfig {
    fn default() -> Self {
        Self {
            min_count: default_min_references(),
            min_journal_fraction: default_min_journal_fraction(),
            max_age_years: default_max_age_years(),
            min_apa_fraction: default_min_apa_fraction(),
            warnings_fatal: false,
        }
    }
}

fn default_min_journal_fraction() -> f64 {
    0.80
}
fn default_max_age_years() -> u32 {
    10
}
fn default_min_apa_fraction() -> f64 {
    0.90
}

/// `[ai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider used when the request does not pick one.
    #[serde(default = "default_provider")]
    pub default_provider: AiProvider,

    /// Per-call timeout for enhancement requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Anthropic settings.
    #[serde(default = "ProviderConfig::claude")]
    pub claude: ProviderConfig,

    /// OpenAI settings.
    #[serde(default = "ProviderConfig::openai")]
    pub openai: ProviderConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            timeout_secs: default_timeout_secs(),
            claude: ProviderConfig::claude(),
            openai: ProviderConfig::openai(),
        }
    }
}

impl AiConfig {
    /// Settings block for the given provider.
    pub fn provider(&self, provider: AiProvider) -> &ProviderConfig {
        match provider {
            AiProvider::Claude => &self.claude,
            AiProvider::Gpt4 => &self.openai,
        }
    }
}

fn default_provider() -> AiProvider {
    AiProvider::Claude
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[ai.claude]` / `[ai.openai]` sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name of the env var holding the API key (never store the key itself).
    pub api_key_env: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// API base URL.
    pub api_base: String,
    /// Upper bound on response tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn claude() -> Self {
        Self {
            api_key_env: "ANTHROPIC_API_KEY".into(),
            model: "claude-sonnet-4-20250514".into(),
            api_base: "https://api.anthropic.com".into(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn openai() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".into(),
            model: "gpt-4-turbo-preview".into(),
            api_base: "https://api.openai.com/v1".into(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.thesisforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ThesisForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.thesisforge/thesisforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ThesisForgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ThesisForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ThesisForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ThesisForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ThesisForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

const MAX_REFERENCE_AGE_YEARS: u32 = 1000;

/// Reject thresholds that can never be satisfied.
fn validate_config(config: &AppConfig) -> Result<()> {
    let policy = &config.reference_policy;
    for (name, value) in [
        ("min_journal_fraction", policy.min_journal_fraction),
        ("min_apa_fraction", policy.min_apa_fraction),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ThesisForgeError::config(format!(
                "reference_policy.{name} must be between 0.0 and 1.0 (got {value})"
            )));
        }
    }
    if policy.max_age_years > MAX_REFERENCE_AGE_YEARS {
        return Err(ThesisForgeError::config(format!(
            "reference_policy.max_age_years must be at most {MAX_REFERENCE_AGE_YEARS} (got {})",
            policy.max_age_years
        )));
    }
    if config.defaults.words_per_page == 0 {
        return Err(ThesisForgeError::config("defaults.words_per_page must be positive"));
    }
    if config.ai.timeout_secs == 0 {
        return Err(ThesisForgeError::config("ai.timeout_secs must be positive"));
    }
    Ok(())
}

/// Read the API key for `provider` from its configured env var.
pub fn resolve_api_key(config: &AppConfig, provider: AiProvider) -> Result<String> {
    let var_name = &config.ai.provider(provider).api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ThesisForgeError::config(format!(
            "{} API key not found. Set the {var_name} environment variable.",
            provider.as_str()
        ))),
    }
}

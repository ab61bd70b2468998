//! Validation of a reference list against a [`ReferencePolicy`].

use std::fmt;
use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use serde::Serialize;

use thesisforge_shared::{Reference, ReferencePolicyConfig, SourceType};

/// Thresholds a bibliography is checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePolicy {
    pub min_count: usize,
    pub min_journal_fraction: f64,
    pub max_age_years: u32,
    pub min_apa_fraction: f64,
    pub warnings_fatal: bool,
    /// Year the age check is relative to; `None` means the current year.
    pub current_year: Option<i32>,
}

impl Default for ReferencePolicy {
    fn default() -> Self {
        Self::from(&ReferencePolicyConfig::default())
    }
}

impl From<&ReferencePolicyConfig> for ReferencePolicy {
    fn from(config: &ReferencePolicyConfig) -> Self {
        Self {
            min_count: config.min_count,
            min_journal_fraction: config.min_journal_fraction,
            max_age_years: config.max_age_years,
            min_apa_fraction: config.min_apa_fraction,
            warnings_fatal: config.warnings_fatal,
            current_year: None,
        }
    }
}

impl ReferencePolicy {
    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    /// The oldest publication year that still counts as recent.
    pub fn oldest_allowed_year(&self) -> i32 {
        let current = self
            .current_year
            .unwrap_or_else(|| chrono::Utc::now().year());
        let max_age = i32::try_from(self.max_age_years).unwrap_or(i32::MAX);
        current.saturating_sub(max_age)
    }
}

/// A non-fatal policy violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceWarning {
    BelowMinimumCount { found: usize, required: usize },
    JournalFractionBelow { actual: f64, required: f64 },
    Outdated { reference: String, year: i32, oldest_allowed: i32 },
    ApaComplianceBelow { actual: f64, required: f64 },
}

impl fmt::Display for ReferenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimumCount { found, required } => {
                write!(f, "only {found} references found, minimum is {required}")
            }
            Self::JournalFractionBelow { actual, required } => write!(
                f,
                "journal references are {:.1}% of the list, required {:.1}%",
                actual * 100.0,
                required * 100.0
            ),
            Self::Outdated {
                reference,
                year,
                oldest_allowed,
            } => write!(
                f,
                "{reference}: year {year} is older than {oldest_allowed}"
            ),
            Self::ApaComplianceBelow { actual, required } => write!(
                f,
                "{:.1}% of entries are in APA form, required {:.1}%",
                actual * 100.0,
                required * 100.0
            ),
        }
    }
}

static APA_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^(]+\(\d{4}[a-z]?\)").expect("valid regex"));

/// Whether a raw entry already has the `Author (Year)` shape.
pub fn is_apa_shaped(raw: &str) -> bool {
    APA_SHAPE_RE.is_match(raw.trim())
}

/// Check a deduplicated reference list against the policy.
pub fn validate(references: &[Reference], policy: &ReferencePolicy) -> Vec<ReferenceWarning> {
    let mut warnings = Vec::new();
    let total = references.len();

    if total < policy.min_count {
        warnings.push(ReferenceWarning::BelowMinimumCount {
            found: total,
            required: policy.min_count,
        });
    }

    if total == 0 {
        return warnings;
    }

    let journals = references
        .iter()
        .filter(|r| r.source_type == SourceType::Journal)
        .count();
    let journal_fraction = journals as f64 / total as f64;
    if journal_fraction < policy.min_journal_fraction {
        warnings.push(ReferenceWarning::JournalFractionBelow {
            actual: journal_fraction,
            required: policy.min_journal_fraction,
        });
    }

    let oldest_allowed = policy.oldest_allowed_year();
    for reference in references.iter().filter(|r| r.year < oldest_allowed) {
        warnings.push(ReferenceWarning::Outdated {
            reference: format!("{} ({})", reference.primary_surname(), reference.year),
            year: reference.year,
            oldest_allowed,
        });
    }

    let apa = references.iter().filter(|r| is_apa_shaped(&r.raw)).count();
    let apa_fraction = apa as f64 / total as f64;
    if apa_fraction < policy.min_apa_fraction {
        warnings.push(ReferenceWarning::ApaComplianceBelow {
            actual: apa_fraction,
            required: policy.min_apa_fraction,
        });
    }

    warnings
}

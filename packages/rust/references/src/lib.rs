//! Bibliography engine: segment, parse, deduplicate, validate and order
//! reference lists.
//!
//! The entry point is [`process`], which turns the text of a bibliography
//! chapter into a [`ReferenceReport`]. [`check_references`] wraps it with
//! the summary counts used by the standalone `check-refs` command.

mod format;
mod normalize;
mod parse;
mod policy;
mod segment;

use serde::Serialize;
use tracing::{debug, info, instrument};

use thesisforge_shared::{Reference, SourceType};

pub use format::{format_apa, render_bibliography};
pub use normalize::{IdentityKey, apa_order, deduplicate, normalize_for_key, sort_apa};
pub use parse::{ParseFailure, classify_source, parse_entry};
pub use policy::{ReferencePolicy, ReferenceWarning, is_apa_shaped, validate};
pub use segment::segment;

/// An entry that could not be parsed, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscardedEntry {
    pub raw: String,
    pub reason: ParseFailure,
}

/// Outcome of running the engine over one bibliography.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReferenceReport {
    /// Deduplicated references in APA order.
    pub references: Vec<Reference>,
    pub warnings: Vec<ReferenceWarning>,
    pub discarded: Vec<DiscardedEntry>,
}

impl ReferenceReport {
    pub fn discarded_raw(&self) -> impl Iterator<Item = &str> {
        self.discarded.iter().map(|d| d.raw.as_str())
    }

    /// Warnings joined into one line, for escalation under a strict policy.
    pub fn warning_summary(&self) -> Option<String> {
        if self.warnings.is_empty() {
            return None;
        }
        Some(
            self.warnings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn formatted(&self) -> Vec<String> {
        render_bibliography(&self.references)
    }
}

/// Segment, parse, deduplicate, validate and order a bibliography.
#[instrument(skip_all, fields(chars = text.len(), min_count = policy.min_count))]
pub fn process(text: &str, policy: &ReferencePolicy) -> ReferenceReport {
    let entries = segment(text);
    let mut parsed = Vec::with_capacity(entries.len());
    let mut discarded = Vec::new();

    for entry in entries {
        match parse_entry(&entry) {
            Ok(reference) => parsed.push(reference),
            Err(reason) => {
                debug!(%reason, entry = %entry, "discarding bibliography entry");
                discarded.push(DiscardedEntry { raw: entry, reason });
            }
        }
    }

    let before = parsed.len();
    let mut references = deduplicate(parsed);
    sort_apa(&mut references);
    let warnings = validate(&references, policy);

    info!(
        parsed = before,
        unique = references.len(),
        discarded = discarded.len(),
        warnings = warnings.len(),
        "references processed"
    );

    ReferenceReport {
        references,
        warnings,
        discarded,
    }
}

/// Summary of a standalone bibliography check.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceCheck {
    pub total_count: usize,
    pub recent_count: usize,
    pub journal_count: usize,
    pub apa_compliant: usize,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub formatted: Vec<String>,
    #[serde(skip)]
    pub report: ReferenceReport,
}

/// Run the engine and summarize the result for display.
pub fn check_references(text: &str, policy: &ReferencePolicy) -> ReferenceCheck {
    let report = process(text, policy);
    let oldest_allowed = policy.oldest_allowed_year();

    let refs = &report.references;
    let recent_count = refs.iter().filter(|r| r.year >= oldest_allowed).count();
    let journal_count = refs
        .iter()
        .filter(|r| r.source_type == SourceType::Journal)
        .count();
    let apa_compliant = refs.iter().filter(|r| is_apa_shaped(&r.raw)).count();

    let issues = report
        .warnings
        .iter()
        .map(ToString::to_string)
        .chain(
            report
                .discarded
                .iter()
                .map(|d| format!("{}: {}", d.reason, d.raw)),
        )
        .collect();

    ReferenceCheck {
        total_count: refs.len(),
        recent_count,
        journal_count,
        apa_compliant,
        is_valid: refs.len() >= policy.min_count && report.warnings.is_empty(),
        issues,
        formatted: report.formatted(),
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "DAFTAR PUSTAKA

Anderson, J. R., & Lebiere, C. (2014). The atomic components of thought. Lawrence Erlbaum Associates.

Brown, P., Smith, K., & Johnson, M. (2018). Advances in machine learning. Journal of AI Research, 45(2), 123-145.

Chen, X., Wang, Y., & Li, Z. (2020). Deep learning applications in education. Educational Technology Review, 28(3), 234-256.

brown, p., smith, k., & johnson, m. (2018). Advances in  machine learning. Journal of AI Research.

Davis, R. (2019). Research methodology in social sciences (3rd ed.). Academic Press.

Tanpa tahun. Dokumen internal lembaga.
";

    fn policy() -> ReferencePolicy {
        ReferencePolicy::default().with_current_year(2026).with_min_count(3)
    }

    #[test]
    fn process_dedups_orders_and_discards() {
        let report = process(SAMPLE, &policy());

        let surnames: Vec<_> = report
            .references
            .iter()
            .map(|r| r.primary_surname().to_string())
            .collect();
        assert_eq!(surnames, vec!["Anderson", "Brown", "Chen", "Davis"]);

        // The longer of the two Brown variants survives.
        assert!(report.references[1].raw.contains("45(2)"));

        assert_eq!(report.discarded.len(), 1);
        assert_eq!(report.discarded[0].reason, ParseFailure::MissingYear);
        assert_eq!(
            report.discarded_raw().collect::<Vec<_>>(),
            vec!["Tanpa tahun. Dokumen internal lembaga."]
        );
    }

    #[test]
    fn process_reports_policy_warnings() {
        let report = process(SAMPLE, &policy());
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            ReferenceWarning::Outdated { year: 2014, .. }
        )));
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ReferenceWarning::JournalFractionBelow { .. })));
        assert!(report.warning_summary().is_some());
    }

    #[test]
    fn check_summarizes_counts() {
        let check = check_references(SAMPLE, &policy());
        assert_eq!(check.total_count, 4);
        assert_eq!(check.recent_count, 3);
        assert_eq!(check.journal_count, 2);
        assert_eq!(check.apa_compliant, 4);
        assert!(!check.is_valid);
        assert_eq!(check.formatted.len(), 4);
        assert!(check.issues.iter().any(|i| i.contains("no publication year")));
    }

    #[test]
    fn empty_text_yields_empty_report() {
        let report = process("", &ReferencePolicy::default());
        assert!(report.references.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }
}

//! Post-extraction sanity checks
//!
//! Parsing and extraction are maximally permissive; this is the single
//! place that renders a verdict on fitness for use. Findings are advisory:
//! an issue list, never an error. Callers decide whether to block.

use serde::Serialize;

use crate::extract::MetricsSnapshot;

/// Completeness threshold, as a percentage.
const MIN_COMPLETENESS_PCT: f64 = 80.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Run every check independently; none short-circuits. `is_valid` holds
/// exactly when the issue list is empty.
pub fn validate(snapshot: &MetricsSnapshot) -> ValidationReport {
    let mut issues = Vec::new();

    if snapshot.record_count == 0 {
        issues.push("dataset contains no records".to_string());
    }

    if snapshot.date_range.is_none() {
        issues.push("no parseable creation dates in dataset".to_string());
    }

    if snapshot.total_complaints == 0 {
        issues.push("no complaints remain after campaign exclusion and deduplication".to_string());
    }

    // Completeness is approximated by the resolution rate. The proxy
    // conflates field completeness with resolution status; kept verbatim
    // for compatibility with the source system's verdicts.
    if snapshot.resolution_rate_pct < MIN_COMPLETENESS_PCT {
        issues.push(format!(
            "data completeness {:.1}% below {:.0}% threshold (approximated by resolution rate)",
            snapshot.resolution_rate_pct, MIN_COMPLETENESS_PCT
        ));
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}

// =============================================================================
// TESTS
// =============================================================================

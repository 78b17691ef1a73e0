// patternloop-config/src/docs.rs
// ============================================================================
// Module: Config Docs Generator
// Description: Markdown generator for patternloop.toml documentation.
// Purpose: Keep config docs in sync with the field defaults baked into
//          config.rs.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Generates `Docs/configuration/patternloop.toml.md` from the defaults and
//! bounds declared in [`crate::config`]. The output is deterministic and
//! intended to be checked in; [`verify_config_docs`] detects drift between
//! the generator and the committed file in CI.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default output path for generated configuration docs.
const DOCS_PATH: &str = "Docs/configuration/patternloop.toml.md";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when generating or verifying config docs.
#[derive(Debug, Error)]
pub enum DocsError {
    /// IO failure while reading or writing docs.
    #[error("docs io error: {0}")]
    Io(String),
    /// Generated docs do not match the committed file.
    #[error("docs drift: {0}")]
    Drift(String),
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Generates the configuration markdown documentation.
#[must_use]
pub fn config_docs_markdown() -> String {
    let mut out = String::new();

    out.push_str("<!--\n");
    out.push_str("Docs/configuration/patternloop.toml.md\n");
    out.push_str("This file is auto-generated; do not edit manually.\n");
    out.push_str("-->\n\n");

    out.push_str("# patternloop.toml Configuration\n\n");
    out.push_str("## Overview\n\n");
    out.push_str(
        "`patternloop.toml` configures storage, scoring, clustering, the outlier \
         crawler, and the real-time coaching session loop. All inputs are validated \
         and fail closed on errors.\n\n",
    );

    render_section(
        &mut out,
        "storage",
        "SQLite persistence settings.",
        &[
            ("path", "string", "patternloop.db", "Path to the SQLite database file."),
            ("busy_timeout_ms", "integer", "5000", "Busy timeout in milliseconds."),
            ("journal_mode", "string", "wal", "`wal` or `delete`."),
            ("sync_mode", "string", "full", "`full` or `normal`."),
            ("max_versions", "integer", "(unset)", "Optional cap on versions retained per entity."),
        ],
    );

    render_section(
        &mut out,
        "scoring",
        "Bayesian and free-energy scoring settings.",
        &[
            ("bayesian_prior_alpha", "float", "1.0", "Prior pseudo-count of successes."),
            ("bayesian_prior_beta", "float", "1.0", "Prior pseudo-count of failures."),
            ("free_energy_window", "integer", "200", "Rolling window size for calibration reporting."),
            (
                "min_completed_for_report",
                "integer",
                "5",
                "Minimum completed predictions before reporting real statistics.",
            ),
        ],
    );

    render_section(
        &mut out,
        "clustering",
        "Pattern-clustering settings.",
        &[
            ("similarity_threshold", "float", "0.72", "Weighted similarity above which two nodes cluster."),
            ("recency_half_life_days", "float", "14.0", "Half-life used to decay recurrence weight over time."),
        ],
    );

    render_section(
        &mut out,
        "crawler",
        "Outlier crawler settings. `[[crawler.sources]]` is a repeatable table with `name`, `base_url`, and `enabled`.",
        &[
            ("default_limit", "integer", "50", "Default page size for a crawl run."),
            ("max_limit", "integer", "5000", "Hard upper bound on a single crawl run's page size."),
            ("request_timeout_ms", "integer", "10000", "Per-request timeout in milliseconds."),
        ],
    );

    render_section(
        &mut out,
        "coaching",
        "Real-time coaching session timing settings (spec section 4.7).",
        &[
            ("min_eval_interval_ms", "integer", "1000", "Minimum time between frame evaluations."),
            ("rule_cooldown_ms", "integer", "6000", "Per-rule cooldown after an intervention fires."),
            ("outcome_window_ms", "integer", "10000", "How long an outcome stays open awaiting compliance."),
        ],
    );

    out
}

/// Writes the generated docs to the standard location.
///
/// # Errors
///
/// Returns [`DocsError`] when file output fails.
pub fn write_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown();
    fs::write(path, content.as_bytes()).map_err(|err| DocsError::Io(err.to_string()))
}

/// Verifies the on-disk docs match the generated output.
///
/// # Errors
///
/// Returns [`DocsError`] when the file cannot be read or the docs drift.
pub fn verify_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown();
    let existing = fs::read_to_string(path).map_err(|err| DocsError::Io(err.to_string()))?;
    if existing != content {
        return Err(DocsError::Drift(format!("docs mismatch: {}", path.display())));
    }
    Ok(())
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Appends one rendered `### table.name` section with a Markdown field table.
fn render_section(out: &mut String, name: &str, description: &str, fields: &[(&str, &str, &str, &str)]) {
    out.push_str("### [");
    out.push_str(name);
    out.push_str("]\n\n");
    out.push_str(description);
    out.push_str("\n\n");
    out.push_str("| Field | Type | Default | Description |\n");
    out.push_str("|---|---|---|---|\n");
    for (field, kind, default, doc) in fields {
        out.push_str("| `");
        out.push_str(field);
        out.push_str("` | ");
        out.push_str(kind);
        out.push_str(" | `");
        out.push_str(default);
        out.push_str("` | ");
        out.push_str(doc);
        out.push_str(" |\n");
    }
    out.push('\n');
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::config_docs_markdown;

    #[test]
    fn markdown_mentions_every_section() {
        let docs = config_docs_markdown();
        for section in ["storage", "scoring", "clustering", "crawler", "coaching"] {
            assert!(docs.contains(section), "docs missing section {section}");
        }
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(config_docs_markdown(), config_docs_markdown());
    }
}

// patternloop-cli/src/i18n.rs
// ============================================================================
// Module: CLI Internationalization Helpers
// Description: Provides message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings for future localization support.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The PatternLoop CLI stores user-facing strings in a small translation
//! catalog to enforce consistent messaging and to prepare for future locales.
//! All runtime output should be routed through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself to avoid panics.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries loaded into the localized message bundle.
const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "patternloop {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    (
        "output.write_failed",
        "Failed to write to {stream}: {error}",
    ),
    ("config.load_failed", "Failed to load config: {error}"),
    (
        "store.open_failed",
        "Failed to open pipeline store: {error}",
    ),
    (
        "crawler.source.unknown",
        "Unknown crawl source {source}; expected \"mock\" or a configured crawler.sources entry.",
    ),
    (
        "crawler.limit.exceeds_max",
        "Requested limit {limit} exceeds crawler.max_limit {max_limit}.",
    ),
    (
        "crawler.run.skipped",
        "run_id={run_id} skipped=true (idempotent replay) items_seen={items_seen}",
    ),
    (
        "crawler.run.completed",
        "run_id={run_id} skipped=false inserted={inserted} duplicates={duplicates}",
    ),
    (
        "ingest_csv.read_failed",
        "Failed to read CSV file at {path}: {error}",
    ),
    (
        "ingest_csv.tier_invalid",
        "Invalid outlier_tier value \"{tier}\"; expected one of S, A, B, C",
    ),
    (
        "ingest_csv.row_invalid",
        "Row {row} in {path} is invalid: {error}",
    ),
    (
        "ingest_csv.run.skipped",
        "run_id={run_id} skipped=true (idempotent replay) rows_seen={rows_seen}",
    ),
    (
        "ingest_csv.run.completed",
        "run_id={run_id} skipped=false upserted={upserted}",
    ),
    (
        "ingest_pattern_library.read_failed",
        "Failed to read pattern library input at {path}: {error}",
    ),
    (
        "ingest_pattern_library.parse_failed",
        "Failed to parse pattern library JSON at {path}: {error}",
    ),
    (
        "ingest_pattern_library.dry_run",
        "dry-run: would ingest pattern_id={pattern_id} cluster_id={cluster_id} revision={revision}",
    ),
    (
        "ingest_pattern_library.ok",
        "ingested pattern_id={pattern_id} revision={revision}",
    ),
    (
        "audit_contracts.rule_key_mismatch",
        "RuleKeyMismatch: rule {rule_id} references unknown feature key \"{key}\"",
    ),
    (
        "audit_contracts.ok",
        "checked {rule_count} rule(s) against {key_count} known feature key(s); no issues found",
    ),
    (
        "audit_contracts.issues_found",
        "found {issue_count} issue(s) across {rule_count} rule(s)",
    ),
    (
        "audit_state.idempotency_violation",
        "idempotency violation: run_type={run_type} idempotency_key={idempotency_key} has more than one completed run",
    ),
    (
        "audit_state.illegal_transition_history",
        "illegal transition history for evidence_event_id={event_id}: {detail}",
    ),
    (
        "audit_state.promoted_without_node",
        "outlier_item_id={outlier_item_id} has status=promoted but no promoted_to_node_id",
    ),
    (
        "audit_state.ok",
        "checked {run_count} run(s) and {event_count} evidence event(s); no issues found",
    ),
    (
        "audit_state.issues_found",
        "found {issue_count} issue(s) across {run_count} run(s) and {event_count} evidence event(s)",
    ),
    (
        "track_depth.no_baseline",
        "parent_id={parent_id} has no prior depth baseline; recorded genealogy_depth={depth} as the new baseline",
    ),
    (
        "track_depth.report",
        "parent_id={parent_id} status={status} genealogy_depth={depth} depth_increased={depth_increased} latest_confidence={confidence}",
    ),
    (
        "track_depth.no_parents",
        "no pattern nodes found to report on",
    ),
    (
        "track_depth.node_not_found",
        "parent_id={parent_id} has no matching pattern node",
    ),
    (
        "time.duration_overflow",
        "run duration overflowed while computing duration_ms",
    ),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the English fallback catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the static English catalog used by the CLI.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a localized message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
///
/// # Returns
///
/// A localized [`String`] with placeholders substituted.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

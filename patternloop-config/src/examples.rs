// patternloop-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical examples for PatternLoop configuration. Output is deterministic
//! and kept in sync with [`crate::config`] and [`crate::docs`].

/// Returns a canonical example `patternloop.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[storage]
path = "patternloop.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"
max_versions = 1000

[scoring]
bayesian_prior_alpha = 1.0
bayesian_prior_beta = 1.0
free_energy_window = 200
min_completed_for_report = 5

[clustering]
similarity_threshold = 0.72
recency_half_life_days = 14.0

[crawler]
default_limit = 50
max_limit = 5000
request_timeout_ms = 10000

[[crawler.sources]]
name = "tiktok_creative_center"
base_url = "https://ads.tiktok.com/business/creativecenter"
enabled = true

[[crawler.sources]]
name = "reel_trends"
base_url = "https://example.com/reel-trends"
enabled = false

[coaching]
min_eval_interval_ms = 1000
rule_cooldown_ms = 6000
outcome_window_ms = 10000
"#,
    )
}

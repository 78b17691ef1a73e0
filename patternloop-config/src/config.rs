// patternloop-config/src/config.rs
// ============================================================================
// Module: PatternLoop Configuration Model
// Description: Canonical `patternloop.toml` schema, fail-closed loading, and
//              validation for storage, scoring, clustering, crawler, and
//              coaching session settings.
// Purpose: Single source of truth for deployment-tunable constants that the
//          rest of the workspace treats as compiled-in defaults.
// Dependencies: patternloop-core, patternloop-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! [`PatternLoopConfig`] is loaded once at process start via [`PatternLoopConfig::load`]
//! and validated before any subsystem touches it. Loading is fail-closed:
//! an oversized file, a non-UTF-8 file, a TOML syntax error, or a value
//! outside its documented bounds all produce a [`ConfigError`] rather than a
//! partially-applied default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use patternloop_core::scoring::free_energy::MAX_RECORDS;
use patternloop_core::scoring::free_energy::MIN_COMPLETED_FOR_REPORT;
use patternloop_store_sqlite::SqliteStoreConfig;
use patternloop_store_sqlite::SqliteStoreMode;
use patternloop_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration file name, resolved relative to the current
/// working directory when no explicit path is given.
pub const DEFAULT_CONFIG_NAME: &str = "patternloop.toml";
/// Environment variable that overrides the default config path.
pub const CONFIG_ENV_VAR: &str = "PATTERNLOOP_CONFIG";
/// Hard cap on the bytes read from a config file before parsing.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum length of a full path, in bytes.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Default busy timeout handed to the SQLite store.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default Bayesian prior pseudo-count of successes.
const DEFAULT_BAYESIAN_ALPHA: f64 = 1.0;
/// Default Bayesian prior pseudo-count of failures.
const DEFAULT_BAYESIAN_BETA: f64 = 1.0;
/// Default rolling window size for free-energy calibration reporting.
const DEFAULT_FREE_ENERGY_WINDOW: usize = 200;
/// Default minimum completed predictions required before reporting.
const DEFAULT_MIN_COMPLETED_FOR_REPORT: usize = MIN_COMPLETED_FOR_REPORT;

/// Default similarity threshold above which two pattern nodes cluster.
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.72;
/// Default half-life, in days, used to decay recurrence weight over time.
const DEFAULT_RECENCY_HALF_LIFE_DAYS: f64 = 14.0;

/// Maximum number of configured crawler sources.
const MAX_SOURCES: usize = 64;
/// Maximum length of a source name.
const MAX_SOURCE_NAME_LENGTH: usize = 128;
/// Maximum length of a source base URL.
const MAX_BASE_URL_LENGTH: usize = 2048;
/// Default outlier-crawl page size.
const DEFAULT_CRAWL_LIMIT: u32 = 50;
/// Hard upper bound on a single crawl request's page size.
const MAX_CRAWL_LIMIT: u32 = 5_000;
/// Default per-request timeout for crawler HTTP calls.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Hard upper bound on the crawler request timeout.
const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;

/// Default frame-evaluation interval for a coaching session, in
/// milliseconds. Matches `patternloop_coach::session::DEFAULT_EVAL_INTERVAL`.
const DEFAULT_EVAL_INTERVAL_MS: u64 = 1_000;
/// Default per-rule cooldown, in milliseconds. Matches
/// `patternloop_coach::session::DEFAULT_RULE_COOLDOWN`.
const DEFAULT_RULE_COOLDOWN_MS: u64 = 6_000;
/// Default outcome observation window, in milliseconds. Matches
/// `patternloop_coach::session::DEFAULT_OUTCOME_WINDOW`.
const DEFAULT_OUTCOME_WINDOW_MS: u64 = 10_000;

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Canonical `patternloop.toml` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternLoopConfig {
    /// SQLite persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Bayesian/free-energy scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Pattern-clustering settings.
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// Outlier crawler settings.
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Real-time coaching session timing settings.
    #[serde(default)]
    pub coaching: CoachingConfig,
    /// Modification time of the file this config was loaded from, if any.
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl Default for PatternLoopConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            scoring: ScoringConfig::default(),
            clustering: ClusteringConfig::default(),
            crawler: CrawlerConfig::default(),
            coaching: CoachingConfig::default(),
            source_modified_at: None,
        }
    }
}

impl PatternLoopConfig {
    /// Loads and validates configuration from `path`, or from the
    /// environment/default location when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be located, exceeds
    /// [`MAX_CONFIG_FILE_SIZE`], is not valid UTF-8, fails to parse as TOML,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let metadata = fs::metadata(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "config file {} exceeds max size of {MAX_CONFIG_FILE_SIZE} bytes",
                resolved.display()
            )));
        }
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|err| ConfigError::Invalid(format!("config file is not valid UTF-8: {err}")))?;
        let mut config: Self = toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.source_modified_at = metadata.modified().ok();
        config.validate()?;
        Ok(config)
    }

    /// Validates every sub-config, in field order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first failing sub-config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.scoring.validate()?;
        self.clustering.validate()?;
        self.crawler.validate()?;
        self.coaching.validate()?;
        Ok(())
    }

    /// Builds the `SqliteStoreConfig` the persistence crate expects.
    #[must_use]
    pub fn sqlite_store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.storage.path.clone(),
            busy_timeout_ms: self.storage.busy_timeout_ms,
            journal_mode: self.storage.journal_mode,
            sync_mode: self.storage.sync_mode,
            max_versions: self.storage.max_versions,
        }
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// SQLite persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// SQLite sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional cap on versions retained per entity record.
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }
}

impl StorageConfig {
    /// Validates the storage path and timeout bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the path or timeout is
    /// out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("storage.busy_timeout_ms must be nonzero".to_string()));
        }
        if let Some(max_versions) = self.max_versions
            && max_versions == 0
        {
            return Err(ConfigError::Invalid("storage.max_versions must be nonzero when set".to_string()));
        }
        Ok(())
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("patternloop.db")
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Bayesian and free-energy scoring settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Prior pseudo-count of successes fed to the Bayesian updater.
    #[serde(default = "default_bayesian_alpha")]
    pub bayesian_prior_alpha: f64,
    /// Prior pseudo-count of failures fed to the Bayesian updater.
    #[serde(default = "default_bayesian_beta")]
    pub bayesian_prior_beta: f64,
    /// Rolling window size for free-energy calibration reporting.
    #[serde(default = "default_free_energy_window")]
    pub free_energy_window: usize,
    /// Minimum completed predictions required before reporting real stats.
    #[serde(default = "default_min_completed_for_report")]
    pub min_completed_for_report: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bayesian_prior_alpha: DEFAULT_BAYESIAN_ALPHA,
            bayesian_prior_beta: DEFAULT_BAYESIAN_BETA,
            free_energy_window: DEFAULT_FREE_ENERGY_WINDOW,
            min_completed_for_report: DEFAULT_MIN_COMPLETED_FOR_REPORT,
        }
    }
}

impl ScoringConfig {
    /// Validates Bayesian priors and free-energy window bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a prior is non-positive or the
    /// window exceeds [`MAX_RECORDS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bayesian_prior_alpha <= 0.0 || self.bayesian_prior_beta <= 0.0 {
            return Err(ConfigError::Invalid("scoring.bayesian priors must be positive".to_string()));
        }
        if self.free_energy_window == 0 || self.free_energy_window > MAX_RECORDS {
            return Err(ConfigError::Invalid(format!(
                "scoring.free_energy_window must be in 1..={MAX_RECORDS}"
            )));
        }
        if self.min_completed_for_report == 0 || self.min_completed_for_report > self.free_energy_window {
            return Err(ConfigError::Invalid(
                "scoring.min_completed_for_report must be nonzero and at most free_energy_window".to_string(),
            ));
        }
        Ok(())
    }
}

const fn default_bayesian_alpha() -> f64 {
    DEFAULT_BAYESIAN_ALPHA
}

const fn default_bayesian_beta() -> f64 {
    DEFAULT_BAYESIAN_BETA
}

const fn default_free_energy_window() -> usize {
    DEFAULT_FREE_ENERGY_WINDOW
}

const fn default_min_completed_for_report() -> usize {
    DEFAULT_MIN_COMPLETED_FOR_REPORT
}

// ============================================================================
// SECTION: Clustering
// ============================================================================

/// Pattern-clustering settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Weighted-similarity threshold above which two nodes join a cluster.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Half-life, in days, used to decay recurrence weight over time.
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            recency_half_life_days: DEFAULT_RECENCY_HALF_LIFE_DAYS,
        }
    }
}

impl ClusteringConfig {
    /// Validates the similarity threshold and decay half-life.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when either value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid("clustering.similarity_threshold must be in 0.0..=1.0".to_string()));
        }
        if self.recency_half_life_days <= 0.0 {
            return Err(ConfigError::Invalid("clustering.recency_half_life_days must be positive".to_string()));
        }
        Ok(())
    }
}

const fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

const fn default_recency_half_life_days() -> f64 {
    DEFAULT_RECENCY_HALF_LIFE_DAYS
}

// ============================================================================
// SECTION: Crawler
// ============================================================================

/// A single configured outlier source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierSourceConfig {
    /// Source name, used as the `source_name` on ingested outliers.
    pub name: String,
    /// Base URL the crawler polls for this source.
    pub base_url: String,
    /// Whether this source is currently enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

/// Outlier crawler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Configured outlier sources.
    #[serde(default)]
    pub sources: Vec<OutlierSourceConfig>,
    /// Default page size for a crawl run.
    #[serde(default = "default_crawl_limit")]
    pub default_limit: u32,
    /// Hard upper bound on a single crawl run's page size.
    #[serde(default = "default_max_crawl_limit")]
    pub max_limit: u32,
    /// Per-request timeout, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            default_limit: DEFAULT_CRAWL_LIMIT,
            max_limit: MAX_CRAWL_LIMIT,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl CrawlerConfig {
    /// Validates source list bounds, limit ordering, and timeout bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first out-of-bounds field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.len() > MAX_SOURCES {
            return Err(ConfigError::Invalid(format!("crawler.sources exceeds max of {MAX_SOURCES} entries")));
        }
        for source in &self.sources {
            validate_path_string("crawler.sources[].name", &source.name)?;
            if source.name.is_empty() || source.name.len() > MAX_SOURCE_NAME_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "crawler source name must be 1..={MAX_SOURCE_NAME_LENGTH} bytes"
                )));
            }
            if source.base_url.is_empty() || source.base_url.len() > MAX_BASE_URL_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "crawler source base_url must be 1..={MAX_BASE_URL_LENGTH} bytes"
                )));
            }
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid("crawler.default_limit must be nonzero and at most max_limit".to_string()));
        }
        if self.max_limit > MAX_CRAWL_LIMIT {
            return Err(ConfigError::Invalid(format!("crawler.max_limit exceeds hard cap of {MAX_CRAWL_LIMIT}")));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "crawler.request_timeout_ms must be in 1..={MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

const fn default_crawl_limit() -> u32 {
    DEFAULT_CRAWL_LIMIT
}

const fn default_max_crawl_limit() -> u32 {
    MAX_CRAWL_LIMIT
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

// ============================================================================
// SECTION: Coaching
// ============================================================================

/// Real-time coaching session timing settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoachingConfig {
    /// Minimum time between frame evaluations, in milliseconds.
    #[serde(default = "default_eval_interval_ms")]
    pub min_eval_interval_ms: u64,
    /// Per-rule cooldown after an intervention fires, in milliseconds.
    #[serde(default = "default_rule_cooldown_ms")]
    pub rule_cooldown_ms: u64,
    /// How long an outcome stays open waiting for a compliance verdict.
    #[serde(default = "default_outcome_window_ms")]
    pub outcome_window_ms: u64,
}

impl Default for CoachingConfig {
    fn default() -> Self {
        Self {
            min_eval_interval_ms: DEFAULT_EVAL_INTERVAL_MS,
            rule_cooldown_ms: DEFAULT_RULE_COOLDOWN_MS,
            outcome_window_ms: DEFAULT_OUTCOME_WINDOW_MS,
        }
    }
}

impl CoachingConfig {
    /// Validates that the three durations are nonzero and sensibly ordered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a duration is zero or the
    /// cooldown/window are shorter than the eval interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_eval_interval_ms == 0 || self.rule_cooldown_ms == 0 || self.outcome_window_ms == 0 {
            return Err(ConfigError::Invalid("coaching durations must all be nonzero".to_string()));
        }
        if self.rule_cooldown_ms < self.min_eval_interval_ms {
            return Err(ConfigError::Invalid(
                "coaching.rule_cooldown_ms must be at least min_eval_interval_ms".to_string(),
            ));
        }
        if self.outcome_window_ms < self.min_eval_interval_ms {
            return Err(ConfigError::Invalid(
                "coaching.outcome_window_ms must be at least min_eval_interval_ms".to_string(),
            ));
        }
        Ok(())
    }
}

const fn default_eval_interval_ms() -> u64 {
    DEFAULT_EVAL_INTERVAL_MS
}

const fn default_rule_cooldown_ms() -> u64 {
    DEFAULT_RULE_COOLDOWN_MS
}

const fn default_outcome_window_ms() -> u64 {
    DEFAULT_OUTCOME_WINDOW_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem I/O failure.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parse failure.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

/// Resolves the config path: explicit argument, then [`CONFIG_ENV_VAR`],
/// then [`DEFAULT_CONFIG_NAME`] in the current directory.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the resolved path is too long.
fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let candidate = if let Some(path) = explicit {
        path.to_path_buf()
    } else if let Ok(from_env) = env::var(CONFIG_ENV_VAR) {
        PathBuf::from(from_env)
    } else {
        PathBuf::from(DEFAULT_CONFIG_NAME)
    };
    validate_path(&candidate)?;
    Ok(candidate)
}

/// Validates total length and per-component length of a filesystem path.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the path or any of its components
/// exceeds the configured length bounds.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let rendered = path.to_string_lossy();
    if rendered.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("path exceeds max length of {MAX_TOTAL_PATH_LENGTH} bytes")));
    }
    for component in path.components() {
        let text = component.as_os_str().to_string_lossy();
        if text.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "path component exceeds max length of {MAX_PATH_COMPONENT_LENGTH} bytes"
            )));
        }
    }
    Ok(())
}

/// Validates an arbitrary path-shaped config field, naming the offending
/// field in the error message.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when `value` exceeds the total or
/// per-component length bounds.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length of {MAX_TOTAL_PATH_LENGTH} bytes")));
    }
    for component in value.split(['/', '\\']) {
        if component.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "{field} component exceeds max length of {MAX_PATH_COMPONENT_LENGTH} bytes"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )]

    use std::fs;

    use tempfile::tempdir;

    use super::ConfigError;
    use super::PatternLoopConfig;
    use crate::examples::config_toml_example;

    #[test]
    fn default_config_validates() {
        let config = PatternLoopConfig::default();
        config.validate().expect("default config must validate");
    }

    #[test]
    fn canonical_example_parses_and_validates() {
        let config: PatternLoopConfig = toml::from_str(&config_toml_example()).expect("example must parse");
        config.validate().expect("example must validate");
    }

    #[test]
    fn load_reads_and_validates_a_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("patternloop.toml");
        fs::write(&path, config_toml_example()).expect("write example");
        let config = PatternLoopConfig::load(Some(&path)).expect("load must succeed");
        assert_eq!(config.crawler.sources.len(), 2);
    }

    #[test]
    fn load_rejects_an_oversized_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("patternloop.toml");
        let oversized = "# padding\n".repeat(200_000);
        fs::write(&path, oversized).expect("write oversized");
        let err = PatternLoopConfig::load(Some(&path)).expect_err("oversized file must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn similarity_threshold_out_of_range_fails_validation() {
        let mut config = PatternLoopConfig::default();
        config.clustering.similarity_threshold = 1.5;
        let err = config.validate().expect_err("out of range threshold must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn cooldown_shorter_than_eval_interval_fails_validation() {
        let mut config = PatternLoopConfig::default();
        config.coaching.rule_cooldown_ms = 10;
        config.coaching.min_eval_interval_ms = 1_000;
        let err = config.validate().expect_err("short cooldown must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

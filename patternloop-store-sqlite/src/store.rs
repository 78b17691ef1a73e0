// patternloop-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Pipeline Store
// Description: Durable SQLite-backed persistence for the Run/Artifact
//              engine, outlier intake, the Evidence Loop, and the long
//              tail of genealogy/coaching/pattern-library records.
// Purpose: Give every pipeline stage a relational, WAL-mode, content-hash
//          verified store with no assumption beyond transactional writes
//          and foreign keys.
// Dependencies: patternloop_core, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! `Run`, `Artifact`, `OutlierItem`, and `EvidenceEvent`/`EvidenceSnapshot`/
//! `DecisionObject` get first-class relational tables because every
//! external interface operation named against them (idempotent run
//! acquisition, outlier upsert by `(platform, external_id)`, Evidence Loop
//! queries by `parent_node_id`) needs indexed columns to query against.
//! Everything else in the data model — `PatternNode`, `PatternCluster`,
//! `PatternRecurrenceLink`, `PatternLibrary`, `DirectorPack`,
//! `CoachingSession`, and the Bayesian/Free-Energy supplemental state — is
//! durability-only: nothing in the external interfaces queries them by
//! anything but their own id, so they share one generic, content-hash
//! verified, append-only versioned table keyed by `(entity_kind,
//! entity_id)`.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use patternloop_core::Artifact;
use patternloop_core::DecisionObject;
use patternloop_core::EvidenceEvent;
use patternloop_core::EvidenceSnapshot;
use patternloop_core::EvidenceStatus;
use patternloop_core::OutlierItemId;
use patternloop_core::PatternNodeId;
use patternloop_core::Run;
use patternloop_core::RunId;
use patternloop_core::RunType;
use patternloop_core::core::hashing::DEFAULT_HASH_ALGORITHM;
use patternloop_core::core::hashing::HashAlgorithm;
use patternloop_core::core::hashing::canonical_json_bytes;
use patternloop_core::core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::entities::OutlierItem;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized payload size accepted for any stored record.
pub const MAX_PAYLOAD_BYTES: usize = 8 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` pipeline store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional maximum versions kept per generic entity record.
    #[serde(default)]
    pub max_versions: Option<u64>,
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store payload exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
    /// No record exists for the requested key.
    #[error("sqlite store record not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Db(err.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed pipeline store with WAL support.
#[derive(Clone)]
pub struct PatternLoopStore {
    /// Store configuration this connection was opened with.
    config: SqliteStoreConfig,
    /// Shared connection handle; `SQLite`'s own locking still applies, the
    /// mutex only serializes access from multiple threads in-process.
    connection: Arc<Mutex<Connection>>,
}

impl PatternLoopStore {
    /// Opens a `SQLite`-backed pipeline store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { config, connection: Arc::new(Mutex::new(connection)) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    // ========================================================================
    // SECTION: Run / Artifact
    // ========================================================================

    /// Inserts a brand-new run, or updates an existing run's mutable
    /// fields (status, timestamps, result) if it already exists.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn save_run(&self, run: &Run) -> Result<(), SqliteStoreError> {
        let inputs_json = to_json_string(&run.inputs_json)?;
        let result_summary = run.result_summary.as_ref().map(to_json_string).transpose()?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO runs (
                    run_id, run_type, status, idempotency_key, inputs_json,
                    result_summary, error_message, error_traceback,
                    started_at, ended_at, duration_ms, parent_run_id, triggered_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(run_id) DO UPDATE SET
                    status = excluded.status,
                    result_summary = excluded.result_summary,
                    error_message = excluded.error_message,
                    error_traceback = excluded.error_traceback,
                    started_at = excluded.started_at,
                    ended_at = excluded.ended_at,
                    duration_ms = excluded.duration_ms",
                params![
                    run.run_id.as_str(),
                    run_type_label(run.run_type),
                    run_status_label(run.status),
                    run.idempotency_key,
                    inputs_json,
                    result_summary,
                    run.error_message,
                    run.error_traceback,
                    run.started_at.map(offset_to_millis),
                    run.ended_at.map(offset_to_millis),
                    run.duration_ms,
                    run.parent_run_id.as_ref().map(patternloop_core::RunId::as_str),
                    run.triggered_by,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Finds the run currently `running` (if any) for `(run_type,
    /// idempotency_key)`, backing idempotent acquisition.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn find_running(
        &self,
        run_type: RunType,
        idempotency_key: &str,
    ) -> Result<Option<Run>, SqliteStoreError> {
        self.find_run_by_status(run_type, idempotency_key, "running")
    }

    /// Finds the completed run (if any) for `(run_type, idempotency_key)`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn find_completed(
        &self,
        run_type: RunType,
        idempotency_key: &str,
    ) -> Result<Option<Run>, SqliteStoreError> {
        self.find_run_by_status(run_type, idempotency_key, "completed")
    }

    fn find_run_by_status(
        &self,
        run_type: RunType,
        idempotency_key: &str,
        status: &str,
    ) -> Result<Option<Run>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT run_id, run_type, status, idempotency_key, inputs_json,
                        result_summary, error_message, error_traceback,
                        started_at, ended_at, duration_ms, parent_run_id, triggered_by
                 FROM runs WHERE run_type = ?1 AND idempotency_key = ?2 AND status = ?3",
                params![run_type_label(run_type), idempotency_key, status],
                map_run_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.transpose()
    }

    /// Loads a run by id.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn load_run(&self, run_id: &RunId) -> Result<Option<Run>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT run_id, run_type, status, idempotency_key, inputs_json,
                        result_summary, error_message, error_traceback,
                        started_at, ended_at, duration_ms, parent_run_id, triggered_by
                 FROM runs WHERE run_id = ?1",
                params![run_id.as_str()],
                map_run_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.transpose()
    }

    /// Lists runs, most recently started first, capped at `limit`. Used by
    /// `audit_pipeline_state` to scan for idempotency-invariant violations
    /// across `(run_type, idempotency_key)` pairs.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn list_runs(&self, limit: u32) -> Result<Vec<Run>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT run_id, run_type, status, idempotency_key, inputs_json,
                        result_summary, error_message, error_traceback,
                        started_at, ended_at, duration_ms, parent_run_id, triggered_by
                 FROM runs ORDER BY rowid DESC LIMIT ?1",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![i64::from(limit)], map_run_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.map(|row| row.map_err(|err| SqliteStoreError::Db(err.to_string())).and_then(|inner| inner))
            .collect::<Result<Vec<_>, _>>()
    }

    /// Persists a content-addressed artifact. Artifacts are immutable once
    /// written; re-inserting the same `artifact_id` is rejected.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn save_artifact(&self, artifact: &Artifact) -> Result<(), SqliteStoreError> {
        let data_json = artifact.data_json.as_ref().map(to_json_string).transpose()?;
        let size_bytes = artifact
            .size_bytes
            .map(i64::try_from)
            .transpose()
            .map_err(|_| SqliteStoreError::Invalid("size_bytes overflow".to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO artifacts (
                    artifact_id, run_id, artifact_type, name, storage_type,
                    storage_path, schema_version, content_hash, data_json,
                    size_bytes, mime_type
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    artifact.artifact_id.as_str(),
                    artifact.run_id.as_str(),
                    artifact.artifact_type,
                    artifact.name,
                    storage_type_label(artifact.storage_type),
                    artifact.storage_path,
                    artifact.schema_version,
                    artifact.content_hash,
                    data_json,
                    size_bytes,
                    artifact.mime_type,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Lists every artifact owned by `run_id`, insertion order.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn list_artifacts(&self, run_id: &RunId) -> Result<Vec<Artifact>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT artifact_id, run_id, artifact_type, name, storage_type,
                        storage_path, schema_version, content_hash, data_json,
                        size_bytes, mime_type
                 FROM artifacts WHERE run_id = ?1 ORDER BY rowid",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![run_id.as_str()], map_artifact_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.map(|row| row.map_err(|err| SqliteStoreError::Db(err.to_string())).and_then(|inner| inner))
            .collect::<Result<Vec<_>, _>>()
    }

    // ========================================================================
    // SECTION: OutlierItem
    // ========================================================================

    /// Upserts an outlier item keyed by `(platform, external_id)`, the
    /// dedup key a crawler re-ingest must collapse onto.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn upsert_outlier_item(&self, item: &OutlierItem) -> Result<(), SqliteStoreError> {
        let comments = to_json_string(&item.comments_top_n)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO outlier_items (
                    outlier_item_id, platform, external_id, video_url, views,
                    likes, shares, comments_top_n, growth_rate, outlier_score,
                    outlier_tier, analysis_status, status, promoted_to_node_id,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(platform, external_id) DO UPDATE SET
                    video_url = excluded.video_url,
                    views = excluded.views,
                    likes = excluded.likes,
                    shares = excluded.shares,
                    comments_top_n = excluded.comments_top_n,
                    growth_rate = excluded.growth_rate,
                    outlier_score = excluded.outlier_score,
                    outlier_tier = excluded.outlier_tier,
                    analysis_status = excluded.analysis_status,
                    status = excluded.status,
                    promoted_to_node_id = excluded.promoted_to_node_id",
                params![
                    item.outlier_item_id.as_str(),
                    item.platform,
                    item.external_id,
                    item.video_url,
                    i64::try_from(item.views)
                        .map_err(|_| SqliteStoreError::Invalid("views overflow".to_string()))?,
                    i64::try_from(item.likes)
                        .map_err(|_| SqliteStoreError::Invalid("likes overflow".to_string()))?,
                    i64::try_from(item.shares)
                        .map_err(|_| SqliteStoreError::Invalid("shares overflow".to_string()))?,
                    comments,
                    item.growth_rate,
                    item.outlier_score,
                    serde_json::to_string(&item.outlier_tier)
                        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
                    serde_json::to_string(&item.analysis_status)
                        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
                    serde_json::to_string(&item.status)
                        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
                    item.promoted_to_node_id.as_ref().map(PatternNodeId::as_str),
                    offset_to_millis(item.created_at),
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Lists outlier items, most recently crawled first, capped at `limit`.
    /// Used by `audit_pipeline_state` and curator review tooling.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn list_outlier_items(&self, limit: u32) -> Result<Vec<OutlierItem>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT outlier_item_id, platform, external_id, video_url, views,
                        likes, shares, comments_top_n, growth_rate, outlier_score,
                        outlier_tier, analysis_status, status, promoted_to_node_id,
                        created_at
                 FROM outlier_items ORDER BY rowid DESC LIMIT ?1",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![i64::from(limit)], map_outlier_item_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.map(|row| row.map_err(|err| SqliteStoreError::Db(err.to_string())).and_then(|inner| inner))
            .collect::<Result<Vec<_>, _>>()
    }

    // ========================================================================
    // SECTION: Evidence Loop
    // ========================================================================

    /// Persists an evidence event's full current state (insert-or-replace
    /// by id — `EvidenceEvent::advance` already enforces the legal
    /// transition sequence before this is called).
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn save_evidence_event(&self, event: &EvidenceEvent) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO evidence_events (
                    evidence_event_id, status, parent_node_id, evidence_snapshot_id,
                    decision_object_id, started_at, evidence_ready_at, decided_at,
                    executed_at, measured_at, error_message
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(evidence_event_id) DO UPDATE SET
                    status = excluded.status,
                    evidence_snapshot_id = excluded.evidence_snapshot_id,
                    decision_object_id = excluded.decision_object_id,
                    started_at = excluded.started_at,
                    evidence_ready_at = excluded.evidence_ready_at,
                    decided_at = excluded.decided_at,
                    executed_at = excluded.executed_at,
                    measured_at = excluded.measured_at,
                    error_message = excluded.error_message",
                params![
                    event.evidence_event_id.as_str(),
                    evidence_status_label(event.status),
                    event.parent_node_id.as_str(),
                    event.evidence_snapshot_id.as_ref().map(|id| id.as_str()),
                    event.decision_object_id.as_ref().map(|id| id.as_str()),
                    event.started_at.map(offset_to_millis),
                    event.evidence_ready_at.map(offset_to_millis),
                    event.decided_at.map(offset_to_millis),
                    event.executed_at.map(offset_to_millis),
                    event.measured_at.map(offset_to_millis),
                    event.error_message,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Returns pending (non-terminal) events, optionally scoped to one
    /// parent node, oldest first, capped at `limit`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn get_pending_events(
        &self,
        parent_node_id: Option<&PatternNodeId>,
        limit: u32,
    ) -> Result<Vec<EvidenceEvent>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT evidence_event_id, status, parent_node_id, evidence_snapshot_id,
                        decision_object_id, started_at, evidence_ready_at, decided_at,
                        executed_at, measured_at, error_message
                 FROM evidence_events
                 WHERE status NOT IN ('measured', 'failed')
                   AND (?1 IS NULL OR parent_node_id = ?1)
                 ORDER BY rowid LIMIT ?2",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(
                params![parent_node_id.map(PatternNodeId::as_str), i64::from(limit)],
                map_evidence_event_row,
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.map(|row| row.map_err(|err| SqliteStoreError::Db(err.to_string())).and_then(|inner| inner))
            .collect::<Result<Vec<_>, _>>()
    }

    /// Returns the most recently inserted event for `parent_node_id`, if any.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn get_latest_event_for_parent(
        &self,
        parent_node_id: &PatternNodeId,
    ) -> Result<Option<EvidenceEvent>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT evidence_event_id, status, parent_node_id, evidence_snapshot_id,
                        decision_object_id, started_at, evidence_ready_at, decided_at,
                        executed_at, measured_at, error_message
                 FROM evidence_events WHERE parent_node_id = ?1 ORDER BY rowid DESC LIMIT 1",
                params![parent_node_id.as_str()],
                map_evidence_event_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.transpose()
    }

    /// Persists an evidence snapshot, produced once per event.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn save_evidence_snapshot(
        &self,
        snapshot: &EvidenceSnapshot,
    ) -> Result<(), SqliteStoreError> {
        let depth1 = to_json_string(&snapshot.depth1_summary)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO evidence_snapshots (
                    evidence_snapshot_id, period, depth1_summary, top_mutation_type,
                    top_mutation_pattern, top_mutation_rate, sample_count, confidence
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    snapshot.evidence_snapshot_id.as_str(),
                    snapshot.period,
                    depth1,
                    snapshot.top_mutation_type,
                    snapshot.top_mutation_pattern,
                    snapshot.top_mutation_rate,
                    snapshot.sample_count,
                    snapshot.confidence,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Loads an evidence snapshot by id, for audit and reporting tooling.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn load_evidence_snapshot(
        &self,
        evidence_snapshot_id: &patternloop_core::EvidenceSnapshotId,
    ) -> Result<Option<EvidenceSnapshot>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT evidence_snapshot_id, period, depth1_summary, top_mutation_type,
                        top_mutation_pattern, top_mutation_rate, sample_count, confidence
                 FROM evidence_snapshots WHERE evidence_snapshot_id = ?1",
                params![evidence_snapshot_id.as_str()],
                map_evidence_snapshot_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.transpose()
    }

    /// Persists a decision object, produced once per event.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn save_decision_object(&self, decision: &DecisionObject) -> Result<(), SqliteStoreError> {
        let decision_json = to_json_string(&decision.decision_json)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO decision_objects (
                    decision_id, decision_type, decision_json, evidence_summary,
                    decision_method, decided_by, decided_at, transcript_artifact_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    decision.decision_id.as_str(),
                    decision_type_label(decision.decision_type),
                    decision_json,
                    decision.evidence_summary,
                    decision_method_label(decision.decision_method),
                    decision.decided_by,
                    offset_to_millis(decision.decided_at),
                    decision.transcript_artifact_id.as_ref().map(|id| id.as_str()),
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Loads a decision object by id, for audit and pipeline-contract
    /// review tooling.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn load_decision_object(
        &self,
        decision_id: &patternloop_core::DecisionId,
    ) -> Result<Option<DecisionObject>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT decision_id, decision_type, decision_json, evidence_summary,
                        decision_method, decided_by, decided_at, transcript_artifact_id
                 FROM decision_objects WHERE decision_id = ?1",
                params![decision_id.as_str()],
                map_decision_object_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.transpose()
    }

    // ========================================================================
    // SECTION: Generic Versioned Entities
    // ========================================================================

    /// Saves a new version of an opaque, content-hash-verified entity
    /// record (`PatternNode`, `PatternCluster`, `PatternRecurrenceLink`,
    /// `PatternLibrary`, `DirectorPack`, `CoachingSession`, Bayesian
    /// priors, prediction records, ...), pruning to `max_versions` when
    /// configured.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on serialization or database failure.
    pub fn save_entity<T: Serialize>(
        &self,
        entity_kind: &str,
        entity_id: &str,
        value: &T,
    ) -> Result<(), SqliteStoreError> {
        let payload = canonical_json_bytes(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_PAYLOAD_BYTES,
                actual_bytes: payload.len(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &payload);
        let saved_at = unix_millis();

        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let latest_version: Option<i64> = tx
            .query_row(
                "SELECT latest_version FROM entities WHERE entity_kind = ?1 AND entity_id = ?2",
                params![entity_kind, entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let next_version = latest_version.unwrap_or(0).checked_add(1).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("entity version overflow for {entity_kind}/{entity_id}"))
        })?;
        tx.execute(
            "INSERT INTO entities (entity_kind, entity_id, latest_version) VALUES (?1, ?2, ?3)
             ON CONFLICT(entity_kind, entity_id) DO UPDATE SET latest_version = excluded.latest_version",
            params![entity_kind, entity_id, next_version],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO entity_versions (
                entity_kind, entity_id, version, payload_json, payload_hash,
                hash_algorithm, saved_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entity_kind,
                entity_id,
                next_version,
                payload,
                digest.value,
                hash_algorithm_label(digest.algorithm),
                saved_at
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if let Some(max_versions) = self.config.max_versions {
            enforce_entity_retention(&tx, entity_kind, entity_id, next_version, max_versions)?;
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }

    /// Loads the latest version of an opaque entity record, verifying its
    /// stored content hash.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError::NotFound`] if no record exists, or
    /// [`SqliteStoreError::Corrupt`] if the stored hash does not match.
    pub fn load_entity<T: DeserializeOwned>(
        &self,
        entity_kind: &str,
        entity_id: &str,
    ) -> Result<T, SqliteStoreError> {
        let guard = self.lock()?;
        let latest_version: Option<i64> = guard
            .query_row(
                "SELECT latest_version FROM entities WHERE entity_kind = ?1 AND entity_id = ?2",
                params![entity_kind, entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(latest_version) = latest_version else {
            return Err(SqliteStoreError::NotFound(format!("{entity_kind}/{entity_id}")));
        };
        let (payload, hash_value, hash_algorithm): (Vec<u8>, String, String) = guard
            .query_row(
                "SELECT payload_json, payload_hash, hash_algorithm FROM entity_versions
                 WHERE entity_kind = ?1 AND entity_id = ?2 AND version = ?3",
                params![entity_kind, entity_id, latest_version],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let algorithm = parse_hash_algorithm(&hash_algorithm)?;
        let expected = hash_bytes(algorithm, &payload);
        if expected.value != hash_value {
            return Err(SqliteStoreError::Corrupt(format!(
                "hash mismatch for entity {entity_kind}/{entity_id}"
            )));
        }
        serde_json::from_slice(&payload).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
    }

    /// Lists the ids of every entity stored under `entity_kind`, most
    /// recently saved first, up to `limit`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on a database failure.
    pub fn list_entity_ids(&self, entity_kind: &str, limit: u32) -> Result<Vec<String>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT e.entity_id FROM entities e
                 JOIN entity_versions v
                   ON v.entity_kind = e.entity_kind
                  AND v.entity_id = e.entity_id
                  AND v.version = e.latest_version
                 WHERE e.entity_kind = ?1
                 ORDER BY v.saved_at DESC
                 LIMIT ?2",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![entity_kind, i64::from(limit)], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.collect::<Result<Vec<String>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Lists every evidence event regardless of status, insertion order,
    /// capped at `limit`. Used by `audit_pipeline_state`, which must scan
    /// terminal events too — unlike [`Self::get_pending_events`], which
    /// excludes `measured`/`failed` by design.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] on database or deserialization failure.
    pub fn list_evidence_events(&self, limit: u32) -> Result<Vec<EvidenceEvent>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT evidence_event_id, status, parent_node_id, evidence_snapshot_id,
                        decision_object_id, started_at, evidence_ready_at, decided_at,
                        executed_at, measured_at, error_message
                 FROM evidence_events ORDER BY rowid LIMIT ?1",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![i64::from(limit)], map_evidence_event_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.map(|row| row.map_err(|err| SqliteStoreError::Db(err.to_string())).and_then(|inner| inner))
            .collect::<Result<Vec<_>, _>>()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Creates the store path's parent directory if it does not exist.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(SCHEMA_DDL).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

const SCHEMA_DDL: &str = "
    CREATE TABLE runs (
        run_id TEXT PRIMARY KEY,
        run_type TEXT NOT NULL,
        status TEXT NOT NULL,
        idempotency_key TEXT NOT NULL,
        inputs_json BLOB NOT NULL,
        result_summary BLOB,
        error_message TEXT,
        error_traceback TEXT,
        started_at INTEGER,
        ended_at INTEGER,
        duration_ms INTEGER,
        parent_run_id TEXT,
        triggered_by TEXT NOT NULL
    );
    CREATE INDEX idx_runs_idempotency ON runs (run_type, idempotency_key, status);

    CREATE TABLE artifacts (
        artifact_id TEXT PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES runs(run_id),
        artifact_type TEXT NOT NULL,
        name TEXT NOT NULL,
        storage_type TEXT NOT NULL,
        storage_path TEXT,
        schema_version TEXT NOT NULL,
        content_hash TEXT,
        data_json BLOB,
        size_bytes INTEGER,
        mime_type TEXT
    );
    CREATE INDEX idx_artifacts_run ON artifacts (run_id);

    CREATE TABLE outlier_items (
        outlier_item_id TEXT PRIMARY KEY,
        platform TEXT NOT NULL,
        external_id TEXT NOT NULL,
        video_url TEXT NOT NULL,
        views INTEGER NOT NULL,
        likes INTEGER NOT NULL,
        shares INTEGER NOT NULL,
        comments_top_n BLOB NOT NULL,
        growth_rate REAL NOT NULL,
        outlier_score REAL NOT NULL,
        outlier_tier TEXT NOT NULL,
        analysis_status TEXT NOT NULL,
        status TEXT NOT NULL,
        promoted_to_node_id TEXT,
        created_at INTEGER NOT NULL,
        UNIQUE (platform, external_id)
    );

    CREATE TABLE evidence_events (
        evidence_event_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        parent_node_id TEXT NOT NULL,
        evidence_snapshot_id TEXT,
        decision_object_id TEXT,
        started_at INTEGER,
        evidence_ready_at INTEGER,
        decided_at INTEGER,
        executed_at INTEGER,
        measured_at INTEGER,
        error_message TEXT
    );
    CREATE INDEX idx_evidence_events_parent ON evidence_events (parent_node_id);

    CREATE TABLE evidence_snapshots (
        evidence_snapshot_id TEXT PRIMARY KEY,
        period TEXT NOT NULL,
        depth1_summary BLOB NOT NULL,
        top_mutation_type TEXT,
        top_mutation_pattern TEXT,
        top_mutation_rate REAL,
        sample_count INTEGER NOT NULL,
        confidence REAL NOT NULL
    );

    CREATE TABLE decision_objects (
        decision_id TEXT PRIMARY KEY,
        decision_type TEXT NOT NULL,
        decision_json BLOB NOT NULL,
        evidence_summary TEXT NOT NULL,
        decision_method TEXT NOT NULL,
        decided_by TEXT NOT NULL,
        decided_at INTEGER NOT NULL,
        transcript_artifact_id TEXT
    );

    CREATE TABLE entities (
        entity_kind TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        latest_version INTEGER NOT NULL,
        PRIMARY KEY (entity_kind, entity_id)
    );
    CREATE TABLE entity_versions (
        entity_kind TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        payload_json BLOB NOT NULL,
        payload_hash TEXT NOT NULL,
        hash_algorithm TEXT NOT NULL,
        saved_at INTEGER NOT NULL,
        PRIMARY KEY (entity_kind, entity_id, version),
        FOREIGN KEY (entity_kind, entity_id) REFERENCES entities(entity_kind, entity_id) ON DELETE CASCADE
    );
";

fn enforce_entity_retention(
    tx: &rusqlite::Transaction<'_>,
    entity_kind: &str,
    entity_id: &str,
    latest_version: i64,
    max_versions: u64,
) -> Result<(), SqliteStoreError> {
    if max_versions == 0 {
        return Err(SqliteStoreError::Invalid("max_versions must be greater than zero".to_string()));
    }
    let max_versions =
        i64::try_from(max_versions).map_err(|_| SqliteStoreError::Invalid("max_versions too large".to_string()))?;
    if latest_version > max_versions {
        let min_version = latest_version - max_versions + 1;
        tx.execute(
            "DELETE FROM entity_versions WHERE entity_kind = ?1 AND entity_id = ?2 AND version < ?3",
            params![entity_kind, entity_id, min_version],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

fn offset_to_millis(at: time::OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn millis_to_offset(millis: i64) -> Result<time::OffsetDateTime, SqliteStoreError> {
    time::OffsetDateTime::from_unix_timestamp(millis / 1000)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

fn to_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

const fn hash_algorithm_label(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha256 => "sha256",
    }
}

fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {other}"))),
    }
}

const fn run_type_label(run_type: RunType) -> &'static str {
    match run_type {
        RunType::Crawler => "crawler",
        RunType::Analysis => "analysis",
        RunType::Clustering => "clustering",
        RunType::Evidence => "evidence",
        RunType::SourcePack => "source_pack",
        RunType::PatternSynthesis => "pattern_synthesis",
        RunType::Decision => "decision",
        RunType::Bandit => "bandit",
    }
}

fn parse_run_type(label: &str) -> Result<RunType, SqliteStoreError> {
    match label {
        "crawler" => Ok(RunType::Crawler),
        "analysis" => Ok(RunType::Analysis),
        "clustering" => Ok(RunType::Clustering),
        "evidence" => Ok(RunType::Evidence),
        "source_pack" => Ok(RunType::SourcePack),
        "pattern_synthesis" => Ok(RunType::PatternSynthesis),
        "decision" => Ok(RunType::Decision),
        "bandit" => Ok(RunType::Bandit),
        other => Err(SqliteStoreError::Invalid(format!("unknown run_type: {other}"))),
    }
}

const fn run_status_label(status: patternloop_core::RunStatus) -> &'static str {
    use patternloop_core::RunStatus;
    match status {
        RunStatus::Queued => "queued",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}

fn parse_run_status(label: &str) -> Result<patternloop_core::RunStatus, SqliteStoreError> {
    use patternloop_core::RunStatus;
    match label {
        "queued" => Ok(RunStatus::Queued),
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        "cancelled" => Ok(RunStatus::Cancelled),
        other => Err(SqliteStoreError::Invalid(format!("unknown run status: {other}"))),
    }
}

const fn storage_type_label(storage_type: patternloop_core::StorageType) -> &'static str {
    use patternloop_core::StorageType;
    match storage_type {
        StorageType::Db => "db",
        StorageType::ObjectStore => "object_store",
        StorageType::ExternalUrl => "external_url",
    }
}

fn parse_storage_type(label: &str) -> Result<patternloop_core::StorageType, SqliteStoreError> {
    use patternloop_core::StorageType;
    match label {
        "db" => Ok(StorageType::Db),
        "object_store" => Ok(StorageType::ObjectStore),
        "external_url" => Ok(StorageType::ExternalUrl),
        other => Err(SqliteStoreError::Invalid(format!("unknown storage_type: {other}"))),
    }
}

const fn evidence_status_label(status: EvidenceStatus) -> &'static str {
    match status {
        EvidenceStatus::Queued => "queued",
        EvidenceStatus::Running => "running",
        EvidenceStatus::EvidenceReady => "evidence_ready",
        EvidenceStatus::Decided => "decided",
        EvidenceStatus::Executed => "executed",
        EvidenceStatus::Measured => "measured",
        EvidenceStatus::Failed => "failed",
    }
}

fn parse_evidence_status(label: &str) -> Result<EvidenceStatus, SqliteStoreError> {
    match label {
        "queued" => Ok(EvidenceStatus::Queued),
        "running" => Ok(EvidenceStatus::Running),
        "evidence_ready" => Ok(EvidenceStatus::EvidenceReady),
        "decided" => Ok(EvidenceStatus::Decided),
        "executed" => Ok(EvidenceStatus::Executed),
        "measured" => Ok(EvidenceStatus::Measured),
        "failed" => Ok(EvidenceStatus::Failed),
        other => Err(SqliteStoreError::Invalid(format!("unknown evidence status: {other}"))),
    }
}

const fn decision_type_label(decision_type: patternloop_core::evidence_loop::DecisionType) -> &'static str {
    use patternloop_core::evidence_loop::DecisionType;
    match decision_type {
        DecisionType::Go => "go",
        DecisionType::Stop => "stop",
        DecisionType::Pivot => "pivot",
    }
}

fn parse_decision_type(
    label: &str,
) -> Result<patternloop_core::evidence_loop::DecisionType, SqliteStoreError> {
    use patternloop_core::evidence_loop::DecisionType;
    match label {
        "go" => Ok(DecisionType::Go),
        "stop" => Ok(DecisionType::Stop),
        "pivot" => Ok(DecisionType::Pivot),
        other => Err(SqliteStoreError::Invalid(format!("unknown decision_type: {other}"))),
    }
}

const fn decision_method_label(method: patternloop_core::evidence_loop::DecisionMethod) -> &'static str {
    use patternloop_core::evidence_loop::DecisionMethod;
    match method {
        DecisionMethod::Auto => "auto",
        DecisionMethod::Manual => "manual",
        DecisionMethod::Hybrid => "hybrid",
    }
}

fn parse_decision_method(
    label: &str,
) -> Result<patternloop_core::evidence_loop::DecisionMethod, SqliteStoreError> {
    use patternloop_core::evidence_loop::DecisionMethod;
    match label {
        "auto" => Ok(DecisionMethod::Auto),
        "manual" => Ok(DecisionMethod::Manual),
        "hybrid" => Ok(DecisionMethod::Hybrid),
        other => Err(SqliteStoreError::Invalid(format!("unknown decision_method: {other}"))),
    }
}

fn map_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Run, SqliteStoreError>> {
    let run_type: String = row.get(1)?;
    let status: String = row.get(2)?;
    let inputs_json: String = row.get(4)?;
    let result_summary: Option<String> = row.get(5)?;
    let started_at: Option<i64> = row.get(8)?;
    let ended_at: Option<i64> = row.get(9)?;
    Ok((|| {
        Ok(Run {
            run_id: RunId::new(row.get::<_, String>(0)?),
            run_type: parse_run_type(&run_type)?,
            status: parse_run_status(&status)?,
            idempotency_key: row.get(3)?,
            inputs_json: serde_json::from_str(&inputs_json)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            result_summary: result_summary
                .map(|value| serde_json::from_str(&value))
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            error_message: row.get(6)?,
            error_traceback: row.get(7)?,
            started_at: started_at.map(millis_to_offset).transpose()?,
            ended_at: ended_at.map(millis_to_offset).transpose()?,
            duration_ms: row.get(10)?,
            parent_run_id: row.get::<_, Option<String>>(11)?.map(RunId::new),
            triggered_by: row.get(12)?,
        })
    })())
}

fn map_outlier_item_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<OutlierItem, SqliteStoreError>> {
    let comments_top_n: String = row.get(7)?;
    let outlier_tier: String = row.get(10)?;
    let analysis_status: String = row.get(11)?;
    let status: String = row.get(12)?;
    let created_at: i64 = row.get(14)?;
    Ok((|| {
        Ok(OutlierItem {
            outlier_item_id: OutlierItemId::new(row.get::<_, String>(0)?),
            platform: row.get(1)?,
            external_id: row.get(2)?,
            video_url: row.get(3)?,
            views: u64::try_from(row.get::<_, i64>(4)?)
                .map_err(|_| SqliteStoreError::Invalid("views underflow".to_string()))?,
            likes: u64::try_from(row.get::<_, i64>(5)?)
                .map_err(|_| SqliteStoreError::Invalid("likes underflow".to_string()))?,
            shares: u64::try_from(row.get::<_, i64>(6)?)
                .map_err(|_| SqliteStoreError::Invalid("shares underflow".to_string()))?,
            comments_top_n: serde_json::from_str(&comments_top_n)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            growth_rate: row.get(8)?,
            outlier_score: row.get(9)?,
            outlier_tier: serde_json::from_str(&outlier_tier)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            analysis_status: serde_json::from_str(&analysis_status)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            status: serde_json::from_str(&status)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            promoted_to_node_id: row.get::<_, Option<String>>(13)?.map(PatternNodeId::new),
            created_at: millis_to_offset(created_at)?,
        })
    })())
}

fn map_artifact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Artifact, SqliteStoreError>> {
    let storage_type: String = row.get(4)?;
    let data_json: Option<String> = row.get(8)?;
    Ok((|| {
        Ok(Artifact {
            artifact_id: patternloop_core::ArtifactId::new(row.get::<_, String>(0)?),
            run_id: RunId::new(row.get::<_, String>(1)?),
            artifact_type: row.get(2)?,
            name: row.get(3)?,
            storage_type: parse_storage_type(&storage_type)?,
            storage_path: row.get(5)?,
            schema_version: row.get(6)?,
            content_hash: row.get(7)?,
            data_json: data_json
                .map(|value| serde_json::from_str(&value))
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            size_bytes: row
                .get::<_, Option<i64>>(9)?
                .map(u64::try_from)
                .transpose()
                .map_err(|_| SqliteStoreError::Invalid("size_bytes underflow".to_string()))?,
            mime_type: row.get(10)?,
        })
    })())
}

fn map_evidence_event_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<EvidenceEvent, SqliteStoreError>> {
    let status: String = row.get(1)?;
    let started_at: Option<i64> = row.get(5)?;
    let evidence_ready_at: Option<i64> = row.get(6)?;
    let decided_at: Option<i64> = row.get(7)?;
    let executed_at: Option<i64> = row.get(8)?;
    let measured_at: Option<i64> = row.get(9)?;
    Ok((|| {
        Ok(EvidenceEvent {
            evidence_event_id: patternloop_core::EvidenceEventId::new(row.get::<_, String>(0)?),
            status: parse_evidence_status(&status)?,
            parent_node_id: PatternNodeId::new(row.get::<_, String>(2)?),
            evidence_snapshot_id: row
                .get::<_, Option<String>>(3)?
                .map(patternloop_core::EvidenceSnapshotId::new),
            decision_object_id: row.get::<_, Option<String>>(4)?.map(patternloop_core::DecisionId::new),
            started_at: started_at.map(millis_to_offset).transpose()?,
            evidence_ready_at: evidence_ready_at.map(millis_to_offset).transpose()?,
            decided_at: decided_at.map(millis_to_offset).transpose()?,
            executed_at: executed_at.map(millis_to_offset).transpose()?,
            measured_at: measured_at.map(millis_to_offset).transpose()?,
            error_message: row.get(10)?,
        })
    })())
}

/// Maps a `decision_objects` row into a [`DecisionObject`].
fn map_decision_object_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<DecisionObject, SqliteStoreError>> {
    let decision_type: String = row.get(1)?;
    let decision_json: String = row.get(2)?;
    let decision_method: String = row.get(4)?;
    let decided_at: i64 = row.get(6)?;
    Ok((|| {
        Ok(DecisionObject {
            decision_id: patternloop_core::DecisionId::new(row.get::<_, String>(0)?),
            decision_type: parse_decision_type(&decision_type)?,
            decision_json: serde_json::from_str(&decision_json)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            evidence_summary: row.get(3)?,
            decision_method: parse_decision_method(&decision_method)?,
            decided_by: row.get(5)?,
            decided_at: millis_to_offset(decided_at)?,
            transcript_artifact_id: row
                .get::<_, Option<String>>(7)?
                .map(patternloop_core::ArtifactId::new),
        })
    })())
}

/// Maps an `evidence_snapshots` row into an [`EvidenceSnapshot`].
fn map_evidence_snapshot_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<EvidenceSnapshot, SqliteStoreError>> {
    let depth1_summary: String = row.get(2)?;
    Ok((|| {
        Ok(EvidenceSnapshot {
            evidence_snapshot_id: patternloop_core::EvidenceSnapshotId::new(row.get::<_, String>(0)?),
            period: row.get(1)?,
            depth1_summary: serde_json::from_str(&depth1_summary)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            top_mutation_type: row.get(3)?,
            top_mutation_pattern: row.get(4)?,
            top_mutation_rate: row.get(5)?,
            sample_count: row.get(6)?,
            confidence: row.get(7)?,
        })
    })())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use patternloop_core::RunStatus;
    use time::macros::datetime;

    use super::*;
    use crate::entities::AnalysisStatus;
    use crate::entities::OutlierStatus;
    use crate::entities::OutlierTier;

    fn temp_store() -> (tempfile::TempDir, PatternLoopStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patternloop.sqlite3");
        let store = PatternLoopStore::new(SqliteStoreConfig {
            path,
            busy_timeout_ms: 1_000,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
            max_versions: None,
        })
        .unwrap();
        (dir, store)
    }

    fn sample_run() -> Run {
        Run {
            run_id: RunId::new("crawler_20260101_000000_abcd1234"),
            run_type: RunType::Crawler,
            status: RunStatus::Running,
            idempotency_key: "deadbeef".to_string(),
            inputs_json: serde_json::json!({"source": "tiktok"}),
            result_summary: None,
            error_message: None,
            error_traceback: None,
            started_at: Some(datetime!(2026-01-01 00:00:00 UTC)),
            ended_at: None,
            duration_ms: None,
            parent_run_id: None,
            triggered_by: "scheduler".to_string(),
        }
    }

    #[test]
    fn round_trips_a_run_through_save_and_load() {
        let (_dir, store) = temp_store();
        let run = sample_run();
        store.save_run(&run).unwrap();
        let loaded = store.load_run(&run.run_id).unwrap().unwrap();
        assert_eq!(loaded.run_id, run.run_id);
        assert_eq!(loaded.status, RunStatus::Running);
    }

    #[test]
    fn finds_the_running_run_for_an_idempotency_key() {
        let (_dir, store) = temp_store();
        let run = sample_run();
        store.save_run(&run).unwrap();
        let found = store.find_running(RunType::Crawler, "deadbeef").unwrap().unwrap();
        assert_eq!(found.run_id, run.run_id);
        assert!(store.find_completed(RunType::Crawler, "deadbeef").unwrap().is_none());
    }

    #[test]
    fn upserts_outlier_items_by_platform_and_external_id() {
        let (_dir, store) = temp_store();
        let item = OutlierItem {
            outlier_item_id: patternloop_core::OutlierItemId::new("oi_1"),
            platform: "tiktok".to_string(),
            external_id: "123".to_string(),
            video_url: "https://www.tiktok.com/video/123".to_string(),
            views: 1_000_000,
            likes: 10_000,
            shares: 500,
            comments_top_n: vec!["nice".to_string()],
            growth_rate: 4.2,
            outlier_score: 0.91,
            outlier_tier: OutlierTier::S,
            analysis_status: AnalysisStatus::Pending,
            status: OutlierStatus::Pending,
            promoted_to_node_id: None,
            created_at: datetime!(2026-01-01 00:00:00 UTC),
        };
        store.upsert_outlier_item(&item).unwrap();
        let mut reupserted = item.clone();
        reupserted.views = 2_000_000;
        store.upsert_outlier_item(&reupserted).unwrap();

        let guard = store.lock().unwrap();
        let count: i64 =
            guard.query_row("SELECT COUNT(*) FROM outlier_items", params![], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
        let views: i64 = guard
            .query_row("SELECT views FROM outlier_items WHERE outlier_item_id = 'oi_1'", params![], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(views, 2_000_000);
    }

    #[test]
    fn rejects_a_corrupted_entity_hash() {
        let (_dir, store) = temp_store();
        store.save_entity("test_entity", "e1", &42u32).unwrap();
        let guard = store.lock().unwrap();
        guard
            .execute(
                "UPDATE entity_versions SET payload_json = ?1 WHERE entity_kind = 'test_entity'",
                params![b"99".to_vec()],
            )
            .unwrap();
        drop(guard);
        let result = store.load_entity::<u32>("test_entity", "e1");
        assert!(matches!(result, Err(SqliteStoreError::Corrupt(_))));
    }

    #[test]
    fn generic_entity_round_trips_through_save_and_load() {
        let (_dir, store) = temp_store();
        store.save_entity("prior", "pattern_1", &42u32).unwrap();
        let loaded: u32 = store.load_entity("prior", "pattern_1").unwrap();
        assert_eq!(loaded, 42);
    }

    #[test]
    fn missing_entity_is_reported_as_not_found() {
        let (_dir, store) = temp_store();
        let result = store.load_entity::<u32>("prior", "missing");
        assert!(matches!(result, Err(SqliteStoreError::NotFound(_))));
    }
}

// patternloop-core/src/run/mod.rs
// ============================================================================
// Module: Run/Artifact/Idempotency Engine
// Description: Content-addressed, idempotent execution tracking for every
//              pipeline step (crawl, analysis, clustering, evidence, ...).
// Purpose: Guarantee at-most-one-COMPLETED-Run per (run_type, inputs) and
//          immutable, content-addressed Artifacts once a Run completes.
// Dependencies: crate::core::hashing, serde, thiserror, time
// ============================================================================

//! ## Overview
//! Every pipeline step is a [`Run`]: a replay-safe execution identified by
//! an `idempotency_key` derived from its canonical-JSON inputs. A `Run`
//! produces zero or more content-addressed [`Artifact`]s. The same inputs
//! must never re-execute — callers that pass `skip_if_exists = true` to
//! [`RunLedger::acquire`] get the existing completed `Run` back instead of
//! a new one.
//!
//! This module only tracks state transitions in memory; persistence is the
//! job of a `RunStateStore`-shaped backend (see `patternloop-store-sqlite`).

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::hashing::hash_canonical_json_hex;
use crate::core::hashing::HashError;
use crate::core::ArtifactId;
use crate::core::RunId;

/// Kind of pipeline step a [`Run`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// A crawl against a source platform.
    Crawler,
    /// A vision-LLM analysis of a single candidate.
    Analysis,
    /// A clustering pass over newly analyzed nodes.
    Clustering,
    /// An Evidence Loop reduction cycle.
    Evidence,
    /// Assembly of a source pack for downstream consumers.
    SourcePack,
    /// Synthesis of a new `PatternLibrary` revision.
    PatternSynthesis,
    /// A GO/STOP/PIVOT decision run.
    Decision,
    /// A bandit-style experiment allocation run.
    Bandit,
}

impl RunType {
    /// Returns the lowercase token used in generated human-readable IDs.
    #[must_use]
    pub const fn as_id_token(self) -> &'static str {
        match self {
            Self::Crawler => "crawler",
            Self::Analysis => "analysis",
            Self::Clustering => "clustering",
            Self::Evidence => "evidence",
            Self::SourcePack => "source_pack",
            Self::PatternSynthesis => "pattern_synthesis",
            Self::Decision => "decision",
            Self::Bandit => "bandit",
        }
    }
}

/// Lifecycle status of a [`Run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Queued but not yet started.
    Queued,
    /// Currently executing; holds the idempotency key exclusively.
    Running,
    /// Finished successfully; immutable from this point on.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

/// A single idempotent execution of a pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Human-readable identifier, `{run_type}_{timestamp}_{short-hash}`.
    pub run_id: RunId,
    /// Kind of pipeline step.
    pub run_type: RunType,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// SHA-256 over the canonical JSON of `inputs_json`.
    pub idempotency_key: String,
    /// The inputs this run was invoked with.
    pub inputs_json: Value,
    /// Free-form summary set on successful completion.
    pub result_summary: Option<Value>,
    /// Error message set on failure.
    pub error_message: Option<String>,
    /// Captured error detail (not a language-level traceback in Rust; the
    /// formatted error chain instead).
    pub error_traceback: Option<String>,
    /// Wall-clock start time.
    pub started_at: Option<OffsetDateTime>,
    /// Wall-clock end time.
    pub ended_at: Option<OffsetDateTime>,
    /// Duration in milliseconds, stamped on completion or failure.
    pub duration_ms: Option<i64>,
    /// Optional parent run, for runs spawned by another run.
    pub parent_run_id: Option<RunId>,
    /// Caller identity or subsystem that triggered this run.
    pub triggered_by: String,
}

/// Content-addressed output of a [`Run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Human-readable identifier, `{run_id}_{artifact_type}_{short-hash}`.
    pub artifact_id: ArtifactId,
    /// Owning run.
    pub run_id: RunId,
    /// Caller-defined artifact kind (e.g. `raw_data`, `normalized_dna`).
    pub artifact_type: String,
    /// Human-readable name.
    pub name: String,
    /// Where the payload physically lives.
    pub storage_type: StorageType,
    /// Path or key within `storage_type`, when not inlined.
    pub storage_path: Option<String>,
    /// Schema version tag for the payload shape.
    pub schema_version: String,
    /// SHA-256 over the canonical JSON of `data_json`, when present.
    pub content_hash: Option<String>,
    /// Inlined payload, when `storage_type == StorageType::Db`.
    pub data_json: Option<Value>,
    /// Size of the payload in bytes, when known.
    pub size_bytes: Option<u64>,
    /// MIME type of the payload, when known.
    pub mime_type: Option<String>,
}

/// Where an [`Artifact`]'s payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Inlined into `data_json`.
    Db,
    /// Externalized to an object store, referenced by `storage_path`.
    ObjectStore,
    /// A fully external URL, referenced by `storage_path`.
    ExternalUrl,
}

/// Errors raised by the Run/Artifact engine.
#[derive(Debug, Error)]
pub enum RunError {
    /// Another `Run` already holds this `(run_type, idempotency_key)` pair
    /// in the `Running` state.
    #[error("run {run_type:?} with idempotency_key {idempotency_key} is already running")]
    Conflict {
        /// The run type in conflict.
        run_type: RunType,
        /// The idempotency key in conflict.
        idempotency_key: String,
    },
    /// An artifact was added to a run that is not `Running`.
    #[error("cannot add artifacts to run {0} in its current status")]
    NotRunning(RunId),
    /// A run was completed or failed twice.
    #[error("run {0} has already reached a terminal status")]
    AlreadyTerminal(RunId),
    /// Canonical-JSON hashing of inputs or artifact data failed.
    #[error("failed to hash run payload: {0}")]
    Hashing(#[from] HashError),
    /// No run exists with the given id.
    #[error("no such run: {0}")]
    NotFound(RunId),
}

/// Outcome of [`RunLedger::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// A brand-new `Run` was created and is now `Running`.
    Created,
    /// An existing `Completed` run was returned without re-execution.
    Skipped,
}

/// Computes the idempotency key for a set of run inputs.
///
/// This is the same canonical-JSON SHA-256 routine used for artifact
/// content hashes (see [`crate::core::hashing`]) — only the payload
/// differs.
///
/// # Errors
///
/// Returns [`HashError`] if `inputs` cannot be canonicalized.
pub fn idempotency_key(inputs: &Value) -> Result<String, HashError> {
    hash_canonical_json_hex(inputs)
}

/// Generates a human-friendly identifier: `{prefix}_{timestamp}_{short-hash}`.
///
/// `short_suffix` should be eight lowercase hex characters (the callers in
/// this crate draw them from a UUID or an additional hash); this function
/// does not generate randomness itself so that it stays reproducible in
/// tests.
#[must_use]
pub fn generate_human_id(prefix: &str, now: OffsetDateTime, short_suffix: &str) -> String {
    format!(
        "{prefix}_{:04}{:02}{:02}_{:02}{:02}{:02}_{short_suffix}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
    )
}

/// In-memory bookkeeping for Run acquisition and artifact tracking.
///
/// A real deployment backs this with `patternloop-store-sqlite`; this
/// ledger exists so the engine's invariants (at most one `Running` or
/// `Completed` run per key) can be expressed and tested independent of any
/// storage backend.
#[derive(Debug, Default)]
pub struct RunLedger {
    runs: HashMap<RunId, Run>,
    completed_by_key: HashMap<(RunType, String), RunId>,
    running_by_key: HashMap<(RunType, String), RunId>,
}

impl RunLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a run for `(run_type, inputs)`.
    ///
    /// If a `Completed` run with the same key exists and `skip_if_exists`
    /// is `true`, it is returned with [`Acquisition::Skipped`]. Otherwise a
    /// new `Run` is inserted in the `Running` state.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Conflict`] if another `Run` already holds the
    /// key in the `Running` state, or [`RunError::Hashing`] if `inputs`
    /// cannot be canonicalized.
    pub fn acquire(
        &mut self,
        run_id: RunId,
        run_type: RunType,
        inputs: Value,
        triggered_by: impl Into<String>,
        parent_run_id: Option<RunId>,
        skip_if_exists: bool,
        now: OffsetDateTime,
    ) -> Result<(Run, Acquisition), RunError> {
        let key = idempotency_key(&inputs)?;
        let lookup_key = (run_type, key.clone());

        if skip_if_exists {
            if let Some(existing_id) = self.completed_by_key.get(&lookup_key) {
                let existing = self
                    .runs
                    .get(existing_id)
                    .cloned()
                    .ok_or_else(|| RunError::NotFound(existing_id.clone()))?;
                return Ok((existing, Acquisition::Skipped));
            }
        }

        if self.running_by_key.contains_key(&lookup_key) {
            return Err(RunError::Conflict {
                run_type,
                idempotency_key: key,
            });
        }

        let run = Run {
            run_id: run_id.clone(),
            run_type,
            status: RunStatus::Running,
            idempotency_key: key.clone(),
            inputs_json: inputs,
            result_summary: None,
            error_message: None,
            error_traceback: None,
            started_at: Some(now),
            ended_at: None,
            duration_ms: None,
            parent_run_id,
            triggered_by: triggered_by.into(),
        };

        self.running_by_key.insert(lookup_key, run_id.clone());
        self.runs.insert(run_id.clone(), run.clone());
        Ok((run, Acquisition::Created))
    }

    /// Attaches a content-addressed artifact to a `Running` run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::NotRunning`] if the run is not `Running`, or
    /// [`RunError::NotFound`] if it does not exist.
    pub fn add_artifact(
        &mut self,
        run_id: &RunId,
        artifact_id: ArtifactId,
        artifact_type: impl Into<String>,
        name: impl Into<String>,
        data: Option<Value>,
        schema_version: impl Into<String>,
    ) -> Result<Artifact, RunError> {
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| RunError::NotFound(run_id.clone()))?;
        if run.status != RunStatus::Running {
            return Err(RunError::NotRunning(run_id.clone()));
        }

        let content_hash = data
            .as_ref()
            .map(hash_canonical_json_hex)
            .transpose()?;

        Ok(Artifact {
            artifact_id,
            run_id: run_id.clone(),
            artifact_type: artifact_type.into(),
            name: name.into(),
            storage_type: StorageType::Db,
            storage_path: None,
            schema_version: schema_version.into(),
            content_hash,
            data_json: data,
            size_bytes: None,
            mime_type: None,
        })
    }

    /// Marks a `Running` run `Completed`, stamping `ended_at`/`duration_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AlreadyTerminal`] if the run already reached a
    /// terminal status, or [`RunError::NotFound`] if it does not exist.
    pub fn complete(
        &mut self,
        run_id: &RunId,
        result_summary: Option<Value>,
        now: OffsetDateTime,
    ) -> Result<Run, RunError> {
        self.finish(run_id, RunStatus::Completed, result_summary, None, now)
    }

    /// Marks a `Running` run `Failed`, recording `error_message`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AlreadyTerminal`] if the run already reached a
    /// terminal status, or [`RunError::NotFound`] if it does not exist.
    pub fn fail(
        &mut self,
        run_id: &RunId,
        error_message: impl Into<String>,
        now: OffsetDateTime,
    ) -> Result<Run, RunError> {
        self.finish(run_id, RunStatus::Failed, None, Some(error_message.into()), now)
    }

    fn finish(
        &mut self,
        run_id: &RunId,
        status: RunStatus,
        result_summary: Option<Value>,
        error_message: Option<String>,
        now: OffsetDateTime,
    ) -> Result<Run, RunError> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| RunError::NotFound(run_id.clone()))?;
        if run.status != RunStatus::Running {
            return Err(RunError::AlreadyTerminal(run_id.clone()));
        }

        let key = (run.run_type, run.idempotency_key.clone());
        self.running_by_key.remove(&key);

        run.status = status;
        run.result_summary = result_summary;
        run.error_message = error_message;
        run.ended_at = Some(now);
        if let Some(started_at) = run.started_at {
            let millis = (now - started_at).whole_milliseconds();
            run.duration_ms = Some(i64::try_from(millis).unwrap_or(i64::MAX));
        }

        if status == RunStatus::Completed {
            self.completed_by_key.insert(key, run_id.clone());
        }

        Ok(run.clone())
    }

    /// Looks up a run by id.
    #[must_use]
    pub fn get(&self, run_id: &RunId) -> Option<&Run> {
        self.runs.get(run_id)
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id_token())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    #[test]
    fn rerunning_identical_inputs_returns_the_completed_run_and_skips() {
        let mut ledger = RunLedger::new();
        let inputs = json!({"source": "mock", "limit": 5});

        let (run, acquisition) = ledger
            .acquire(
                RunId::new("crawler_1"),
                RunType::Crawler,
                inputs.clone(),
                "cli",
                None,
                true,
                now(),
            )
            .expect("first acquire succeeds");
        assert_eq!(acquisition, Acquisition::Created);
        ledger.complete(&run.run_id, None, now()).expect("completes");

        let (again, acquisition) = ledger
            .acquire(
                RunId::new("crawler_2"),
                RunType::Crawler,
                inputs,
                "cli",
                None,
                true,
                now(),
            )
            .expect("second acquire succeeds");

        assert_eq!(acquisition, Acquisition::Skipped);
        assert_eq!(again.run_id, run.run_id);
    }

    #[test]
    fn concurrent_running_runs_with_the_same_key_conflict() {
        let mut ledger = RunLedger::new();
        let inputs = json!({"source": "mock"});

        ledger
            .acquire(
                RunId::new("crawler_1"),
                RunType::Crawler,
                inputs.clone(),
                "cli",
                None,
                true,
                now(),
            )
            .expect("first acquire succeeds");

        let err = ledger
            .acquire(
                RunId::new("crawler_2"),
                RunType::Crawler,
                inputs,
                "cli",
                None,
                true,
                now(),
            )
            .expect_err("second acquire conflicts");

        assert!(matches!(err, RunError::Conflict { .. }));
    }

    #[test]
    fn artifact_content_hash_matches_canonical_json_of_its_data() {
        let mut ledger = RunLedger::new();
        let (run, _) = ledger
            .acquire(
                RunId::new("analysis_1"),
                RunType::Analysis,
                json!({"node_id": "n1"}),
                "pipeline",
                None,
                true,
                now(),
            )
            .expect("acquire succeeds");

        let data = json!({"hook": {"type": "text"}});
        let artifact = ledger
            .add_artifact(
                &run.run_id,
                ArtifactId::new("a1"),
                "normalized_dna",
                "dna",
                Some(data.clone()),
                "v1",
            )
            .expect("artifact added");

        let expected = hash_canonical_json_hex(&data).expect("hashes");
        assert_eq!(artifact.content_hash, Some(expected));
    }

    #[test]
    fn artifacts_cannot_be_added_once_a_run_is_terminal() {
        let mut ledger = RunLedger::new();
        let (run, _) = ledger
            .acquire(
                RunId::new("analysis_1"),
                RunType::Analysis,
                json!({}),
                "pipeline",
                None,
                true,
                now(),
            )
            .expect("acquire succeeds");
        ledger.complete(&run.run_id, None, now()).expect("completes");

        let err = ledger
            .add_artifact(&run.run_id, ArtifactId::new("a1"), "kind", "name", None, "v1")
            .expect_err("add_artifact fails after completion");

        assert!(matches!(err, RunError::NotRunning(_)));
    }

    #[test]
    fn duration_ms_is_stamped_on_completion() {
        let mut ledger = RunLedger::new();
        let start = now();
        let (run, _) = ledger
            .acquire(
                RunId::new("r1"),
                RunType::Bandit,
                json!({}),
                "cli",
                None,
                true,
                start,
            )
            .expect("acquire succeeds");

        let end = start + time::Duration::milliseconds(250);
        let completed = ledger.complete(&run.run_id, None, end).expect("completes");
        assert_eq!(completed.duration_ms, Some(250));
    }
}

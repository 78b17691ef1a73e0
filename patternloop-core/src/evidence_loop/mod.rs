// patternloop-core/src/evidence_loop/mod.rs
// ============================================================================
// Module: Evidence Loop State Machine
// Description: The QUEUED→RUNNING→EVIDENCE_READY→DECIDED→EXECUTED→MEASURED
//              lifecycle (with FAILED reachable from any non-terminal
//              state), validated against an explicit transition table.
// Purpose: Guarantee the closed-loop mutation/measurement/decision cycle
//          never advances through an illegal state transition.
// Dependencies: crate::core identifiers, thiserror, time
// ============================================================================

//! ## Overview
//! Every transition here is checked against [`TRANSITIONS`], a literal
//! array of legal `(from, to)` pairs — never reflection, never string
//! matching. `EvidenceEvent::advance` is the sole mutator; it rejects any
//! pair not present in the table with [`IllegalTransition`] and leaves the
//! event untouched. `RUNNING→EVIDENCE_READY` additionally requires a
//! caller-supplied `evidence_snapshot_id` and `EVIDENCE_READY→DECIDED`
//! requires a `DecisionObject`, per the transition contracts — those
//! preconditions are enforced by the typed `mark_*` wrapper methods, not
//! by `advance` itself.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::DecisionId;
use crate::core::EvidenceEventId;
use crate::core::EvidenceSnapshotId;
use crate::core::PatternNodeId;

/// Status of an [`EvidenceEvent`]'s lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    /// Queued but not yet started.
    Queued,
    /// Currently running a mutation/measurement cycle.
    Running,
    /// An `EvidenceSnapshot` has been produced.
    EvidenceReady,
    /// A `DecisionObject` has been recorded.
    Decided,
    /// The decision has been executed against the pattern.
    Executed,
    /// Post-execution measurement has been recorded. Terminal.
    Measured,
    /// The cycle failed. Terminal.
    Failed,
}

/// The literal set of legal `(from, to)` transitions. Anything else is
/// rejected by [`EvidenceEvent::advance`].
pub const TRANSITIONS: &[(EvidenceStatus, EvidenceStatus)] = &[
    (EvidenceStatus::Queued, EvidenceStatus::Running),
    (EvidenceStatus::Running, EvidenceStatus::EvidenceReady),
    (EvidenceStatus::EvidenceReady, EvidenceStatus::Decided),
    (EvidenceStatus::Decided, EvidenceStatus::Executed),
    (EvidenceStatus::Executed, EvidenceStatus::Measured),
    (EvidenceStatus::Queued, EvidenceStatus::Failed),
    (EvidenceStatus::Running, EvidenceStatus::Failed),
    (EvidenceStatus::EvidenceReady, EvidenceStatus::Failed),
    (EvidenceStatus::Decided, EvidenceStatus::Failed),
    (EvidenceStatus::Executed, EvidenceStatus::Failed),
];

/// An attempted transition not present in [`TRANSITIONS`].
#[derive(Debug, thiserror::Error)]
#[error("illegal transition for event {event_id}: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// The event that rejected the transition.
    pub event_id: EvidenceEventId,
    /// The status the event was in.
    pub from: EvidenceStatus,
    /// The status that was requested.
    pub to: EvidenceStatus,
}

/// Snapshot of pattern-level outcome statistics produced once per
/// `EvidenceEvent` in `RUNNING → EVIDENCE_READY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    /// Snapshot identifier.
    pub evidence_snapshot_id: EvidenceSnapshotId,
    /// Reporting period label (caller-defined, e.g. an ISO week).
    pub period: String,
    /// `mutation_type -> pattern -> {success_rate, sample_count}`.
    pub depth1_summary: Vec<Depth1Entry>,
    /// The highest-performing mutation type this period.
    pub top_mutation_type: Option<String>,
    /// The highest-performing mutation pattern this period.
    pub top_mutation_pattern: Option<String>,
    /// That mutation pattern's success rate.
    pub top_mutation_rate: Option<f64>,
    /// Total samples backing this snapshot.
    pub sample_count: u32,
    /// Confidence in the summary, in `[0, 1]`.
    pub confidence: f64,
}

/// A single `mutation_type -> pattern -> {success_rate, sample_count}`
/// row of an [`EvidenceSnapshot`]'s `depth1_summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depth1Entry {
    /// The mutation type this row reports on.
    pub mutation_type: String,
    /// The specific mutation pattern within that type.
    pub pattern: String,
    /// Observed success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Number of samples backing `success_rate`.
    pub sample_count: u32,
}

/// GO / STOP / PIVOT decision classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Proceed with the mutation.
    Go,
    /// Halt further experimentation on this pattern.
    Stop,
    /// Proceed with a different mutation.
    Pivot,
}

/// How a [`DecisionObject`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    /// Produced entirely by the STPF/Bayesian scoring pipeline.
    Auto,
    /// Produced by a human curator.
    Manual,
    /// Scoring pipeline proposed, a human curator confirmed or overrode.
    Hybrid,
}

/// The decision produced once per `EvidenceEvent` in
/// `EVIDENCE_READY → DECIDED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionObject {
    /// Decision identifier.
    pub decision_id: DecisionId,
    /// GO / STOP / PIVOT classification.
    pub decision_type: DecisionType,
    /// The full scoring breakdown that produced this decision.
    pub decision_json: serde_json::Value,
    /// Human-readable summary of the evidence backing this decision.
    pub evidence_summary: String,
    /// How the decision was produced.
    pub decision_method: DecisionMethod,
    /// Identity of the decider (a user id, or `"system"` for auto).
    pub decided_by: String,
    /// When the decision was made.
    pub decided_at: OffsetDateTime,
    /// Artifact holding the decision transcript, if one was recorded.
    pub transcript_artifact_id: Option<crate::core::ArtifactId>,
}

/// A single Evidence Loop cycle for one `PatternNode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEvent {
    /// Event identifier.
    pub evidence_event_id: EvidenceEventId,
    /// Current lifecycle status.
    pub status: EvidenceStatus,
    /// The pattern node this event is evaluating a mutation of.
    pub parent_node_id: PatternNodeId,
    /// Snapshot produced in `RUNNING → EVIDENCE_READY`, once set.
    pub evidence_snapshot_id: Option<EvidenceSnapshotId>,
    /// Decision produced in `EVIDENCE_READY → DECIDED`, once set.
    pub decision_object_id: Option<DecisionId>,
    /// When the event entered `RUNNING`.
    pub started_at: Option<OffsetDateTime>,
    /// When the event entered `EVIDENCE_READY`.
    pub evidence_ready_at: Option<OffsetDateTime>,
    /// When the event entered `DECIDED`.
    pub decided_at: Option<OffsetDateTime>,
    /// When the event entered `EXECUTED`.
    pub executed_at: Option<OffsetDateTime>,
    /// When the event entered `MEASURED`.
    pub measured_at: Option<OffsetDateTime>,
    /// Error message, set only on `FAILED`.
    pub error_message: Option<String>,
}

impl EvidenceEvent {
    /// Creates a new event in `QUEUED` for the given parent node.
    #[must_use]
    pub fn new(evidence_event_id: EvidenceEventId, parent_node_id: PatternNodeId) -> Self {
        Self {
            evidence_event_id,
            status: EvidenceStatus::Queued,
            parent_node_id,
            evidence_snapshot_id: None,
            decision_object_id: None,
            started_at: None,
            evidence_ready_at: None,
            decided_at: None,
            executed_at: None,
            measured_at: None,
            error_message: None,
        }
    }

    /// Validates and applies a bare status transition against
    /// [`TRANSITIONS`]. Internal: typed callers should use the `mark_*`
    /// methods below, which additionally enforce each transition's
    /// required payload.
    fn advance(&mut self, to: EvidenceStatus) -> Result<(), IllegalTransition> {
        let legal = TRANSITIONS.iter().any(|&(from, candidate)| from == self.status && candidate == to);
        if !legal {
            return Err(IllegalTransition {
                event_id: self.evidence_event_id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `QUEUED → RUNNING`. Stamps `started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if not currently `QUEUED`.
    pub fn mark_running(&mut self, now: OffsetDateTime) -> Result<(), IllegalTransition> {
        self.advance(EvidenceStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// `RUNNING → EVIDENCE_READY`. Requires the snapshot that was
    /// produced for this cycle.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if not currently `RUNNING`.
    pub fn mark_evidence_ready(
        &mut self,
        evidence_snapshot_id: EvidenceSnapshotId,
        now: OffsetDateTime,
    ) -> Result<(), IllegalTransition> {
        self.advance(EvidenceStatus::EvidenceReady)?;
        self.evidence_snapshot_id = Some(evidence_snapshot_id);
        self.evidence_ready_at = Some(now);
        Ok(())
    }

    /// `EVIDENCE_READY → DECIDED`. Requires the decision recorded for this
    /// cycle; its FK back to this event is the caller's responsibility to
    /// set atomically alongside this call.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if not currently `EVIDENCE_READY`.
    pub fn mark_decided(&mut self, decision_id: DecisionId, now: OffsetDateTime) -> Result<(), IllegalTransition> {
        self.advance(EvidenceStatus::Decided)?;
        self.decision_object_id = Some(decision_id);
        self.decided_at = Some(now);
        Ok(())
    }

    /// `DECIDED → EXECUTED`. Stamps `executed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if not currently `DECIDED`.
    pub fn mark_executed(&mut self, now: OffsetDateTime) -> Result<(), IllegalTransition> {
        self.advance(EvidenceStatus::Executed)?;
        self.executed_at = Some(now);
        Ok(())
    }

    /// `EXECUTED → MEASURED`. Stamps `measured_at`. Terminal.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if not currently `EXECUTED`.
    pub fn mark_measured(&mut self, now: OffsetDateTime) -> Result<(), IllegalTransition> {
        self.advance(EvidenceStatus::Measured)?;
        self.measured_at = Some(now);
        Ok(())
    }

    /// Any non-terminal status `→ FAILED`. Terminal.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if already `MEASURED` or `FAILED`.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), IllegalTransition> {
        self.advance(EvidenceStatus::Failed)?;
        self.error_message = Some(reason.into());
        Ok(())
    }

    /// Whether this event has reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EvidenceStatus::Measured | EvidenceStatus::Failed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    #[test]
    fn happy_path_walks_the_full_lifecycle() {
        let mut event = EvidenceEvent::new(EvidenceEventId::new("e1"), PatternNodeId::new("n1"));
        event.mark_running(now()).expect("queued -> running");
        event
            .mark_evidence_ready(EvidenceSnapshotId::new("s1"), now())
            .expect("running -> evidence_ready");
        event.mark_decided(DecisionId::new("d1"), now()).expect("evidence_ready -> decided");
        event.mark_executed(now()).expect("decided -> executed");
        event.mark_measured(now()).expect("executed -> measured");
        assert_eq!(event.status, EvidenceStatus::Measured);
        assert!(event.is_terminal());
    }

    #[test]
    fn skipping_a_state_is_rejected_and_leaves_status_untouched() {
        let mut event = EvidenceEvent::new(EvidenceEventId::new("e1"), PatternNodeId::new("n1"));
        let err = event.mark_decided(DecisionId::new("d1"), now()).expect_err("illegal");
        assert_eq!(err.from, EvidenceStatus::Queued);
        assert_eq!(err.to, EvidenceStatus::Decided);
        assert_eq!(event.status, EvidenceStatus::Queued);
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_status() {
        for status in [
            EvidenceStatus::Queued,
            EvidenceStatus::Running,
            EvidenceStatus::EvidenceReady,
            EvidenceStatus::Decided,
            EvidenceStatus::Executed,
        ] {
            let legal = TRANSITIONS.iter().any(|&(from, to)| from == status && to == EvidenceStatus::Failed);
            assert!(legal, "{status:?} should be able to fail");
        }
    }

    #[test]
    fn measured_and_failed_have_no_outgoing_transitions() {
        for status in [EvidenceStatus::Measured, EvidenceStatus::Failed] {
            assert!(!TRANSITIONS.iter().any(|&(from, _)| from == status));
        }
    }

    #[test]
    fn failing_twice_is_rejected() {
        let mut event = EvidenceEvent::new(EvidenceEventId::new("e1"), PatternNodeId::new("n1"));
        event.mark_failed("boom").expect("queued -> failed");
        let err = event.mark_failed("again").expect_err("already terminal");
        assert_eq!(err.from, EvidenceStatus::Failed);
    }
}

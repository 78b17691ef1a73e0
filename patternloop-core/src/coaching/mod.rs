// patternloop-core/src/coaching/mod.rs
// ============================================================================
// Module: Coaching Session Domain Model
// Description: Session assignment, intervention, and outcome shapes for the
//              real-time coaching session controller (§4.7), plus the pure
//              deterministic bucketing function that assigns a session to
//              the control / coached / holdout carve-out.
// Purpose: Give the runtime controller (in `patternloop-coach`) and the
//          persistence layer a shared, storage-agnostic vocabulary.
// Dependencies: crate::core::{SessionId, InterventionId, DirectorPackId,
//               PatternLibraryId}, sha2
// ============================================================================

//! ## Overview
//! A `CoachingSession` is assigned, once and deterministically, into one of
//! three buckets: `control` (10%, no coaching delivered), `coached` +
//! `holdout` (5%, coached but excluded from promotion statistics), and
//! plain `coached` (the remaining 85%). [`assign_session`] computes this
//! bucket from a hash of the session id alone, so the same id always
//! produces the same assignment without any stored state.

use sha2::Digest;
use sha2::Sha256;

use crate::core::DirectorPackId;
use crate::core::InterventionId;
use crate::core::PatternLibraryId;
use crate::core::SessionId;

/// The creative mode a [`CoachingSession`] runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingMode {
    /// Close imitation of the reference pattern.
    Homage,
    /// A guided mutation of the reference pattern.
    Mutation,
    /// A branded campaign built on the reference pattern.
    Campaign,
}

/// Control/holdout assignment for a [`CoachingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAssignment {
    /// Receives coaching interventions.
    Coached,
    /// No coaching is delivered; rule evaluations are still logged.
    Control,
}

/// Upper bound (exclusive) of the fraction hashed into [`SessionAssignment::Control`].
pub const CONTROL_FRACTION: f64 = 0.10;
/// Upper bound (exclusive) of the fraction hashed into the coached holdout carve-out.
pub const HOLDOUT_FRACTION: f64 = 0.05;

/// The outcome of hashing a session id into its experiment bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBucket {
    /// Control or coached.
    pub assignment: SessionAssignment,
    /// Whether a coached session is additionally excluded from promotion statistics.
    pub holdout_group: bool,
}

/// Deterministically hashes `session_id` into [0, 1) and buckets it into
/// control (first 10%), coached+holdout (next 5%), or plain coached
/// (remaining 85%).
///
/// The same `session_id` always returns the same bucket: the hash is a pure
/// function of the id, with no random or time-dependent input.
#[must_use]
pub fn assign_session(session_id: &SessionId) -> SessionBucket {
    let unit = hash_to_unit_interval(session_id.as_str());
    if unit < CONTROL_FRACTION {
        SessionBucket { assignment: SessionAssignment::Control, holdout_group: false }
    } else if unit < CONTROL_FRACTION + HOLDOUT_FRACTION {
        SessionBucket { assignment: SessionAssignment::Coached, holdout_group: true }
    } else {
        SessionBucket { assignment: SessionAssignment::Coached, holdout_group: false }
    }
}

/// Hashes `value` with SHA-256 and maps the leading 8 bytes onto `[0, 1)`.
fn hash_to_unit_interval(value: &str) -> f64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut buf = [0_u8; 8];
    buf.copy_from_slice(&digest[0..8]);
    let as_u64 = u64::from_be_bytes(buf);
    // u64::MAX + 1 as f64 loses no precision relevant to bucketing at this
    // granularity; the quotient lands strictly inside [0, 1).
    (as_u64 as f64) / (u64::MAX as f64 + 1.0)
}

/// A single live or completed coaching run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoachingSession {
    /// Session identifier.
    pub session_id: SessionId,
    /// Salted hash of the creator's user id.
    pub user_id_hash: String,
    /// Coaching mode.
    pub mode: CoachingMode,
    /// The pattern this session is coaching toward.
    pub pattern_id: PatternLibraryId,
    /// Content hash of the `DirectorPack` served to this session.
    pub pack_hash: String,
    /// `DirectorPack` this session is bound to.
    pub director_pack_id: DirectorPackId,
    /// Control/holdout assignment.
    pub assignment: SessionAssignment,
    /// Whether this session is excluded from coaching for measurement.
    pub holdout_group: bool,
}

impl CoachingSession {
    /// Starts a new session, computing its experiment bucket from `session_id`.
    #[must_use]
    pub fn start(
        session_id: SessionId,
        user_id_hash: String,
        mode: CoachingMode,
        pattern_id: PatternLibraryId,
        pack_hash: String,
        director_pack_id: DirectorPackId,
    ) -> Self {
        let bucket = assign_session(&session_id);
        Self {
            session_id,
            user_id_hash,
            mode,
            pattern_id,
            pack_hash,
            director_pack_id,
            assignment: bucket.assignment,
            holdout_group: bucket.holdout_group,
        }
    }

    /// Whether this session should receive delivered coach lines.
    #[must_use]
    pub fn is_coached(&self) -> bool {
        self.assignment == SessionAssignment::Coached
    }
}

/// A rule violation surfaced to the session's client.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoachingIntervention {
    /// Intervention identifier.
    pub intervention_id: InterventionId,
    /// Owning session.
    pub session_id: SessionId,
    /// The `DnaInvariant::rule_id` that failed.
    pub rule_id: String,
    /// The rule evaluator's compliance confidence at fire time.
    pub confidence: f64,
    /// Elapsed session time, in milliseconds, when the rule fired.
    pub elapsed_ms: u64,
    /// Rendered coach-line message sent to the client.
    pub message: String,
}

/// Whether a creator complied with an intervention's rule on re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compliance {
    /// The rule passed on re-evaluation within the observation window.
    Complied,
    /// The rule still failed on re-evaluation within the observation window.
    Violated,
    /// No re-evaluation occurred before the observation window closed.
    Unknown,
}

/// The resolved outcome of a single [`CoachingIntervention`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoachingOutcome {
    /// The intervention this outcome resolves.
    pub intervention_id: InterventionId,
    /// Compliance determination.
    pub compliance: Compliance,
    /// Seconds from intervention to the resolving (or window-closing) re-evaluation.
    pub latency_sec: f64,
    /// Reason the outcome is `unknown`, when applicable.
    pub reason: Option<String>,
}

/// Terminal record written when a session ends, whether by normal
/// completion or client-initiated cancellation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoachingUploadOutcome {
    /// The session this outcome closes.
    pub session_id: SessionId,
    /// Whether the session produced a published upload.
    pub uploaded: bool,
    /// Total interventions fired during the session.
    pub intervention_count: u32,
    /// Total frames evaluated during the session.
    pub frames_evaluated: u64,
    /// `true` when the session ended via client cancellation rather than a
    /// normal finish.
    pub cancelled: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    #[test]
    fn same_session_id_always_buckets_the_same_way() {
        let id = SessionId::new("sess_abcdef");
        let first = assign_session(&id);
        let second = assign_session(&id);
        assert_eq!(first, second);
    }

    #[test]
    fn thousand_sessions_land_near_the_declared_splits() {
        let mut control = 0;
        let mut holdout = 0;
        let mut coached = 0;
        for i in 0..1000 {
            let id = SessionId::new(format!("sess_{i}"));
            let bucket = assign_session(&id);
            match (bucket.assignment, bucket.holdout_group) {
                (SessionAssignment::Control, _) => control += 1,
                (SessionAssignment::Coached, true) => holdout += 1,
                (SessionAssignment::Coached, false) => coached += 1,
            }
        }
        assert!((70..=130).contains(&control), "control count {control} out of range");
        assert!((30..=70).contains(&holdout), "holdout count {holdout} out of range");
        assert!((800..=900).contains(&coached), "coached count {coached} out of range");
    }

    #[test]
    fn session_is_coached_iff_not_control() {
        let session = CoachingSession::start(
            SessionId::new("sess_1"),
            "hash".to_string(),
            CoachingMode::Homage,
            PatternLibraryId::new("pattern_1"),
            "pack_hash".to_string(),
            DirectorPackId::new("pack_1"),
        );
        assert_eq!(session.is_coached(), session.assignment == SessionAssignment::Coached);
    }
}

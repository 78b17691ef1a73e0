// patternloop-core/src/director_pack/mod.rs
// ============================================================================
// Module: DirectorPack and the Evidence-Guided Pack Updater
// Description: The coaching runtime contract (invariants, mutation slots,
//              checkpoints) and the pure function that evolves it from an
//              EvidenceSnapshot.
// Purpose: Let accumulated evidence escalate or relax DNA invariant
//          enforcement without ever mutating the pack in place.
// Dependencies: crate::core::DirectorPackId, crate::evidence_loop::EvidenceSnapshot
// ============================================================================

//! ## Overview
//! [`update_pack`] never mutates its input: it returns a new
//! [`DirectorPack`] plus the list of [`PackDiff`]s that changed, so the
//! producing `Run` can persist both the new pack and an auditable record
//! of what moved and why.

use serde::Deserialize;
use serde::Serialize;

use crate::core::DirectorPackId;
use crate::evidence_loop::EvidenceSnapshot;

/// Escalation level of a [`DnaInvariant`]'s enforcement priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Violations are logged only.
    Low,
    /// Violations trigger a coaching intervention.
    Medium,
    /// Violations trigger an intervention and are weighted in review.
    High,
    /// Violations block upload without manual override.
    Critical,
}

impl Priority {
    fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }
}

/// The measurement domain a [`DnaInvariant`] belongs to, used to decide
/// which rules are eligible for per-frame (as opposed to checkpoint-only)
/// evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantDomain {
    /// Framing, crop, and on-screen layout rules.
    Composition,
    /// Content-safety rules.
    Safety,
    /// Rules measured from the audio track.
    Audio,
    /// Rules measured from script/caption text or pacing.
    Narrative,
}

/// A single rule a `DirectorPack` enforces during coaching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnaInvariant {
    /// Identifier matched against `EvidenceSnapshot.depth1_summary` keys.
    pub rule_id: String,
    /// The measurement domain this rule belongs to.
    pub domain: InvariantDomain,
    /// The measurement this rule reduces to, e.g. `"visual_face_area_ratio"`.
    pub metric_id: String,
    /// Enforcement priority.
    pub priority: Priority,
    /// Relative weight in scoring/review, capped at [`MAX_WEIGHT`].
    pub weight: f64,
}

impl DnaInvariant {
    /// Whether this rule is eligible for per-frame (1Hz) evaluation: only
    /// `composition`/`safety` rules, or any rule whose `metric_id` itself
    /// indicates a visual measurement, run on every tick. Other domains
    /// (audio, narrative) are checkpoint-only.
    #[must_use]
    pub fn is_visual_per_frame(&self) -> bool {
        matches!(self.domain, InvariantDomain::Composition | InvariantDomain::Safety)
            || self.metric_id.starts_with("visual_")
    }
}

/// Cap on [`DnaInvariant::weight`] after repeated promotion.
pub const MAX_WEIGHT: f64 = 2.0;
/// Weight multiplier applied when a rule's success rate is high.
pub const PROMOTION_MULTIPLIER: f64 = 1.2;
/// Success-rate threshold below which a rule's priority escalates.
pub const ESCALATION_THRESHOLD: f64 = 0.4;
/// Success-rate threshold at or above which a rule's weight is promoted.
pub const PROMOTION_THRESHOLD: f64 = 0.9;

/// The coaching runtime contract for one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorPack {
    /// Pack identifier.
    pub director_pack_id: DirectorPackId,
    /// The invariants this pack enforces.
    pub dna_invariants: Vec<DnaInvariant>,
    /// Named mutation slots available to the coaching session.
    pub mutation_slots: Vec<String>,
    /// Mutations that must never be suggested.
    pub forbidden_mutations: Vec<String>,
    /// Time-triggered checkpoint labels, in seconds from session start.
    pub checkpoints: Vec<u32>,
    /// Coach-line message templates, keyed by `rule_id`.
    pub coach_line_templates: Vec<(String, String)>,
    /// Opaque runtime contract payload passed through to the client.
    pub runtime_contract: serde_json::Value,
}

/// A single field change produced by [`update_pack`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackDiff {
    /// The rule that changed.
    pub rule_id: String,
    /// The field that changed (`"priority"` or `"weight"`).
    pub field: String,
    /// The field's previous value, stringified.
    pub old: String,
    /// The field's new value, stringified.
    pub new: String,
}

/// Evolves `pack` against `snapshot`'s per-rule success rates, returning a
/// new pack and the diffs that changed. The input pack is never mutated.
#[must_use]
pub fn update_pack(pack: &DirectorPack, snapshot: &EvidenceSnapshot) -> (DirectorPack, Vec<PackDiff>) {
    let mut diffs = Vec::new();
    let mut new_invariants = Vec::with_capacity(pack.dna_invariants.len());

    for invariant in &pack.dna_invariants {
        let mut updated = invariant.clone();

        if let Some(success_rate) = matching_success_rate(snapshot, &invariant.rule_id) {
            if success_rate < ESCALATION_THRESHOLD {
                let escalated = invariant.priority.escalate();
                if escalated != invariant.priority {
                    diffs.push(PackDiff {
                        rule_id: invariant.rule_id.clone(),
                        field: "priority".to_string(),
                        old: format!("{:?}", invariant.priority),
                        new: format!("{escalated:?}"),
                    });
                    updated.priority = escalated;
                }
            } else if success_rate >= PROMOTION_THRESHOLD {
                let promoted = (invariant.weight * PROMOTION_MULTIPLIER).min(MAX_WEIGHT);
                if (promoted - invariant.weight).abs() > f64::EPSILON {
                    diffs.push(PackDiff {
                        rule_id: invariant.rule_id.clone(),
                        field: "weight".to_string(),
                        old: format!("{:.3}", invariant.weight),
                        new: format!("{promoted:.3}"),
                    });
                    updated.weight = promoted;
                }
            }
        }

        new_invariants.push(updated);
    }

    let new_pack = DirectorPack {
        dna_invariants: new_invariants,
        ..pack.clone()
    };

    (new_pack, diffs)
}

fn matching_success_rate(snapshot: &EvidenceSnapshot, rule_id: &str) -> Option<f64> {
    snapshot
        .depth1_summary
        .iter()
        .find(|entry| entry.pattern == rule_id || entry.mutation_type == rule_id)
        .map(|entry| entry.success_rate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;
    use crate::core::EvidenceSnapshotId;
    use crate::evidence_loop::Depth1Entry;

    fn pack_with_rule(rule_id: &str, priority: Priority, weight: f64) -> DirectorPack {
        DirectorPack {
            director_pack_id: DirectorPackId::new("pack_1"),
            dna_invariants: vec![DnaInvariant {
                rule_id: rule_id.to_string(),
                domain: InvariantDomain::Composition,
                metric_id: format!("visual_{rule_id}"),
                priority,
                weight,
            }],
            mutation_slots: vec![],
            forbidden_mutations: vec![],
            checkpoints: vec![],
            coach_line_templates: vec![],
            runtime_contract: serde_json::json!({}),
        }
    }

    fn snapshot_with_rate(rule_id: &str, success_rate: f64) -> EvidenceSnapshot {
        EvidenceSnapshot {
            evidence_snapshot_id: EvidenceSnapshotId::new("s1"),
            period: "2026-W30".to_string(),
            depth1_summary: vec![Depth1Entry {
                mutation_type: "generic".to_string(),
                pattern: rule_id.to_string(),
                success_rate,
                sample_count: 10,
            }],
            top_mutation_type: None,
            top_mutation_pattern: None,
            top_mutation_rate: None,
            sample_count: 10,
            confidence: 0.8,
        }
    }

    #[test]
    fn low_success_rate_escalates_priority_one_level() {
        let pack = pack_with_rule("no_text_overlay", Priority::Low, 1.0);
        let snapshot = snapshot_with_rate("no_text_overlay", 0.2);
        let (updated, diffs) = update_pack(&pack, &snapshot);
        assert_eq!(updated.dna_invariants[0].priority, Priority::Medium);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "priority");
    }

    #[test]
    fn high_success_rate_promotes_weight_capped_at_two() {
        let pack = pack_with_rule("hook_timing", Priority::Medium, 1.9);
        let snapshot = snapshot_with_rate("hook_timing", 0.95);
        let (updated, diffs) = update_pack(&pack, &snapshot);
        assert!((updated.dna_invariants[0].weight - MAX_WEIGHT).abs() < 1e-9);
        assert_eq!(diffs[0].field, "weight");
    }

    #[test]
    fn critical_priority_does_not_escalate_further() {
        let pack = pack_with_rule("safety", Priority::Critical, 1.0);
        let snapshot = snapshot_with_rate("safety", 0.1);
        let (updated, diffs) = update_pack(&pack, &snapshot);
        assert_eq!(updated.dna_invariants[0].priority, Priority::Critical);
        assert!(diffs.is_empty());
    }

    #[test]
    fn rules_without_evidence_carry_through_unchanged() {
        let pack = pack_with_rule("untested_rule", Priority::Low, 1.0);
        let snapshot = snapshot_with_rate("some_other_rule", 0.1);
        let (updated, diffs) = update_pack(&pack, &snapshot);
        assert_eq!(updated.dna_invariants[0].priority, Priority::Low);
        assert!(diffs.is_empty());
    }

    #[test]
    fn input_pack_is_never_mutated() {
        let pack = pack_with_rule("hook_timing", Priority::Low, 1.0);
        let snapshot = snapshot_with_rate("hook_timing", 0.1);
        let _ = update_pack(&pack, &snapshot);
        assert_eq!(pack.dna_invariants[0].priority, Priority::Low);
    }
}

// patternloop-core/src/cluster/mod.rs
// ============================================================================
// Module: Pattern Clustering Engine
// Description: Weighted multi-dimensional similarity scoring and cluster
//              assignment over NormalizedDna, plus recurrence-link
//              promotion between clusters.
// Purpose: Group analyzed videos into PatternClusters and track when a
//          cluster's features recur against an older, ancestor cluster.
// Dependencies: crate::core::ClusterId, crate::vdg::NormalizedDna, time
// ============================================================================

//! ## Overview
//! Clustering is deterministic given the same normalized inputs in the
//! same order: candidates are prefiltered to the same [`crate::vdg::PatternType`],
//! scored against every existing cluster of that type with
//! [`similarity`], and assigned to the highest scorer above
//! [`ASSIGNMENT_THRESHOLD`] — ties broken by larger `member_count`, then
//! older `created_at`. A normalizer failure on one node is the caller's
//! concern (§4.3): this module only ever scores and assigns nodes it is
//! given.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::ClusterId;
use crate::vdg::NormalizedDna;
use crate::vdg::PatternType;

/// Similarity score threshold for assigning a node to an existing cluster.
pub const ASSIGNMENT_THRESHOLD: f64 = 0.72;

/// Feature-similarity thresholds gating a `candidate` recurrence link.
pub const RECURRENCE_MICROBEAT_THRESHOLD: f64 = 0.7;
/// See [`RECURRENCE_MICROBEAT_THRESHOLD`].
pub const RECURRENCE_HOOK_THRESHOLD: f64 = 0.7;
/// See [`RECURRENCE_MICROBEAT_THRESHOLD`].
pub const RECURRENCE_AUDIO_THRESHOLD: f64 = 0.5;
/// Evidence count at which a `candidate` recurrence link is `confirmed`.
pub const RECURRENCE_CONFIRM_EVIDENCE_COUNT: u32 = 3;

/// Per-dimension weights used by [`similarity`]. Sums to `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    /// Weight of the hook-comparison term.
    pub hook: f64,
    /// Weight of the microbeat-sequence term.
    pub microbeat: f64,
    /// Weight of the visual-pattern term.
    pub visual: f64,
    /// Weight of the audio-flags term.
    pub audio: f64,
    /// Weight of the pattern-type term.
    pub pattern_type: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            hook: 0.30,
            microbeat: 0.30,
            visual: 0.15,
            audio: 0.10,
            pattern_type: 0.15,
        }
    }
}

/// A group of recurring, feature-similar videos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCluster {
    /// Cluster identifier.
    pub cluster_id: ClusterId,
    /// Human-readable name, assigned when the cluster is created.
    pub cluster_name: String,
    /// Dominant pattern type shared by members.
    pub pattern_type: PatternType,
    /// Number of nodes assigned to this cluster.
    pub member_count: u32,
    /// Average outlier score across members.
    pub avg_outlier_score: f64,
    /// The cluster this one was split from, if any; reflexive for roots.
    pub ancestor_cluster_id: ClusterId,
    /// The root cluster of this lineage; reflexive for roots.
    pub origin_cluster_id: ClusterId,
    /// Aggregate recurrence score across confirmed recurrence links.
    pub recurrence_score: f64,
    /// Count of confirmed recurrence links into this cluster.
    pub recurrence_count: u32,
    /// Timestamp of the most recent confirmed recurrence.
    pub last_recurrence_at: Option<OffsetDateTime>,
    /// When this cluster was created.
    pub created_at: OffsetDateTime,
    /// Representative normalized DNA used for subsequent similarity scoring.
    pub representative_dna: NormalizedDna,
}

/// Lifecycle status of a [`PatternRecurrenceLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceStatus {
    /// Thresholds were met but evidence is not yet sufficient.
    Candidate,
    /// Evidence count reached [`RECURRENCE_CONFIRM_EVIDENCE_COUNT`].
    Confirmed,
    /// Rejected by explicit curator action.
    Rejected,
}

/// Per-feature similarity breakdown backing a recurrence link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecurrenceFeatureSimilarity {
    /// Microbeat-sequence similarity.
    pub microbeat_sim: f64,
    /// Hook-genome similarity.
    pub hook_genome_sim: f64,
    /// Focus-window similarity (not computed by this module; carried
    /// through from the VDG payload by the caller).
    pub focus_window_sim: f64,
    /// Audio-format similarity.
    pub audio_format_sim: f64,
    /// Comment-signature similarity (caller-supplied).
    pub comment_signature_sim: f64,
    /// Product-slot similarity (caller-supplied).
    pub product_slot_sim: f64,
}

/// A directional recurrence relationship between a newer cluster and an
/// older ancestor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecurrenceLink {
    /// The newer cluster.
    pub cluster_id_current: ClusterId,
    /// The older cluster it recurs against.
    pub cluster_id_ancestor: ClusterId,
    /// Lifecycle status.
    pub status: RecurrenceStatus,
    /// Feature-similarity breakdown.
    pub features: RecurrenceFeatureSimilarity,
    /// Aggregate recurrence score.
    pub recurrence_score: f64,
    /// Number of evidence observations supporting this link.
    pub evidence_count: u32,
    /// First time this link's thresholds were met.
    pub first_seen_at: OffsetDateTime,
    /// Most recent time this link's thresholds were met.
    pub last_seen_at: OffsetDateTime,
}

/// Outcome of scoring a node against the existing cluster set.
#[derive(Debug, Clone)]
pub enum ClusterAssignment {
    /// Assigned to an existing cluster at the given similarity score.
    Existing {
        /// The cluster assigned to.
        cluster_id: ClusterId,
        /// The winning similarity score.
        score: f64,
    },
    /// No existing cluster scored high enough; a new cluster is needed,
    /// with `origin_cluster_id` set to the new cluster's own id.
    NewCluster,
}

/// Computes the weighted similarity between two normalized DNA records.
///
/// The result is in `[0, 1]` whenever `weights` sums to `1.0` (callers
/// should use [`SimilarityWeights::default`] unless deliberately
/// overriding per-dimension weights for experimentation).
#[must_use]
pub fn similarity(a: &NormalizedDna, b: &NormalizedDna, weights: SimilarityWeights) -> f64 {
    if is_empty_dna(a) && is_empty_dna(b) {
        return 0.5;
    }

    weights.hook * hook_similarity(a, b)
        + weights.microbeat * microbeat_similarity(&a.microbeat_sequence, &b.microbeat_sequence)
        + weights.visual * jaccard_similarity(&a.visual_patterns, &b.visual_patterns)
        + weights.audio * audio_similarity(a, b)
        + weights.pattern_type * f64::from(u8::from(a.pattern_type == b.pattern_type))
}

/// A DNA record with no extractable signal at all. Comparing two such
/// records is treated as a neutral 0.5 rather than a spurious perfect
/// match, since "nothing vs. nothing" carries no evidence of recurrence.
fn is_empty_dna(dna: &NormalizedDna) -> bool {
    dna.hook.hook_type == crate::vdg::HookType::Unknown
        && dna.hook.duration_sec == 0.0
        && dna.microbeat_sequence.is_empty()
        && dna.visual_patterns.is_empty()
        && !dna.audio_flags.is_trending
        && dna.audio_flags.dominant_stems.is_empty()
}

fn hook_similarity(a: &NormalizedDna, b: &NormalizedDna) -> f64 {
    if a.hook.hook_type != b.hook.hook_type {
        return 0.3;
    }
    if (a.hook.duration_sec - b.hook.duration_sec).abs() < 1.0 {
        1.0
    } else {
        0.6
    }
}

fn audio_similarity(a: &NormalizedDna, b: &NormalizedDna) -> f64 {
    if a.audio_flags.is_trending == b.audio_flags.is_trending {
        1.0
    } else {
        0.5
    }
}

/// `1 - normalized Levenshtein distance` over `role:cue` microbeat tokens.
#[must_use]
pub fn microbeat_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        1.0
    } else {
        1.0 - (distance as f64 / max_len as f64)
    }
}

/// Classic Wagner-Fischer edit distance over a generic token slice.
fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (m, n) = (a.len(), b.len());
    let mut row: Vec<usize> = (0..=n).collect();

    for i in 1..=m {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=n {
            let temp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j - 1])
            };
            prev_diag = temp;
        }
    }
    row[n]
}

/// Jaccard similarity over two token sets (camera-move tokens).
#[must_use]
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;

    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Scores a node's normalized DNA against every candidate cluster of the
/// same `pattern_type` and returns the assignment decision.
///
/// Ties are broken by larger `member_count`, then older `created_at`, per
/// the assignment rule.
#[must_use]
pub fn assign(dna: &NormalizedDna, candidates: &[PatternCluster], weights: SimilarityWeights) -> ClusterAssignment {
    let mut best: Option<(&PatternCluster, f64)> = None;

    for cluster in candidates.iter().filter(|c| c.pattern_type == dna.pattern_type) {
        let score = similarity(dna, &cluster.representative_dna, weights);
        if score < ASSIGNMENT_THRESHOLD {
            continue;
        }
        best = match best {
            None => Some((cluster, score)),
            Some((current_best, current_score)) => {
                if is_better_candidate(cluster, score, current_best, current_score) {
                    Some((cluster, score))
                } else {
                    Some((current_best, current_score))
                }
            }
        };
    }

    match best {
        Some((cluster, score)) => ClusterAssignment::Existing {
            cluster_id: cluster.cluster_id.clone(),
            score,
        },
        None => ClusterAssignment::NewCluster,
    }
}

fn is_better_candidate(
    candidate: &PatternCluster,
    candidate_score: f64,
    current_best: &PatternCluster,
    current_best_score: f64,
) -> bool {
    if candidate_score != current_best_score {
        return candidate_score > current_best_score;
    }
    if candidate.member_count != current_best.member_count {
        return candidate.member_count > current_best.member_count;
    }
    candidate.created_at < current_best.created_at
}

/// Evaluates whether a new cluster's feature similarity against an older
/// cluster crosses the recurrence-link thresholds.
#[must_use]
pub fn evaluate_recurrence(features: RecurrenceFeatureSimilarity) -> bool {
    features.microbeat_sim >= RECURRENCE_MICROBEAT_THRESHOLD
        && features.hook_genome_sim >= RECURRENCE_HOOK_THRESHOLD
        && features.audio_format_sim >= RECURRENCE_AUDIO_THRESHOLD
}

/// Promotes a `candidate` recurrence link to `confirmed` once its
/// evidence count reaches [`RECURRENCE_CONFIRM_EVIDENCE_COUNT`].
pub fn maybe_confirm(link: &mut PatternRecurrenceLink) {
    if link.status == RecurrenceStatus::Candidate && link.evidence_count >= RECURRENCE_CONFIRM_EVIDENCE_COUNT {
        link.status = RecurrenceStatus::Confirmed;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;
    use crate::vdg::AudioFlags;
    use crate::vdg::Hook;
    use crate::vdg::HookType;

    fn dna(hook_type: HookType, duration: f64, microbeats: &[&str], visuals: &[&str], trending: bool) -> NormalizedDna {
        NormalizedDna {
            hook: Hook {
                hook_type,
                duration_sec: duration,
                delivery: "x".to_string(),
            },
            microbeat_sequence: microbeats.iter().map(|s| (*s).to_string()).collect(),
            visual_patterns: visuals.iter().map(|s| (*s).to_string()).collect(),
            audio_flags: AudioFlags {
                is_trending: trending,
                dominant_stems: vec![],
            },
            pattern_type: PatternType::Semantic,
        }
    }

    #[test]
    fn identical_dna_scores_maximum_similarity() {
        let a = dna(HookType::Text, 2.0, &["setup:q", "payoff:a"], &["pan"], true);
        let b = a.clone();
        assert!((similarity(&a, &b, SimilarityWeights::default()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn microbeat_similarity_is_one_minus_normalized_levenshtein() {
        let a = vec!["setup:q".to_string(), "payoff:a".to_string()];
        let b = vec!["setup:q".to_string()];
        assert!((microbeat_similarity(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn jaccard_similarity_of_disjoint_sets_is_zero() {
        let a = vec!["pan".to_string()];
        let b = vec!["zoom".to_string()];
        assert!((jaccard_similarity(&a, &b) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn weights_sum_to_one() {
        let w = SimilarityWeights::default();
        let total = w.hook + w.microbeat + w.visual + w.audio + w.pattern_type;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_of_two_empty_dna_records_is_neutral_not_a_perfect_match() {
        let empty = dna(HookType::Unknown, 0.0, &[], &[], false);
        assert!((similarity(&empty, &empty, SimilarityWeights::default()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tie_break_prefers_larger_member_count_then_older_cluster() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp");
        let older = now - time::Duration::days(1);
        let shared_dna = dna(HookType::Text, 2.0, &["setup:q"], &["pan"], true);

        let small_old = PatternCluster {
            cluster_id: ClusterId::new("c_small_old"),
            cluster_name: "a".to_string(),
            pattern_type: PatternType::Semantic,
            member_count: 2,
            avg_outlier_score: 0.0,
            ancestor_cluster_id: ClusterId::new("c_small_old"),
            origin_cluster_id: ClusterId::new("c_small_old"),
            recurrence_score: 0.0,
            recurrence_count: 0,
            last_recurrence_at: None,
            created_at: older,
            representative_dna: shared_dna.clone(),
        };
        let large_new = PatternCluster {
            cluster_id: ClusterId::new("c_large_new"),
            member_count: 5,
            created_at: now,
            ..small_old.clone()
        };

        match assign(&shared_dna, &[small_old, large_new], SimilarityWeights::default()) {
            ClusterAssignment::Existing { cluster_id, .. } => {
                assert_eq!(cluster_id, ClusterId::new("c_large_new"));
            }
            ClusterAssignment::NewCluster => panic!("expected an existing-cluster assignment"),
        }
    }

    #[test]
    fn recurrence_link_confirms_once_evidence_count_reaches_threshold() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp");
        let mut link = PatternRecurrenceLink {
            cluster_id_current: ClusterId::new("c1"),
            cluster_id_ancestor: ClusterId::new("c0"),
            status: RecurrenceStatus::Candidate,
            features: RecurrenceFeatureSimilarity {
                microbeat_sim: 0.8,
                hook_genome_sim: 0.8,
                focus_window_sim: 0.0,
                audio_format_sim: 0.6,
                comment_signature_sim: 0.0,
                product_slot_sim: 0.0,
            },
            recurrence_score: 0.8,
            evidence_count: 2,
            first_seen_at: now,
            last_seen_at: now,
        };

        maybe_confirm(&mut link);
        assert_eq!(link.status, RecurrenceStatus::Candidate);

        link.evidence_count = 3;
        maybe_confirm(&mut link);
        assert_eq!(link.status, RecurrenceStatus::Confirmed);
    }
}

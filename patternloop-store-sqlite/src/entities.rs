// patternloop-store-sqlite/src/entities.rs
// ============================================================================
// Module: Persisted Entity Shapes
// Description: Row shapes for entities the domain library leaves as
//              persistence concerns — candidate intake, pattern tree
//              nodes, crystallized pattern revisions, coaching sessions,
//              and the Bayesian/Free-Energy supplemental state.
// Purpose: Give the store crate concrete, serializable types for the
//          parts of the data model that are metadata records rather
//          than algorithmic state.
// Dependencies: patternloop_core identifiers, serde, time
// ============================================================================

//! ## Overview
//! `patternloop-core` models the entities with runtime invariants and
//! scoring logic (`Run`, `Artifact`, `EvidenceEvent`, `PatternCluster`,
//! ...) directly. The remaining entities from the data model are largely
//! descriptive records with no algorithm attached; they live here, next
//! to the store that is their only consumer.

use patternloop_core::ClusterId;
use patternloop_core::CoachingIntervention as CoreCoachingIntervention;
use patternloop_core::CoachingOutcome as CoreCoachingOutcome;
use patternloop_core::CoachingSession as CoreCoachingSession;
use patternloop_core::CoachingUploadOutcome as CoreCoachingUploadOutcome;
use patternloop_core::OutlierItemId;
use patternloop_core::PatternLibraryId;
use patternloop_core::PatternNodeId;
use patternloop_core::scoring::bayesian::BayesianPrior as CoreBayesianPrior;
use patternloop_core::scoring::bayesian::PredictionOutcome;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// Outlier-tier classification assigned to a crawled candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutlierTier {
    /// Top-tier candidate.
    S,
    /// Strong candidate.
    A,
    /// Marginal candidate.
    B,
    /// Weak candidate, analyzed only if capacity allows.
    C,
}

/// Analysis pipeline status of an [`OutlierItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Not yet submitted to the vision LLM.
    Pending,
    /// Curator-approved for analysis.
    Approved,
    /// Vision LLM analysis in flight.
    Analyzing,
    /// Vision LLM analysis complete.
    Completed,
    /// Comments were requested and are awaiting review.
    CommentsPendingReview,
    /// Comment fetch failed.
    CommentsFailed,
    /// Comments fetched and ready for scoring.
    CommentsReady,
    /// Skipped by curation rules.
    Skipped,
}

/// Curation status of an [`OutlierItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierStatus {
    /// Awaiting curation.
    Pending,
    /// Selected for analysis.
    Selected,
    /// Rejected by a curation rule or a curator.
    Rejected,
    /// Promoted to a `PatternNode`.
    Promoted,
}

/// A crawled short-form video candidate, keyed by `(platform, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierItem {
    /// Item identifier.
    pub outlier_item_id: OutlierItemId,
    /// Source platform, lowercased and alias-resolved.
    pub platform: String,
    /// Platform-native identifier.
    pub external_id: String,
    /// Canonicalized video URL.
    pub video_url: String,
    /// Raw view count at crawl time.
    pub views: u64,
    /// Raw like count at crawl time.
    pub likes: u64,
    /// Raw share count at crawl time.
    pub shares: u64,
    /// Top-N comment bodies captured at crawl time.
    pub comments_top_n: Vec<String>,
    /// Views-per-hour-since-publish growth rate.
    pub growth_rate: f64,
    /// Computed outlier score.
    pub outlier_score: f64,
    /// Outlier tier bucket.
    pub outlier_tier: OutlierTier,
    /// Analysis pipeline status.
    pub analysis_status: AnalysisStatus,
    /// Curation status.
    pub status: OutlierStatus,
    /// The `PatternNode` this item was promoted to, once promoted.
    pub promoted_to_node_id: Option<PatternNodeId>,
    /// When this candidate was first crawled.
    pub created_at: OffsetDateTime,
}

/// Tree layer of a [`PatternNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternLayer {
    /// A root node promoted directly from an `OutlierItem`.
    Master,
    /// A direct mutation of a master node.
    Fork,
    /// A mutation of a fork.
    ForkOfFork,
}

/// A node in the pattern genealogy tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternNode {
    /// Node identifier.
    pub node_id: PatternNodeId,
    /// Tree layer.
    pub layer: PatternLayer,
    /// Parent node, `None` for `Master` nodes.
    pub parent_node_id: Option<PatternNodeId>,
    /// Depth in the genealogy tree; `parent.depth + 1`.
    pub genealogy_depth: u32,
    /// The vision LLM's structured analysis for this node.
    pub gemini_analysis: serde_json::Value,
    /// Cumulative view count across this node's uploads.
    pub view_count: u64,
    /// Number of direct forks of this node.
    pub total_fork_count: u32,
    /// Cumulative royalty attributed to this node's lineage.
    pub total_royalty_earned: f64,
    /// Whether this node has an associated published upload.
    pub is_published: bool,
    /// When this node was created.
    pub created_at: OffsetDateTime,
}

/// Temporal phase of a crystallized [`PatternLibrary`] revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalPhase {
    /// Earliest, most volatile phase.
    T0,
    /// Early validation phase.
    T1,
    /// Mid-life phase.
    T2,
    /// Maturity phase.
    T3,
    /// Decline phase.
    T4,
}

/// A crystallized, append-only revision of a pattern's playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternLibrary {
    /// Revision identifier.
    pub pattern_id: PatternLibraryId,
    /// The cluster this revision crystallizes.
    pub cluster_id: ClusterId,
    /// Temporal phase this revision applies to.
    pub temporal_phase: TemporalPhase,
    /// Rules a mutation must not violate.
    pub invariant_rules: Vec<String>,
    /// Strategy label guiding future mutation generation.
    pub mutation_strategy: String,
    /// Monotonically increasing revision number.
    pub revision: u32,
    /// The revision this one supersedes, if any.
    pub previous_revision_id: Option<PatternLibraryId>,
    /// Confidence in this revision's guidance.
    pub confidence_score: f64,
    /// Sample count backing this revision.
    pub sample_count: u32,
    /// When this revision was crystallized.
    pub created_at: OffsetDateTime,
}

/// Durable row wrapper around [`CoreCoachingSession`], adding the
/// persistence-only `started_at` stamp the live controller has no reason
/// to track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingSessionRecord {
    /// The live session shape, owned by `patternloop-core`.
    pub session: CoreCoachingSession,
    /// When this session started.
    pub started_at: OffsetDateTime,
}

/// Durable row wrapper around [`CoreCoachingIntervention`], adding the
/// server-assigned timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingInterventionRecord {
    /// The intervention shape, owned by `patternloop-core`.
    pub intervention: CoreCoachingIntervention,
    /// When this intervention was recorded.
    pub recorded_at: OffsetDateTime,
}

/// Durable row wrapper around [`CoreCoachingOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingOutcomeRecord {
    /// The outcome shape, owned by `patternloop-core`.
    pub outcome: CoreCoachingOutcome,
    /// When this outcome was recorded.
    pub recorded_at: OffsetDateTime,
}

/// Durable row wrapper around [`CoreCoachingUploadOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingUploadOutcomeRecord {
    /// The upload-outcome shape, owned by `patternloop-core`.
    pub outcome: CoreCoachingUploadOutcome,
    /// When the session closed.
    pub closed_at: OffsetDateTime,
}

/// Durable wrapper around [`CoreBayesianPrior`] for one pattern, carrying
/// the identity and freshness metadata the in-memory updater has no
/// reason to track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBayesianPrior {
    /// The pattern this prior tracks.
    pub pattern_id: PatternLibraryId,
    /// The running `p_success`/`sample_count` belief.
    pub prior: CoreBayesianPrior,
    /// When this prior was last updated.
    pub last_updated: OffsetDateTime,
}

impl StoredBayesianPrior {
    /// Creates a fresh, uninformative prior for `pattern_id`.
    #[must_use]
    pub fn uninformative(pattern_id: PatternLibraryId, now: OffsetDateTime) -> Self {
        Self { pattern_id, prior: CoreBayesianPrior::default(), last_updated: now }
    }
}

/// A single STPF prediction recorded for later outcome comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// The content item this prediction was made for.
    pub content_id: String,
    /// The predicted score at prediction time.
    pub predicted_score: f64,
    /// Observed outcome, once known.
    pub actual_outcome: Option<PredictionOutcome>,
    /// Observed view count, once known.
    pub actual_views: Option<u64>,
    /// Expected view count at prediction time, when modeled.
    pub expected_views: Option<f64>,
    /// When this prediction was recorded.
    pub recorded_at: OffsetDateTime,
    /// Relative prediction error, once the outcome is known.
    pub error: Option<f64>,
}

/// Upper bound on [`PredictionRecord`]s retained per tracked scope.
pub const PREDICTION_RING_CAPACITY: usize = 1000;

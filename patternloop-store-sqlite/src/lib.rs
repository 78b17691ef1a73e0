// patternloop-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Entity Store
// Description: Durable persistence backend for the PatternLoop data model.
// Purpose: Provide production-grade persistence for runs, artifacts,
//          outlier items, pattern nodes, clusters, evidence events, and
//          pattern library revisions.
// Dependencies: patternloop-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed store that persists the full §3 data
//! model as versioned, append-only rows with content-hash verification on
//! read. It is designed for deterministic serialization, crash recovery,
//! and audit readiness.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod entities;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use entities::AnalysisStatus;
pub use entities::CoachingInterventionRecord;
pub use entities::CoachingOutcomeRecord;
pub use entities::CoachingSessionRecord;
pub use entities::CoachingUploadOutcomeRecord;
pub use entities::OutlierItem;
pub use entities::OutlierStatus;
pub use entities::OutlierTier;
pub use entities::PatternLayer;
pub use entities::PatternLibrary;
pub use entities::PatternNode;
pub use entities::PredictionRecord;
pub use entities::StoredBayesianPrior;
pub use entities::TemporalPhase;
pub use entities::PREDICTION_RING_CAPACITY;

pub use store::MAX_PAYLOAD_BYTES;
pub use store::PatternLoopStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;

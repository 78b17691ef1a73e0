// patternloop-core/src/core/mod.rs
// ============================================================================
// Module: PatternLoop Core Foundations
// Description: Identifier and hashing primitives shared by every domain
//              module in this crate.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! These two modules are the foundation everything else in the crate sits
//! on: opaque identifiers and canonical-JSON content hashing. No other
//! module reaches past them for these concerns.

pub mod hashing;
pub mod identifiers;

pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use hashing::hash_canonical_json_hex;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::DEFAULT_HASH_ALGORITHM;

pub use identifiers::ArtifactId;
pub use identifiers::ClusterId;
pub use identifiers::DecisionId;
pub use identifiers::DirectorPackId;
pub use identifiers::EvidenceEventId;
pub use identifiers::EvidenceSnapshotId;
pub use identifiers::InterventionId;
pub use identifiers::OutlierItemId;
pub use identifiers::PatternLibraryId;
pub use identifiers::PatternNodeId;
pub use identifiers::RecurrenceLinkId;
pub use identifiers::RunId;
pub use identifiers::SessionId;

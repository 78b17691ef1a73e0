// patternloop-core/src/core/identifiers.rs
// ============================================================================
// Module: PatternLoop Identifiers
// Description: Canonical opaque identifiers for runs, artifacts, patterns,
//              clusters, evidence events, and coaching sessions.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every primary entity in `PatternLoop` is addressed through an opaque,
//! string-backed identifier rather than a raw `String`. This keeps IDs from
//! different entity families from being accidentally interchanged at call
//! sites. Human-readable secondary IDs (`run_id`, `pattern_id`,
//! `cluster_id`, ...) follow the `{type}_{timestamp}_{short-hash}` shape
//! produced by [`crate::run::generate_human_id`]; validation of that shape
//! is the generator's job, not this module's.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Declares an opaque, string-backed identifier newtype.
///
/// Every generated type derives the same `new`/`as_str`/`Display`/`From`
/// surface so callers never need to remember which ID supports which
/// conversion.
macro_rules! declare_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

declare_id!(
    /// Identifier for a single idempotent `Run` (§4.1).
    RunId
);
declare_id!(
    /// Identifier for a content-addressed `Artifact` owned by a `Run`.
    ArtifactId
);
declare_id!(
    /// Identifier for a crawled `OutlierItem` candidate.
    OutlierItemId
);
declare_id!(
    /// Identifier for a `PatternNode` (parent anchor or variant child).
    PatternNodeId
);
declare_id!(
    /// Identifier for a `PatternCluster`.
    ClusterId
);
declare_id!(
    /// Identifier for a directional `PatternRecurrenceLink` between clusters.
    RecurrenceLinkId
);
declare_id!(
    /// Identifier for an `EvidenceEvent` (a single Evidence Loop cycle).
    EvidenceEventId
);
declare_id!(
    /// Identifier for an `EvidenceSnapshot` produced by the evidence reducer.
    EvidenceSnapshotId
);
declare_id!(
    /// Identifier for a `DecisionObject` (GO / STOP / PIVOT).
    DecisionId
);
declare_id!(
    /// Identifier for a crystallized `PatternLibrary` revision.
    PatternLibraryId
);
declare_id!(
    /// Identifier for a `DirectorPack`.
    DirectorPackId
);
declare_id!(
    /// Identifier for a live `CoachingSession`.
    SessionId
);
declare_id!(
    /// Identifier for a single `CoachingIntervention`.
    InterventionId
);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::RunId;

    #[test]
    fn round_trips_through_string_conversions() {
        let id = RunId::from("crawler_20260101_000000_abcd1234");
        assert_eq!(id.as_str(), "crawler_20260101_000000_abcd1234");
        assert_eq!(id.to_string(), "crawler_20260101_000000_abcd1234");
    }

    #[test]
    fn equal_ids_from_different_sources_compare_equal() {
        let a = RunId::new("run_1");
        let b: RunId = String::from("run_1").into();
        assert_eq!(a, b);
    }
}

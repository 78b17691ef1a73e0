// patternloop-rules/src/lib.rs
// ============================================================================
// Module: Requirement Root
// Description: Public API surface for the requirement subsystem.
// Purpose: Wire together core modules and re-exports.
// Dependencies: crate::{curation, error, requirement, serde_support, traits, tristate}
// ============================================================================

//! ## Overview
//! This crate exposes a single generic Boolean/tri-state requirement
//! algebra (errors, trait seams, tree evaluation, serde validation) plus
//! the one concrete predicate domain that walks it: curation rules and
//! the `Comparator` sum type they compile into.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod curation;
pub mod error;
pub mod requirement;
pub mod serde_support;
pub mod traits;
pub mod tristate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use curation::Comparator;
pub use curation::CurationPredicate;
pub use curation::CurationRule;
pub use curation::FeatureContext;
pub use curation::RuleAction;
pub use error::RequirementError;
pub use error::RequirementResult;
pub use requirement::Requirement;
pub use requirement::RequirementGroup;
pub use requirement::RequirementGroupError;
pub use requirement::RequirementId;
pub use requirement::RequirementIdError;
pub use serde_support::RequirementSerializer;
pub use serde_support::RequirementValidator;
pub use serde_support::SerdeConfig;
pub use serde_support::SerdeError;
pub use traits::BoolAsTri;
pub use traits::PredicateEval;
pub use traits::TriStatePredicateEval;
pub use tristate::BochvarLogic;
pub use tristate::GroupCounts;
pub use tristate::KleeneLogic;
pub use tristate::LogicMode;
pub use tristate::NoopTrace;
pub use tristate::RequirementTrace;
pub use tristate::TriLogic;
pub use tristate::TriState;

// ============================================================================
// SECTION: Convenience Constructors
// ============================================================================

/// Convenience functions for creating requirements without the enum's
/// constructor names underfoot.
pub mod convenience {
    use super::Requirement;

    /// Creates a requirement requiring all of the given requirements
    #[must_use]
    pub fn all<P>(requirements: Vec<Requirement<P>>) -> Requirement<P> {
        Requirement::and(requirements)
    }

    /// Creates a requirement requiring any of the given requirements
    #[must_use]
    pub fn any<P>(requirements: Vec<Requirement<P>>) -> Requirement<P> {
        Requirement::or(requirements)
    }

    /// Creates a requirement that inverts another requirement
    #[must_use]
    pub fn not<P>(requirement: Requirement<P>) -> Requirement<P> {
        Requirement::negate(requirement)
    }

    /// Creates a requirement requiring at least N of the given requirements
    #[must_use]
    pub fn at_least<P>(min: u8, requirements: Vec<Requirement<P>>) -> Requirement<P> {
        Requirement::require_group(min, requirements)
    }

    /// Creates a requirement from a predicate
    #[must_use]
    pub const fn predicate<P>(predicate: P) -> Requirement<P> {
        Requirement::predicate(predicate)
    }
}

// ============================================================================
// SECTION: Requirement Macro
// ============================================================================

/// Macro for ergonomic requirement construction
///
/// ```ignore
/// let req = requirement! {
///     and [
///         predicate(my_predicate),
///         or [
///             predicate(other_predicate),
///             not(predicate(third_predicate))
///         ],
///         require_group(2, [
///             predicate(option_a),
///             predicate(option_b),
///             predicate(option_c)
///         ])
///     ]
/// };
/// ```
#[macro_export]
macro_rules! requirement {
    (predicate($pred:expr)) => {
        $crate::requirement::Requirement::predicate($pred)
    };

    (not($req:tt)) => {
        $crate::requirement::Requirement::negate(requirement!($req))
    };

    (and [$($req:tt),* $(,)?]) => {
        $crate::requirement::Requirement::and(vec![$(requirement!($req)),*])
    };

    (or [$($req:tt),* $(,)?]) => {
        $crate::requirement::Requirement::or(vec![$(requirement!($req)),*])
    };

    (require_group($min:expr, [$($req:tt),* $(,)?])) => {
        $crate::requirement::Requirement::require_group($min, vec![$(requirement!($req)),*])
    };
}

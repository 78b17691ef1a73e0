// patternloop-rules/src/error.rs
// ============================================================================
// Module: Requirement Error Definitions
// Description: Structured diagnostics for the requirement system.
// Purpose: Provide rich diagnostics and helper getters for requirement failures.
// Dependencies: serde::{Serialize, Deserialize}, std::fmt
// ============================================================================

//! ## Overview
//! Centralizes the requirement evaluation errors, their messaging,
//! conversions, and serialization guarantees so rule evaluation and
//! audit tooling remain decoupled while still exposing actionable
//! diagnostics.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Errors that can occur during requirement evaluation
///
/// # Invariants
/// - None. Variants capture structured evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementError {
    /// A group requirement failed because not enough sub-requirements were satisfied
    GroupRequirementFailed {
        /// How many requirements were actually passed
        passed: usize,
        /// How many requirements needed to pass
        required: usize,
    },

    /// All requirements in an OR clause failed
    OrAllFailed,

    /// The inner requirement of a NOT clause was satisfied (making the NOT fail)
    NotFailed,

    /// A condition referenced a feature key that the evaluation context does not have
    UnknownFeatureKey(String),

    /// A condition compared a feature value against an incompatible comparator
    ///
    /// For example, `Contains` applied to a numeric feature value.
    TypeMismatch {
        /// The feature key involved
        feature_key: String,
        /// The comparator that could not apply to the value's type
        comparator: String,
    },

    /// A domain-specific condition failed evaluation
    ConditionFailed(String),

    /// A domain condition encountered an internal error during evaluation
    ConditionError(String),

    /// Invalid requirement structure was encountered
    InvalidStructure(String),

    /// Requirement tree too deep (potential stack overflow protection)
    TooDeep {
        /// Maximum allowed recursion depth
        max_depth: usize,
        /// Depth encountered while evaluating
        actual_depth: usize,
    },

    /// An error occurred that doesn't fit other categories
    Other(String),
}

impl fmt::Display for RequirementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupRequirementFailed { passed, required } => {
                write!(f, "Group requirement failed: passed {passed}, needed {required}")
            }
            Self::OrAllFailed => write!(f, "All alternatives in OR requirement failed"),
            Self::NotFailed => write!(f, "NOT requirement failed: inner requirement was satisfied"),
            Self::UnknownFeatureKey(key) => write!(f, "condition references unknown feature key '{key}'"),
            Self::TypeMismatch { feature_key, comparator } => {
                write!(f, "comparator '{comparator}' cannot apply to feature '{feature_key}'")
            }
            Self::ConditionFailed(msg) => write!(f, "Requirement not met: {msg}"),
            Self::ConditionError(msg) => write!(f, "Condition evaluation error: {msg}"),
            Self::InvalidStructure(msg) => write!(f, "Invalid requirement structure: {msg}"),
            Self::TooDeep { max_depth, actual_depth } => {
                write!(f, "Requirement tree too deep: {actual_depth} levels (max {max_depth})")
            }
            Self::Other(msg) => write!(f, "Requirement error: {msg}"),
        }
    }
}

impl std::error::Error for RequirementError {}

impl RequirementError {
    /// Creates a condition failure error with a custom message
    pub fn condition_failed(message: impl Into<String>) -> Self {
        Self::ConditionFailed(message.into())
    }

    /// Creates a condition error (technical failure) with a custom message
    pub fn condition_error(message: impl Into<String>) -> Self {
        Self::ConditionError(message.into())
    }

    /// Creates a generic error with a custom message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Creates an invalid structure error
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }
}

impl From<String> for RequirementError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl From<&str> for RequirementError {
    fn from(message: &str) -> Self {
        Self::Other(message.to_string())
    }
}

/// Convenient Result type for requirement operations
pub type RequirementResult<T = ()> = Result<T, RequirementError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    #[test]
    fn unknown_feature_key_message_names_the_key() {
        let err = RequirementError::UnknownFeatureKey("hook_delivery".to_string());
        assert!(err.to_string().contains("hook_delivery"));
    }

    #[test]
    fn string_conversion_wraps_as_other() {
        let err: RequirementError = "boom".into();
        assert_eq!(err, RequirementError::Other("boom".to_string()));
    }
}

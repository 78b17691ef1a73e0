// patternloop-rules/src/serde_support.rs
// ============================================================================
// Module: Requirement Serde Support
// Description: Serde helpers for requirement serialization and validation.
// Purpose: Provide error models, configuration, and tree validation helpers.
// Dependencies: serde::{Deserialize, Serialize}, serde_json, std::fmt
// ============================================================================

//! ## Overview
//! Strongly typed serde helpers give deterministic serialization/
//! deserialization outcomes while exposing consistent validation errors
//! for requirement structures. Deserialized requirements (curation rule
//! conditions loaded from storage) are untrusted input: validate and
//! fail closed.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::requirement::Requirement;

/// Error types that can occur during requirement serialization/deserialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerdeError {
    /// Invalid requirement structure
    InvalidStructure(String),
    /// Missing required field
    MissingField(String),
    /// Requirement tree too deep
    TooDeep {
        /// Maximum supported tree depth
        max_depth: usize,
        /// Depth encountered during validation
        actual_depth: usize,
    },
    /// Invalid group configuration
    InvalidGroup {
        /// Minimum required items in the group
        min: u8,
        /// Total items provided
        total: usize,
    },
}

impl fmt::Display for SerdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStructure(msg) => write!(f, "Invalid requirement structure: {msg}"),
            Self::MissingField(field) => write!(f, "Missing required field: {field}"),
            Self::TooDeep { max_depth, actual_depth } => {
                write!(f, "Requirement tree too deep: {actual_depth} levels (max {max_depth})")
            }
            Self::InvalidGroup { min, total } => {
                write!(f, "Invalid group requirement: min {min} exceeds total {total}")
            }
        }
    }
}

impl std::error::Error for SerdeError {}

/// Configuration for requirement serialization/deserialization
#[derive(Debug, Clone)]
pub struct SerdeConfig {
    /// Maximum allowed depth for requirement trees
    pub max_depth: usize,
    /// Whether to validate requirement trees during deserialization
    pub validate_on_deserialize: bool,
    /// Whether to allow empty And/Or requirements
    pub allow_empty_logical: bool,
}

impl Default for SerdeConfig {
    fn default() -> Self {
        Self { max_depth: 32, validate_on_deserialize: true, allow_empty_logical: true }
    }
}

/// Validator for requirement trees
#[derive(Debug)]
pub struct RequirementValidator {
    config: SerdeConfig,
}

impl RequirementValidator {
    /// Creates a new validator with the given configuration
    #[must_use]
    pub const fn new(config: SerdeConfig) -> Self {
        Self { config }
    }

    /// Creates a validator with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self { config: SerdeConfig::default() }
    }

    /// Validates a requirement tree's structure.
    ///
    /// # Errors
    /// Returns [`SerdeError`] when the requirement violates structural limits.
    pub fn validate<P>(&self, requirement: &Requirement<P>) -> Result<(), SerdeError> {
        self.validate_depth(requirement, 0)?;
        self.validate_structure(requirement)?;
        Ok(())
    }

    fn validate_depth<P>(&self, requirement: &Requirement<P>, current_depth: usize) -> Result<(), SerdeError> {
        if current_depth > self.config.max_depth {
            return Err(SerdeError::TooDeep { max_depth: self.config.max_depth, actual_depth: current_depth });
        }

        match requirement {
            Requirement::And(reqs) | Requirement::Or(reqs) => {
                for req in reqs {
                    self.validate_depth(req, current_depth + 1)?;
                }
            }
            Requirement::RequireGroup { reqs, .. } => {
                for req in reqs {
                    self.validate_depth(req, current_depth + 1)?;
                }
            }
            Requirement::Not(req) => self.validate_depth(req, current_depth + 1)?,
            Requirement::Predicate(_) => {}
        }

        Ok(())
    }

    fn validate_structure<P>(&self, requirement: &Requirement<P>) -> Result<(), SerdeError> {
        match requirement {
            Requirement::And(reqs) => {
                if !self.config.allow_empty_logical && reqs.is_empty() {
                    return Err(SerdeError::InvalidStructure("Empty And requirement not allowed".to_string()));
                }
                for req in reqs {
                    self.validate_structure(req)?;
                }
            }
            Requirement::Or(reqs) => {
                if !self.config.allow_empty_logical && reqs.is_empty() {
                    return Err(SerdeError::InvalidStructure("Empty Or requirement not allowed".to_string()));
                }
                for req in reqs {
                    self.validate_structure(req)?;
                }
            }
            Requirement::RequireGroup { min, reqs } => {
                let min_required = usize::from(*min);
                if min_required > reqs.len() {
                    return Err(SerdeError::InvalidGroup { min: *min, total: reqs.len() });
                }
                if *min == 0 && !reqs.is_empty() {
                    return Err(SerdeError::InvalidStructure(
                        "RequireGroup with min=0 should be empty or use And instead".to_string(),
                    ));
                }
                for req in reqs {
                    self.validate_structure(req)?;
                }
            }
            Requirement::Not(req) => self.validate_structure(req)?,
            Requirement::Predicate(_) => {}
        }

        Ok(())
    }
}

/// Helper for serializing requirements to/from JSON with validation
#[derive(Debug)]
pub struct RequirementSerializer {
    validator: RequirementValidator,
}

impl RequirementSerializer {
    /// Creates a new serializer with the given configuration
    #[must_use]
    pub const fn new(config: SerdeConfig) -> Self {
        Self { validator: RequirementValidator::new(config) }
    }

    /// Creates a serializer with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self { validator: RequirementValidator::with_defaults() }
    }

    /// Serializes a requirement to JSON with validation.
    ///
    /// # Errors
    /// Returns [`SerdeError`] if validation fails or serialization fails.
    pub fn to_json<P>(&self, requirement: &Requirement<P>) -> Result<String, SerdeError>
    where
        P: Serialize,
    {
        if self.validator.config.validate_on_deserialize {
            self.validator.validate(requirement)?;
        }

        serde_json::to_string_pretty(requirement).map_err(|e| SerdeError::InvalidStructure(e.to_string()))
    }

    /// Deserializes a requirement from JSON with validation.
    ///
    /// # Errors
    /// Returns [`SerdeError`] if parsing fails or validation fails.
    pub fn from_json<P>(&self, json_str: &str) -> Result<Requirement<P>, SerdeError>
    where
        P: for<'de> Deserialize<'de>,
    {
        let requirement: Requirement<P> =
            serde_json::from_str(json_str).map_err(|e| SerdeError::InvalidStructure(e.to_string()))?;

        if self.validator.config.validate_on_deserialize {
            self.validator.validate(&requirement)?;
        }

        Ok(requirement)
    }

    /// Validates a requirement without serialization.
    ///
    /// # Errors
    /// Returns [`SerdeError`] when the requirement violates structural limits.
    pub fn validate<P>(&self, requirement: &Requirement<P>) -> Result<(), SerdeError> {
        self.validator.validate(requirement)
    }
}

impl Default for RequirementSerializer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Convenience functions for serialization without an explicit serializer
pub mod convenience {
    use super::Deserialize;
    use super::Requirement;
    use super::RequirementSerializer;
    use super::RequirementValidator;
    use super::SerdeError;
    use super::Serialize;

    /// Serialize a requirement to JSON with default configuration.
    ///
    /// # Errors
    /// Returns [`SerdeError`] if serialization fails or validation fails.
    pub fn to_json<P: Serialize>(requirement: &Requirement<P>) -> Result<String, SerdeError> {
        RequirementSerializer::default().to_json(requirement)
    }

    /// Deserialize a requirement from JSON with default configuration.
    ///
    /// # Errors
    /// Returns [`SerdeError`] if parsing fails or validation fails.
    pub fn from_json<P: for<'de> Deserialize<'de>>(json_str: &str) -> Result<Requirement<P>, SerdeError> {
        RequirementSerializer::default().from_json(json_str)
    }

    /// Validate a requirement with default configuration.
    ///
    /// # Errors
    /// Returns [`SerdeError`] when the requirement violates structural limits.
    pub fn validate<P>(requirement: &Requirement<P>) -> Result<(), SerdeError> {
        RequirementValidator::with_defaults().validate(requirement)
    }

    /// Quick validation check that returns a boolean.
    pub fn is_valid<P>(requirement: &Requirement<P>) -> bool {
        validate(requirement).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Hash, Serialize, Deserialize)]
    struct Leaf(u8);

    #[test]
    fn round_trips_through_json() {
        let req = Requirement::and(vec![Requirement::predicate(Leaf(1)), Requirement::predicate(Leaf(2))]);
        let json = convenience::to_json(&req).unwrap();
        let back: Requirement<Leaf> = convenience::from_json(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn rejects_trees_deeper_than_the_configured_limit() {
        let mut req = Requirement::predicate(Leaf(0));
        for _ in 0 .. 5 {
            req = Requirement::negate(req);
        }
        let validator = RequirementValidator::new(SerdeConfig { max_depth: 2, ..SerdeConfig::default() });
        assert!(matches!(validator.validate(&req), Err(SerdeError::TooDeep { .. })));
    }

    #[test]
    fn rejects_group_with_min_exceeding_total() {
        let req = Requirement::require_group(3, vec![Requirement::predicate(Leaf(0))]);
        assert!(!convenience::is_valid(&req));
    }
}

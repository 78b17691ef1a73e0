// patternloop-rules/src/curation.rs
// ============================================================================
// Module: Curation Rule Predicates
// Description: The closed `Comparator` sum type and the feature-map
//              predicate that curation rules and rule audits evaluate
//              through the universal requirement algebra.
// Purpose: Let a curation rule's `conditions` map compile into a
//          `Requirement<CurationPredicate>` tree, never a reflection-
//          driven dispatch table.
// Dependencies: crate::requirement, crate::traits, crate::error, serde_json
// ============================================================================

//! ## Overview
//! A curation rule is `{conditions: {feature_key: op_value}, action,
//! priority}`. [`CurationRule::condition_tree`] compiles `conditions`
//! into an implicit AND of [`CurationPredicate`] leaves; evaluation
//! walks that tree via [`Requirement::eval`]. [`CurationRule::validate_keyspace`]
//! enforces that every referenced feature key is one the extractor
//! actually produces, per the hard-error requirement on unknown keys.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::RequirementError;
use crate::requirement::Requirement;
use crate::traits::PredicateEval;

/// Closed comparator sum type evaluated against extracted feature values.
///
/// Every operator a curation rule or a DNA invariant can name. Adding a
/// new comparator means adding a variant here and a matching arm in
/// [`CurationPredicate::eval`] — never a name looked up at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Value equality comparison.
    Equals,
    /// Value inequality comparison.
    NotEquals,
    /// Numeric greater-than comparison.
    GreaterThan,
    /// Numeric greater-than-or-equal comparison.
    GreaterThanOrEqual,
    /// Numeric less-than comparison.
    LessThan,
    /// Numeric less-than-or-equal comparison.
    LessThanOrEqual,
    /// Lexicographic greater-than comparison for strings.
    LexGreaterThan,
    /// Lexicographic less-than comparison for strings.
    LexLessThan,
    /// String containment comparison.
    Contains,
    /// Membership in an expected set.
    InSet,
    /// Deep equality comparison for arrays/objects.
    DeepEquals,
    /// Deep inequality comparison for arrays/objects.
    DeepNotEquals,
    /// Feature exists (value must be present in the context).
    Exists,
    /// Feature does not exist (value must be absent from the context).
    NotExists,
}

/// A single `feature_key op expected_value` leaf.
#[derive(Debug, Clone, PartialEq, Hash, Serialize, Deserialize)]
pub struct CurationPredicate {
    /// The feature key looked up in the evaluation context.
    pub feature_key: String,
    /// The comparator applied to the looked-up value.
    pub comparator: Comparator,
    /// The value compared against, as canonical JSON.
    pub expected: Value,
}

/// A flat map of extracted feature values a [`CurationPredicate`] reads from.
pub type FeatureContext = BTreeMap<String, Value>;

impl PredicateEval for CurationPredicate {
    type Context<'a> = FeatureContext;

    fn eval(&self, context: &Self::Context<'_>) -> bool {
        let actual = context.get(&self.feature_key);

        match self.comparator {
            Comparator::Exists => actual.is_some(),
            Comparator::NotExists => actual.is_none(),
            _ => actual.is_some_and(|value| apply(self.comparator, value, &self.expected)),
        }
    }
}

fn apply(comparator: Comparator, actual: &Value, expected: &Value) -> bool {
    match comparator {
        Comparator::Equals => actual == expected,
        Comparator::NotEquals => actual != expected,
        Comparator::DeepEquals => actual == expected,
        Comparator::DeepNotEquals => actual != expected,
        Comparator::GreaterThan => numeric(actual, expected).is_some_and(|(a, b)| a > b),
        Comparator::GreaterThanOrEqual => numeric(actual, expected).is_some_and(|(a, b)| a >= b),
        Comparator::LessThan => numeric(actual, expected).is_some_and(|(a, b)| a < b),
        Comparator::LessThanOrEqual => numeric(actual, expected).is_some_and(|(a, b)| a <= b),
        Comparator::LexGreaterThan => lexical(actual, expected).is_some_and(|(a, b)| a > b),
        Comparator::LexLessThan => lexical(actual, expected).is_some_and(|(a, b)| a < b),
        Comparator::Contains => lexical(actual, expected).is_some_and(|(a, b)| a.contains(&b)),
        Comparator::InSet => expected.as_array().is_some_and(|set| set.contains(actual)),
        Comparator::Exists | Comparator::NotExists => unreachable!("handled in eval before apply"),
    }
}

fn numeric(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((actual.as_f64()?, expected.as_f64()?))
}

fn lexical(actual: &Value, expected: &Value) -> Option<(String, String)> {
    Some((actual.as_str()?.to_string(), expected.as_str()?.to_string()))
}

/// What a curation rule does when its conditions are satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Promote the matching `OutlierItem` to a `PatternNode`.
    Promote,
    /// Reject the matching `OutlierItem` outright.
    Reject,
    /// Route the matching `OutlierItem` into a campaign queue.
    Campaign,
}

/// A single curation rule: conditions, the action taken when they all
/// hold, and a priority used to order rules with overlapping conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationRule {
    /// The rule's human-readable identifier.
    pub rule_id: String,
    /// Feature-key conditions, implicitly AND-combined.
    pub conditions: Vec<CurationPredicate>,
    /// The action taken when every condition holds.
    pub action: RuleAction,
    /// Evaluation priority; higher runs first when rules overlap.
    pub priority: i32,
}

impl CurationRule {
    /// Compiles this rule's flat `conditions` map into a requirement tree.
    #[must_use]
    pub fn condition_tree(&self) -> Requirement<CurationPredicate> {
        Requirement::and(self.conditions.iter().cloned().map(Requirement::predicate).collect())
    }

    /// Evaluates this rule's conditions against `context`.
    #[must_use]
    pub fn matches(&self, context: &FeatureContext) -> bool {
        self.condition_tree().eval(context)
    }

    /// Validates that every condition's feature key is present in
    /// `known_keys` (the feature extractor's declared output keyspace).
    ///
    /// # Errors
    /// Returns [`RequirementError::UnknownFeatureKey`] for the first
    /// condition key the extractor does not produce.
    pub fn validate_keyspace(&self, known_keys: &[String]) -> Result<(), RequirementError> {
        for condition in &self.conditions {
            if !known_keys.iter().any(|key| key == &condition.feature_key) {
                return Err(RequirementError::UnknownFeatureKey(condition.feature_key.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use serde_json::json;

    use super::*;

    fn rule(conditions: Vec<CurationPredicate>) -> CurationRule {
        CurationRule { rule_id: "r1".to_string(), conditions, action: RuleAction::Promote, priority: 0 }
    }

    fn condition(feature_key: &str, comparator: Comparator, expected: Value) -> CurationPredicate {
        CurationPredicate { feature_key: feature_key.to_string(), comparator, expected }
    }

    #[test]
    fn numeric_gt_passes_when_feature_exceeds_threshold() {
        let rule = rule(vec![condition("view_velocity", Comparator::GreaterThan, json!(100.0))]);
        let mut ctx = FeatureContext::new();
        ctx.insert("view_velocity".to_string(), json!(150.0));
        assert!(rule.matches(&ctx));
    }

    #[test]
    fn multiple_conditions_are_implicitly_and_combined() {
        let rule = rule(vec![
            condition("view_velocity", Comparator::GreaterThan, json!(100.0)),
            condition("has_hook", Comparator::Equals, json!(true)),
        ]);
        let mut ctx = FeatureContext::new();
        ctx.insert("view_velocity".to_string(), json!(150.0));
        ctx.insert("has_hook".to_string(), json!(false));
        assert!(!rule.matches(&ctx));
    }

    #[test]
    fn exists_does_not_require_an_expected_value_match() {
        let rule = rule(vec![condition("comment_count", Comparator::Exists, Value::Null)]);
        let mut ctx = FeatureContext::new();
        ctx.insert("comment_count".to_string(), json!(42));
        assert!(rule.matches(&ctx));
    }

    #[test]
    fn missing_feature_fails_non_exists_comparators() {
        let rule = rule(vec![condition("missing_key", Comparator::Equals, json!(1))]);
        assert!(!rule.matches(&FeatureContext::new()));
    }

    #[test]
    fn in_set_checks_membership_in_an_expected_array() {
        let rule = rule(vec![condition("pattern_type", Comparator::InSet, json!(["visual", "hybrid"]))]);
        let mut ctx = FeatureContext::new();
        ctx.insert("pattern_type".to_string(), json!("hybrid"));
        assert!(rule.matches(&ctx));
    }

    #[test]
    fn validate_keyspace_rejects_unregistered_feature_keys() {
        let rule = rule(vec![condition("unregistered_feature", Comparator::Exists, Value::Null)]);
        let known = vec!["view_velocity".to_string()];
        assert!(matches!(rule.validate_keyspace(&known), Err(RequirementError::UnknownFeatureKey(_))));
    }
}

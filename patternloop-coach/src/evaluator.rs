// patternloop-coach/src/evaluator.rs
// ============================================================================
// Module: DNA Invariant Rule Evaluator
// Description: The collaborator contract a session loop calls into to check
//              a streamed frame against a DirectorPack's DNA invariants.
// Purpose: Keep the actual vision/audio judgment (a model call, in
//          production) outside this crate; the session loop only needs a
//          pass/fail/confidence verdict per rule per frame.
// Dependencies: patternloop_core::DnaInvariant, crate::events::FrameSample
// ============================================================================

//! ## Overview
//! [`RuleEvaluator`] is the seam between the deterministic session loop and
//! whatever actually judges a frame against a rule (a heuristic, a small
//! classifier, a vision-LLM call). The loop treats it as a pure function of
//! `(invariant, sample)`; it does not retry or cache on the evaluator's
//! behalf, so implementations that call out to a network service should
//! apply their own timeout and retry policy before returning.

use patternloop_core::DnaInvariant;
use thiserror::Error;

use crate::events::FrameSample;

/// Errors an evaluator implementation can surface to the session loop.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The evaluator could not complete a verdict for this frame.
    #[error("rule evaluation failed: {0}")]
    Failed(String),
    /// The sample lacked a measurement the rule needed.
    #[error("missing measurement {0:?} required by rule")]
    MissingMeasurement(String),
}

/// A single rule's verdict against one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCompliance {
    /// Whether the frame satisfies the invariant.
    pub compliant: bool,
    /// The evaluator's confidence in this verdict, in `[0, 1]`.
    pub confidence: f64,
    /// A human-readable coach line to show when `compliant` is `false`.
    pub message: Option<String>,
    /// The measured value the verdict was based on, when applicable.
    pub measured_value: Option<f64>,
}

/// Judges a streamed frame against one `DnaInvariant`.
pub trait RuleEvaluator: Send + Sync {
    /// Evaluates `sample` against `invariant`.
    ///
    /// # Errors
    /// Returns [`EvaluatorError`] when no verdict could be produced.
    fn evaluate(
        &self,
        invariant: &DnaInvariant,
        sample: &FrameSample,
    ) -> Result<RuleCompliance, EvaluatorError>;
}

/// An evaluator that reads a single named measurement and compares it
/// against a fixed threshold, treating "measurement below threshold" as a
/// violation.
///
/// This is the evaluator used in tests and as a baseline for rules that
/// reduce to one bounded measurement rather than a model judgment.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    /// The measurement key to read from the sample.
    pub measurement_key: String,
    /// The minimum acceptable value.
    pub minimum: f64,
}

impl ThresholdEvaluator {
    /// Creates a threshold evaluator for `measurement_key >= minimum`.
    #[must_use]
    pub fn new(measurement_key: impl Into<String>, minimum: f64) -> Self {
        Self { measurement_key: measurement_key.into(), minimum }
    }
}

impl RuleEvaluator for ThresholdEvaluator {
    fn evaluate(
        &self,
        invariant: &DnaInvariant,
        sample: &FrameSample,
    ) -> Result<RuleCompliance, EvaluatorError> {
        let Some(&value) = sample.measurements.get(&self.measurement_key) else {
            return Err(EvaluatorError::MissingMeasurement(self.measurement_key.clone()));
        };
        let compliant = value >= self.minimum;
        let message = (!compliant).then(|| {
            format!(
                "{} measured {value:.2}, below required {:.2}",
                invariant.rule_id, self.minimum
            )
        });
        Ok(RuleCompliance { compliant, confidence: 1.0, message, measured_value: Some(value) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use std::collections::BTreeMap;

    use patternloop_core::DnaInvariant;
    use patternloop_core::InvariantDomain;
    use patternloop_core::SessionId;
    use patternloop_core::director_pack::Priority;

    use super::*;

    fn invariant() -> DnaInvariant {
        DnaInvariant {
            rule_id: "composition:face_area".to_string(),
            domain: InvariantDomain::Composition,
            metric_id: "visual_face_area_ratio".to_string(),
            priority: Priority::Medium,
            weight: 1.0,
        }
    }

    fn sample(value: f64) -> FrameSample {
        let mut measurements = BTreeMap::new();
        measurements.insert("face_area_ratio".to_string(), value);
        FrameSample {
            session_id: SessionId::new("sess_1"),
            elapsed_ms: 0,
            frame_index: 0,
            measurements,
        }
    }

    #[test]
    fn value_at_or_above_minimum_is_compliant() {
        let evaluator = ThresholdEvaluator::new("face_area_ratio", 0.2);
        let verdict = evaluator.evaluate(&invariant(), &sample(0.2)).unwrap();
        assert!(verdict.compliant);
        assert!(verdict.message.is_none());
    }

    #[test]
    fn value_below_minimum_is_a_violation_with_a_message() {
        let evaluator = ThresholdEvaluator::new("face_area_ratio", 0.2);
        let verdict = evaluator.evaluate(&invariant(), &sample(0.05)).unwrap();
        assert!(!verdict.compliant);
        assert!(verdict.message.is_some());
    }

    #[test]
    fn missing_measurement_is_an_error() {
        let evaluator = ThresholdEvaluator::new("crop_margin_px", 10.0);
        let err = evaluator.evaluate(&invariant(), &sample(0.2)).unwrap_err();
        assert!(matches!(err, EvaluatorError::MissingMeasurement(_)));
    }
}

// patternloop-core/src/scoring/bayesian.rs
// ============================================================================
// Module: Bayesian Posterior Updater
// Description: Updates a pattern's long-run success prior from one
//              observed mutation outcome, with a Wilson confidence
//              interval on the resulting posterior.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! [`BayesianPrior`] tracks one pattern's running `p_success` belief.
//! [`update`] folds in a single [`Observation`] via odds-form Bayes'
//! rule; the likelihood itself is derived from the observation's
//! `proof_strength`, `cost_paid`, and `engagement_rate` through a
//! deliberately branchy elif-style chain — kept branchy because that is
//! the actual decision surface being modeled, not because it could not be
//! simplified.

/// A pattern's running success-rate belief.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BayesianPrior {
    /// Current belief `P(success)`, in `[0, 1]`.
    pub p_success: f64,
    /// Number of observations folded into this prior so far.
    pub sample_count: u32,
}

impl Default for BayesianPrior {
    fn default() -> Self {
        Self { p_success: 0.5, sample_count: 0 }
    }
}

/// Outcome of a single mutation/measurement cycle feeding [`update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// The mutation succeeded.
    Success,
    /// The mutation failed.
    Failure,
    /// Outcome could not be determined.
    Unknown,
}

/// A single observation to fold into a [`BayesianPrior`].
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    /// Whether the mutation succeeded, failed, or is unknown.
    pub outcome: PredictionOutcome,
    /// Strength of the supporting evidence, 1-10.
    pub proof_strength: f64,
    /// Cost paid to run the experiment.
    pub cost_paid: f64,
    /// Observed engagement rate, if measured.
    pub engagement_rate: Option<f64>,
}

/// Confidence label derived from the Wilson interval width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    /// CI width < 0.1.
    High,
    /// CI width < 0.3.
    Medium,
    /// CI width >= 0.3.
    Low,
}

/// Result of one [`update`] call.
#[derive(Debug, Clone, Copy)]
pub struct PosteriorUpdate {
    /// The updated prior.
    pub posterior: BayesianPrior,
    /// Likelihood used for this update.
    pub likelihood: f64,
    /// Lower bound of the Wilson 95% confidence interval.
    pub ci_low: f64,
    /// Upper bound of the Wilson 95% confidence interval.
    pub ci_high: f64,
    /// Confidence label derived from the interval width.
    pub confidence_level: ConfidenceLevel,
}

const EPSILON: f64 = 1e-10;
const WILSON_Z: f64 = 1.96;

/// Computes the likelihood `P(E|S)` for an observation, independent of
/// any prior.
#[must_use]
pub fn likelihood(observation: Observation) -> f64 {
    if observation.outcome == PredictionOutcome::Unknown {
        return (0.5 + (observation.proof_strength - 5.0) * 0.02).clamp(0.1, 0.9);
    }

    let mut l = 0.7;
    if observation.proof_strength > 7.0 {
        l += 0.2;
    } else if observation.proof_strength > 5.0 {
        l += 0.1;
    } else if observation.proof_strength < 3.0 {
        l -= 0.4;
    } else if observation.proof_strength < 4.0 {
        l -= 0.3;
    }

    l += (observation.cost_paid / 100.0).min(0.15);

    if let Some(rate) = observation.engagement_rate {
        if rate > 0.1 {
            l += 0.1;
        } else if rate > 0.05 {
            l += 0.05;
        }
    }

    l = l.clamp(0.1, 0.95);

    if observation.outcome == PredictionOutcome::Failure {
        1.0 - l
    } else {
        l
    }
}

/// Folds `observation` into `prior`, returning the posterior and its
/// Wilson confidence interval.
#[must_use]
pub fn update(prior: BayesianPrior, observation: Observation) -> PosteriorUpdate {
    let l = likelihood(observation);

    let odds_prior = prior.p_success / (1.0 - prior.p_success + EPSILON);
    let odds_post = odds_prior * l / (1.0 - l + EPSILON);
    let p_post = (odds_post / (1.0 + odds_post)).clamp(0.01, 0.99);

    let posterior = BayesianPrior {
        p_success: p_post,
        sample_count: prior.sample_count + 1,
    };

    let (ci_low, ci_high) = wilson_interval(p_post, posterior.sample_count);
    let width = ci_high - ci_low;
    let confidence_level = if width < 0.1 {
        ConfidenceLevel::High
    } else if width < 0.3 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    PosteriorUpdate {
        posterior,
        likelihood: l,
        ci_low,
        ci_high,
        confidence_level,
    }
}

/// Wilson 95% confidence interval for `p` observed over `sample_count + 1`
/// trials.
#[must_use]
pub fn wilson_interval(p: f64, sample_count: u32) -> (f64, f64) {
    let n = f64::from(sample_count) + 1.0;
    let z2 = WILSON_Z * WILSON_Z;
    let denom = 1.0 + z2 / n;
    let center = p + z2 / (2.0 * n);
    let variance = ((p * (1.0 - p) + z2 / (4.0 * n)) / n).max(0.0);
    let half_width = WILSON_Z * variance.sqrt();
    (
        ((center - half_width) / denom).clamp(0.0, 1.0),
        ((center + half_width) / denom).clamp(0.0, 1.0),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    #[test]
    fn unknown_outcome_bypasses_the_elif_chain_entirely() {
        let observation = Observation {
            outcome: PredictionOutcome::Unknown,
            proof_strength: 10.0,
            cost_paid: 1000.0,
            engagement_rate: Some(0.5),
        };
        assert!((likelihood(observation) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn failure_outcome_flips_the_likelihood() {
        let success = Observation {
            outcome: PredictionOutcome::Success,
            proof_strength: 8.0,
            cost_paid: 0.0,
            engagement_rate: None,
        };
        let failure = Observation { outcome: PredictionOutcome::Failure, ..success };
        assert!((likelihood(success) + likelihood(failure) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn strong_evidence_pulls_the_posterior_above_the_prior() {
        let prior = BayesianPrior::default();
        let observation = Observation {
            outcome: PredictionOutcome::Success,
            proof_strength: 9.0,
            cost_paid: 50.0,
            engagement_rate: Some(0.2),
        };
        let result = update(prior, observation);
        assert!(result.posterior.p_success > prior.p_success);
    }

    #[test]
    fn posterior_is_always_clamped_into_the_open_unit_interval() {
        let prior = BayesianPrior { p_success: 0.99, sample_count: 50 };
        let observation = Observation {
            outcome: PredictionOutcome::Success,
            proof_strength: 10.0,
            cost_paid: 100.0,
            engagement_rate: Some(1.0),
        };
        let result = update(prior, observation);
        assert!(result.posterior.p_success <= 0.99);
    }

    #[test]
    fn wilson_interval_narrows_as_sample_count_grows() {
        let (low_n_low, low_n_high) = wilson_interval(0.6, 2);
        let (high_n_low, high_n_high) = wilson_interval(0.6, 500);
        assert!(high_n_high - high_n_low < low_n_high - low_n_low);
    }
}

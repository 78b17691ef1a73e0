// patternloop-core/tests/idempotency_and_scoring_properties.rs
// ============================================================================
// Module: Idempotency and Scoring Property Tests
// Description: Property-style invariants for the Run/Artifact engine and
//              the STPF/Bayesian scoring pipeline.
// ============================================================================
//! ## Overview
//! Validates the cross-cutting invariants from spec.md §8 that do not
//! belong to any single module's unit tests: idempotency-key stability
//! under key reordering, STPF determinism and the all-high-inputs
//! boundary, and Bayesian symmetric-likelihood convergence.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]

use patternloop_core::core::hash_canonical_json_hex;
use patternloop_core::scoring::bayesian::BayesianPrior;
use patternloop_core::scoring::bayesian::Observation;
use patternloop_core::scoring::bayesian::PredictionOutcome;
use patternloop_core::scoring::stpf::score;
use patternloop_core::scoring::stpf::ExpectationGap;
use patternloop_core::scoring::stpf::PatchInputs;
use patternloop_core::scoring::stpf::StpfDenominator;
use patternloop_core::scoring::stpf::StpfGates;
use patternloop_core::scoring::stpf::StpfInputs;
use patternloop_core::scoring::stpf::StpfMultipliers;
use patternloop_core::scoring::stpf::StpfNumerator;
use proptest::prelude::*;

fn all_ten_inputs() -> StpfInputs {
    StpfInputs {
        gates: StpfGates { trust: 10.0, legality: 10.0, hygiene: 10.0 },
        numerator: StpfNumerator { essence: 10.0, capability: 10.0, novelty: 10.0, connection: 10.0, proof: 10.0 },
        denominator: StpfDenominator { cost: 1.0, risk: 1.0, threat: 1.0, pressure: 1.0, time_lag: 1.0, uncertainty: 1.0 },
        multipliers: StpfMultipliers { scarcity: 10.0, network: 10.0, leverage: 10.0, timing: None, platform_fit: None, creator_authority: None },
        proof_evidenced: true,
        expectation_gap: None,
        patch_inputs: PatchInputs::default(),
    }
}

#[test]
fn all_ten_numerator_all_one_denominator_all_ten_gate_scores_at_least_900() {
    let result = score(all_ten_inputs());
    assert!(result.score_1000 >= 900, "expected >= 900, got {}", result.score_1000);
    assert!(result.score_1000 <= 1000);
}

#[test]
fn stpf_identical_inputs_produce_byte_identical_output_fields() {
    let inputs = all_ten_inputs();
    let first = score(inputs);
    let second = score(inputs);
    assert_eq!(first.score_1000, second.score_1000);
    assert_eq!(first.decision, second.decision);
    assert_eq!(first.applied_patches, second.applied_patches);
    assert!((first.raw - second.raw).abs() < f64::EPSILON);
}

#[test]
fn bayesian_update_with_symmetric_success_and_failure_returns_near_the_prior() {
    let prior = BayesianPrior { p_success: 0.5, sample_count: 0 };
    let success = Observation {
        outcome: PredictionOutcome::Success,
        proof_strength: 5.0,
        cost_paid: 0.0,
        engagement_rate: None,
    };
    let failure = Observation { outcome: PredictionOutcome::Failure, ..success };

    let after_success = patternloop_core::scoring::bayesian::update(prior, success).posterior.p_success;
    let after_failure = patternloop_core::scoring::bayesian::update(prior, failure).posterior.p_success;

    assert!((after_success - (1.0 - after_failure)).abs() < 1e-9);
}

#[test]
fn bayesian_update_with_strong_evidence_exceeds_seven_tenths() {
    let prior = BayesianPrior { p_success: 0.5, sample_count: 0 };
    let observation = Observation {
        outcome: PredictionOutcome::Success,
        proof_strength: 10.0,
        cost_paid: 0.0,
        engagement_rate: None,
    };
    let posterior = patternloop_core::scoring::bayesian::update(prior, observation).posterior;
    assert!(posterior.p_success > 0.7, "expected > 0.7, got {}", posterior.p_success);
}

proptest! {
    #[test]
    fn idempotency_key_is_stable_under_object_key_reordering(
        source in "[a-z]{1,8}",
        limit in 0u32..1000,
        category in "[a-z]{1,8}",
    ) {
        let forward = serde_json::json!({"source": source, "limit": limit, "category": category});
        let reordered = serde_json::json!({"category": category, "limit": limit, "source": source});
        prop_assert_eq!(
            hash_canonical_json_hex(&forward).unwrap(),
            hash_canonical_json_hex(&reordered).unwrap(),
        );
    }

    #[test]
    fn stpf_kill_switch_never_fires_when_every_gate_is_at_least_four(
        trust in 4.0f64..10.0,
        legality in 4.0f64..10.0,
        hygiene in 4.0f64..10.0,
    ) {
        let mut inputs = all_ten_inputs();
        inputs.gates = StpfGates { trust, legality, hygiene };
        let result = score(inputs);
        prop_assert!(result.gate_passed);
    }

    #[test]
    fn stpf_kill_switch_always_fires_when_any_gate_is_below_four(
        trust in 0.0f64..4.0,
    ) {
        let mut inputs = all_ten_inputs();
        inputs.gates.trust = trust;
        let result = score(inputs);
        prop_assert!(!result.gate_passed);
        prop_assert_eq!(result.score_1000, 0);
    }
}

#[test]
fn gap_entropy_bonus_only_increases_score_when_actual_exceeds_expected() {
    let mut without_gap = all_ten_inputs();
    without_gap.expectation_gap = None;
    let baseline = score(without_gap);

    let mut with_gap = all_ten_inputs();
    with_gap.expectation_gap = Some(ExpectationGap { expected: 1.0, actual: 5.0 });
    let boosted = score(with_gap);

    assert!(boosted.raw >= baseline.raw);
}

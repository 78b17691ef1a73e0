// patternloop-core/src/scoring/stpf.rs
// ============================================================================
// Module: STPF Safe-Math Scoring
// Description: Gate/value/friction/multiplier scoring with a hard kill
//              switch and sequential reality-distortion patches.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! STPF ("Scarcity/Trust/Proof/Friction") reduces a candidate's 1-10 scale
//! gate/value/friction/multiplier inputs to a 0-1000 score and a
//! GO/CONSIDER/NO-GO call. The kill switch (any gate below 4) short
//! circuits straight to a zero score; otherwise the raw score is computed,
//! rescaled, then run through four reality-distortion patches **in
//! sequence** — each patch's output feeds the next patch's input.

use std::collections::HashMap;

/// Gate inputs, 1-10 scale. Any gate below [`KILL_SWITCH_THRESHOLD`] zeroes
/// the score outright.
#[derive(Debug, Clone, Copy)]
pub struct StpfGates {
    /// Trust in the source/creator/evidence quality.
    pub trust: f64,
    /// Legal/platform-policy standing.
    pub legality: f64,
    /// Media/production hygiene.
    pub hygiene: f64,
}

impl StpfGates {
    fn min(self) -> f64 {
        self.trust.min(self.legality).min(self.hygiene)
    }

    fn product_over_ten(self) -> f64 {
        (self.trust / 10.0) * (self.legality / 10.0) * (self.hygiene / 10.0)
    }
}

/// Value (numerator) inputs, 1-10 scale.
#[derive(Debug, Clone, Copy)]
pub struct StpfNumerator {
    /// Core idea strength.
    pub essence: f64,
    /// Execution/production capability.
    pub capability: f64,
    /// Novelty relative to the pattern library.
    pub novelty: f64,
    /// Audience connection/relatability.
    pub connection: f64,
    /// Strength of supporting evidence. Capped at 3 if unevidenced.
    pub proof: f64,
}

/// Friction (denominator) inputs, 1-10 scale.
#[derive(Debug, Clone, Copy)]
pub struct StpfDenominator {
    /// Cost to produce/execute.
    pub cost: f64,
    /// Execution risk.
    pub risk: f64,
    /// External threat (competition, platform risk).
    pub threat: f64,
    /// Time pressure.
    pub pressure: f64,
    /// Lag between action and payoff.
    pub time_lag: f64,
    /// Uncertainty in the estimate itself.
    pub uncertainty: f64,
}

/// Multiplier inputs, 1-10 scale (plus carried-through-but-unused
/// `timing`/`platform_fit`/`creator_authority` fields for downstream
/// reporting).
#[derive(Debug, Clone, Copy)]
pub struct StpfMultipliers {
    /// Scarcity of the opportunity.
    pub scarcity: f64,
    /// Network-effect potential.
    pub network: f64,
    /// Leverage available to the creator.
    pub leverage: f64,
    /// Timing fit; carried through but not used by [`calculate_boost`].
    pub timing: Option<f64>,
    /// Platform fit; carried through but not used by [`calculate_boost`].
    pub platform_fit: Option<f64>,
    /// Creator authority; carried through but not used by
    /// [`calculate_boost`].
    pub creator_authority: Option<f64>,
}

/// Full STPF input set for one scoring pass.
#[derive(Debug, Clone, Copy)]
pub struct StpfInputs {
    /// Gate inputs.
    pub gates: StpfGates,
    /// Value inputs.
    pub numerator: StpfNumerator,
    /// Friction inputs.
    pub denominator: StpfDenominator,
    /// Multiplier inputs.
    pub multipliers: StpfMultipliers,
    /// Whether `proof` should be treated as unevidenced (applies the
    /// proof ceiling).
    pub proof_evidenced: bool,
    /// Expected vs. actual outcome, for the gap-entropy bonus.
    pub expectation_gap: Option<ExpectationGap>,
    /// Additional fields consumed only by reality-distortion patches.
    pub patch_inputs: PatchInputs,
}

/// Expected-vs-actual pair feeding the gap-entropy bonus.
#[derive(Debug, Clone, Copy)]
pub struct ExpectationGap {
    /// Expected outcome magnitude.
    pub expected: f64,
    /// Actual observed outcome magnitude.
    pub actual: f64,
}

/// Inputs consumed only by the reality-distortion patches, not by the
/// core formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchInputs {
    /// Capital available, for Patch A.
    pub capital: Option<f64>,
    /// Self-reported confidence level (1-10), for Patch B.
    pub confidence_level: Option<f64>,
    /// Audience retention rate in `[0, 1]`, for Patch D.
    pub retention: Option<f64>,
}

/// GO/CONSIDER/NO-GO classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StpfVerdict {
    /// Score >= 700.
    Go,
    /// 400 <= score < 700.
    Consider,
    /// Score < 400, or the kill switch fired.
    NoGo,
}

const KILL_SWITCH_THRESHOLD: f64 = 4.0;
const PROOF_CEILING: f64 = 3.0;
const FRICTION_EXPONENT: f64 = 0.8;
const NETWORK_BOOST_BETA: f64 = 0.5;
const ENTROPY_GAMMA: f64 = 0.6;
const RESCALE_DENOMINATOR_OFFSET: f64 = 500.0;

const VALUE_EXPONENT_ESSENCE: f64 = 2.0;
const VALUE_EXPONENT_CAPABILITY: f64 = 1.2;
const VALUE_EXPONENT_NOVELTY: f64 = 1.1;
const VALUE_EXPONENT_CONNECTION: f64 = 1.0;
const VALUE_EXPONENT_PROOF: f64 = 1.3;

const FRICTION_WEIGHT_COST: f64 = 1.0;
const FRICTION_WEIGHT_RISK: f64 = 1.2;
const FRICTION_WEIGHT_THREAT: f64 = 1.0;
const FRICTION_WEIGHT_PRESSURE: f64 = 1.0;
const FRICTION_WEIGHT_TIME_LAG: f64 = 0.9;
const FRICTION_WEIGHT_UNCERTAINTY: f64 = 1.1;

/// Result of a full STPF scoring pass, after patches.
#[derive(Debug, Clone)]
pub struct StpfResult {
    /// Final score, 0-1000.
    pub score_1000: u32,
    /// Whether the kill switch allowed scoring to proceed at all.
    pub gate_passed: bool,
    /// Raw (pre-rescale) score.
    pub raw: f64,
    /// Value term.
    pub value: f64,
    /// Friction term.
    pub friction: f64,
    /// Multiplier term.
    pub multiplier: f64,
    /// Gap-entropy bonus factor applied.
    pub entropy: f64,
    /// Final GO/CONSIDER/NO-GO call.
    pub decision: StpfVerdict,
    /// Confidence in the call, `min(1.0, gate_product * 1.2)`.
    pub confidence: f64,
    /// One-sentence explanation of the dominant drivers.
    pub why: String,
    /// Up to 3 improvement suggestions.
    pub how: Vec<String>,
    /// Reasons emitted by patches that actually fired, in application order.
    pub applied_patches: Vec<String>,
}

/// Computes the value (numerator) term: `essence^2.0 * capability^1.2 *
/// novelty^1.1 * connection^1.0 * proof^1.3`, applying the proof ceiling
/// first when `proof_evidenced` is `false`.
#[must_use]
pub fn calculate_value(numerator: StpfNumerator, proof_evidenced: bool) -> f64 {
    let proof = if proof_evidenced { numerator.proof } else { numerator.proof.min(PROOF_CEILING) };
    numerator.essence.powf(VALUE_EXPONENT_ESSENCE)
        * numerator.capability.powf(VALUE_EXPONENT_CAPABILITY)
        * numerator.novelty.powf(VALUE_EXPONENT_NOVELTY)
        * numerator.connection.powf(VALUE_EXPONENT_CONNECTION)
        * proof.powf(VALUE_EXPONENT_PROOF)
}

/// Computes the friction (denominator) term. Each component contributes
/// `1 + ((x-1)/9) * weight`, so friction is always >= 1.
#[must_use]
pub fn calculate_friction(denominator: StpfDenominator) -> f64 {
    friction_term(denominator.cost, FRICTION_WEIGHT_COST)
        * friction_term(denominator.risk, FRICTION_WEIGHT_RISK)
        * friction_term(denominator.threat, FRICTION_WEIGHT_THREAT)
        * friction_term(denominator.pressure, FRICTION_WEIGHT_PRESSURE)
        * friction_term(denominator.time_lag, FRICTION_WEIGHT_TIME_LAG)
        * friction_term(denominator.uncertainty, FRICTION_WEIGHT_UNCERTAINTY)
}

fn friction_term(x: f64, weight: f64) -> f64 {
    1.0 + ((x - 1.0) / 9.0) * weight
}

/// Computes the multiplier boost: `(1+s) * network_boost * (1+lv)`, where
/// `network_boost = 1 + (2^nw - 1) * beta`.
#[must_use]
pub fn calculate_boost(multipliers: StpfMultipliers) -> f64 {
    let s = (multipliers.scarcity - 1.0) / 9.0;
    let lv = (multipliers.leverage - 1.0) / 9.0;
    let nw = (multipliers.network - 1.0) / 9.0;
    let network_boost = 1.0 + (2f64.powf(nw) - 1.0) * NETWORK_BOOST_BETA;
    (1.0 + s) * network_boost * (1.0 + lv)
}

fn gap_entropy_bonus(gap: Option<ExpectationGap>) -> f64 {
    match gap {
        Some(gap) => 1.0 + ENTROPY_GAMMA * (1.0 + (gap.actual - gap.expected).max(0.0)).ln(),
        None => 1.0,
    }
}

fn rescale(raw: f64) -> u32 {
    let scaled = 1000.0 * raw / (raw + RESCALE_DENOMINATOR_OFFSET);
    clamp_to_score(scaled)
}

/// Rounds and clamps a float into `[0, 1000]` before narrowing to `u32`.
/// The clamp makes the narrowing cast lossless; the cast is still flagged
/// by clippy syntactically, so it is isolated here with the justification.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is clamped to [0, 1000] immediately before the cast")]
fn clamp_to_score(value: f64) -> u32 {
    value.round().clamp(0.0, 1000.0) as u32
}

fn classify(score_1000: u32) -> StpfVerdict {
    if score_1000 >= 700 {
        StpfVerdict::Go
    } else if score_1000 >= 400 {
        StpfVerdict::Consider
    } else {
        StpfVerdict::NoGo
    }
}

/// Runs a complete STPF scoring pass: kill switch, raw formula, rescale,
/// sequential reality-distortion patches, and explanation generation.
#[must_use]
pub fn score(inputs: StpfInputs) -> StpfResult {
    if inputs.gates.min() < KILL_SWITCH_THRESHOLD {
        return StpfResult {
            score_1000: 0,
            gate_passed: false,
            raw: 0.0,
            value: 0.0,
            friction: 1.0,
            multiplier: 1.0,
            entropy: 1.0,
            decision: StpfVerdict::NoGo,
            confidence: 0.0,
            why: "a gate fell below the minimum trust/legality/hygiene threshold".to_string(),
            how: vec!["raise every gate above 4 before requesting another score".to_string()],
            applied_patches: Vec::new(),
        };
    }

    let value = calculate_value(inputs.numerator, inputs.proof_evidenced);
    let friction = calculate_friction(inputs.denominator);
    let multiplier = calculate_boost(inputs.multipliers);
    let entropy = gap_entropy_bonus(inputs.expectation_gap);
    let gate_product = inputs.gates.product_over_ten();

    let raw = gate_product * (value / friction.powf(FRICTION_EXPONENT)) * multiplier * entropy;
    let mut score_1000 = rescale(raw);

    let mut applied_patches = Vec::new();
    let mut float_score = f64::from(score_1000);
    apply_patches(inputs, &mut float_score, &mut applied_patches);
    score_1000 = clamp_to_score(float_score);

    let decision = classify(score_1000);
    let confidence = (gate_product * 1.2).min(1.0);

    StpfResult {
        score_1000,
        gate_passed: true,
        raw,
        value,
        friction,
        multiplier,
        entropy,
        decision,
        confidence,
        why: explain_decision(decision, inputs.numerator, inputs.denominator, inputs.multipliers),
        how: improvement_suggestions(inputs.numerator, inputs.denominator, inputs.multipliers),
        applied_patches,
    }
}

/// Lists the reasons every reality-distortion patch *would* fire against
/// `inputs`, without mutating a score. Mirrors [`score`]'s patch
/// conditions exactly.
#[must_use]
pub fn applicable_patches(inputs: &StpfInputs) -> Vec<String> {
    let mut reasons = Vec::new();
    let patch = &inputs.patch_inputs;

    if inputs.numerator.essence <= 3.0 {
        if let Some(capital) = patch.capital {
            if capital > 1_000_000.0 {
                reasons.push(patch_a_reason(capital));
            }
        }
    }
    if inputs.numerator.proof < 5.0 {
        if let Some(confidence_level) = patch.confidence_level {
            if confidence_level > 7.0 {
                reasons.push(patch_b_reason(confidence_level));
            }
        }
    }
    if inputs.gates.trust < 6.0 {
        reasons.push(patch_c_reason());
    }
    if inputs.multipliers.network > 8.0 {
        if let Some(retention) = patch.retention {
            if retention > 0.7 {
                reasons.push(patch_d_reason());
            }
        }
    }
    reasons
}

fn patch_a_reason(capital: f64) -> String {
    format!("Patch A (capital override): low essence offset by capital={capital:.0}")
}
fn patch_b_reason(confidence_level: f64) -> String {
    format!("Patch B (overconfidence penalty): low proof with self-reported confidence={confidence_level:.1}")
}
fn patch_c_reason() -> String {
    "Patch C (trust collapse): trust gate below 6".to_string()
}
fn patch_d_reason() -> String {
    "Patch D (winner-takes-all): high network effect with strong retention".to_string()
}

fn apply_patches(inputs: StpfInputs, score: &mut f64, applied: &mut Vec<String>) {
    let patch = inputs.patch_inputs;

    if inputs.numerator.essence <= 3.0 {
        if let Some(capital) = patch.capital {
            if capital > 1_000_000.0 {
                *score *= 1.0 + (1.0 + capital).log10() * 0.1;
                applied.push(patch_a_reason(capital));
            }
        }
    }
    if inputs.numerator.proof < 5.0 {
        if let Some(confidence_level) = patch.confidence_level {
            if confidence_level > 7.0 {
                *score *= 1.0 - confidence_level * 0.03;
                applied.push(patch_b_reason(confidence_level));
            }
        }
    }
    if inputs.gates.trust < 6.0 {
        *score *= 0.2;
        applied.push(patch_c_reason());
    }
    if inputs.multipliers.network > 8.0 {
        if let Some(retention) = patch.retention {
            if retention > 0.7 {
                *score *= 1.3;
                applied.push(patch_d_reason());
            }
        }
    }
}

fn explain_decision(
    decision: StpfVerdict,
    numerator: StpfNumerator,
    denominator: StpfDenominator,
    multipliers: StpfMultipliers,
) -> String {
    let dominant_value = dominant_field(&[
        ("essence", numerator.essence),
        ("capability", numerator.capability),
        ("novelty", numerator.novelty),
        ("connection", numerator.connection),
        ("proof", numerator.proof),
    ]);
    let dominant_friction = dominant_field(&[
        ("cost", denominator.cost),
        ("risk", denominator.risk),
        ("threat", denominator.threat),
        ("pressure", denominator.pressure),
        ("time_lag", denominator.time_lag),
        ("uncertainty", denominator.uncertainty),
    ]);

    match decision {
        StpfVerdict::Go => format!("strong {dominant_value} outweighs {dominant_friction}, with network={:.1} amplifying it", multipliers.network),
        StpfVerdict::Consider => format!("{dominant_value} and {dominant_friction} roughly offset; the call is marginal"),
        StpfVerdict::NoGo => format!("{dominant_friction} overwhelms the value this candidate offers"),
    }
}

fn dominant_field(fields: &[(&str, f64)]) -> String {
    fields
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| (*name).to_string())
        .unwrap_or_else(|| "overall quality".to_string())
}

fn improvement_suggestions(
    numerator: StpfNumerator,
    denominator: StpfDenominator,
    multipliers: StpfMultipliers,
) -> Vec<String> {
    let mut levers: HashMap<&str, String> = HashMap::new();

    if numerator.essence < 6.0 {
        levers.insert("essence", "strengthen the core idea (essence)".to_string());
    }
    if numerator.proof < 5.0 {
        levers.insert("proof", "add supporting evidence".to_string());
    }
    if denominator.risk >= 7.0 {
        levers.insert("risk", "mitigate execution risk".to_string());
    }
    if multipliers.network < 5.0 {
        levers.insert("network", "find ways to leverage network effects".to_string());
    }

    if levers.is_empty() {
        return vec!["maintain current trajectory".to_string()];
    }

    let mut suggestions: Vec<String> = levers.into_values().collect();
    suggestions.sort();
    suggestions.truncate(3);
    suggestions
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    fn mid_gates() -> StpfGates {
        StpfGates { trust: 7.0, legality: 8.0, hygiene: 7.0 }
    }
    fn mid_numerator() -> StpfNumerator {
        StpfNumerator { essence: 7.0, capability: 6.0, novelty: 6.0, connection: 6.0, proof: 6.0 }
    }
    fn mid_denominator() -> StpfDenominator {
        StpfDenominator { cost: 4.0, risk: 4.0, threat: 3.0, pressure: 4.0, time_lag: 3.0, uncertainty: 4.0 }
    }
    fn mid_multipliers() -> StpfMultipliers {
        StpfMultipliers { scarcity: 5.0, network: 5.0, leverage: 5.0, timing: None, platform_fit: None, creator_authority: None }
    }

    fn base_inputs() -> StpfInputs {
        StpfInputs {
            gates: mid_gates(),
            numerator: mid_numerator(),
            denominator: mid_denominator(),
            multipliers: mid_multipliers(),
            proof_evidenced: true,
            expectation_gap: None,
            patch_inputs: PatchInputs::default(),
        }
    }

    #[test]
    fn kill_switch_zeroes_the_score_when_any_gate_is_below_four() {
        let mut inputs = base_inputs();
        inputs.gates.trust = 3.9;
        let result = score(inputs);
        assert_eq!(result.score_1000, 0);
        assert!(!result.gate_passed);
        assert_eq!(result.decision, StpfVerdict::NoGo);
    }

    #[test]
    fn friction_is_always_at_least_one() {
        let denominator = StpfDenominator { cost: 1.0, risk: 1.0, threat: 1.0, pressure: 1.0, time_lag: 1.0, uncertainty: 1.0 };
        assert!((calculate_friction(denominator) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unevidenced_proof_is_capped_at_three_before_exponentiation() {
        let evidenced = calculate_value(StpfNumerator { proof: 9.0, ..mid_numerator() }, true);
        let unevidenced = calculate_value(StpfNumerator { proof: 9.0, ..mid_numerator() }, false);
        let capped = calculate_value(StpfNumerator { proof: 3.0, ..mid_numerator() }, true);
        assert!(unevidenced < evidenced);
        assert!((unevidenced - capped).abs() < 1e-9);
    }

    #[test]
    fn trust_collapse_patch_applies_a_fixed_penalty() {
        let mut inputs = base_inputs();
        inputs.gates.trust = 5.0;
        let with_low_trust = score(inputs);
        assert!(with_low_trust.applied_patches.iter().any(|p| p.contains("trust collapse")));

        inputs.gates.trust = 7.0;
        let with_high_trust = score(inputs);
        assert!(with_high_trust.score_1000 > with_low_trust.score_1000);
    }

    #[test]
    fn applicable_patches_preview_matches_what_score_would_apply() {
        let mut inputs = base_inputs();
        inputs.gates.trust = 5.0;
        let preview = applicable_patches(&inputs);
        let applied = score(inputs).applied_patches;
        assert_eq!(preview, applied);
    }

    #[test]
    fn decision_thresholds_classify_correctly() {
        assert_eq!(classify(700), StpfVerdict::Go);
        assert_eq!(classify(699), StpfVerdict::Consider);
        assert_eq!(classify(400), StpfVerdict::Consider);
        assert_eq!(classify(399), StpfVerdict::NoGo);
    }

    #[test]
    fn how_suggestions_never_exceed_three() {
        let numerator = StpfNumerator { essence: 1.0, capability: 1.0, novelty: 1.0, connection: 1.0, proof: 1.0 };
        let denominator = StpfDenominator { cost: 9.0, risk: 9.0, threat: 9.0, pressure: 9.0, time_lag: 9.0, uncertainty: 9.0 };
        let multipliers = StpfMultipliers { scarcity: 1.0, network: 1.0, leverage: 1.0, timing: None, platform_fit: None, creator_authority: None };
        assert!(improvement_suggestions(numerator, denominator, multipliers).len() <= 3);
    }
}

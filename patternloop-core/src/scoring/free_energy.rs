// patternloop-core/src/scoring/free_energy.rs
// ============================================================================
// Module: Free-Energy / Calibration Health Checker
// Description: Rolling-window entropy/surprise/calibration reporting over
//              past STPF predictions.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! [`PredictionRecord`]s accumulate in a ring buffer capped at
//! [`MAX_RECORDS`]. With fewer than [`MIN_COMPLETED_FOR_REPORT`] completed
//! records (those with a recorded `error`), [`report`] returns a fixed
//! `unknown` state rather than noisy statistics computed over too few
//! points.

use std::collections::VecDeque;

/// Maximum number of [`PredictionRecord`]s retained.
pub const MAX_RECORDS: usize = 1000;
/// Minimum completed records required before [`report`] computes real
/// statistics instead of the fixed `unknown` state.
pub const MIN_COMPLETED_FOR_REPORT: usize = 5;

/// One past prediction: a predicted score and, once known, its outcome.
#[derive(Debug, Clone, Copy)]
pub struct PredictionRecord {
    /// The STPF score (0-1000) predicted at the time.
    pub predicted_score: f64,
    /// Whether the mutation ultimately succeeded, once known.
    pub actual_success: Option<bool>,
    /// Absolute error between predicted and realized outcome, once known.
    pub error: Option<f64>,
}

/// Rolling window of past predictions backing [`report`].
#[derive(Debug, Default)]
pub struct PredictionWindow {
    records: VecDeque<PredictionRecord>,
}

impl PredictionWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new record, evicting the oldest if at capacity.
    pub fn push(&mut self, record: PredictionRecord) {
        if self.records.len() == MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    fn completed(&self) -> Vec<&PredictionRecord> {
        self.records.iter().filter(|r| r.error.is_some()).collect()
    }
}

/// Overall calibration-health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Too few completed predictions to assess; a fixed placeholder state.
    Unknown,
    /// Free energy < 0.35.
    Healthy,
    /// Free energy < 0.7.
    Degraded,
    /// Free energy >= 0.7.
    Critical,
}

/// Calibration metrics computed over completed records.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationReport {
    /// Mean squared error between predicted probability and outcome.
    pub brier: f64,
    /// Mean negative log-likelihood of the realized outcome.
    pub log_loss: f64,
    /// `|P(predicted >= 500) - P(actual success)|`.
    pub calibration_error: f64,
    /// Mean absolute error.
    pub mae: f64,
}

impl Default for CalibrationReport {
    fn default() -> Self {
        Self { brier: 0.25, log_loss: 0.69, calibration_error: 0.0, mae: 0.0 }
    }
}

/// Full Free-Energy/calibration health report.
#[derive(Debug, Clone)]
pub struct FreeEnergyReport {
    /// `min(1.0, variance(predicted_scores) / 250000)`.
    pub entropy: f64,
    /// `mean(errors)`.
    pub surprise: f64,
    /// `entropy + surprise`.
    pub free_energy: f64,
    /// Calibration metrics.
    pub calibration: CalibrationReport,
    /// Overall health classification.
    pub health: HealthStatus,
    /// Plain-language recommendations derived from breached thresholds.
    pub recommendations: Vec<String>,
}

const ENTROPY_VARIANCE_DIVISOR: f64 = 250_000.0;
const HEALTHY_THRESHOLD: f64 = 0.35;
const DEGRADED_THRESHOLD: f64 = 0.7;
const CALIBRATION_ERROR_THRESHOLD: f64 = 0.1;
const BRIER_THRESHOLD: f64 = 0.25;

/// Produces a [`FreeEnergyReport`] from the current window contents.
#[must_use]
pub fn report(window: &PredictionWindow) -> FreeEnergyReport {
    let completed = window.completed();

    if completed.len() < MIN_COMPLETED_FOR_REPORT {
        return FreeEnergyReport {
            entropy: 0.5,
            surprise: 0.0,
            free_energy: 0.5,
            calibration: CalibrationReport::default(),
            health: HealthStatus::Unknown,
            recommendations: vec!["gather more predictions before trusting calibration metrics".to_string()],
        };
    }

    let predicted_scores: Vec<f64> = window.records.iter().map(|r| r.predicted_score).collect();
    let entropy = (variance(&predicted_scores) / ENTROPY_VARIANCE_DIVISOR).min(1.0);

    let errors: Vec<f64> = completed.iter().filter_map(|r| r.error).collect();
    let surprise = mean(&errors);
    let free_energy = entropy + surprise;

    let calibration = calibrate(&completed);

    let health = if free_energy < HEALTHY_THRESHOLD {
        HealthStatus::Healthy
    } else if free_energy < DEGRADED_THRESHOLD {
        HealthStatus::Degraded
    } else {
        HealthStatus::Critical
    };

    FreeEnergyReport {
        entropy,
        surprise,
        free_energy,
        calibration,
        health,
        recommendations: recommendations(entropy, surprise, &calibration),
    }
}

fn calibrate(completed: &[&PredictionRecord]) -> CalibrationReport {
    let mut squared_errors = Vec::with_capacity(completed.len());
    let mut log_losses = Vec::with_capacity(completed.len());
    let mut absolute_errors = Vec::with_capacity(completed.len());
    let mut predicted_go = 0usize;
    let mut actual_success = 0usize;

    for record in completed {
        let pred_prob = (record.predicted_score / 1000.0).clamp(0.05, 0.95);
        let success = record.actual_success.unwrap_or(false);
        let actual = if success { 1.0 } else { 0.0 };

        squared_errors.push((pred_prob - actual).powi(2));
        absolute_errors.push((pred_prob - actual).abs());
        log_losses.push(if success {
            -(pred_prob.max(0.001)).ln()
        } else {
            -(1.0 - pred_prob).max(0.001).ln()
        });

        if record.predicted_score >= 500.0 {
            predicted_go += 1;
        }
        if success {
            actual_success += 1;
        }
    }

    let n = completed.len() as f64;
    let p_predicted_go = predicted_go as f64 / n;
    let p_actual_success = actual_success as f64 / n;

    CalibrationReport {
        brier: mean(&squared_errors),
        log_loss: mean(&log_losses),
        calibration_error: (p_predicted_go - p_actual_success).abs(),
        mae: mean(&absolute_errors),
    }
}

fn recommendations(entropy: f64, surprise: f64, calibration: &CalibrationReport) -> Vec<String> {
    let mut out = Vec::new();
    if entropy > HEALTHY_THRESHOLD {
        out.push("predicted scores are highly dispersed; consider tightening the scoring inputs".to_string());
    }
    if surprise > HEALTHY_THRESHOLD {
        out.push("recent outcomes are diverging from predictions; re-check the likelihood model".to_string());
    }
    if calibration.calibration_error > CALIBRATION_ERROR_THRESHOLD {
        out.push("the GO/NO-GO threshold is miscalibrated against observed success rates".to_string());
    }
    if calibration.brier > BRIER_THRESHOLD {
        out.push("predicted probabilities are poorly separated from outcomes; review proof/evidence inputs".to_string());
    }
    if out.is_empty() {
        out.push("system healthy".to_string());
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;

    fn record(predicted: f64, success: bool, error: f64) -> PredictionRecord {
        PredictionRecord { predicted_score: predicted, actual_success: Some(success), error: Some(error) }
    }

    #[test]
    fn fewer_than_five_completed_records_reports_unknown() {
        let mut window = PredictionWindow::new();
        window.push(record(700.0, true, 0.1));
        let result = report(&window);
        assert_eq!(result.health, HealthStatus::Unknown);
        assert!((result.free_energy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ring_buffer_evicts_the_oldest_record_past_capacity() {
        let mut window = PredictionWindow::new();
        for i in 0..MAX_RECORDS + 10 {
            window.push(record(i as f64, true, 0.0));
        }
        assert_eq!(window.records.len(), MAX_RECORDS);
        assert!((window.records.front().expect("front exists").predicted_score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn well_calibrated_predictions_report_healthy() {
        let mut window = PredictionWindow::new();
        for _ in 0..10 {
            window.push(record(800.0, true, 0.05));
            window.push(record(200.0, false, 0.05));
        }
        let result = report(&window);
        assert_eq!(result.health, HealthStatus::Healthy);
    }

    #[test]
    fn badly_calibrated_predictions_report_degraded_or_critical() {
        let mut window = PredictionWindow::new();
        for _ in 0..10 {
            window.push(record(900.0, false, 0.9));
            window.push(record(100.0, true, 0.9));
        }
        let result = report(&window);
        assert!(matches!(result.health, HealthStatus::Degraded | HealthStatus::Critical));
    }
}

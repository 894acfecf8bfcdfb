//! Weighted-signal risk scoring (§4.3), grounded on
//! `ScoringConfigSpec` shape: named signal weights plus ascending
//! classification-bucket thresholds, both externally configurable.

use serde::{Deserialize, Serialize};

use crate::types::{Recommendation, RiskLevel, WorkloadInputs};

/// Weights for the five workload risk signals. Not required to sum to
/// 1.0 — each factor is independently normalized first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeights {
    pub open_count: f64,
    pub story_points_open: f64,
    pub high_priority_open_count: f64,
    pub overdue_count: f64,
    pub capacity_utilization: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            open_count: 0.15,
            story_points_open: 0.2,
            high_priority_open_count: 0.25,
            overdue_count: 0.25,
            capacity_utilization: 0.15,
        }
    }
}

/// Ascending boundaries partitioning the normalized risk score into
/// `{low, moderate, high, critical}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self { moderate: 0.35, high: 0.6, critical: 0.85 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: SignalWeights,
    pub thresholds: ClassificationThresholds,
    /// Normalization caps: a factor at or above its cap contributes its
    /// full weight; values between `0` and the cap scale linearly.
    pub open_count_cap: f64,
    pub story_points_cap: f64,
    pub high_priority_cap: f64,
    pub overdue_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            thresholds: ClassificationThresholds::default(),
            open_count_cap: 15.0,
            story_points_cap: 40.0,
            high_priority_cap: 5.0,
            overdue_cap: 3.0,
        }
    }
}

fn normalize(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        return 0.0;
    }
    (value / cap).clamp(0.0, 1.0)
}

/// Weighted sum of the five normalized signals, in `[0, 1]`.
pub fn risk_score(inputs: &WorkloadInputs, config: &ScoringConfig) -> f64 {
    let w = &config.weights;
    w.open_count * normalize(inputs.open_count as f64, config.open_count_cap)
        + w.story_points_open * normalize(inputs.story_points_open, config.story_points_cap)
        + w.high_priority_open_count
            * normalize(inputs.high_priority_open_count as f64, config.high_priority_cap)
        + w.overdue_count * normalize(inputs.overdue_count as f64, config.overdue_cap)
        + w.capacity_utilization * inputs.capacity_utilization.clamp(0.0, 1.0)
}

pub fn classify_risk(score: f64, thresholds: &ClassificationThresholds) -> RiskLevel {
    if score >= thresholds.critical {
        RiskLevel::Critical
    } else if score >= thresholds.high {
        RiskLevel::High
    } else if score >= thresholds.moderate {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Deterministic mapping from risk bucket to recommendation tags
/// (§4.3: "a deterministic function of the risk bucket").
pub fn recommendations_for(risk: RiskLevel, inputs: &WorkloadInputs) -> Vec<Recommendation> {
    match risk {
        RiskLevel::Low => vec![],
        RiskLevel::Moderate => vec![Recommendation::Defer],
        RiskLevel::High => {
            let mut out = vec![Recommendation::ReducePriorityLoad];
            if inputs.overdue_count > 0 {
                out.push(Recommendation::Reassign);
            }
            out
        }
        RiskLevel::Critical => {
            vec![Recommendation::Reassign, Recommendation::EscalateToLead]
        }
    }
}

//! Calibration scoring of past predictions.
//!
//! A well-calibrated forecaster who says "70 %" wins about 70 % of the time.
//! Predictions are bucketed by stated probability and each bucket's hit rate
//! is compared with its mean prediction.

use crate::error::{check_probability, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_NUM_BINS: usize = 10;

/// Summed over/under-confidence above this earns a recommendation.
const CONFIDENCE_THRESHOLD: f64 = 0.1;
const HIGH_SEVERITY_THRESHOLD: f64 = 0.2;
/// A bin needs more than this many predictions to be judged on its own.
const MIN_BIN_COUNT: u32 = 5;
const BIN_ERROR_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub predicted_probability: f64,
    pub actual_outcome: bool,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub bet_type: Option<String>,
}

impl CalibrationPoint {
    pub fn new(predicted_probability: f64, actual_outcome: bool) -> Self {
        Self {
            predicted_probability,
            actual_outcome,
            sport: None,
            bet_type: None,
        }
    }
}

fn outcome_value(won: bool) -> f64 {
    if won {
        1.0
    } else {
        0.0
    }
}

fn validate(points: &[CalibrationPoint]) -> Result<()> {
    for p in points {
        check_probability("predicted_probability", p.predicted_probability)?;
    }
    Ok(())
}

/// Mean squared error of the predictions, 0 for no predictions.
pub fn brier_score(points: &[CalibrationPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum: f64 = points
        .iter()
        .map(|p| (p.predicted_probability - outcome_value(p.actual_outcome)).powi(2))
        .sum();
    sum / points.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    /// Mean predicted probability, 0 for an empty bin.
    pub predicted: f64,
    /// Observed win rate, 0 for an empty bin.
    pub actual: f64,
    pub count: u32,
}

/// Equal-width bins over [0, 1]; a prediction of exactly 1 falls in the last.
pub fn calibration_curve(points: &[CalibrationPoint], num_bins: usize) -> Result<Vec<CalibrationBin>> {
    if num_bins == 0 {
        return Err(EngineError::invalid("num_bins", 0, "need at least one bin"));
    }
    validate(points)?;

    let mut sums = vec![(0.0_f64, 0.0_f64, 0_u32); num_bins];
    for p in points {
        let idx = ((p.predicted_probability * num_bins as f64).floor() as usize).min(num_bins - 1);
        let bin = &mut sums[idx];
        bin.0 += p.predicted_probability;
        bin.1 += outcome_value(p.actual_outcome);
        bin.2 += 1;
    }

    let width = 1.0 / num_bins as f64;
    Ok(sums
        .into_iter()
        .enumerate()
        .map(|(i, (predicted, actual, count))| {
            let n = count.max(1) as f64;
            CalibrationBin {
                lower: i as f64 * width,
                upper: (i + 1) as f64 * width,
                predicted: if count > 0 { predicted / n } else { 0.0 },
                actual: if count > 0 { actual / n } else { 0.0 },
                count,
            }
        })
        .collect())
}

/// Count-weighted sums of how far predictions sat above (over) or below
/// (under) the observed rate. Empty bins contribute nothing.
pub fn confidence_metrics(curve: &[CalibrationBin]) -> (f64, f64) {
    let mut over = 0.0;
    let mut under = 0.0;
    for bin in curve.iter().filter(|b| b.count > 0) {
        let gap = (bin.predicted - bin.actual) * bin.count as f64;
        if gap > 0.0 {
            over += gap;
        } else {
            under -= gap;
        }
    }
    (over, under)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Overconfidence,
    Underconfidence,
    SpecificRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    fn for_total(total: f64) -> Self {
        if total > HIGH_SEVERITY_THRESHOLD {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecommendation {
    pub kind: RecommendationKind,
    pub description: String,
    pub severity: Severity,
    pub suggested_action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationMetrics {
    pub total_predictions: usize,
    pub brier_score: f64,
    pub calibration_curve: Vec<CalibrationBin>,
    pub overconfidence: f64,
    pub underconfidence: f64,
}

impl CalibrationMetrics {
    /// Recompute everything from the full prediction history.
    pub fn compute(points: &[CalibrationPoint]) -> Result<Self> {
        Self::compute_with_bins(points, DEFAULT_NUM_BINS)
    }

    pub fn compute_with_bins(points: &[CalibrationPoint], num_bins: usize) -> Result<Self> {
        if points.is_empty() {
            return Err(EngineError::invalid("points", 0, "no predictions to calibrate"));
        }
        let calibration_curve = calibration_curve(points, num_bins)?;
        let (overconfidence, underconfidence) = confidence_metrics(&calibration_curve);

        Ok(Self {
            total_predictions: points.len(),
            brier_score: brier_score(points),
            calibration_curve,
            overconfidence,
            underconfidence,
        })
    }

    pub fn recommendations(&self) -> Vec<CalibrationRecommendation> {
        let mut out = Vec::new();

        if self.overconfidence > CONFIDENCE_THRESHOLD {
            out.push(CalibrationRecommendation {
                kind: RecommendationKind::Overconfidence,
                description: "You tend to be overconfident in your predictions".to_string(),
                severity: Severity::for_total(self.overconfidence),
                suggested_action: "Consider being more conservative with your probability estimates",
            });
        }

        if self.underconfidence > CONFIDENCE_THRESHOLD {
            out.push(CalibrationRecommendation {
                kind: RecommendationKind::Underconfidence,
                description: "You tend to be underconfident in your predictions".to_string(),
                severity: Severity::for_total(self.underconfidence),
                suggested_action: "Consider being more confident in your probability estimates",
            });
        }

        for bin in &self.calibration_curve {
            if bin.count > MIN_BIN_COUNT && (bin.predicted - bin.actual).abs() > BIN_ERROR_THRESHOLD {
                out.push(CalibrationRecommendation {
                    kind: RecommendationKind::SpecificRange,
                    description: format!(
                        "Significant calibration error in the {:.0}-{:.0}% range",
                        bin.lower * 100.0,
                        bin.upper * 100.0
                    ),
                    severity: Severity::Medium,
                    suggested_action: "Review your prediction methodology for this probability range",
                });
            }
        }

        out
    }
}

/// Identifies one slice of a prediction history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Segment {
    pub sport: Option<String>,
    pub bet_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub segment: Segment,
    pub metrics: CalibrationMetrics,
    pub recommendations: Vec<CalibrationRecommendation>,
}

/// Metrics per (sport, bet type), in segment order.
pub fn metrics_by_segment(points: &[CalibrationPoint], num_bins: usize) -> Result<Vec<SegmentReport>> {
    let mut groups: BTreeMap<Segment, Vec<CalibrationPoint>> = BTreeMap::new();
    for p in points {
        let segment = Segment {
            sport: p.sport.clone(),
            bet_type: p.bet_type.clone(),
        };
        groups.entry(segment).or_default().push(p.clone());
    }

    groups
        .into_iter()
        .map(|(segment, pts)| {
            let metrics = CalibrationMetrics::compute_with_bins(&pts, num_bins)?;
            tracing::debug!(
                sport = ?segment.sport,
                bet_type = ?segment.bet_type,
                n = metrics.total_predictions,
                brier = metrics.brier_score,
                "calibration segment"
            );
            let recommendations = metrics.recommendations();
            Ok(SegmentReport {
                segment,
                metrics,
                recommendations,
            })
        })
        .collect()
}

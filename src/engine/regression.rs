//! Regression to the mean.
//!
//! Extreme short-run performance drifts back toward a baseline. How far it
//! drifts depends on the metric (a per-sport regression factor) and how much
//! to trust the sample depends on its size relative to the metric's
//! stabilization point. The analysis nudges a user's probability against a
//! hot or cold streak and flags the cognitive biases the streak invites.

use super::stats::{ConfidenceLevel, Interval};
use crate::config::{MetricProfile, RegressionTable, TableSource};
use crate::error::{check_finite, check_probability, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability shift per standard deviation of over/under-performance.
const ADJUSTMENT_PER_SD: f64 = 0.05;
/// Adjustment never exceeds this share of the distance to the nearer bound.
const MAX_ADJUSTMENT_SHARE: f64 = 0.5;
/// Percentage metrics cap the spread at this share of min(avg, 1 - avg).
const PERCENTAGE_SD_CAP: f64 = 0.8;

const RECENCY_SD_THRESHOLD: f64 = 1.5;
const HOT_HAND_SAMPLE_SHARE: f64 = 0.3;
const GAMBLERS_SD_SHARE: f64 = 0.8;
const GAMBLERS_SEVERITY: f64 = 0.7;
const SMALL_SAMPLE_SHARE: f64 = 0.2;

/// `n / (n + s)`: 0 with no data, 0.5 at the stabilization point, never 1.
pub fn reliability(sample_size: f64, stabilization_point: f64) -> Result<f64> {
    if !sample_size.is_finite() || sample_size < 0.0 {
        return Err(EngineError::invalid("sample_size", sample_size, "must be non-negative"));
    }
    if !stabilization_point.is_finite() || stabilization_point <= 0.0 {
        return Err(EngineError::invalid(
            "stabilization_point",
            stabilization_point,
            "must be positive",
        ));
    }
    Ok(sample_size / (sample_size + stabilization_point))
}

/// Reliability-weighted blend of the observation and the population mean.
pub fn estimate_true_talent(observed: f64, population_mean: f64, reliability: f64) -> f64 {
    observed * reliability + population_mean * (1.0 - reliability)
}

/// `baseline + (current - baseline) * (1 - factor)`
pub fn expected_performance(current: f64, baseline: f64, regression_factor: f64) -> f64 {
    baseline + (current - baseline) * (1.0 - regression_factor)
}

fn is_percentage_metric(metric: &str) -> bool {
    metric.to_ascii_lowercase().contains("percentage")
}

/// Spread of a metric. Percentage metrics with a known league average are
/// capped so the interval cannot cover impossible rates.
pub fn standard_deviation(profile: &MetricProfile, metric: &str, league_average: Option<f64>) -> f64 {
    match league_average {
        Some(avg) if is_percentage_metric(metric) => {
            profile.std_dev.min(avg.min(1.0 - avg) * PERCENTAGE_SD_CAP)
        }
        _ => profile.std_dev,
    }
}

/// `expected ± z * sd / sqrt(n)`.
pub fn confidence_interval(
    expected: f64,
    std_dev: f64,
    sample_size: f64,
    level: ConfidenceLevel,
) -> Result<Interval> {
    if sample_size <= 0.0 {
        return Err(EngineError::degenerate(
            "confidence_interval",
            "standard error is undefined for an empty sample",
        ));
    }
    if std_dev <= 0.0 {
        return Err(EngineError::degenerate(
            "confidence_interval",
            "standard deviation must be positive",
        ));
    }
    let standard_error = std_dev / sample_size.sqrt();
    Ok(Interval::around(expected, level.z_score() * standard_error))
}

/// How many standard deviations the current level sits above the
/// regression-adjusted expectation.
pub fn deviations_from_mean(current: f64, expected: f64, std_dev: f64) -> Result<f64> {
    if !std_dev.is_finite() || std_dev <= 0.0 {
        return Err(EngineError::degenerate(
            "deviations_from_mean",
            "standard deviation must be positive",
        ));
    }
    Ok((current - expected) / std_dev)
}

/// Move `original` against the streak: 5 points per standard deviation,
/// bounded by half the distance to the nearer of 0 and 1.
pub fn adjust_probability(original: f64, deviations: f64) -> f64 {
    let max = original.min(1.0 - original) * MAX_ADJUSTMENT_SHARE;
    let raw = deviations * ADJUSTMENT_PER_SD;
    original - raw.clamp(-max, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceStatus {
    Overperforming,
    Underperforming,
    Average,
}

impl PerformanceStatus {
    pub fn classify(current: f64, baseline: f64) -> Self {
        if current > baseline {
            PerformanceStatus::Overperforming
        } else if current < baseline {
            PerformanceStatus::Underperforming
        } else {
            PerformanceStatus::Average
        }
    }
}

impl fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PerformanceStatus::Overperforming => "overperforming",
            PerformanceStatus::Underperforming => "underperforming",
            PerformanceStatus::Average => "average",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionInput {
    pub current_performance: f64,
    pub baseline: f64,
    #[serde(default)]
    pub league_average: Option<f64>,
    pub sample_size: f64,
    pub sport: String,
    pub metric: String,
    pub original_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BiasKind {
    RecencyBias,
    HotHandFallacy,
    GamblersFallacy,
    SmallSampleSize,
}

impl BiasKind {
    pub fn description(self) -> &'static str {
        match self {
            BiasKind::RecencyBias => "Recency Bias",
            BiasKind::HotHandFallacy => "Hot-Hand Fallacy",
            BiasKind::GamblersFallacy => "Gambler's Fallacy",
            BiasKind::SmallSampleSize => "Small Sample Size",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CognitiveBias {
    pub kind: BiasKind,
    pub description: &'static str,
    pub explanation: String,
    /// 0-1
    pub severity: f64,
}

impl CognitiveBias {
    fn new(kind: BiasKind, explanation: String, severity: f64) -> Self {
        Self {
            kind,
            description: kind.description(),
            explanation,
            severity: severity.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionAnalysis {
    pub sport: String,
    pub metric: String,
    pub current_performance: f64,
    pub baseline: f64,
    pub expected_performance: f64,
    pub estimated_talent: f64,
    pub original_probability: f64,
    pub adjusted_probability: f64,
    /// `None` when the sample is empty.
    pub confidence_interval: Option<Interval>,
    pub regression_factor: f64,
    pub reliability: f64,
    pub performance_status: PerformanceStatus,
    pub sample_size: f64,
    pub stabilization_point: f64,
    pub standard_deviation: f64,
    /// Table spread before any percentage cap.
    pub table_std_dev: f64,
    pub deviations_from_mean: f64,
    pub table_source: TableSource,
    pub biases: Vec<CognitiveBias>,
}

impl RegressionAnalysis {
    pub fn used_default_factors(&self) -> bool {
        self.table_source.is_fallback()
    }
}

/// Full regression analysis of one streak against its baseline.
pub fn analyze(
    input: &RegressionInput,
    table: &RegressionTable,
    level: ConfidenceLevel,
) -> Result<RegressionAnalysis> {
    let current = check_finite("current_performance", input.current_performance)?;
    let baseline = check_finite("baseline", input.baseline)?;
    let original = check_probability("original_probability", input.original_probability)?;
    if let Some(avg) = input.league_average {
        check_finite("league_average", avg)?;
        if is_percentage_metric(&input.metric) && !(0.0..=1.0).contains(&avg) {
            return Err(EngineError::invalid(
                "league_average",
                avg,
                "percentage metrics need an average within [0, 1]",
            ));
        }
    }

    let sport = input.sport.to_lowercase();
    let (profile, table_source) = table.resolve(&sport, &input.metric);
    let reliability = reliability(input.sample_size, profile.stabilization_point)?;
    let estimated_talent = estimate_true_talent(current, baseline, reliability);
    let expected = expected_performance(current, baseline, profile.factor);

    let std_dev = standard_deviation(&profile, &input.metric, input.league_average);
    let deviations = deviations_from_mean(current, expected, std_dev)?;

    let confidence_interval = if input.sample_size > 0.0 {
        Some(confidence_interval(expected, std_dev, input.sample_size, level)?)
    } else {
        None
    };

    let mut analysis = RegressionAnalysis {
        sport,
        metric: input.metric.clone(),
        current_performance: current,
        baseline,
        expected_performance: expected,
        estimated_talent,
        original_probability: original,
        adjusted_probability: adjust_probability(original, deviations),
        confidence_interval,
        regression_factor: profile.factor,
        reliability,
        performance_status: PerformanceStatus::classify(current, baseline),
        sample_size: input.sample_size,
        stabilization_point: profile.stabilization_point,
        standard_deviation: std_dev,
        table_std_dev: profile.std_dev,
        deviations_from_mean: deviations,
        table_source,
        biases: Vec::new(),
    };
    analysis.biases = identify_biases(&analysis);

    tracing::debug!(
        sport = %analysis.sport,
        metric = %analysis.metric,
        deviations,
        adjusted = analysis.adjusted_probability,
        biases = analysis.biases.len(),
        "regression analysis"
    );
    Ok(analysis)
}

/// Biases a streak like this one tends to provoke. Each check is independent.
pub fn identify_biases(analysis: &RegressionAnalysis) -> Vec<CognitiveBias> {
    let mut biases = Vec::new();
    let n = analysis.sample_size;
    let s = analysis.stabilization_point;
    let abs_dev = analysis.deviations_from_mean.abs();

    if abs_dev > RECENCY_SD_THRESHOLD {
        biases.push(CognitiveBias::new(
            BiasKind::RecencyBias,
            format!(
                "Current {} performance is {:.1} standard deviations from the mean, \
                 suggesting possible recency bias in probability estimates.",
                analysis.performance_status, abs_dev
            ),
            (abs_dev / 2.0).min(1.0),
        ));
    }

    if analysis.performance_status == PerformanceStatus::Overperforming
        && n < s * HOT_HAND_SAMPLE_SHARE
    {
        biases.push(CognitiveBias::new(
            BiasKind::HotHandFallacy,
            format!(
                "Current hot streak ({n} observations) is smaller than the stabilization \
                 point ({s}), suggesting caution when projecting continued high performance."
            ),
            1.0 - n / (s * 0.5),
        ));
    }

    if analysis.performance_status == PerformanceStatus::Underperforming
        && (analysis.current_performance - analysis.baseline).abs()
            > GAMBLERS_SD_SHARE * analysis.table_std_dev
    {
        biases.push(CognitiveBias::new(
            BiasKind::GamblersFallacy,
            "Be cautious about assuming an immediate return to baseline performance. \
             Regression happens gradually over time, not necessarily in the next event."
                .to_string(),
            GAMBLERS_SEVERITY,
        ));
    }

    if n < s * SMALL_SAMPLE_SHARE {
        biases.push(CognitiveBias::new(
            BiasKind::SmallSampleSize,
            format!(
                "Current performance is based on a small sample ({n} vs. stabilization at {s}), \
                 making it less reliable for predictive purposes."
            ),
            1.0 - n / (s * SMALL_SAMPLE_SHARE),
        ));
    }

    biases
}

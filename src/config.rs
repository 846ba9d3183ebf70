use crate::engine::stats::ConfidenceLevel;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Sport used when a request names a sport the model table does not know.
pub const FALLBACK_SPORT: &str = "basketball";
/// Regression table key holding the cross-sport defaults.
pub const DEFAULT_SPORT_KEY: &str = "default";
/// Per-sport catch-all metric key in the regression table.
pub const ANY_METRIC_KEY: &str = "anyMetric";

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub risk: RiskConfig,
    pub factors: FactorConfig,
    pub models: ModelConfig,
    pub regression: RegressionTable,
    pub calibration: CalibrationConfig,
}

/// Bankroll policy. Fractions are shares of bankroll in [0, 1].
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    pub fraction_multiplier: f64,
    pub max_bet_percentage: f64,
    pub stop_loss_percentage: f64,
    pub stop_win_percentage: f64,
    pub max_open_bets: u32,
    pub max_consecutive_losses: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            fraction_multiplier: 0.5,
            max_bet_percentage: 0.1,
            stop_loss_percentage: 0.2,
            stop_win_percentage: 0.5,
            max_open_bets: 5,
            max_consecutive_losses: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FactorConfig {
    pub base_probability: f64,
    pub confidence_level: ConfidenceLevel,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            base_probability: 0.5,
            confidence_level: ConfidenceLevel::NinetyFive,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScoringType {
    Goals,
    Points,
    Runs,
}

impl ScoringType {
    /// Upper bound (exclusive) of the Poisson score grid.
    pub fn max_score(self) -> u32 {
        match self {
            ScoringType::Goals => 10,
            ScoringType::Points | ScoringType::Runs => 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SportParams {
    pub k_factor: f64,
    /// Elo points added to the home side's rating.
    pub home_advantage: f64,
    pub default_rating: f64,
    pub scoring_type: ScoringType,
}

impl SportParams {
    const fn new(k_factor: f64, home_advantage: f64, scoring_type: ScoringType) -> Self {
        Self {
            k_factor,
            home_advantage,
            default_rating: 1500.0,
            scoring_type,
        }
    }
}

const BASKETBALL: SportParams = SportParams::new(32.0, 100.0, ScoringType::Points);

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct BlendWeights {
    pub regression: f64,
    pub elo: f64,
    pub poisson: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            regression: 0.4,
            elo: 0.4,
            poisson: 0.2,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub blend: BlendWeights,
    pub sports: BTreeMap<String, SportParams>,
    /// Weights of the linear regression sub-model, keyed by feature name.
    pub feature_weights: BTreeMap<String, f64>,
    /// Per-sport replacements for individual feature weights.
    pub feature_overrides: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let sports = [
            ("basketball", BASKETBALL),
            ("football", SportParams::new(24.0, 70.0, ScoringType::Goals)),
            ("baseball", SportParams::new(20.0, 50.0, ScoringType::Runs)),
            ("hockey", SportParams::new(28.0, 60.0, ScoringType::Goals)),
            ("soccer", SportParams::new(24.0, 80.0, ScoringType::Goals)),
        ];
        let feature_weights = [
            ("homeAdvantage", 0.1),
            ("recentForm", 0.3),
            ("headToHead", 0.2),
            ("restDays", 0.1),
            ("injuries", 0.1),
            ("weather", 0.1),
            ("venue", 0.1),
        ];
        let feature_overrides = [
            ("baseball", vec![("weather", 0.15), ("homeAdvantage", 0.08)]),
            ("soccer", vec![("homeAdvantage", 0.15), ("venue", 0.15)]),
        ];

        Self {
            blend: BlendWeights::default(),
            sports: sports
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            feature_weights: weights(&feature_weights),
            feature_overrides: feature_overrides
                .into_iter()
                .map(|(sport, w)| (sport.to_string(), weights(&w)))
                .collect(),
        }
    }
}

fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl ModelConfig {
    /// Elo/Poisson parameters for `sport`, falling back to basketball.
    pub fn sport_params(&self, sport: &str) -> SportParams {
        if let Some(p) = self.sports.get(sport) {
            return *p;
        }
        tracing::warn!(sport, fallback = FALLBACK_SPORT, "unknown sport, using fallback model parameters");
        self.sports.get(FALLBACK_SPORT).copied().unwrap_or(BASKETBALL)
    }

    /// Base feature weights with the sport's overrides applied.
    pub fn feature_weights_for(&self, sport: &str) -> BTreeMap<String, f64> {
        let mut out = self.feature_weights.clone();
        if let Some(overrides) = self.feature_overrides.get(sport) {
            for (k, v) in overrides {
                out.insert(k.clone(), *v);
            }
        }
        out
    }
}

/// Regression-to-the-mean parameters for one metric.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct MetricProfile {
    /// Share of an observed deviation expected to fade, in [0, 1].
    pub factor: f64,
    /// Sample size at which observed and prior carry equal weight.
    pub stabilization_point: f64,
    pub std_dev: f64,
}

impl MetricProfile {
    const fn new(factor: f64, stabilization_point: f64, std_dev: f64) -> Self {
        Self {
            factor,
            stabilization_point,
            std_dev,
        }
    }
}

const GLOBAL_FALLBACK_PROFILE: MetricProfile = MetricProfile::new(0.65, 40.0, 0.1);

/// Where a resolved [`MetricProfile`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    /// The sport's own entry for the metric.
    Exact,
    /// The sport's `anyMetric` entry.
    SportFallback,
    /// The metric's entry under the `default` sport.
    DefaultSport,
    /// `default.anyMetric`, or the built-in profile if that is missing too.
    GlobalFallback,
}

impl TableSource {
    pub fn is_fallback(self) -> bool {
        self != TableSource::Exact
    }
}

/// sport -> metric -> profile
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct RegressionTable(pub BTreeMap<String, BTreeMap<String, MetricProfile>>);

impl Default for RegressionTable {
    fn default() -> Self {
        let rows: &[(&str, &[(&str, MetricProfile)])] = &[
            (
                "basketball",
                &[
                    ("threePointPercentage", MetricProfile::new(0.70, 750.0, 0.05)),
                    ("freeThrowPercentage", MetricProfile::new(0.55, 250.0, 0.08)),
                    ("fieldGoalPercentage", MetricProfile::new(0.60, 400.0, 0.04)),
                    ("winPercentage", MetricProfile::new(0.65, 70.0, 0.15)),
                    ("pointsPerGame", MetricProfile::new(0.40, 20.0, 5.0)),
                    ("assistsPerGame", MetricProfile::new(0.30, 15.0, 1.5)),
                ],
            ),
            (
                "baseball",
                &[
                    ("battingAverage", MetricProfile::new(0.80, 500.0, 0.025)),
                    ("onBasePercentage", MetricProfile::new(0.65, 350.0, 0.03)),
                    ("sluggingPercentage", MetricProfile::new(0.75, 450.0, 0.05)),
                    ("era", MetricProfile::new(0.70, 500.0, 0.75)),
                    ("winPercentage", MetricProfile::new(0.85, 100.0, 0.1)),
                ],
            ),
            (
                "football",
                &[
                    ("passCompletionPercentage", MetricProfile::new(0.65, 300.0, 0.05)),
                    ("yardsPerAttempt", MetricProfile::new(0.75, 400.0, 1.0)),
                    ("winPercentage", MetricProfile::new(0.80, 48.0, 0.2)),
                    ("fieldGoalPercentage", MetricProfile::new(0.70, 100.0, 0.07)),
                ],
            ),
            (
                "soccer",
                &[
                    ("scoringRate", MetricProfile::new(0.78, 40.0, 0.1)),
                    ("winPercentage", MetricProfile::new(0.75, 60.0, 0.15)),
                    ("cleanSheetRate", MetricProfile::new(0.68, 35.0, 0.12)),
                    ("goalConversionRate", MetricProfile::new(0.80, 120.0, 0.04)),
                ],
            ),
            (
                "hockey",
                &[
                    ("shootingPercentage", MetricProfile::new(0.75, 300.0, 0.03)),
                    ("savePercentage", MetricProfile::new(0.65, 1500.0, 0.015)),
                    ("winPercentage", MetricProfile::new(0.70, 82.0, 0.12)),
                ],
            ),
            (
                DEFAULT_SPORT_KEY,
                &[
                    ("winPercentage", MetricProfile::new(0.70, 50.0, 0.15)),
                    ("scoringRate", MetricProfile::new(0.75, 30.0, 0.1)),
                    (ANY_METRIC_KEY, GLOBAL_FALLBACK_PROFILE),
                ],
            ),
        ];

        RegressionTable(
            rows.iter()
                .map(|(sport, metrics)| {
                    let metrics: BTreeMap<String, MetricProfile> = metrics
                        .iter()
                        .map(|(m, p)| (m.to_string(), *p))
                        .collect();
                    (sport.to_string(), metrics)
                })
                .collect(),
        )
    }
}

impl RegressionTable {
    /// Look up the profile for `sport`/`metric`.
    ///
    /// A known sport falls back to its own `anyMetric`, then to
    /// `default.anyMetric`. An unknown sport reads the `default` table
    /// instead, metric first, then `anyMetric`.
    pub fn resolve(&self, sport: &str, metric: &str) -> (MetricProfile, TableSource) {
        let global = || {
            self.0
                .get(DEFAULT_SPORT_KEY)
                .and_then(|t| t.get(ANY_METRIC_KEY))
                .copied()
                .unwrap_or(GLOBAL_FALLBACK_PROFILE)
        };

        let (profile, source) = match self.0.get(sport) {
            Some(table) => {
                if let Some(p) = table.get(metric) {
                    return (*p, TableSource::Exact);
                }
                match table.get(ANY_METRIC_KEY) {
                    Some(p) => (*p, TableSource::SportFallback),
                    None => (global(), TableSource::GlobalFallback),
                }
            }
            None => match self.0.get(DEFAULT_SPORT_KEY).and_then(|t| t.get(metric)) {
                Some(p) => (*p, TableSource::DefaultSport),
                None => (global(), TableSource::GlobalFallback),
            },
        };

        tracing::warn!(sport, metric, source = ?source, "regression table has no entry, using fallback profile");
        (profile, source)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub num_bins: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { num_bins: 10 }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no engine call could accept.
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("risk.fraction_multiplier", self.risk.fraction_multiplier),
            ("risk.max_bet_percentage", self.risk.max_bet_percentage),
            ("risk.stop_loss_percentage", self.risk.stop_loss_percentage),
            ("risk.stop_win_percentage", self.risk.stop_win_percentage),
            ("factors.base_probability", self.factors.base_probability),
        ];
        for (name, v) in unit {
            ensure!((0.0..=1.0).contains(&v), "{} must be within [0, 1], got {}", name, v);
        }
        ensure!(self.calibration.num_bins > 0, "calibration.num_bins must be positive");

        let blend = self.models.blend;
        for (name, w) in [
            ("models.blend.regression", blend.regression),
            ("models.blend.elo", blend.elo),
            ("models.blend.poisson", blend.poisson),
        ] {
            ensure!(w.is_finite() && w >= 0.0, "{} must be a non-negative number, got {}", name, w);
        }
        // the blend renormalises over these two when Poisson is absent
        ensure!(
            blend.regression + blend.elo > 0.0,
            "models.blend regression and elo weights cannot both be 0"
        );

        for (sport, p) in &self.models.sports {
            ensure!(
                p.k_factor.is_finite() && p.k_factor > 0.0,
                "models.sports.{}.k_factor must be positive, got {}",
                sport,
                p.k_factor
            );
            ensure!(
                p.home_advantage.is_finite() && p.default_rating.is_finite(),
                "models.sports.{} has a non-finite home_advantage or default_rating",
                sport
            );
        }

        for (sport, metrics) in &self.regression.0 {
            for (metric, p) in metrics {
                ensure!(
                    (0.0..=1.0).contains(&p.factor) && p.stabilization_point > 0.0 && p.std_dev > 0.0,
                    "regression.{}.{} has an out-of-range profile",
                    sport,
                    metric
                );
            }
        }
        Ok(())
    }
}

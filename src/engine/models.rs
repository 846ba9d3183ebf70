//! Statistical win-probability models and their blend.
//!
//! Three independent estimates of the same "team beats opponent" event:
//!
//! - **Elo**: logistic on the rating gap, home side gets a rating bonus
//! - **Poisson**: independent scoring rates, P(team scores strictly more),
//!   summed over a truncated score grid
//! - **Regression**: 0.5 plus a weighted sum of caller-scored features
//!
//! `blend` combines them 0.4 / 0.4 / 0.2 (configurable), renormalizing when
//! no scoring rates are supplied.

use super::stats::clamp_unit;
use crate::config::{BlendWeights, ModelConfig, ScoringType, SportParams};
use crate::error::{check_finite, check_unit_interval, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Elo scale: a 400 point gap is 10:1 odds.
const ELO_SCALE: f64 = 400.0;
const REGRESSION_BASE: f64 = 0.5;

/// Expected score of A against B.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / ELO_SCALE))
}

/// Rating after one game. `actual` is 1 for a win, 0.5 draw, 0 loss.
pub fn new_rating(current: f64, expected: f64, actual: f64, k_factor: f64) -> f64 {
    current + k_factor * (actual - expected)
}

#[derive(Debug, Clone, Serialize)]
pub struct EloEstimate {
    pub team_rating: f64,
    pub opponent_rating: f64,
    pub home_advantage: f64,
    pub k_factor: f64,
    pub predicted_probability: f64,
}

/// Missing ratings start at the sport's default. The home side's rating
/// gets the sport's home advantage before the comparison.
pub fn elo_probability(
    team_rating: Option<f64>,
    opponent_rating: Option<f64>,
    team_is_home: bool,
    params: &SportParams,
) -> Result<EloEstimate> {
    let team_rating = check_finite("team_rating", team_rating.unwrap_or(params.default_rating))?;
    let opponent_rating =
        check_finite("opponent_rating", opponent_rating.unwrap_or(params.default_rating))?;

    let predicted_probability = if team_is_home {
        expected_score(team_rating + params.home_advantage, opponent_rating)
    } else {
        expected_score(team_rating, opponent_rating + params.home_advantage)
    };

    Ok(EloEstimate {
        team_rating,
        opponent_rating,
        home_advantage: params.home_advantage,
        k_factor: params.k_factor,
        predicted_probability,
    })
}

/// P(X = k) for X ~ Poisson(lambda), built up iteratively so large `k`
/// never overflows a factorial.
pub fn poisson_pmf(k: u32, lambda: f64) -> f64 {
    let mut p = (-lambda).exp();
    for i in 1..=k {
        p *= lambda / i as f64;
    }
    p
}

#[derive(Debug, Clone, Serialize)]
pub struct PoissonEstimate {
    pub goals_for: f64,
    pub goals_against: f64,
    pub scoring_type: ScoringType,
    /// Scores at or above this are not counted.
    pub max_score: u32,
    pub predicted_probability: f64,
}

/// Probability the team outscores the opponent, summing
/// `P(i; for) * P(j; against)` for `0 <= j < i < max_score`.
///
/// The grid is truncated at 10 for goal sports and 20 otherwise, so
/// high-scoring sports with rates near or above the cap lose most of
/// their mass. Draws are never counted as wins.
pub fn poisson_win_probability(
    goals_for: f64,
    goals_against: f64,
    scoring_type: ScoringType,
) -> Result<PoissonEstimate> {
    for (field, v) in [("goals_for", goals_for), ("goals_against", goals_against)] {
        if !v.is_finite() || v < 0.0 {
            return Err(EngineError::invalid(field, v, "scoring rate must be non-negative"));
        }
    }

    let max_score = scoring_type.max_score();
    let team: Vec<f64> = (0..max_score).map(|i| poisson_pmf(i, goals_for)).collect();
    let opp: Vec<f64> = (0..max_score).map(|j| poisson_pmf(j, goals_against)).collect();

    let mut win = 0.0;
    for (i, p_team) in team.iter().enumerate() {
        win += p_team * opp[..i].iter().sum::<f64>();
    }

    Ok(PoissonEstimate {
        goals_for,
        goals_against,
        scoring_type,
        max_score,
        predicted_probability: clamp_unit(win),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionEstimate {
    pub feature_weights: BTreeMap<String, f64>,
    pub predicted_probability: f64,
}

/// `0.5 + Σ weight * feature` over features that have a weight, clamped.
/// Features without a weight are ignored.
pub fn regression_probability(
    features: &BTreeMap<String, f64>,
    weights: BTreeMap<String, f64>,
) -> Result<RegressionEstimate> {
    let mut p = REGRESSION_BASE;
    for (name, value) in features {
        let Some(w) = weights.get(name) else {
            continue;
        };
        if !value.is_finite() {
            return Err(EngineError::invalid("feature", format!("{name}={value}"), "must be finite"));
        }
        p += w * value;
    }
    Ok(RegressionEstimate {
        feature_weights: weights,
        predicted_probability: clamp_unit(p),
    })
}

/// Everything the blended model can use. Only `sport` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInput {
    pub sport: String,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    #[serde(default)]
    pub team_rating: Option<f64>,
    #[serde(default)]
    pub opponent_rating: Option<f64>,
    /// Scoring rates; Poisson joins the blend only when both are present.
    #[serde(default)]
    pub goals_for: Option<f64>,
    #[serde(default)]
    pub goals_against: Option<f64>,
    #[serde(default = "default_true")]
    pub is_home_team: bool,
    /// Flat probability bonus from the user's profile when playing at home.
    #[serde(default)]
    pub profile_home_advantage: Option<f64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct BlendedEstimate {
    pub sport: String,
    pub probability: f64,
    pub weights: BlendWeights,
    pub regression: RegressionEstimate,
    pub elo: EloEstimate,
    pub poisson: Option<PoissonEstimate>,
}

/// Weighted blend of the sub-models plus the optional home bump.
pub fn blend(input: &ModelInput, config: &ModelConfig) -> Result<BlendedEstimate> {
    let sport = input.sport.to_lowercase();
    let params = config.sport_params(&sport);
    let w = config.blend;

    let regression = regression_probability(&input.features, config.feature_weights_for(&sport))?;
    let elo = elo_probability(input.team_rating, input.opponent_rating, input.is_home_team, &params)?;
    let poisson = match (input.goals_for, input.goals_against) {
        (Some(gf), Some(ga)) => Some(poisson_win_probability(gf, ga, params.scoring_type)?),
        _ => None,
    };

    let mut probability =
        regression.predicted_probability * w.regression + elo.predicted_probability * w.elo;
    match &poisson {
        Some(p) => probability += p.predicted_probability * w.poisson,
        None => {
            let total = w.regression + w.elo;
            if total <= 0.0 {
                return Err(EngineError::degenerate(
                    "blend",
                    "regression and elo weights sum to zero",
                ));
            }
            probability /= total;
        }
    }

    if input.is_home_team {
        if let Some(bonus) = input.profile_home_advantage {
            probability += check_unit_interval("profile_home_advantage", bonus)?;
        }
    }
    let probability = clamp_unit(probability);

    tracing::debug!(
        sport = %sport,
        probability,
        regression = regression.predicted_probability,
        elo = elo.predicted_probability,
        poisson = poisson.as_ref().map(|p| p.predicted_probability),
        "blended model estimate"
    );

    Ok(BlendedEstimate {
        sport,
        probability,
        weights: w,
        regression,
        elo,
        poisson,
    })
}

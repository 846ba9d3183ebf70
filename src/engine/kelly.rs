//! Kelly criterion stake sizing for fixed-odds sports bets.

use super::odds::{implied_probability, validate_decimal};
use crate::error::{check_open_probability, check_unit_interval, EngineError, Result};
use serde::Serialize;

/// Applied fraction above this is high risk.
const HIGH_RISK_FRACTION: f64 = 0.10;
/// Applied fraction above this is medium risk.
const MEDIUM_RISK_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn from_fraction(applied: f64) -> Self {
        if applied > HIGH_RISK_FRACTION {
            RiskLevel::High
        } else if applied > MEDIUM_RISK_FRACTION {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    #[serde(rename = "bet")]
    Bet,
    #[serde(rename = "no bet")]
    NoBet,
}

/// Kelly sizing for one bet. Computed fresh per request, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct KellyResult {
    /// Applied fraction of bankroll: fractional, capped, never negative.
    pub kelly_fraction: f64,
    /// Full-Kelly fraction before the multiplier, cap and floor.
    pub raw_kelly: f64,
    /// `probability - implied_probability`; negative means no value.
    pub edge: f64,
    pub implied_probability: f64,
    pub decimal_odds: f64,
    pub has_betting_value: bool,
    pub risk_level: RiskLevel,
    pub recommendation: Recommendation,
}

impl KellyResult {
    /// Stake in bankroll units.
    pub fn stake(&self, bankroll: f64) -> f64 {
        self.kelly_fraction * bankroll.max(0.0)
    }
}

/// Compute the Kelly bet for a user probability at the given decimal odds.
///
/// - `probability`: user's win probability, strictly inside (0, 1)
/// - `decimal_odds`: offered price, > 1
/// - `fraction_multiplier`: scaling factor (e.g. 0.25 for quarter-Kelly)
/// - `max_bet_percentage`: hard cap as a share of bankroll
pub fn kelly(
    probability: f64,
    decimal_odds: f64,
    fraction_multiplier: f64,
    max_bet_percentage: f64,
) -> Result<KellyResult> {
    let p = check_open_probability("probability", probability)?;
    let fraction_multiplier = check_unit_interval("fraction_multiplier", fraction_multiplier)?;
    let max_bet_percentage = check_unit_interval("max_bet_percentage", max_bet_percentage)?;
    if decimal_odds == 1.0 {
        return Err(EngineError::degenerate("kelly", "net odds b = 0"));
    }
    let decimal_odds = validate_decimal(decimal_odds)?;

    let implied = implied_probability(decimal_odds)?;
    let b = decimal_odds - 1.0;

    // f* = (b*p - q) / b
    let raw_kelly = raw_kelly(p, b);

    let applied = (raw_kelly * fraction_multiplier).min(max_bet_percentage).max(0.0);
    let edge = p - implied;

    tracing::debug!(probability = p, decimal_odds, raw_kelly, applied, "kelly sized");

    Ok(KellyResult {
        kelly_fraction: applied,
        raw_kelly,
        edge,
        implied_probability: implied,
        decimal_odds,
        has_betting_value: edge > 0.0,
        risk_level: RiskLevel::from_fraction(applied),
        recommendation: if applied == 0.0 {
            Recommendation::NoBet
        } else {
            Recommendation::Bet
        },
    })
}

fn raw_kelly(p: f64, b: f64) -> f64 {
    (b * p - (1.0 - p)) / b
}

/// Return and exposure figures for a concrete stake.
#[derive(Debug, Clone, Serialize)]
pub struct RiskMetrics {
    pub potential_profit: f64,
    pub risk_to_reward_ratio: f64,
    pub bankroll_risk_percentage: f64,
    pub max_loss: f64,
}

pub fn risk_metrics(stake: f64, decimal_odds: f64, bankroll: f64) -> Result<RiskMetrics> {
    if !stake.is_finite() || stake <= 0.0 {
        return Err(EngineError::invalid("stake", stake, "must be positive"));
    }
    if !bankroll.is_finite() || bankroll <= 0.0 {
        return Err(EngineError::invalid("bankroll", bankroll, "must be positive"));
    }
    let decimal_odds = validate_decimal(decimal_odds)?;

    let potential_profit = stake * (decimal_odds - 1.0);
    Ok(RiskMetrics {
        potential_profit,
        risk_to_reward_ratio: stake / potential_profit,
        bankroll_risk_percentage: stake / bankroll * 100.0,
        max_loss: stake,
    })
}

use super::kelly::{kelly, KellyResult};
use crate::config::RiskConfig;
use crate::error::EngineError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a new bet was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskViolation {
    #[error("maximum number of open bets ({max}) reached")]
    MaxOpenBets { open: u32, max: u32 },

    #[error("{streak} consecutive losses, limit is {max}")]
    ConsecutiveLosses { streak: u32, max: u32 },

    #[error("daily stop loss would be exceeded ({projected_loss:.2} > {limit:.2})")]
    StopLoss { projected_loss: f64, limit: f64 },

    #[error("daily stop win reached ({daily_win:.2} > {limit:.2})")]
    StopWin { daily_win: f64, limit: f64 },

    #[error(transparent)]
    Invalid(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyResult {
    pub loss: f64,
    pub win: f64,
}

/// Bankroll limits for one bettor. Plain owned state; wrap it to share.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    open_bets: u32,
    consecutive_losses: u32,
    /// Positive for a winning streak, negative for a losing one.
    current_streak: i32,
    daily: BTreeMap<NaiveDate, DailyResult>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            open_bets: 0,
            consecutive_losses: 0,
            current_streak: 0,
            daily: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Kelly sizing with this bettor's multiplier and cap.
    pub fn size_bet(&self, probability: f64, decimal_odds: f64) -> Result<KellyResult, EngineError> {
        kelly(
            probability,
            decimal_odds,
            self.config.fraction_multiplier,
            self.config.max_bet_percentage,
        )
    }

    /// Check whether a bet of `stake` may be placed on `today`.
    pub fn check_bet(&self, stake: f64, bankroll: f64, today: NaiveDate) -> Result<(), RiskViolation> {
        if !stake.is_finite() || stake <= 0.0 {
            return Err(EngineError::invalid("stake", stake, "must be positive").into());
        }
        if !bankroll.is_finite() || bankroll <= 0.0 {
            return Err(EngineError::invalid("bankroll", bankroll, "must be positive").into());
        }

        if self.open_bets >= self.config.max_open_bets {
            return Err(RiskViolation::MaxOpenBets {
                open: self.open_bets,
                max: self.config.max_open_bets,
            });
        }
        if self.consecutive_losses >= self.config.max_consecutive_losses {
            return Err(RiskViolation::ConsecutiveLosses {
                streak: self.consecutive_losses,
                max: self.config.max_consecutive_losses,
            });
        }

        let day = self.daily_result(today);
        let loss_limit = bankroll * self.config.stop_loss_percentage;
        if day.loss + stake > loss_limit {
            return Err(RiskViolation::StopLoss {
                projected_loss: day.loss + stake,
                limit: loss_limit,
            });
        }
        let win_limit = bankroll * self.config.stop_win_percentage;
        if day.win > win_limit {
            return Err(RiskViolation::StopWin {
                daily_win: day.win,
                limit: win_limit,
            });
        }
        Ok(())
    }

    pub fn record_open(&mut self) {
        self.open_bets += 1;
    }

    /// Settle one open bet. `result` is the profit: negative for a loss,
    /// zero for a push.
    pub fn record_settled(&mut self, result: f64, day: NaiveDate) {
        self.open_bets = self.open_bets.saturating_sub(1);
        let entry = self.daily.entry(day).or_default();
        if result < 0.0 {
            entry.loss += result.abs();
            self.consecutive_losses += 1;
            self.current_streak = self.current_streak.min(0) - 1;
        } else if result > 0.0 {
            entry.win += result;
            self.consecutive_losses = 0;
            self.current_streak = self.current_streak.max(0) + 1;
        }
        tracing::debug!(
            %day,
            result,
            open = self.open_bets,
            streak = self.current_streak,
            "bet settled"
        );
    }

    pub fn daily_result(&self, day: NaiveDate) -> DailyResult {
        self.daily.get(&day).copied().unwrap_or_default()
    }

    pub fn open_bets(&self) -> u32 {
        self.open_bets
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn current_streak(&self) -> i32 {
        self.current_streak
    }
}

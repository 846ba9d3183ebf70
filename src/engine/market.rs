use super::odds::{implied_probability, Odds, OddsFormat, RawOdds};
use crate::error::{check_open_probability, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One side of a moneyline market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Away,
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Home => "home",
            Outcome::Away => "away",
            Outcome::Draw => "draw",
        })
    }
}

/// A single bookmaker's prices for one event, all in `odds_format`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmakerQuote {
    pub bookmaker: String,
    pub odds_format: OddsFormat,
    pub home_odds: RawOdds,
    pub away_odds: RawOdds,
    #[serde(default)]
    pub draw_odds: Option<RawOdds>,
}

impl BookmakerQuote {
    fn raw(&self, outcome: Outcome) -> Option<&RawOdds> {
        match outcome {
            Outcome::Home => Some(&self.home_odds),
            Outcome::Away => Some(&self.away_odds),
            Outcome::Draw => self.draw_odds.as_ref(),
        }
    }

    /// Parsed odds for one outcome in the quote's own format.
    pub fn odds(&self, outcome: Outcome) -> Result<Odds> {
        let raw = self.raw(outcome).ok_or_else(|| {
            EngineError::invalid("outcome", outcome, "bookmaker does not price this outcome")
        })?;
        Odds::parse(raw, self.odds_format)
    }

    pub fn decimal_odds(&self, outcome: Outcome) -> Result<f64> {
        self.odds(outcome)?.to_decimal()
    }

    /// Implied probabilities for the complete outcome set this bookmaker
    /// prices (2 without a draw, 3 with). Every price is converted to decimal
    /// first so mixed-format books never reach the margin sum.
    pub fn implied_probabilities(&self) -> Result<Vec<f64>> {
        let mut outcomes = vec![Outcome::Home, Outcome::Away];
        if self.draw_odds.is_some() {
            outcomes.push(Outcome::Draw);
        }
        outcomes
            .into_iter()
            .map(|o| implied_probability(self.decimal_odds(o)?))
            .collect()
    }

    pub fn margin(&self) -> Result<f64> {
        Ok(bookmaker_margin(&self.implied_probabilities()?))
    }
}

/// Overround: sum of implied probabilities over ALL mutually exclusive
/// outcomes of one bookmaker, minus 1.
pub fn bookmaker_margin(implied_probabilities: &[f64]) -> f64 {
    implied_probabilities.iter().sum::<f64>() - 1.0
}

/// Proportional de-vig: `implied / (1 + margin)`.
///
/// This does not redistribute the margin by outcome likelihood, so longshots
/// keep slightly more of the vig than favourites.
pub fn fair_probability(implied: f64, margin: f64) -> f64 {
    implied / (1.0 + margin)
}

/// Expected profit per unit staked.
pub fn expected_value(user_probability: f64, decimal_odds: f64) -> f64 {
    user_probability * (decimal_odds - 1.0) - (1.0 - user_probability)
}

pub fn is_positive_ev(user_probability: f64, decimal_odds: f64) -> bool {
    expected_value(user_probability, decimal_odds) > 0.0
}

/// Relative edge in percent: `(user - fair) / fair * 100`.
///
/// Not to be confused with the Kelly `edge`, which is a plain difference.
pub fn edge_percentage(user_probability: f64, fair_probability: f64) -> Result<f64> {
    if !fair_probability.is_finite() || fair_probability <= 0.0 {
        return Err(EngineError::degenerate(
            "edge_percentage",
            "fair probability must be positive",
        ));
    }
    Ok((user_probability - fair_probability) / fair_probability * 100.0)
}

/// Per-bookmaker comparison of the user's probability against the market.
#[derive(Debug, Clone, Serialize)]
pub struct MarketComparison {
    pub bookmaker: String,
    pub outcome: Outcome,
    pub original_odds: Odds,
    pub decimal_odds: f64,
    pub implied_probability: f64,
    pub fair_probability: f64,
    pub user_probability: f64,
    pub bookmaker_margin: f64,
    pub edge_percentage: f64,
    pub expected_value: f64,
    pub is_positive_ev: bool,
}

/// Evaluate one quote for the requested outcome.
pub fn evaluate(
    quote: &BookmakerQuote,
    outcome: Outcome,
    user_probability: f64,
) -> Result<MarketComparison> {
    let user_probability = check_open_probability("user_probability", user_probability)?;

    let original_odds = quote.odds(outcome)?;
    let decimal_odds = original_odds.to_decimal()?;
    let implied = implied_probability(decimal_odds)?;
    let margin = quote.margin()?;
    let fair = fair_probability(implied, margin);
    let ev = expected_value(user_probability, decimal_odds);

    Ok(MarketComparison {
        bookmaker: quote.bookmaker.clone(),
        outcome,
        original_odds,
        decimal_odds,
        implied_probability: implied,
        fair_probability: fair,
        user_probability,
        bookmaker_margin: margin,
        edge_percentage: edge_percentage(user_probability, fair)?,
        expected_value: ev,
        is_positive_ev: ev > 0.0,
    })
}

/// Stable sort, highest edge first. Ties keep their input order.
pub fn rank_by_edge(mut opportunities: Vec<MarketComparison>) -> Vec<MarketComparison> {
    opportunities.sort_by(|a, b| {
        b.edge_percentage
            .partial_cmp(&a.edge_percentage)
            .unwrap_or(Ordering::Equal)
    });
    opportunities
}

/// Compare a user probability against every bookmaker in a market and rank
/// the results by edge.
pub fn compare_odds(
    quotes: &[BookmakerQuote],
    outcome: Outcome,
    user_probability: f64,
) -> Result<Vec<MarketComparison>> {
    if quotes.is_empty() {
        return Err(EngineError::invalid("quotes", 0, "market has no bookmakers"));
    }
    let comparisons = quotes
        .iter()
        .map(|q| evaluate(q, outcome, user_probability))
        .collect::<Result<Vec<_>>>()?;
    Ok(rank_by_edge(comparisons))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(name: &str, format: OddsFormat, home: RawOdds, away: RawOdds) -> BookmakerQuote {
        BookmakerQuote {
            bookmaker: name.to_string(),
            odds_format: format,
            home_odds: home,
            away_odds: away,
            draw_odds: None,
        }
    }

    #[test]
    fn test_no_vig_market_has_zero_margin() {
        // +100 / +100 -> 0.5 + 0.5 = 1.0
        let q = quote("fair", OddsFormat::American, 100.0.into(), 100.0.into());
        let margin = q.margin().unwrap();
        assert!(margin.abs() < 1e-12);
        let implied = implied_probability(q.decimal_odds(Outcome::Home).unwrap()).unwrap();
        assert!((fair_probability(implied, margin) - implied).abs() < 1e-12);
    }

    #[test]
    fn test_standard_juice_margin() {
        // -110 / -110 -> 2 * 0.5238 - 1 = 0.0476
        let q = quote("book", OddsFormat::American, (-110.0).into(), (-110.0).into());
        let margin = q.margin().unwrap();
        assert!((margin - 0.0476).abs() < 1e-3, "got {margin}");

        let implied = 110.0 / 210.0;
        let fair = fair_probability(implied, margin);
        assert!((fair - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_three_way_margin_includes_draw() {
        let mut q = quote("eu", OddsFormat::Decimal, 2.5.into(), 3.0.into());
        q.draw_odds = Some(3.2.into());
        // 0.4 + 0.3333 + 0.3125 - 1 = 0.0458
        let margin = q.margin().unwrap();
        assert!((margin - 0.045_833).abs() < 1e-5, "got {margin}");
        assert_eq!(q.implied_probabilities().unwrap().len(), 3);
    }

    #[test]
    fn test_expected_value_and_edge_percentage() {
        // p = 0.55 at 2.0: 0.55 * 1 - 0.45 = 0.10
        assert!((expected_value(0.55, 2.0) - 0.10).abs() < 1e-12);
        assert!(is_positive_ev(0.55, 2.0));
        assert!(!is_positive_ev(0.45, 2.0));

        // (0.55 - 0.50) / 0.50 * 100 = 10 %
        assert!((edge_percentage(0.55, 0.50).unwrap() - 10.0).abs() < 1e-9);
        assert!(edge_percentage(0.55, 0.0).is_err());
    }

    #[test]
    fn test_compare_converts_mixed_formats_and_ranks() {
        let quotes = vec![
            quote("american", OddsFormat::American, (-110.0).into(), (-110.0).into()),
            quote("fractional", OddsFormat::Fractional, "6/5".into(), "4/6".into()),
            quote("decimal", OddsFormat::Decimal, 2.05.into(), 1.80.into()),
        ];
        let ranked = compare_odds(&quotes, Outcome::Home, 0.55).unwrap();
        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].edge_percentage >= pair[1].edge_percentage);
        }
        let frac = ranked.iter().find(|c| c.bookmaker == "fractional").unwrap();
        assert!((frac.decimal_odds - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let quotes = vec![
            quote("first", OddsFormat::Decimal, 2.0.into(), 2.0.into()),
            quote("second", OddsFormat::Decimal, 2.0.into(), 2.0.into()),
            quote("better", OddsFormat::Decimal, 2.2.into(), 1.8.into()),
        ];
        let ranked = compare_odds(&quotes, Outcome::Home, 0.55).unwrap();
        let names: Vec<_> = ranked.iter().map(|c| c.bookmaker.as_str()).collect();
        assert_eq!(names, vec!["better", "first", "second"]);
    }

    #[test]
    fn test_missing_draw_is_invalid() {
        let quotes = vec![quote("us", OddsFormat::American, 120.0.into(), (-140.0).into())];
        let err = compare_odds(&quotes, Outcome::Draw, 0.3).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { field: "outcome", .. }));
    }

    #[test]
    fn test_empty_market_is_invalid() {
        assert!(compare_odds(&[], Outcome::Home, 0.5).is_err());
    }
}

//! Odds representations and conversions.
//!
//! Decimal odds are the pivot format: every conversion goes through decimal,
//! and every downstream computation (Kelly, margin, EV) takes decimal odds.
//!
//! - American +150 -> 2.50, American -110 -> 1.909
//! - Fractional "5/2" -> 3.50
//! - Implied probability = 1 / decimal

use crate::error::{check_finite, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest denominator tried when approximating decimal odds as a fraction.
const MAX_FRACTION_DENOMINATOR: u32 = 100;
/// Stop searching once the fraction is this close.
const FRACTION_PRECISION: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddsFormat {
    American,
    Decimal,
    Fractional,
}

impl FromStr for OddsFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "american" => Ok(OddsFormat::American),
            "decimal" => Ok(OddsFormat::Decimal),
            "fractional" => Ok(OddsFormat::Fractional),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OddsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OddsFormat::American => "american",
            OddsFormat::Decimal => "decimal",
            OddsFormat::Fractional => "fractional",
        };
        f.write_str(s)
    }
}

/// An odds value tagged with its format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "lowercase")]
pub enum Odds {
    American(f64),
    Decimal(f64),
    Fractional { numerator: u32, denominator: u32 },
}

/// Odds as they arrive from a caller: a bare number or a string such as
/// `"5/2"` or `"-110"`. Only meaningful together with an [`OddsFormat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOdds {
    Number(f64),
    Text(String),
}

impl From<f64> for RawOdds {
    fn from(v: f64) -> Self {
        RawOdds::Number(v)
    }
}

impl From<&str> for RawOdds {
    fn from(s: &str) -> Self {
        RawOdds::Text(s.to_string())
    }
}

impl Odds {
    /// Interpret a raw caller value in the given format.
    pub fn parse(raw: &RawOdds, format: OddsFormat) -> Result<Self> {
        match (format, raw) {
            (OddsFormat::Fractional, RawOdds::Text(s)) => parse_fraction(s),
            (OddsFormat::Fractional, RawOdds::Number(n)) => Err(EngineError::invalid(
                "fractional odds",
                n,
                "expected a \"numerator/denominator\" string",
            )),
            (_, RawOdds::Number(n)) => Ok(Self::numeric(format, check_finite("odds", *n)?)),
            (_, RawOdds::Text(s)) => {
                let n: f64 = s
                    .trim()
                    .trim_start_matches('+')
                    .parse()
                    .map_err(|_| EngineError::invalid("odds", s, "not a number"))?;
                Ok(Self::numeric(format, check_finite("odds", n)?))
            }
        }
    }

    fn numeric(format: OddsFormat, n: f64) -> Self {
        match format {
            OddsFormat::American => Odds::American(n),
            _ => Odds::Decimal(n),
        }
    }

    pub fn format(&self) -> OddsFormat {
        match self {
            Odds::American(_) => OddsFormat::American,
            Odds::Decimal(_) => OddsFormat::Decimal,
            Odds::Fractional { .. } => OddsFormat::Fractional,
        }
    }

    /// Convert to decimal odds. The result is always > 1.
    pub fn to_decimal(&self) -> Result<f64> {
        let decimal = match *self {
            Odds::American(a) => american_to_decimal(a)?,
            Odds::Decimal(d) => d,
            Odds::Fractional {
                numerator,
                denominator,
            } => {
                if denominator == 0 {
                    return Err(EngineError::invalid(
                        "fractional odds",
                        self,
                        "denominator must be non-zero",
                    ));
                }
                numerator as f64 / denominator as f64 + 1.0
            }
        };
        validate_decimal(decimal)
    }

    /// Express decimal odds in the requested format.
    pub fn from_decimal(decimal: f64, format: OddsFormat) -> Result<Self> {
        match format {
            OddsFormat::Decimal => Ok(Odds::Decimal(validate_decimal(decimal)?)),
            OddsFormat::American => Ok(Odds::American(decimal_to_american(decimal)?)),
            OddsFormat::Fractional => {
                let (numerator, denominator) = decimal_to_fractional(decimal)?;
                Ok(Odds::Fractional {
                    numerator,
                    denominator,
                })
            }
        }
    }

    /// Convert between formats, going through decimal.
    pub fn convert(&self, to: OddsFormat) -> Result<Self> {
        if self.format() == to {
            self.to_decimal()?;
            return Ok(*self);
        }
        Self::from_decimal(self.to_decimal()?, to)
    }

    pub fn implied_probability(&self) -> Result<f64> {
        implied_probability(self.to_decimal()?)
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Odds::American(a) if *a > 0.0 => write!(f, "+{}", a),
            Odds::American(a) => write!(f, "{}", a),
            Odds::Decimal(d) => write!(f, "{:.3}", d),
            Odds::Fractional {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator, denominator),
        }
    }
}

fn parse_fraction(s: &str) -> Result<Odds> {
    let (num, den) = s
        .trim()
        .split_once('/')
        .ok_or_else(|| EngineError::invalid("fractional odds", s, "expected \"numerator/denominator\""))?;
    let numerator: u32 = num
        .trim()
        .parse()
        .map_err(|_| EngineError::invalid("fractional odds", s, "numerator is not a whole number"))?;
    let denominator: u32 = den
        .trim()
        .parse()
        .map_err(|_| EngineError::invalid("fractional odds", s, "denominator is not a whole number"))?;
    if denominator == 0 {
        return Err(EngineError::invalid(
            "fractional odds",
            s,
            "denominator must be non-zero",
        ));
    }
    Ok(Odds::Fractional {
        numerator,
        denominator,
    })
}

/// Reject decimal odds that do not encode a positive net payoff.
pub fn validate_decimal(decimal: f64) -> Result<f64> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return Err(EngineError::invalid(
            "decimal odds",
            decimal,
            "must be greater than 1",
        ));
    }
    Ok(decimal)
}

/// American odds to decimal.
/// Positive (e.g., +150): 150/100 + 1 = 2.50
/// Negative (e.g., -150): 100/150 + 1 = 1.667
pub fn american_to_decimal(american: f64) -> Result<f64> {
    let american = check_finite("american odds", american)?;
    if american == 0.0 {
        return Err(EngineError::invalid(
            "american odds",
            american,
            "0 is the no-bet sentinel, not a price",
        ));
    }
    if american > 0.0 {
        Ok(american / 100.0 + 1.0)
    } else {
        Ok(100.0 / american.abs() + 1.0)
    }
}

/// Decimal odds to (rounded) American odds.
///
/// Decimal exactly 1 has no American price; see
/// [`decimal_to_american_or_no_bet`] for the sentinel variant.
pub fn decimal_to_american(decimal: f64) -> Result<f64> {
    if decimal == 1.0 {
        return Err(EngineError::degenerate(
            "decimal_to_american",
            "decimal odds of exactly 1 have zero net payoff",
        ));
    }
    let decimal = validate_decimal(decimal)?;
    if decimal >= 2.0 {
        Ok(((decimal - 1.0) * 100.0).round())
    } else {
        Ok((-100.0 / (decimal - 1.0)).round())
    }
}

/// Same as [`decimal_to_american`] but maps decimal 1 to the American `0`
/// "no bet" sentinel instead of failing.
pub fn decimal_to_american_or_no_bet(decimal: f64) -> Result<f64> {
    if decimal == 1.0 {
        return Ok(0.0);
    }
    decimal_to_american(decimal)
}

/// Best fraction for `decimal - 1` with denominator <= 100, reduced.
///
/// Odds whose net payoff is below half of 1/100 have no such fraction
/// (`ArithmeticDegenerate`), and a net payoff beyond `u32::MAX` cannot be
/// written as one (`InvalidInput`).
pub fn decimal_to_fractional(decimal: f64) -> Result<(u32, u32)> {
    let decimal = validate_decimal(decimal)?;
    let target = decimal - 1.0;
    if target.round() > u32::MAX as f64 {
        return Err(EngineError::invalid(
            "decimal odds",
            decimal,
            "odds too large for a fraction",
        ));
    }

    let mut best = (1u32, 1u32);
    let mut best_error = (target - 1.0).abs();

    for denominator in 1..=MAX_FRACTION_DENOMINATOR {
        let numerator = (target * denominator as f64).round();
        if numerator > u32::MAX as f64 {
            // larger denominators only grow the numerator
            break;
        }
        let error = (target - numerator / denominator as f64).abs();
        if error < best_error {
            best = (numerator as u32, denominator);
            best_error = error;
            if error < FRACTION_PRECISION {
                break;
            }
        }
    }

    if best.0 == 0 {
        return Err(EngineError::degenerate(
            "decimal_to_fractional",
            "net payoff rounds to 0/1 at denominators up to 100",
        ));
    }

    let divisor = gcd(best.0, best.1);
    Ok((best.0 / divisor, best.1 / divisor))
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a.max(1)
    } else {
        gcd(b, a % b)
    }
}

/// Probability encoded by decimal odds, ignoring margin.
pub fn implied_probability(decimal: f64) -> Result<f64> {
    Ok(1.0 / validate_decimal(decimal)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_american_to_decimal() {
        assert!((american_to_decimal(150.0).unwrap() - 2.5).abs() < 1e-9);
        assert!((american_to_decimal(-150.0).unwrap() - 1.666_666).abs() < 1e-5);
        assert!((american_to_decimal(-110.0).unwrap() - 1.909_09).abs() < 1e-4);
        assert!(american_to_decimal(0.0).is_err());
    }

    #[test]
    fn test_decimal_to_american_both_branches() {
        assert_eq!(decimal_to_american(2.5).unwrap(), 150.0);
        assert_eq!(decimal_to_american(2.0).unwrap(), 100.0);
        assert_eq!(decimal_to_american(1.5).unwrap(), -200.0);
        // 1.909 -> -110.01 -> -110
        assert_eq!(decimal_to_american(1.909).unwrap(), -110.0);
    }

    #[test]
    fn test_decimal_one_is_degenerate_unless_sentinel() {
        assert!(matches!(
            decimal_to_american(1.0),
            Err(EngineError::ArithmeticDegenerate { .. })
        ));
        assert_eq!(decimal_to_american_or_no_bet(1.0).unwrap(), 0.0);
        assert!(matches!(
            decimal_to_american(0.8),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_fractional_conversions() {
        let odds = Odds::parse(&"5/2".into(), OddsFormat::Fractional).unwrap();
        assert!((odds.to_decimal().unwrap() - 3.5).abs() < 1e-9);

        assert_eq!(decimal_to_fractional(3.5).unwrap(), (5, 2));
        assert_eq!(decimal_to_fractional(2.0).unwrap(), (1, 1));
        // 1.909... = 10/11 + 1
        assert_eq!(decimal_to_fractional(1.0 + 10.0 / 11.0).unwrap(), (10, 11));
        // 4/6 reduces to 2/3
        assert_eq!(decimal_to_fractional(1.0 + 4.0 / 6.0).unwrap(), (2, 3));
    }

    #[test]
    fn test_fraction_near_even_money_floor() {
        // 0.004 * 100 rounds to 0 at every denominator
        assert!(matches!(
            decimal_to_fractional(1.004),
            Err(EngineError::ArithmeticDegenerate { .. })
        ));
        assert!(Odds::Decimal(1.004).convert(OddsFormat::Fractional).is_err());
        assert_eq!(decimal_to_fractional(1.01).unwrap(), (1, 100));
    }

    #[test]
    fn test_fraction_too_large_is_rejected() {
        assert!(matches!(
            decimal_to_fractional(5e9),
            Err(EngineError::InvalidInput { .. })
        ));
        // 4_000_000_000 / 1 still fits in a u32
        assert_eq!(decimal_to_fractional(4e9 + 1.0).unwrap(), (4_000_000_000, 1));
    }

    #[test]
    fn test_fraction_parse_errors() {
        assert!(Odds::parse(&"5-2".into(), OddsFormat::Fractional).is_err());
        assert!(Odds::parse(&"5/0".into(), OddsFormat::Fractional).is_err());
        assert!(Odds::parse(&RawOdds::Number(2.5), OddsFormat::Fractional).is_err());
    }

    #[test]
    fn test_parse_american_text_with_plus_sign() {
        let odds = Odds::parse(&"+150".into(), OddsFormat::American).unwrap();
        assert_eq!(odds, Odds::American(150.0));
    }

    #[test]
    fn test_unsupported_format() {
        let err = "moneyline".parse::<OddsFormat>().unwrap_err();
        assert_eq!(err, EngineError::UnsupportedFormat("moneyline".to_string()));
        assert_eq!("Decimal".parse::<OddsFormat>().unwrap(), OddsFormat::Decimal);
    }

    #[test]
    fn test_implied_probability() {
        assert!((implied_probability(2.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((implied_probability(4.0).unwrap() - 0.25).abs() < 1e-12);
        assert!(implied_probability(1.0).is_err());
        let p = Odds::American(-110.0).implied_probability().unwrap();
        assert!((p - 0.5238).abs() < 1e-4, "got {p}");
    }

    #[test]
    fn test_convert_via_decimal() {
        let american = Odds::Fractional {
            numerator: 3,
            denominator: 2,
        }
        .convert(OddsFormat::American)
        .unwrap();
        assert_eq!(american, Odds::American(150.0));

        let frac = Odds::American(-200.0).convert(OddsFormat::Fractional).unwrap();
        assert_eq!(
            frac,
            Odds::Fractional {
                numerator: 1,
                denominator: 2
            }
        );
    }

    #[test]
    fn test_american_round_trip_within_rounding() {
        // Integer American odds lose at most half a unit, which is at most
        // 0.005 in decimal terms on either branch.
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let d: f64 = rng.gen_range(1.01..50.0);
            let american = decimal_to_american(d).unwrap();
            let back = american_to_decimal(american).unwrap();
            assert!((back - d).abs() <= 0.005 + 1e-9, "d={d}, american={american}, back={back}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Odds::American(150.0).to_string(), "+150");
        assert_eq!(Odds::American(-110.0).to_string(), "-110");
        assert_eq!(
            Odds::Fractional {
                numerator: 5,
                denominator: 2
            }
            .to_string(),
            "5/2"
        );
    }
}

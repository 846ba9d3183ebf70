//! Small statistical helpers shared by the probability engines.

use serde::{Deserialize, Serialize};

/// Two-sided confidence level for an interval estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "90")]
    Ninety,
    #[default]
    #[serde(rename = "95")]
    NinetyFive,
    #[serde(rename = "99")]
    NinetyNine,
}

impl ConfidenceLevel {
    pub fn z_score(self) -> f64 {
        match self {
            ConfidenceLevel::Ninety => 1.645,
            ConfidenceLevel::NinetyFive => 1.96,
            ConfidenceLevel::NinetyNine => 2.576,
        }
    }

    /// Map a fractional level such as `0.95` to a known level. Anything that
    /// is not within 1e-6 of 0.90 / 0.95 / 0.99 falls back to 95 %.
    pub fn from_fraction(level: f64) -> Self {
        const EPS: f64 = 1e-6;
        if (level - 0.90).abs() < EPS {
            ConfidenceLevel::Ninety
        } else if (level - 0.99).abs() < EPS {
            ConfidenceLevel::NinetyNine
        } else {
            ConfidenceLevel::NinetyFive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    /// `center ± margin`.
    pub fn around(center: f64, margin: f64) -> Self {
        Self {
            lower: center - margin,
            upper: center + margin,
        }
    }

    /// Clamp both bounds into [0, 1].
    pub fn clamp_unit(self) -> Self {
        Self {
            lower: clamp_unit(self.lower),
            upper: clamp_unit(self.upper),
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

pub fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

use thiserror::Error;

/// Errors produced by the computation engine.
///
/// Every engine function fails fast with one of these instead of returning
/// NaN, infinity or an out-of-range probability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid {field} ({value}): {reason}")]
    InvalidInput {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unsupported odds format: {0}")]
    UnsupportedFormat(String),

    #[error("degenerate arithmetic in {operation}: {reason}")]
    ArithmeticDegenerate {
        operation: &'static str,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        EngineError::InvalidInput {
            field,
            value: value.to_string(),
            reason,
        }
    }

    pub fn degenerate(operation: &'static str, reason: &'static str) -> Self {
        EngineError::ArithmeticDegenerate { operation, reason }
    }
}

/// Probability strictly inside (0, 1).
pub(crate) fn check_open_probability(field: &'static str, p: f64) -> Result<f64> {
    if !p.is_finite() || p <= 0.0 || p >= 1.0 {
        return Err(EngineError::invalid(field, p, "must be strictly between 0 and 1"));
    }
    Ok(p)
}

/// Probability inside [0, 1].
pub(crate) fn check_probability(field: &'static str, p: f64) -> Result<f64> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(EngineError::invalid(field, p, "must be between 0 and 1"));
    }
    Ok(p)
}

/// Any value in [0, 1], e.g. a Kelly multiplier or bankroll share.
pub(crate) fn check_unit_interval(field: &'static str, v: f64) -> Result<f64> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(EngineError::invalid(field, v, "must be within [0, 1]"));
    }
    Ok(v)
}

pub(crate) fn check_finite(field: &'static str, v: f64) -> Result<f64> {
    if !v.is_finite() {
        return Err(EngineError::invalid(field, v, "must be a finite number"));
    }
    Ok(v)
}

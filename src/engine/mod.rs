pub mod calibration;
pub mod factors;
pub mod kelly;
pub mod market;
pub mod models;
pub mod odds;
pub mod regression;
pub mod risk;
pub mod stats;

pub use calibration::{CalibrationMetrics, CalibrationPoint};
pub use factors::{process_factors, FactorAnalysis, FactorDefinition, FactorInput};
pub use kelly::{kelly, KellyResult};
pub use market::{compare_odds, BookmakerQuote, MarketComparison, Outcome};
pub use odds::{Odds, OddsFormat};
pub use regression::{RegressionAnalysis, RegressionInput};
pub use risk::{RiskManager, RiskViolation};

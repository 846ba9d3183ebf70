//! Sports-betting decision support: odds conversion, Kelly stake sizing,
//! market margin and edge ranking, multi-factor and statistical win
//! probabilities, regression to the mean, and calibration scoring.
//!
//! All engine functions are pure and synchronous. Static tables (sport
//! parameters, regression profiles, risk settings) live in [`config::Config`].

pub mod config;
pub mod engine;
pub mod error;

pub use error::{EngineError, Result};

//! Command-line front end for the betting-edge engine.
//!
//! Every subcommand reads flags or a JSON input file, calls the library and
//! prints the result as pretty JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use betting_edge::config::Config;
use betting_edge::engine::calibration::{metrics_by_segment, CalibrationMetrics, CalibrationPoint};
use betting_edge::engine::factors::{process_factors, CorrelationMatrix, FactorDefinition, FactorInput, FactorOptions};
use betting_edge::engine::kelly::{kelly, risk_metrics};
use betting_edge::engine::market::{compare_odds, BookmakerQuote, Outcome};
use betting_edge::engine::models::{blend, ModelInput};
use betting_edge::engine::odds::{Odds, OddsFormat, RawOdds};
use betting_edge::engine::regression::{analyze, RegressionInput};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "betting-edge")]
#[command(version, about = "Odds conversion, Kelly sizing, edge and calibration analysis")]
struct Cli {
    /// Configuration file; built-in defaults are used when it does not exist
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert odds between formats
    Odds {
        /// Odds value, e.g. -110, 2.5 or 5/2
        #[arg(allow_hyphen_values = true)]
        value: String,
        /// Format of VALUE: american, decimal or fractional
        #[arg(short, long)]
        from: String,
        /// Target format
        #[arg(short, long)]
        to: String,
    },
    /// Kelly stake for a probability at given odds
    Kelly {
        /// Your win probability, strictly between 0 and 1
        #[arg(short, long)]
        probability: f64,
        /// Offered odds
        #[arg(short, long, allow_hyphen_values = true)]
        odds: String,
        /// Format of the odds
        #[arg(long, default_value = "decimal")]
        format: String,
        /// Kelly multiplier; defaults to risk.fraction_multiplier
        #[arg(long)]
        fraction: Option<f64>,
        /// Stake cap as a share of bankroll; defaults to risk.max_bet_percentage
        #[arg(long)]
        max_bet: Option<f64>,
        /// Bankroll, to report the stake and its risk metrics
        #[arg(short, long)]
        bankroll: Option<f64>,
    },
    /// Rank bookmakers by edge for one outcome
    Compare {
        /// JSON array of bookmaker quotes
        #[arg(short, long)]
        input: PathBuf,
        /// home, away or draw
        #[arg(long, default_value = "home")]
        outcome: String,
        #[arg(short, long)]
        probability: f64,
    },
    /// Multi-factor probability from scored factors
    Factors {
        /// JSON object with `definitions` and `inputs`
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Blend the Elo, Poisson and regression models
    Blend {
        /// JSON model input
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Regression-to-the-mean adjustment and bias check
    Regression {
        /// JSON regression input
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Calibration metrics for past predictions
    Calibrate {
        /// JSON array of calibration points
        #[arg(short, long)]
        input: PathBuf,
        /// Report each sport / bet type separately
        #[arg(long)]
        by_segment: bool,
    },
}

#[derive(Deserialize)]
struct FactorRequest {
    definitions: Vec<FactorDefinition>,
    inputs: Vec<FactorInput>,
    #[serde(default)]
    base_probability: Option<f64>,
}

#[derive(Serialize)]
struct ConvertedOdds {
    input: Odds,
    output: Odds,
    display: String,
    decimal: f64,
    implied_probability: f64,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn raw_odds(value: &str) -> RawOdds {
    match value.parse::<f64>() {
        Ok(n) => RawOdds::Number(n),
        Err(_) => RawOdds::Text(value.to_string()),
    }
}

fn parse_outcome(s: &str) -> Result<Outcome> {
    match s.to_lowercase().as_str() {
        "home" => Ok(Outcome::Home),
        "away" => Ok(Outcome::Away),
        "draw" => Ok(Outcome::Draw),
        other => anyhow::bail!("unknown outcome '{}', expected home, away or draw", other),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using built-in defaults");
        Ok(Config::default())
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Odds { value, from, to } => {
            let from: OddsFormat = from.parse()?;
            let to: OddsFormat = to.parse()?;
            let input = Odds::parse(&raw_odds(&value), from)?;
            let output = input.convert(to)?;
            let decimal = input.to_decimal()?;
            print_json(&ConvertedOdds {
                display: output.to_string(),
                implied_probability: input.implied_probability()?,
                input,
                output,
                decimal,
            })
        }

        Commands::Kelly { probability, odds, format, fraction, max_bet, bankroll } => {
            let format: OddsFormat = format.parse()?;
            let decimal = Odds::parse(&raw_odds(&odds), format)?.to_decimal()?;
            let result = kelly(
                probability,
                decimal,
                fraction.unwrap_or(config.risk.fraction_multiplier),
                max_bet.unwrap_or(config.risk.max_bet_percentage),
            )?;

            let mut out = serde_json::to_value(&result)?;
            if let Some(bankroll) = bankroll {
                let stake = result.stake(bankroll);
                out["stake"] = serde_json::json!(stake);
                if stake > 0.0 {
                    out["risk_metrics"] = serde_json::to_value(risk_metrics(stake, decimal, bankroll)?)?;
                }
            }
            print_json(&out)
        }

        Commands::Compare { input, outcome, probability } => {
            let quotes: Vec<BookmakerQuote> = read_json(&input)?;
            let ranked = compare_odds(&quotes, parse_outcome(&outcome)?, probability)?;
            print_json(&ranked)
        }

        Commands::Factors { input } => {
            let req: FactorRequest = read_json(&input)?;
            let correlations = CorrelationMatrix::from_definitions(&req.definitions)?;
            let mut options = FactorOptions::from(&config.factors);
            if let Some(base) = req.base_probability {
                options.base_probability = base;
            }
            let analysis = process_factors(&req.inputs, &req.definitions, &correlations, options)?;
            print_json(&analysis)
        }

        Commands::Blend { input } => {
            let input: ModelInput = read_json(&input)?;
            print_json(&blend(&input, &config.models)?)
        }

        Commands::Regression { input } => {
            let input: RegressionInput = read_json(&input)?;
            let analysis = analyze(&input, &config.regression, config.factors.confidence_level)?;
            print_json(&analysis)
        }

        Commands::Calibrate { input, by_segment } => {
            let points: Vec<CalibrationPoint> = read_json(&input)?;
            let bins = config.calibration.num_bins;
            if by_segment {
                print_json(&metrics_by_segment(&points, bins)?)
            } else {
                let metrics = CalibrationMetrics::compute_with_bins(&points, bins)?;
                let recommendations = metrics.recommendations();
                print_json(&serde_json::json!({
                    "metrics": metrics,
                    "recommendations": recommendations,
                }))
            }
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("betting_edge=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

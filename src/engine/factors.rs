//! Multi-factor probability engine.
//!
//! Turns a set of user-scored factors into one win probability:
//!
//! 1. normalize each raw value to [0, 1] according to its input type
//! 2. contribution = normalized * (weight / 10) * historical_impact
//! 3. pairwise correlation adjustment to avoid double counting
//! 4. deviations of each contribution from 0.5 push the base probability
//!    up or down
//!
//! Confidence blends factor coverage, average weight and how far the values
//! sit from neutral; it drives the width of the reported interval.

use super::stats::{clamp_unit, ConfidenceLevel, Interval};
use crate::config::FactorConfig;
use crate::error::{check_probability, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_BASE_PROBABILITY: f64 = 0.5;
const MAX_WEIGHT: f64 = 10.0;

/// How a factor is scored by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputType {
    Binary,
    /// Without bounds the scale is 0-10.
    Scale {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Percentage,
    Select { options: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorDefinition {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub input_type: InputType,
    /// 0-10
    pub statistical_weight: f64,
    /// 0-1
    pub historical_impact: f64,
    /// Other factor key -> coefficient in [-1, 1].
    #[serde(default)]
    pub correlations: BTreeMap<String, f64>,
}

/// A raw factor value as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Flag(bool),
    Number(f64),
    Choice(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorInput {
    pub factor_key: String,
    pub value: FactorValue,
    /// Overrides the definition's statistical weight.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// A factor after normalization and weighting.
#[derive(Debug, Clone, Serialize)]
pub struct FactorObservation {
    pub factor_key: String,
    pub name: String,
    pub category: String,
    pub value: FactorValue,
    pub normalized_value: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// Normalize a raw value to [0, 1] for the definition's input type.
pub fn normalize(value: &FactorValue, definition: &FactorDefinition) -> Result<f64> {
    let mismatch = |expected: &'static str| {
        EngineError::invalid("factor value", format!("{}={:?}", definition.key, value), expected)
    };

    match (&definition.input_type, value) {
        (InputType::Binary, FactorValue::Flag(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        (InputType::Binary, _) => Err(mismatch("binary factors take true/false")),

        (InputType::Scale { min, max }, FactorValue::Number(v)) => {
            if !v.is_finite() {
                return Err(mismatch("scale value must be finite"));
            }
            let normalized = match (min, max) {
                (Some(lo), Some(hi)) => {
                    if hi <= lo {
                        return Err(EngineError::degenerate(
                            "normalize",
                            "scale max must exceed min",
                        ));
                    }
                    (v - lo) / (hi - lo)
                }
                _ => v / 10.0,
            };
            Ok(clamp_unit(normalized))
        }
        (InputType::Scale { .. }, _) => Err(mismatch("scale factors take a number")),

        (InputType::Percentage, FactorValue::Number(v)) => {
            check_probability("percentage factor", *v).map_err(|_| mismatch("percentage must be within [0, 1]"))
        }
        (InputType::Percentage, _) => Err(mismatch("percentage factors take a number")),

        (InputType::Select { options }, FactorValue::Choice(choice)) => {
            if options.len() < 2 {
                return Ok(0.0);
            }
            Ok(options
                .iter()
                .position(|o| o == choice)
                .map(|idx| idx as f64 / (options.len() - 1) as f64)
                .unwrap_or(0.0))
        }
        (InputType::Select { .. }, _) => Err(mismatch("select factors take one of the options")),
    }
}

/// `normalized * (weight / 10) * historical_impact`
pub fn contribution(normalized_value: f64, weight: f64, historical_impact: f64) -> f64 {
    normalized_value * (weight / MAX_WEIGHT) * historical_impact
}

/// Symmetric correlation coefficients, stored once per unordered pair.
#[derive(Debug, Clone, Default)]
pub struct CorrelationMatrix {
    pairs: HashMap<(String, String), f64>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl CorrelationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `r` for the pair. Re-inserting the same pair with a different
    /// coefficient is rejected since A-B must equal B-A.
    pub fn insert(&mut self, a: &str, b: &str, r: f64) -> Result<()> {
        if a == b {
            return Err(EngineError::invalid("correlation", a, "a factor cannot correlate with itself"));
        }
        if !r.is_finite() || !(-1.0..=1.0).contains(&r) {
            return Err(EngineError::invalid("correlation", r, "coefficient must be within [-1, 1]"));
        }
        let key = pair_key(a, b);
        if let Some(existing) = self.pairs.get(&key) {
            if (existing - r).abs() > 1e-12 {
                return Err(EngineError::invalid(
                    "correlation",
                    format!("{}-{}", a, b),
                    "conflicting coefficients; the matrix must be symmetric",
                ));
            }
            return Ok(());
        }
        self.pairs.insert(key, r);
        Ok(())
    }

    /// Coefficient for the pair, 0 when none is stored.
    pub fn get(&self, a: &str, b: &str) -> f64 {
        self.pairs.get(&pair_key(a, b)).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn from_definitions(definitions: &[FactorDefinition]) -> Result<Self> {
        let mut matrix = Self::new();
        for def in definitions {
            for (other, &r) in &def.correlations {
                matrix.insert(&def.key, other, r)?;
            }
        }
        Ok(matrix)
    }
}

/// Pairwise correlation pass over the observations, in slice order.
///
/// For each pair with coefficient r, `c_a * c_b * r` is removed from the two
/// contributions in proportion to their share. Later pairs see the values
/// already adjusted by earlier ones, so with three or more mutually
/// correlated factors the result depends on the input order.
pub fn apply_correlation_adjustments(
    observations: &mut [FactorObservation],
    correlations: &CorrelationMatrix,
) {
    if correlations.is_empty() {
        return;
    }

    for i in 0..observations.len() {
        for j in (i + 1)..observations.len() {
            let r = correlations.get(&observations[i].factor_key, &observations[j].factor_key);
            if r == 0.0 {
                continue;
            }
            let ca = observations[i].contribution;
            let cb = observations[j].contribution;
            let adjustment = ca * cb * r;
            let total = ca + cb;
            if total > 0.0 {
                observations[i].contribution = ca - adjustment * (ca / total);
                observations[j].contribution = cb - adjustment * (cb / total);
            }
        }
    }

    for obs in observations.iter_mut() {
        obs.contribution = clamp_unit(obs.contribution);
    }
}

/// Push `base` up by positive deviations from 0.5 and down by negative ones.
pub fn final_probability(contributions: &[f64], base: f64) -> f64 {
    let (pos, neg) = contributions.iter().fold((0.0, 0.0), |(pos, neg), c| {
        let deviation = c - 0.5;
        if deviation > 0.0 {
            (pos + deviation, neg)
        } else {
            (pos, neg + deviation.abs())
        }
    });
    clamp_unit(base + (1.0 - base) * pos - base * neg)
}

/// 0.3 * coverage + 0.5 * mean weight + 0.2 * spread from neutral.
pub fn confidence(observations: &[FactorObservation], total_available: usize) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let n = observations.len() as f64;
    let coverage = n / total_available.max(1) as f64;
    let avg_weight = observations.iter().map(|o| o.weight).sum::<f64>() / n / MAX_WEIGHT;
    // max squared distance from 0.5 is 0.25
    let avg_variance = observations
        .iter()
        .map(|o| (o.normalized_value - 0.5).powi(2))
        .sum::<f64>()
        / n
        * 4.0;
    clamp_unit(coverage * 0.3 + avg_weight * 0.5 + avg_variance * 0.2)
}

/// Lower confidence widens the interval: se = (1 - confidence) * 0.25.
pub fn confidence_interval(probability: f64, confidence: f64, level: ConfidenceLevel) -> Interval {
    let standard_error = (1.0 - confidence) * 0.25;
    Interval::around(probability, level.z_score() * standard_error).clamp_unit()
}

#[derive(Debug, Clone, Copy)]
pub struct FactorOptions {
    pub base_probability: f64,
    pub confidence_level: ConfidenceLevel,
}

impl Default for FactorOptions {
    fn default() -> Self {
        Self {
            base_probability: DEFAULT_BASE_PROBABILITY,
            confidence_level: ConfidenceLevel::default(),
        }
    }
}

impl From<&FactorConfig> for FactorOptions {
    fn from(config: &FactorConfig) -> Self {
        Self {
            base_probability: config.base_probability,
            confidence_level: config.confidence_level,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorAnalysis {
    pub probability: f64,
    pub confidence: f64,
    pub confidence_interval: Interval,
    pub factors: Vec<FactorObservation>,
    /// Input keys with no matching definition.
    pub skipped: Vec<String>,
}

fn check_definition(def: &FactorDefinition) -> Result<()> {
    if !def.statistical_weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&def.statistical_weight) {
        return Err(EngineError::invalid(
            "statistical_weight",
            def.statistical_weight,
            "must be within [0, 10]",
        ));
    }
    check_probability("historical_impact", def.historical_impact)?;
    Ok(())
}

/// Score the inputs against their definitions and blend them into one
/// probability. `definitions` and `correlations` must be one consistent
/// snapshot.
pub fn process_factors(
    inputs: &[FactorInput],
    definitions: &[FactorDefinition],
    correlations: &CorrelationMatrix,
    options: FactorOptions,
) -> Result<FactorAnalysis> {
    if inputs.is_empty() {
        return Err(EngineError::invalid("factors", 0, "at least one factor input is required"));
    }
    if definitions.is_empty() {
        return Err(EngineError::invalid("factor definitions", 0, "no definitions supplied"));
    }
    let base = check_probability("base_probability", options.base_probability)?;

    let mut by_key: HashMap<&str, &FactorDefinition> = HashMap::with_capacity(definitions.len());
    for def in definitions {
        check_definition(def)?;
        if by_key.insert(def.key.as_str(), def).is_some() {
            return Err(EngineError::invalid("factor key", &def.key, "duplicate definition"));
        }
    }

    let mut seen = HashSet::new();
    let mut observations = Vec::with_capacity(inputs.len());
    let mut skipped = Vec::new();

    for input in inputs {
        let Some(def) = by_key.get(input.factor_key.as_str()) else {
            tracing::debug!(factor = %input.factor_key, "no definition for factor input, skipping");
            skipped.push(input.factor_key.clone());
            continue;
        };
        if !seen.insert(input.factor_key.as_str()) {
            return Err(EngineError::invalid("factor key", &input.factor_key, "factor entered twice"));
        }

        let weight = input.weight.unwrap_or(def.statistical_weight);
        if !weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&weight) {
            return Err(EngineError::invalid("weight", weight, "must be within [0, 10]"));
        }
        let normalized_value = normalize(&input.value, def)?;

        observations.push(FactorObservation {
            factor_key: input.factor_key.clone(),
            name: def.name.clone(),
            category: def.category.clone(),
            value: input.value.clone(),
            normalized_value,
            weight,
            contribution: contribution(normalized_value, weight, def.historical_impact),
        });
    }

    apply_correlation_adjustments(&mut observations, correlations);

    let contributions: Vec<f64> = observations.iter().map(|o| o.contribution).collect();
    let probability = final_probability(&contributions, base);
    let confidence = confidence(&observations, definitions.len());
    let interval = confidence_interval(probability, confidence, options.confidence_level);

    Ok(FactorAnalysis {
        probability,
        confidence,
        confidence_interval: interval,
        factors: observations,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(key: &str, input_type: InputType, weight: f64, impact: f64) -> FactorDefinition {
        FactorDefinition {
            key: key.to_string(),
            name: key.to_string(),
            category: "form".to_string(),
            input_type,
            statistical_weight: weight,
            historical_impact: impact,
            correlations: BTreeMap::new(),
        }
    }

    fn obs(key: &str, contribution: f64) -> FactorObservation {
        FactorObservation {
            factor_key: key.to_string(),
            name: key.to_string(),
            category: String::new(),
            value: FactorValue::Number(0.0),
            normalized_value: 0.5,
            weight: 5.0,
            contribution,
        }
    }

    #[test]
    fn test_normalize_each_input_type() {
        let binary = def("b", InputType::Binary, 5.0, 1.0);
        assert_eq!(normalize(&FactorValue::Flag(true), &binary).unwrap(), 1.0);
        assert_eq!(normalize(&FactorValue::Flag(false), &binary).unwrap(), 0.0);

        let scale = def("s", InputType::Scale { min: None, max: None }, 5.0, 1.0);
        assert!((normalize(&FactorValue::Number(7.0), &scale).unwrap() - 0.7).abs() < 1e-12);

        let bounded = def("s2", InputType::Scale { min: Some(-5.0), max: Some(5.0) }, 5.0, 1.0);
        assert!((normalize(&FactorValue::Number(0.0), &bounded).unwrap() - 0.5).abs() < 1e-12);

        let pct = def("p", InputType::Percentage, 5.0, 1.0);
        assert_eq!(normalize(&FactorValue::Number(0.35), &pct).unwrap(), 0.35);

        let select = def(
            "w",
            InputType::Select {
                options: vec!["rain".into(), "cloud".into(), "sun".into()],
            },
            5.0,
            1.0,
        );
        assert_eq!(normalize(&FactorValue::Choice("cloud".into()), &select).unwrap(), 0.5);
        assert_eq!(normalize(&FactorValue::Choice("sun".into()), &select).unwrap(), 1.0);
        assert_eq!(normalize(&FactorValue::Choice("snow".into()), &select).unwrap(), 0.0);
    }

    #[test]
    fn test_normalize_rejects_mismatched_values() {
        let binary = def("b", InputType::Binary, 5.0, 1.0);
        assert!(normalize(&FactorValue::Number(1.0), &binary).is_err());
        let pct = def("p", InputType::Percentage, 5.0, 1.0);
        assert!(normalize(&FactorValue::Number(1.5), &pct).is_err());
        let bad = def("s", InputType::Scale { min: Some(3.0), max: Some(3.0) }, 5.0, 1.0);
        assert!(matches!(
            normalize(&FactorValue::Number(3.0), &bad),
            Err(EngineError::ArithmeticDegenerate { .. })
        ));
    }

    #[test]
    fn test_contribution() {
        // 0.8 * (5/10) * 0.5 = 0.2
        assert!((contribution(0.8, 5.0, 0.5) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_matrix_is_symmetric() {
        let mut m = CorrelationMatrix::new();
        m.insert("form", "injuries", 0.4).unwrap();
        assert_eq!(m.get("injuries", "form"), 0.4);
        // same pair declared from the other side is fine
        m.insert("injuries", "form", 0.4).unwrap();
        assert_eq!(m.len(), 1);
        assert!(m.insert("injuries", "form", 0.3).is_err());
        assert!(m.insert("form", "form", 0.3).is_err());
        assert!(m.insert("a", "b", 1.5).is_err());
    }

    #[test]
    fn test_positive_correlation_reduces_both() {
        // adj = 0.6 * 0.2 * 0.5 = 0.06; shares 0.75 / 0.25
        let mut m = CorrelationMatrix::new();
        m.insert("a", "b", 0.5).unwrap();
        let mut observations = vec![obs("a", 0.6), obs("b", 0.2)];
        apply_correlation_adjustments(&mut observations, &m);
        assert!((observations[0].contribution - (0.6 - 0.045)).abs() < 1e-12);
        assert!((observations[1].contribution - (0.2 - 0.015)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_correlation_increases_both() {
        let mut m = CorrelationMatrix::new();
        m.insert("a", "b", -0.5).unwrap();
        let mut observations = vec![obs("a", 0.6), obs("b", 0.2)];
        apply_correlation_adjustments(&mut observations, &m);
        assert!(observations[0].contribution > 0.6);
        assert!(observations[1].contribution > 0.2);
    }

    #[test]
    fn test_three_way_correlation_depends_on_order() {
        let mut m = CorrelationMatrix::new();
        m.insert("a", "b", 0.5).unwrap();
        m.insert("a", "c", 0.5).unwrap();
        m.insert("b", "c", 0.5).unwrap();

        let contribution_of = |observations: &[FactorObservation], key: &str| {
            observations
                .iter()
                .find(|o| o.factor_key == key)
                .map(|o| o.contribution)
                .unwrap()
        };

        // a-b first: adj = 0.6 * 0.4 * 0.5 = 0.12 -> a 0.528, b 0.352
        let mut forward = vec![obs("a", 0.6), obs("b", 0.4), obs("c", 0.2)];
        apply_correlation_adjustments(&mut forward, &m);
        assert!((contribution_of(&forward, "a") - 0.489_705_5).abs() < 1e-6);
        assert!((contribution_of(&forward, "b") - 0.330_619_8).abs() < 1e-6);
        assert!((contribution_of(&forward, "c") - 0.174_227_7).abs() < 1e-6);

        // c-b first
        let mut reversed = vec![obs("c", 0.2), obs("b", 0.4), obs("a", 0.6)];
        apply_correlation_adjustments(&mut reversed, &m);
        assert!((contribution_of(&reversed, "a") - 0.494_993_1).abs() < 1e-6);
        assert!((contribution_of(&reversed, "b") - 0.331_601_2).abs() < 1e-6);
        assert!((contribution_of(&reversed, "c") - 0.173_378_5).abs() < 1e-6);

        assert!((contribution_of(&forward, "a") - contribution_of(&reversed, "a")).abs() > 1e-3);
    }

    #[test]
    fn test_final_probability() {
        // no deviation -> base
        assert_eq!(final_probability(&[0.5, 0.5], 0.5), 0.5);
        // pos = 0.3 -> 0.5 + 0.5 * 0.3 = 0.65
        assert!((final_probability(&[0.8], 0.5) - 0.65).abs() < 1e-12);
        // neg = 0.4 -> 0.5 - 0.5 * 0.4 = 0.30
        assert!((final_probability(&[0.1], 0.5) - 0.30).abs() < 1e-12);
        // clamped
        assert_eq!(final_probability(&[0.0, 0.0, 0.0], 0.5), 0.0);
    }

    #[test]
    fn test_confidence_and_interval() {
        let observations = vec![obs("a", 0.5), obs("b", 0.5)];
        // coverage 2/4 = 0.5, avg weight 0.5, variance 0
        // 0.15 + 0.25 + 0 = 0.40
        let c = confidence(&observations, 4);
        assert!((c - 0.40).abs() < 1e-12);
        assert_eq!(confidence(&[], 4), 0.0);

        // se = 0.6 * 0.25 = 0.15; margin = 1.96 * 0.15 = 0.294
        let i = confidence_interval(0.5, c, ConfidenceLevel::NinetyFive);
        assert!((i.lower - 0.206).abs() < 1e-9);
        assert!((i.upper - 0.794).abs() < 1e-9);
    }

    #[test]
    fn test_process_factors_end_to_end() {
        let mut form = def("recentForm", InputType::Scale { min: None, max: None }, 8.0, 0.9);
        form.correlations.insert("homeAdvantage".to_string(), 0.3);
        let home = def("homeAdvantage", InputType::Binary, 6.0, 0.7);
        let weather = def("weather", InputType::Percentage, 2.0, 0.2);
        let definitions = vec![form, home, weather];
        let matrix = CorrelationMatrix::from_definitions(&definitions).unwrap();

        let inputs = vec![
            FactorInput {
                factor_key: "recentForm".into(),
                value: FactorValue::Number(9.0),
                weight: None,
            },
            FactorInput {
                factor_key: "homeAdvantage".into(),
                value: FactorValue::Flag(true),
                weight: Some(10.0),
            },
            FactorInput {
                factor_key: "unknown".into(),
                value: FactorValue::Flag(true),
                weight: None,
            },
        ];

        let analysis = process_factors(&inputs, &definitions, &matrix, FactorOptions::default()).unwrap();
        assert_eq!(analysis.factors.len(), 2);
        assert_eq!(analysis.skipped, vec!["unknown".to_string()]);
        assert!((0.0..=1.0).contains(&analysis.probability));
        assert!((0.0..=1.0).contains(&analysis.confidence));
        assert!(analysis.confidence_interval.contains(analysis.probability));
        // weight override took effect
        assert_eq!(analysis.factors[1].weight, 10.0);
        // correlation pulled the first contribution below its raw value
        assert!(analysis.factors[0].contribution < 0.9 * 0.8 * 0.9 + 1e-12);
    }

    #[test]
    fn test_process_factors_rejects_empty_inputs() {
        let definitions = vec![def("a", InputType::Binary, 5.0, 1.0)];
        let m = CorrelationMatrix::new();
        assert!(process_factors(&[], &definitions, &m, FactorOptions::default()).is_err());
        let inputs = vec![FactorInput {
            factor_key: "a".into(),
            value: FactorValue::Flag(true),
            weight: None,
        }];
        assert!(process_factors(&inputs, &[], &m, FactorOptions::default()).is_err());
    }

    #[test]
    fn test_factor_value_deserializes_by_shape() {
        let v: FactorValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, FactorValue::Flag(true));
        let v: FactorValue = serde_json::from_str("7.5").unwrap();
        assert_eq!(v, FactorValue::Number(7.5));
        let v: FactorValue = serde_json::from_str("\"sun\"").unwrap();
        assert_eq!(v, FactorValue::Choice("sun".into()));
    }
}

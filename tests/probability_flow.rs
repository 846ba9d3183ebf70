// Probability estimation and calibration flows driven by JSON inputs

#[cfg(test)]
mod tests {
    use betting_edge::config::{Config, TableSource};
    use betting_edge::engine::calibration::{
        metrics_by_segment, CalibrationMetrics, CalibrationPoint, RecommendationKind,
    };
    use betting_edge::engine::factors::{
        process_factors, CorrelationMatrix, FactorDefinition, FactorInput, FactorOptions,
    };
    use betting_edge::engine::models::{blend, ModelInput};
    use betting_edge::engine::regression::{analyze, reliability, RegressionInput};
    use std::path::Path;

    fn definitions() -> Vec<FactorDefinition> {
        serde_json::from_str(
            r#"[
                {"key": "form", "name": "Recent form", "category": "team",
                 "input_type": {"type": "scale"}, "statistical_weight": 8, "historical_impact": 0.9,
                 "correlations": {"momentum": 0.5}},
                {"key": "momentum", "name": "Momentum", "category": "team",
                 "input_type": {"type": "percentage"}, "statistical_weight": 6, "historical_impact": 0.7},
                {"key": "rested", "name": "Rested", "category": "schedule",
                 "input_type": {"type": "binary"}, "statistical_weight": 4, "historical_impact": 0.5},
                {"key": "venue", "name": "Venue", "category": "situational",
                 "input_type": {"type": "select", "options": ["away", "neutral", "home"]},
                 "statistical_weight": 5, "historical_impact": 0.6}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_factor_pipeline_from_json() {
        let defs = definitions();
        let inputs: Vec<FactorInput> = serde_json::from_str(
            r#"[
                {"factor_key": "form", "value": 9},
                {"factor_key": "momentum", "value": 0.8},
                {"factor_key": "rested", "value": true},
                {"factor_key": "venue", "value": "home"},
                {"factor_key": "crowd", "value": 7}
            ]"#,
        )
        .unwrap();

        let correlations = CorrelationMatrix::from_definitions(&defs).unwrap();
        assert_eq!(correlations.get("momentum", "form"), 0.5);

        let config = Config::default();
        let analysis =
            process_factors(&inputs, &defs, &correlations, FactorOptions::from(&config.factors)).unwrap();

        assert_eq!(analysis.factors.len(), 4);
        assert_eq!(analysis.skipped, vec!["crowd".to_string()]);
        assert!((0.0..=1.0).contains(&analysis.probability));
        assert!((0.0..=1.0).contains(&analysis.confidence));
        assert!(analysis.confidence_interval.contains(analysis.probability));
        for f in &analysis.factors {
            assert!((0.0..=1.0).contains(&f.contribution));
        }
    }

    #[test]
    fn test_blend_from_json_input() {
        let input: ModelInput = serde_json::from_str(
            r#"{"sport": "hockey", "features": {"recentForm": 0.2, "injuries": -0.1},
                "team_rating": 1550, "opponent_rating": 1500,
                "goals_for": 3.1, "goals_against": 2.7, "profile_home_advantage": 0.02}"#,
        )
        .unwrap();
        assert!(input.is_home_team);

        let config = Config::default();
        let r = blend(&input, &config.models).unwrap();
        assert!(r.poisson.is_some());
        assert!((0.0..=1.0).contains(&r.probability));
        // 0.5 + 0.3 * 0.2 - 0.1 * 0.1 = 0.55
        assert!((r.regression.predicted_probability - 0.55).abs() < 1e-12);
        assert!(r.elo.predicted_probability > 0.5);
    }

    #[test]
    fn test_regression_scenario_and_fallback_visibility() {
        assert_eq!(reliability(0.0, 500.0).unwrap(), 0.0);
        assert_eq!(reliability(500.0, 500.0).unwrap(), 0.5);

        let config = Config::default();
        let input: RegressionInput = serde_json::from_str(
            r#"{"current_performance": 0.320, "baseline": 0.260, "sample_size": 120,
                "sport": "baseball", "metric": "battingAverage", "original_probability": 0.58}"#,
        )
        .unwrap();
        let a = analyze(&input, &config.regression, config.factors.confidence_level).unwrap();
        assert_eq!(a.table_source, TableSource::Exact);
        assert!(a.adjusted_probability < a.original_probability);
        assert!(a.expected_performance < input.current_performance);
        assert!(a.expected_performance > input.baseline);

        let mut other = input.clone();
        other.sport = "cricket".to_string();
        let b = analyze(&other, &config.regression, config.factors.confidence_level).unwrap();
        assert!(b.used_default_factors());
    }

    #[test]
    fn test_calibration_report_by_segment() {
        let points: Vec<CalibrationPoint> = serde_json::from_str(
            r#"[
                {"predicted_probability": 0.9, "actual_outcome": true, "sport": "soccer", "bet_type": "moneyline"},
                {"predicted_probability": 0.9, "actual_outcome": true, "sport": "soccer", "bet_type": "moneyline"},
                {"predicted_probability": 0.9, "actual_outcome": false, "sport": "soccer", "bet_type": "moneyline"},
                {"predicted_probability": 0.2, "actual_outcome": false, "sport": "hockey"}
            ]"#,
        )
        .unwrap();

        let all = CalibrationMetrics::compute(&points).unwrap();
        assert_eq!(all.total_predictions, 4);
        assert!(all.recommendations().iter().any(|r| r.kind == RecommendationKind::Overconfidence));

        let reports = metrics_by_segment(&points, 10).unwrap();
        assert_eq!(reports.len(), 2);
        let soccer = reports
            .iter()
            .find(|r| r.segment.sport.as_deref() == Some("soccer"))
            .unwrap();
        assert_eq!(soccer.metrics.total_predictions, 3);
    }

    #[test]
    fn test_shipped_config_drives_the_engines() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.models.sport_params("baseball").k_factor, 20.0);
    }
}

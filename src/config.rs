//! Pipeline configuration. Defaults reproduce the literal constants the
//! models were tuned with (7-day window, 5% contamination, -1.0/1.5 sigma).

use crate::dataset::Field;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input CSV of daily records
    pub data_path: PathBuf,
    /// Rolling feature parameters
    pub features: FeaturesConfig,
    /// Isolation forest parameters
    pub anomaly: AnomalyConfig,
    /// Fatigue label thresholds and classifier parameters
    pub risk: RiskConfig,
    /// Activity index goals
    pub index: IndexConfig,
    /// Where artifacts, metrics and the report are written
    pub export: ExportConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Trailing window length (observations)
    pub window: usize,
    /// Observations required before a statistic is defined
    pub min_periods: usize,
    /// Raw fields that get `z_`/`d_` columns
    pub tracked: Vec<Field>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Expected share of anomalous rows, in (0, 1)
    pub contamination: f64,
    pub n_estimators: usize,
    /// Rows drawn per tree (capped at the dataset size)
    pub max_samples: usize,
    pub seed: u64,
    pub feature_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// `z_sleep` below this marks a fatigue day
    pub sleep_z_threshold: f64,
    /// `z_steps` above this marks a fatigue day
    pub steps_z_threshold: f64,
    /// Share of entities held out for evaluation
    pub test_fraction: f64,
    pub seed: u64,
    /// Probability at or above which a row is flagged
    pub decision_threshold: f64,
    pub feature_columns: Vec<String>,
    pub linear: LinearConfig,
    pub forest: ForestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// Inverse L2 regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub min_samples_leaf: usize,
    /// `None` grows trees until leaves are pure or too small to split
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub steps_goal: f64,
    pub sleep_goal: f64,
    pub steps_column: String,
    pub sleep_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
    /// Base name for the fatigue model artifact and its sidecar files
    pub model_name: String,
    pub report_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("health_fitness_dataset.csv"),
            features: FeaturesConfig::default(),
            anomaly: AnomalyConfig::default(),
            risk: RiskConfig::default(),
            index: IndexConfig::default(),
            export: ExportConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            window: 7,
            min_periods: 3,
            tracked: vec![Field::Steps, Field::SleepHours],
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            n_estimators: 200,
            max_samples: 256,
            seed: 42,
            feature_columns: to_strings(&["steps", "sleep_hours", "calories", "d_steps", "d_sleep"]),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sleep_z_threshold: -1.0,
            steps_z_threshold: 1.5,
            test_fraction: 0.2,
            seed: 42,
            decision_threshold: 0.5,
            feature_columns: to_strings(&[
                "steps",
                "calories",
                "sleep_hours",
                "age",
                "sex",
                "height",
                "weight",
                "d_sleep",
                "d_steps",
            ]),
            linear: LinearConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 2000,
            tol: 1e-8,
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            min_samples_leaf: 5,
            max_depth: None,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            steps_goal: 10_000.0,
            sleep_goal: 8.0,
            steps_column: "steps".to_string(),
            sleep_column: "sleep_hours".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("export"),
            model_name: "fatigue_model_v1".to_string(),
            report_file: "daily_health_report.csv".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                match serde_json::from_str::<PipelineConfig>(&data) {
                    Ok(c) => return c,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "invalid config; using defaults")
                    }
                }
            }
        }
        Self::default()
    }

    /// Reject parameters no stage can work with. Column names are checked
    /// later, against the actual frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.features;
        if f.window == 0 {
            return Err(ConfigError::invalid("features.window", "must be > 0"));
        }
        if f.min_periods == 0 || f.min_periods > f.window {
            return Err(ConfigError::invalid(
                "features.min_periods",
                format!("must be in 1..={}", f.window),
            ));
        }
        if f.tracked.is_empty() {
            return Err(ConfigError::EmptyColumns { stage: "features" });
        }

        let a = &self.anomaly;
        if !(a.contamination > 0.0 && a.contamination < 1.0) {
            return Err(ConfigError::invalid("anomaly.contamination", "must be in (0, 1)"));
        }
        if a.n_estimators == 0 || a.max_samples == 0 {
            return Err(ConfigError::invalid("anomaly.n_estimators", "trees and samples must be > 0"));
        }

        let r = &self.risk;
        if !(r.test_fraction > 0.0 && r.test_fraction < 1.0) {
            return Err(ConfigError::invalid("risk.test_fraction", "must be in (0, 1)"));
        }
        if !(r.decision_threshold > 0.0 && r.decision_threshold < 1.0) {
            return Err(ConfigError::invalid("risk.decision_threshold", "must be in (0, 1)"));
        }
        if r.linear.c <= 0.0 || r.linear.max_iter == 0 {
            return Err(ConfigError::invalid("risk.linear", "c and max_iter must be > 0"));
        }
        if r.forest.n_estimators == 0 || r.forest.min_samples_leaf == 0 {
            return Err(ConfigError::invalid("risk.forest", "n_estimators and min_samples_leaf must be > 0"));
        }

        crate::index::validate_goals(self.index.steps_goal, self.index.sleep_goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: PipelineConfig = serde_json::from_str(r#"{"features": {"window": 14}}"#).unwrap();
        assert_eq!(c.features.window, 14);
        assert_eq!(c.features.min_periods, 3);
        assert_eq!(c.anomaly.n_estimators, 200);
    }

    #[test]
    fn rejects_min_periods_above_window() {
        let mut c = PipelineConfig::default();
        c.features.min_periods = 8;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidParameter { name: "features.min_periods", .. })
        ));
    }

    #[test]
    fn rejects_non_positive_goal() {
        let mut c = PipelineConfig::default();
        c.index.sleep_goal = 0.0;
        assert!(c.validate().is_err());
    }
}

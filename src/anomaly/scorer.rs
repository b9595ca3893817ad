//! Fits a fresh isolation forest over instantaneous + delta features and
//! flags each row.

use crate::config::AnomalyConfig;
use crate::dataset::EntityId;
use crate::error::ConfigError;
use crate::features::FeatureFrame;
use crate::model::{IsolationForest, IsolationParams};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyLabel {
    pub entity_id: EntityId,
    pub timestamp: Option<NaiveDate>,
    pub is_anomaly: bool,
}

pub struct AnomalyScorer {
    config: AnomalyConfig,
}

impl AnomalyScorer {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Train on `frame` and flag every row of it. Undefined cells count as 0.0.
    pub fn train(&self, frame: &FeatureFrame) -> Result<(IsolationForest, Vec<AnomalyLabel>), ConfigError> {
        let x = frame.matrix(&self.config.feature_columns, "anomaly")?;
        let forest = IsolationForest::fit(
            &x,
            IsolationParams {
                n_estimators: self.config.n_estimators,
                max_samples: self.config.max_samples,
                contamination: self.config.contamination,
                seed: self.config.seed,
            },
        )?;

        let labels: Vec<AnomalyLabel> = forest
            .predict(&x)
            .into_iter()
            .zip(frame.rows())
            .map(|(is_anomaly, r)| AnomalyLabel {
                entity_id: r.entity_id.clone(),
                timestamp: r.timestamp,
                is_anomaly,
            })
            .collect();

        let flagged = labels.iter().filter(|l| l.is_anomaly).count();
        info!(
            rows = labels.len(),
            flagged,
            share = flagged as f64 / labels.len() as f64,
            contamination = self.config.contamination,
            "anomaly balance"
        );
        Ok((forest, labels))
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Record, Sex};
    use crate::features::WindowedFeatureEngine;

    fn frame() -> FeatureFrame {
        let records: Vec<Record> = (0..40)
            .map(|i| Record {
                entity_id: EntityId::from((i % 4) as u32),
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1 + (i / 4) as u32),
                steps: if i == 37 { 60_000.0 } else { 8000.0 + ((i * 37) % 11) as f64 * 150.0 },
                sleep_hours: if i == 37 { 1.0 } else { 7.0 + ((i * 13) % 5) as f64 * 0.2 },
                calories: 2200.0 + ((i * 7) % 9) as f64 * 20.0,
                age: 30.0,
                sex: Sex::Male,
                height: 180.0,
                weight: 80.0,
            })
            .collect();
        WindowedFeatureEngine::new(&Default::default()).unwrap().compute(&records)
    }

    #[test]
    fn flags_the_extreme_day() {
        let frame = frame();
        let (_, labels) = AnomalyScorer::new(AnomalyConfig::default()).train(&frame).unwrap();
        assert_eq!(labels.len(), frame.len());
        let extreme = frame.rows().iter().position(|r| r.steps == 60_000.0).unwrap();
        assert!(labels[extreme].is_anomaly);
        assert_eq!(labels[extreme].entity_id, frame.rows()[extreme].entity_id);
    }

    #[test]
    fn unknown_column_is_config_error() {
        let config = AnomalyConfig {
            feature_columns: vec!["steps".into(), "z_heart_rate".into()],
            ..AnomalyConfig::default()
        };
        let err = AnomalyScorer::new(config).train(&frame()).unwrap_err();
        assert_eq!(err, ConfigError::MissingColumn("z_heart_rate".into()));
    }

    #[test]
    fn empty_column_list_is_config_error() {
        let config = AnomalyConfig {
            feature_columns: vec![],
            ..AnomalyConfig::default()
        };
        assert!(matches!(
            AnomalyScorer::new(config).train(&frame()),
            Err(ConfigError::EmptyColumns { .. })
        ));
    }

    #[test]
    fn empty_frame_is_config_error() {
        let empty = frame().select(&[]);
        assert!(matches!(
            AnomalyScorer::new(AnomalyConfig::default()).train(&empty),
            Err(ConfigError::EmptyMatrix { .. })
        ));
    }
}

//! Activity index: weighted balance of steps and sleep against daily goals,
//! capped at 1.0 (no lower bound).

use crate::config::IndexConfig;
use crate::dataset::EntityId;
use crate::error::ConfigError;
use crate::features::FeatureFrame;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const STEPS_WEIGHT: f64 = 0.6;
const SLEEP_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityIndex {
    pub entity_id: EntityId,
    pub timestamp: Option<NaiveDate>,
    pub index: f64,
}

pub(crate) fn validate_goals(steps_goal: f64, sleep_goal: f64) -> Result<(), ConfigError> {
    if !(steps_goal.is_finite() && steps_goal > 0.0) {
        return Err(ConfigError::invalid("steps_goal", "must be a positive number"));
    }
    if !(sleep_goal.is_finite() && sleep_goal > 0.0) {
        return Err(ConfigError::invalid("sleep_goal", "must be a positive number"));
    }
    Ok(())
}

/// `min(0.6 * steps/steps_goal + 0.4 * sleep/sleep_goal, 1.0)`; NaN when
/// either input is NaN.
pub fn activity_index(steps: f64, sleep_hours: f64, steps_goal: f64, sleep_goal: f64) -> f64 {
    let raw = STEPS_WEIGHT * steps / steps_goal + SLEEP_WEIGHT * sleep_hours / sleep_goal;
    if raw.is_nan() {
        raw
    } else {
        raw.min(1.0)
    }
}

pub struct ActivityIndexCalculator {
    config: IndexConfig,
}

impl ActivityIndexCalculator {
    pub fn new(config: IndexConfig) -> Result<Self, ConfigError> {
        validate_goals(config.steps_goal, config.sleep_goal)?;
        Ok(Self { config })
    }

    /// One index per frame row. Both source columns are resolved before any
    /// value is computed. Rows with an undefined source value get NaN, so
    /// callers expecting bounded output should pass a cleaned frame.
    pub fn compute(&self, frame: &FeatureFrame) -> Result<Vec<ActivityIndex>, ConfigError> {
        let steps = frame.column(&self.config.steps_column)?;
        let sleep = frame.column(&self.config.sleep_column)?;
        Ok(frame
            .rows()
            .iter()
            .zip(steps.into_iter().zip(sleep))
            .map(|(r, (steps, sleep))| ActivityIndex {
                entity_id: r.entity_id.clone(),
                timestamp: r.timestamp,
                index: activity_index(
                    steps.unwrap_or(f64::NAN),
                    sleep.unwrap_or(f64::NAN),
                    self.config.steps_goal,
                    self.config.sleep_goal,
                ),
            })
            .collect())
    }
}

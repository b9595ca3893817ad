//! Fatigue target: a day with poor relative sleep or unusually high activity.

use crate::config::RiskConfig;
use crate::dataset::Field;
use crate::error::ConfigError;
use crate::features::FeatureFrame;
use tracing::info;

/// Name under which derived labels are attached to a frame.
pub const FATIGUE_LABEL: &str = "fatigue";

/// `(z_sleep < sleep_threshold) || (z_steps > steps_threshold)` per row.
/// An undefined z-score never satisfies its comparison.
pub fn derive_fatigue_labels(frame: &FeatureFrame, config: &RiskConfig) -> Result<Vec<bool>, ConfigError> {
    let z_sleep = frame.column(&Field::SleepHours.z_column())?;
    let z_steps = frame.column(&Field::Steps.z_column())?;
    let labels: Vec<bool> = z_sleep
        .iter()
        .zip(&z_steps)
        .map(|(sleep, steps)| {
            sleep.is_some_and(|z| z < config.sleep_z_threshold) || steps.is_some_and(|z| z > config.steps_z_threshold)
        })
        .collect();

    let positives = labels.iter().filter(|&&l| l).count();
    info!(
        rows = labels.len(),
        fatigued = positives,
        share = if labels.is_empty() { 0.0 } else { positives as f64 / labels.len() as f64 },
        "fatigue label distribution"
    );
    Ok(labels)
}

/// Convenience: derive the labels and attach them as [`FATIGUE_LABEL`].
pub fn attach_fatigue_labels(frame: FeatureFrame, config: &RiskConfig) -> Result<FeatureFrame, ConfigError> {
    let labels = derive_fatigue_labels(&frame, config)?;
    frame.with_label(FATIGUE_LABEL, labels)
}

//! Feature engineering: records → per-entity arenas → rolling stats → frame.

use super::frame::{entity_spans, DerivedColumns, FeatureFrame};
use super::rolling::trailing_stats;
use crate::config::FeaturesConfig;
use crate::dataset::{Field, Record};
use crate::error::ConfigError;
use tracing::debug;

pub struct WindowedFeatureEngine {
    window: usize,
    min_periods: usize,
    tracked: Vec<Field>,
}

impl WindowedFeatureEngine {
    pub fn new(config: &FeaturesConfig) -> Result<Self, ConfigError> {
        Self::with_params(config.window, config.min_periods, config.tracked.clone())
    }

    pub fn with_params(window: usize, min_periods: usize, tracked: Vec<Field>) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::invalid("window", "must be > 0"));
        }
        if min_periods == 0 || min_periods > window {
            return Err(ConfigError::invalid("min_periods", format!("must be in 1..={window}")));
        }
        if tracked.is_empty() {
            return Err(ConfigError::EmptyColumns { stage: "features" });
        }
        Ok(Self {
            window,
            min_periods,
            tracked,
        })
    }

    /// Sort a copy of `records` by (entity, timestamp), missing timestamps
    /// last and ties in input order, then compute `z_`/`d_` columns inside
    /// each entity's span. Rows are never dropped here.
    pub fn compute(&self, records: &[Record]) -> FeatureFrame {
        let mut rows = records.to_vec();
        rows.sort_by(|a, b| {
            a.entity_id
                .cmp(&b.entity_id)
                .then_with(|| a.timestamp.is_none().cmp(&b.timestamp.is_none()))
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        let spans = entity_spans(&rows);

        let mut derived: Vec<DerivedColumns> = self
            .tracked
            .iter()
            .map(|&field| DerivedColumns {
                field,
                z: vec![None; rows.len()],
                d: vec![None; rows.len()],
            })
            .collect();

        // One arena per entity; cells are addressed as span.start + position.
        let mut arena: Vec<f64> = Vec::new();
        for span in &spans {
            for cols in derived.iter_mut() {
                arena.clear();
                arena.extend(rows[span.range()].iter().map(|r| cols.field.value(r)));
                for (pos, stat) in trailing_stats(&arena, self.window, self.min_periods).into_iter().enumerate() {
                    cols.z[span.start + pos] = stat.z;
                    cols.d[span.start + pos] = stat.d;
                }
            }
        }

        debug!(rows = rows.len(), entities = spans.len(), window = self.window, "rolling features computed");
        FeatureFrame::from_parts(rows, derived)
    }
}

//! Wellness risk pipeline: daily activity and sleep records in, a fused
//! per-day report of fatigue risk, activity anomalies and an activity index out.
//!
//! Modular structure:
//! - [`dataset`]: Daily records and CSV ingestion
//! - [`features`]: Per-entity rolling z-scores and deviations
//! - [`anomaly`]: Isolation-forest activity anomaly flags
//! - [`risk`]: Fatigue labels, grouped split, candidate selection
//! - [`index`]: Activity index against daily goals
//! - [`report`]: Fusion of all signals and report writing
//! - [`pipeline`]: Stage orchestration
//! - [`export`]: Model artifacts and report on disk
//! - [`logging`]: Structured JSON logging

pub mod anomaly;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod features;
pub mod index;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod risk;

pub use anomaly::{AnomalyLabel, AnomalyScorer};
pub use config::PipelineConfig;
pub use dataset::{EntityId, Record};
pub use error::{AlignmentError, ConfigError, DataQualityError, PipelineError};
pub use features::{FeatureFrame, WindowedFeatureEngine};
pub use index::{ActivityIndex, ActivityIndexCalculator};
pub use logging::StructuredLogger;
pub use pipeline::{Pipeline, PipelineRun};
pub use report::{ReportFusion, UnifiedRow};
pub use risk::{RiskClassifier, RiskLabel};

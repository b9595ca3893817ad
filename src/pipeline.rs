//! End-to-end run: features → cleaning → labels → {anomaly, index, risk} →
//! fusion. Every table is passed explicitly from one stage to the next.
//!
//! Configuration problems abort the run. Data problems (nothing left after
//! cleaning, a degenerate split, misaligned fusion input) are recorded in
//! [`PipelineRun::stages`] and the run continues with what it has.

use crate::anomaly::{AnomalyLabel, AnomalyScorer};
use crate::config::PipelineConfig;
use crate::dataset::Record;
use crate::error::{ConfigError, DataQualityError};
use crate::features::{FeatureFrame, WindowedFeatureEngine};
use crate::index::{ActivityIndex, ActivityIndexCalculator};
use crate::model::IsolationForest;
use crate::report::{ActivitySignal, FusionMode, ReportFusion, UnifiedRow};
use crate::risk::{attach_fatigue_labels, RiskClassifier, RiskLabel, Training, ENTITY_GROUP, FATIGUE_LABEL};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Features,
    Cleaning,
    Labels,
    Anomaly,
    Index,
    Risk,
    Fusion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Features => "features",
            Stage::Cleaning => "cleaning",
            Stage::Labels => "labels",
            Stage::Anomaly => "anomaly",
            Stage::Index => "index",
            Stage::Risk => "risk",
            Stage::Fusion => "fusion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed { rows: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStatus {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// Everything a run produced, including the partial pieces of a run whose
/// later stages could not complete.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Cleaned frame with the fatigue label attached
    pub frame: FeatureFrame,
    pub removed_rows: usize,
    pub anomaly_model: Option<IsolationForest>,
    pub anomalies: Vec<AnomalyLabel>,
    pub activity: Vec<ActivityIndex>,
    pub training: Training,
    /// Selected model's scores for every cleaned row; empty when training
    /// was unavailable
    pub risk: Vec<RiskLabel>,
    pub fusion_mode: Option<FusionMode>,
    pub report: Vec<UnifiedRow>,
    pub stages: Vec<StageStatus>,
}

impl PipelineRun {
    pub fn stage(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// True when every stage completed.
    pub fn is_complete(&self) -> bool {
        self.stages
            .iter()
            .all(|s| matches!(s.outcome, StageOutcome::Completed { .. }))
    }
}

#[derive(Default)]
struct StageLog(Vec<StageStatus>);

impl StageLog {
    fn completed(&mut self, stage: Stage, rows: usize) {
        info!(%stage, rows, "stage completed");
        self.0.push(StageStatus {
            stage,
            outcome: StageOutcome::Completed { rows },
        });
    }

    fn failed(&mut self, stage: Stage, reason: impl fmt::Display) {
        let reason = reason.to_string();
        warn!(%stage, %reason, "stage failed");
        self.0.push(StageStatus {
            stage,
            outcome: StageOutcome::Failed { reason },
        });
    }
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates the configuration up front.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, records: &[Record]) -> Result<PipelineRun, ConfigError> {
        let cfg = &self.config;
        let mut log = StageLog::default();

        let engine = WindowedFeatureEngine::new(&cfg.features)?;
        let features = engine.compute(records);
        log.completed(Stage::Features, features.len());

        let (clean, removed_rows) = features.drop_incomplete();
        info!(kept = clean.len(), removed = removed_rows, "incomplete rows dropped");
        log.completed(Stage::Cleaning, clean.len());

        let frame = attach_fatigue_labels(clean, &cfg.risk)?;
        log.completed(Stage::Labels, frame.len());

        let (anomaly_model, anomalies) = if frame.is_empty() {
            for column in &cfg.anomaly.feature_columns {
                frame.column(column)?;
            }
            log.failed(Stage::Anomaly, no_rows());
            (None, Vec::new())
        } else {
            let (model, labels) = AnomalyScorer::new(cfg.anomaly.clone()).train(&frame)?;
            log.completed(Stage::Anomaly, labels.len());
            (Some(model), labels)
        };

        let activity = ActivityIndexCalculator::new(cfg.index.clone())?.compute(&frame)?;
        log.completed(Stage::Index, activity.len());

        let training = RiskClassifier::new(cfg.risk.clone()).train_and_select(&frame, FATIGUE_LABEL, ENTITY_GROUP)?;
        let risk = match &training {
            Training::Selected(selection) => {
                info!(
                    model = %selection.kind(),
                    criterion = ?selection.criterion,
                    auc = ?selection.metrics().roc_auc,
                    f1 = selection.metrics().f1,
                    "fatigue model selected"
                );
                let labels = selection.predict_frame(&frame)?;
                log.completed(Stage::Risk, labels.len());
                labels
            }
            Training::Unavailable(e) => {
                log.failed(Stage::Risk, e);
                Vec::new()
            }
        };

        let (fusion_mode, report) = match fuse(&training, &risk, &anomalies, &activity) {
            Ok((mode, rows)) => {
                log.completed(Stage::Fusion, rows.len());
                (Some(mode), rows)
            }
            Err(reason) => {
                log.failed(Stage::Fusion, reason);
                (None, Vec::new())
            }
        };

        Ok(PipelineRun {
            frame,
            removed_rows,
            anomaly_model,
            anomalies,
            activity,
            training,
            risk,
            fusion_mode,
            report,
            stages: log.0,
        })
    }
}

fn no_rows() -> DataQualityError {
    DataQualityError::NoData {
        reason: "feature frame is empty after cleaning".to_string(),
    }
}

fn fuse(
    training: &Training,
    risk: &[RiskLabel],
    anomalies: &[AnomalyLabel],
    activity: &[ActivityIndex],
) -> Result<(FusionMode, Vec<UnifiedRow>), String> {
    let signals = ActivitySignal::combine(anomalies, activity).map_err(|e| e.to_string())?;
    let fused = match training {
        Training::Selected(_) => ReportFusion::fuse(risk, &signals).map_err(|e| e.to_string())?,
        Training::Unavailable(_) => ReportFusion::activity_only(&signals),
    };
    Ok((fused.mode, fused.rows))
}

//! Trains both fatigue candidates on the same entity-grouped split, scores
//! them on the held-out entities and keeps the better one.

use super::metrics::ClassificationMetrics;
use super::split::{group_split, GroupSplit};
use crate::config::RiskConfig;
use crate::dataset::EntityId;
use crate::error::{ConfigError, DataQualityError};
use crate::features::FeatureFrame;
use crate::model::{CandidateKind, FatigueModel, FeatureManifest};
use chrono::NaiveDate;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Only supported grouping key.
pub const ENTITY_GROUP: &str = "entity_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLabel {
    pub entity_id: EntityId,
    pub timestamp: Option<NaiveDate>,
    pub fatigue_probability: f64,
    pub fatigue_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    RocAuc,
    /// Used when ROC-AUC is undefined for the held-out labels
    F1,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub kind: CandidateKind,
    pub metrics: ClassificationMetrics,
}

/// The winning candidate with everything needed to report on it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub model: FatigueModel,
    pub criterion: SelectionCriterion,
    pub candidates: Vec<CandidateReport>,
    pub test_predictions: Vec<RiskLabel>,
    pub split: GroupSplit,
    feature_columns: Vec<String>,
    decision_threshold: f64,
}

impl Selection {
    pub fn kind(&self) -> CandidateKind {
        self.model.kind()
    }

    pub fn metrics(&self) -> &ClassificationMetrics {
        let kind = self.kind();
        &self
            .candidates
            .iter()
            .find(|c| c.kind == kind)
            .unwrap_or(&self.candidates[0])
            .metrics
    }

    pub fn manifest(&self) -> FeatureManifest {
        FeatureManifest::new(self.feature_columns.clone())
    }

    /// Score every row of `frame` with the selected model.
    pub fn predict_frame(&self, frame: &FeatureFrame) -> Result<Vec<RiskLabel>, ConfigError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let x = frame.matrix(&self.feature_columns, "risk")?;
        let proba = self.model.predict_proba(&x);
        Ok(risk_labels(frame, &(0..frame.len()).collect::<Vec<_>>(), &proba, self.decision_threshold))
    }
}

/// Outcome of [`RiskClassifier::train_and_select`]. Data problems are values,
/// not errors, so the pipeline can continue with the other signals.
#[derive(Debug, Clone)]
pub enum Training {
    Selected(Box<Selection>),
    Unavailable(DataQualityError),
}

impl Training {
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Training::Selected(s) => Some(s),
            Training::Unavailable(_) => None,
        }
    }
}

fn risk_labels(frame: &FeatureFrame, rows: &[usize], proba: &[f64], threshold: f64) -> Vec<RiskLabel> {
    rows.iter()
        .zip(proba)
        .map(|(&i, &p)| RiskLabel {
            entity_id: frame.entity(i).clone(),
            timestamp: frame.timestamp(i),
            fatigue_probability: p,
            fatigue_flag: p >= threshold,
        })
        .collect()
}

/// `challenger` replaces `best` only when strictly better, so earlier
/// candidates win ties.
fn is_better(challenger: &ClassificationMetrics, best: &ClassificationMetrics, criterion: SelectionCriterion) -> bool {
    match criterion {
        SelectionCriterion::RocAuc => match (challenger.roc_auc, best.roc_auc) {
            (Some(c), Some(b)) => c > b,
            (Some(_), None) => true,
            _ => false,
        },
        SelectionCriterion::F1 => challenger.f1 > best.f1,
    }
}

pub struct RiskClassifier {
    config: RiskConfig,
}

impl RiskClassifier {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Feature columns, test fraction and seed come from the classifier's
    /// `RiskConfig`; only the label and grouping columns are per call.
    pub fn train_and_select(
        &self,
        frame: &FeatureFrame,
        label_column: &str,
        group_column: &str,
    ) -> Result<Training, ConfigError> {
        let cfg = &self.config;
        if cfg.feature_columns.is_empty() {
            return Err(ConfigError::EmptyColumns { stage: "risk" });
        }
        if !(cfg.test_fraction > 0.0 && cfg.test_fraction < 1.0) {
            return Err(ConfigError::invalid("test_fraction", "must be in (0, 1)"));
        }
        if group_column != ENTITY_GROUP {
            return Err(ConfigError::invalid(
                "group_column",
                format!("`{group_column}` is not a grouping key; use `{ENTITY_GROUP}`"),
            ));
        }
        let y = frame.label(label_column)?;
        if frame.is_empty() {
            // an unknown column is still a configuration error
            for column in &cfg.feature_columns {
                frame.column(column)?;
            }
            return Ok(Training::Unavailable(DataQualityError::NoData {
                reason: "feature frame is empty after cleaning".to_string(),
            }));
        }
        let x = frame.matrix(&cfg.feature_columns, "risk")?;

        let groups: Vec<EntityId> = frame.rows().iter().map(|r| r.entity_id.clone()).collect();
        let split = match group_split(&groups, cfg.test_fraction, cfg.seed) {
            Ok(s) => s,
            Err(e) => return Ok(Training::Unavailable(e)),
        };
        info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            train_entities = split.train_entities.len(),
            test_entities = split.test_entities.len(),
            "group split"
        );

        let x_train = x.select(Axis(0), &split.train);
        let x_test = x.select(Axis(0), &split.test);
        let y_train: Vec<bool> = split.train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<bool> = split.test.iter().map(|&i| y[i]).collect();

        let mut fitted: Vec<(FatigueModel, Vec<f64>, ClassificationMetrics)> = Vec::new();
        for kind in CandidateKind::ALL {
            let model = match FatigueModel::fit(kind, &x_train, &y_train, cfg) {
                Ok(m) => m,
                Err(e) => return Ok(Training::Unavailable(e)),
            };
            let proba = model.predict_proba(&x_test);
            let metrics = ClassificationMetrics::evaluate(&y_test, &proba, cfg.decision_threshold);
            info!(
                model = %kind,
                acc = metrics.accuracy,
                f1 = metrics.f1,
                auc = ?metrics.roc_auc,
                precision = metrics.precision,
                recall = metrics.recall,
                "candidate evaluated"
            );
            fitted.push((model, proba, metrics));
        }

        let criterion = if fitted.iter().any(|f| f.2.roc_auc.is_some()) {
            SelectionCriterion::RocAuc
        } else {
            SelectionCriterion::F1
        };
        let mut best = 0;
        for i in 1..fitted.len() {
            if is_better(&fitted[i].2, &fitted[best].2, criterion) {
                best = i;
            }
        }

        let candidates = fitted
            .iter()
            .map(|(m, _, metrics)| CandidateReport {
                kind: m.kind(),
                metrics: *metrics,
            })
            .collect();
        let (model, proba, _) = fitted.swap_remove(best);
        let test_predictions = risk_labels(frame, &split.test, &proba, cfg.decision_threshold);
        info!(model = %model.kind(), criterion = ?criterion, "best model selected");

        Ok(Training::Selected(Box::new(Selection {
            model,
            criterion,
            candidates,
            test_predictions,
            split,
            feature_columns: cfg.feature_columns.clone(),
            decision_threshold: cfg.decision_threshold,
        })))
    }
}

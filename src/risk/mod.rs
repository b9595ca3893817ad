//! Supervised fatigue risk: label derivation, grouped split, two candidate
//! classifiers and selection by ROC-AUC.

mod engine;
mod labels;
mod metrics;
mod split;

pub use engine::{CandidateReport, RiskClassifier, RiskLabel, Selection, SelectionCriterion, Training, ENTITY_GROUP};
pub use labels::{attach_fatigue_labels, derive_fatigue_labels, FATIGUE_LABEL};
pub use metrics::{roc_auc, ClassificationMetrics};
pub use split::{group_split, GroupSplit};

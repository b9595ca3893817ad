//! Detectors and classifiers fitted in-process, plus the artifact store
//! that persists them as opaque blobs.

mod artifact;
mod forest;
mod isolation;
mod linear;

pub use artifact::{ArtifactHandle, ArtifactStore, FeatureManifest, FsArtifactStore};
pub use forest::{DecisionTree, RandomForest};
pub use isolation::{average_path_length, IsolationForest, IsolationParams};
pub use linear::{LogisticRegression, StandardScaler};

use crate::config::RiskConfig;
use crate::error::{ConfigError, DataQualityError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub(crate) struct ClassBalance {
    /// Per-row weight `n / (classes * count(class))`
    pub weights: Vec<f64>,
    pub positives: usize,
}

/// Balanced class weights; fails unless both classes are present.
pub(crate) fn balanced_weights(y: &[bool]) -> Result<ClassBalance, DataQualityError> {
    let Some(&first) = y.first() else {
        return Err(DataQualityError::NoData {
            reason: "no training rows".to_string(),
        });
    };
    let positives = y.iter().filter(|&&v| v).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(DataQualityError::SingleClassTraining { class: first });
    }
    let n = y.len() as f64;
    let (wp, wn) = (n / (2.0 * positives as f64), n / (2.0 * negatives as f64));
    Ok(ClassBalance {
        weights: y.iter().map(|&v| if v { wp } else { wn }).collect(),
        positives,
    })
}

/// The two fatigue candidates, in declaration (tie-break) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Linear,
    Ensemble,
}

impl CandidateKind {
    pub const ALL: [CandidateKind; 2] = [CandidateKind::Linear, CandidateKind::Ensemble];

    pub fn name(self) -> &'static str {
        match self {
            CandidateKind::Linear => "logreg",
            CandidateKind::Ensemble => "rf",
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fitted fatigue classifier. Selection code only sees this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum FatigueModel {
    Linear(LogisticRegression),
    Ensemble(RandomForest),
}

impl FatigueModel {
    pub fn fit(kind: CandidateKind, x: &Array2<f64>, y: &[bool], config: &RiskConfig) -> Result<Self, DataQualityError> {
        Ok(match kind {
            CandidateKind::Linear => FatigueModel::Linear(LogisticRegression::fit(x, y, &config.linear)?),
            CandidateKind::Ensemble => FatigueModel::Ensemble(RandomForest::fit(x, y, &config.forest, config.seed)?),
        })
    }

    pub fn kind(&self) -> CandidateKind {
        match self {
            FatigueModel::Linear(_) => CandidateKind::Linear,
            FatigueModel::Ensemble(_) => CandidateKind::Ensemble,
        }
    }

    /// Probability of the fatigue class per row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        match self {
            FatigueModel::Linear(m) => m.predict_proba(x),
            FatigueModel::Ensemble(m) => m.predict_proba(x),
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            FatigueModel::Linear(m) => m.n_features(),
            FatigueModel::Ensemble(m) => m.n_features(),
        }
    }

    /// Score one day from named feature values in manifest order; absent
    /// names count as 0.0.
    pub fn predict_named(&self, manifest: &FeatureManifest, values: &HashMap<String, f64>) -> Result<f64, ConfigError> {
        if manifest.features.len() != self.n_features() {
            return Err(ConfigError::invalid(
                "manifest",
                format!(
                    "model expects {} features, manifest lists {}",
                    self.n_features(),
                    manifest.features.len()
                ),
            ));
        }
        let row = Array2::from_shape_fn((1, manifest.features.len()), |(_, j)| {
            values.get(&manifest.features[j]).copied().unwrap_or(0.0)
        });
        Ok(self.predict_proba(&row)[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_weights_sum_to_n() {
        let y = [true, false, false, false];
        let b = balanced_weights(&y).unwrap();
        assert_eq!(b.positives, 1);
        assert_eq!(b.weights[0], 2.0);
        assert!((b.weights.iter().sum::<f64>() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn empty_labels_are_no_data() {
        assert!(matches!(balanced_weights(&[]), Err(DataQualityError::NoData { .. })));
    }

    #[test]
    fn predict_named_checks_manifest() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i + j) as f64);
        let y: Vec<bool> = (0..20).map(|i| i >= 10).collect();
        let model = FatigueModel::fit(CandidateKind::Linear, &x, &y, &RiskConfig::default()).unwrap();

        let manifest = FeatureManifest::new(vec!["a".into(), "b".into()]);
        let mut values = HashMap::new();
        values.insert("a".to_string(), 19.0);
        values.insert("b".to_string(), 20.0);
        assert!(model.predict_named(&manifest, &values).unwrap() > 0.5);

        let short = FeatureManifest::new(vec!["a".into()]);
        assert!(model.predict_named(&short, &values).is_err());
    }
}

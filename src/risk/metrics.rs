//! Binary classification metrics on a held-out split.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub f1: f64,
    /// `None` when the evaluated labels contain a single class
    pub roc_auc: Option<f64>,
    pub precision: f64,
    pub recall: f64,
    pub support: usize,
}

impl ClassificationMetrics {
    /// Hard labels come from `proba >= threshold`. Ratios with an empty
    /// denominator are 0.
    pub fn evaluate(y_true: &[bool], proba: &[f64], threshold: f64) -> Self {
        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&truth, &p) in y_true.iter().zip(proba) {
            match (truth, p >= threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            accuracy: ratio(tp + tn, y_true.len()),
            f1,
            roc_auc: roc_auc(y_true, proba),
            precision,
            recall,
            support: y_true.len(),
        }
    }

    /// Flat name → value map for the metrics JSON; an undefined AUC is omitted.
    pub fn to_export(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        out.insert("acc".to_string(), self.accuracy);
        out.insert("f1".to_string(), self.f1);
        if let Some(auc) = self.roc_auc {
            out.insert("auc".to_string(), auc);
        }
        out.insert("precision".to_string(), self.precision);
        out.insert("recall".to_string(), self.recall);
        out
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
pub fn roc_auc(y_true: &[bool], scores: &[f64]) -> Option<f64> {
    let positives = y_true.iter().filter(|&&y| y).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; the tie group i..=j shares their mean
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j].iter().filter(|&&k| y_true[k]).count() as f64 * mean_rank;
        i = j + 1;
    }
    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking() {
        assert_eq!(roc_auc(&[false, false, true, true], &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
    }

    #[test]
    fn ties_count_half() {
        assert_eq!(roc_auc(&[false, true], &[0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn single_class_auc_is_none() {
        assert_eq!(roc_auc(&[true, true], &[0.2, 0.9]), None);
        let m = ClassificationMetrics::evaluate(&[false, false], &[0.1, 0.7], 0.5);
        assert_eq!(m.roc_auc, None);
        assert!(!m.to_export().contains_key("auc"));
    }

    #[test]
    fn confusion_counts() {
        let y = [true, true, false, false, true];
        let p = [0.9, 0.4, 0.6, 0.1, 0.5];
        let m = ClassificationMetrics::evaluate(&y, &p, 0.5);
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_predicted_positives_gives_zero_precision() {
        let m = ClassificationMetrics::evaluate(&[true, false], &[0.1, 0.2], 0.5);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1, 0.0);
    }
}

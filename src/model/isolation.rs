//! Isolation forest: random axis-aligned partitions; short paths mean outliers.

use crate::error::ConfigError;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf { size: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(x: &Array2<f64>, sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = vec![Node::Leaf { size: 0 }];
        let mut stack = vec![(0usize, sample, 0usize)];
        while let Some((slot, rows, depth)) = stack.pop() {
            let split = if depth >= max_depth || rows.len() <= 1 {
                None
            } else {
                Self::pick_split(x, &rows, rng)
            };
            let Some((feature, threshold)) = split else {
                nodes[slot] = Node::Leaf { size: rows.len() };
                continue;
            };
            let (l, r): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&i| x[[i, feature]] <= threshold);
            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { size: 0 });
            nodes.push(Node::Leaf { size: 0 });
            nodes[slot] = Node::Split {
                feature,
                threshold,
                left,
                right,
            };
            stack.push((right, r, depth + 1));
            stack.push((left, l, depth + 1));
        }
        Self { nodes }
    }

    /// Random feature among those not constant on `rows`, uniform threshold in [min, max).
    fn pick_split(x: &Array2<f64>, rows: &[usize], rng: &mut StdRng) -> Option<(usize, f64)> {
        let spread: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(x[[i, f]]), hi.max(x[[i, f]]))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();
        if spread.is_empty() {
            return None;
        }
        let (feature, lo, hi) = spread[rng.gen_range(0..spread.len())];
        Some((feature, rng.gen_range(lo..hi)))
    }

    fn path_length(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IsolationParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    n_features: usize,
    /// Scores strictly above this are outliers
    threshold: f64,
}

impl IsolationForest {
    pub fn fit(x: &Array2<f64>, params: IsolationParams) -> Result<Self, ConfigError> {
        if x.nrows() == 0 {
            return Err(ConfigError::EmptyMatrix { stage: "anomaly" });
        }
        if x.ncols() == 0 {
            return Err(ConfigError::EmptyColumns { stage: "anomaly" });
        }
        if !(params.contamination > 0.0 && params.contamination < 1.0) {
            return Err(ConfigError::invalid("contamination", "must be in (0, 1)"));
        }
        if params.n_estimators == 0 || params.max_samples == 0 {
            return Err(ConfigError::invalid("n_estimators", "trees and samples must be > 0"));
        }

        let n = x.nrows();
        let sample_size = params.max_samples.min(n);
        let max_depth = (sample_size as f64).log2().ceil().max(0.0) as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(x, sample, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            n_features: x.ncols(),
            threshold: f64::INFINITY,
        };
        let scores = forest.score_samples(x);
        forest.threshold = quantile(&scores, 1.0 - params.contamination);
        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher is more isolated.
    pub fn score_samples(&self, x: &Array2<f64>) -> Vec<f64> {
        let norm = average_path_length(self.sample_size).max(f64::MIN_POSITIVE);
        let n_trees = self.trees.len().max(1) as f64;
        x.rows()
            .into_iter()
            .map(|row| {
                let mean = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / n_trees;
                2f64.powf(-mean / norm)
            })
            .collect()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<bool> {
        self.score_samples(x).into_iter().map(|s| s > self.threshold).collect()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Linear-interpolated quantile, `q` in [0, 1].
pub(crate) fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params(seed: u64) -> IsolationParams {
        IsolationParams {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
            seed,
        }
    }

    fn cluster_with_outlier() -> Array2<f64> {
        let mut x = Array2::from_shape_fn((60, 2), |(i, j)| ((i * 7 + j * 3) % 10) as f64 * 0.1);
        x[[59, 0]] = 50.0;
        x[[59, 1]] = -50.0;
        x
    }

    #[test]
    fn path_length_constants() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.2448).abs() < 1e-3);
    }

    #[test]
    fn far_point_scores_highest() {
        let x = cluster_with_outlier();
        let forest = IsolationForest::fit(&x, params(42)).unwrap();
        let scores = forest.score_samples(&x);
        let top = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(top, 59);
        assert!(forest.predict(&x)[59]);
    }

    #[test]
    fn same_seed_same_flags() {
        let x = cluster_with_outlier();
        let a = IsolationForest::fit(&x, params(7)).unwrap().predict(&x);
        let b = IsolationForest::fit(&x, params(7)).unwrap().predict(&x);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_matrix_is_config_error() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            IsolationForest::fit(&x, params(1)),
            Err(ConfigError::EmptyMatrix { .. })
        ));
    }

    #[test]
    fn quantile_interpolates() {
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
        assert_eq!(quantile(&[4.0, 1.0], 1.0), 4.0);
    }
}

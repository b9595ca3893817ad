//! Bagged CART ensemble with per-bootstrap balanced class weights.

use super::balanced_weights;
use crate::config::ForestConfig;
use crate::error::DataQualityError;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Weighted share of the positive class
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Training rows reaching a node: (row index, sample weight).
type Members = Vec<(usize, f64)>;

struct Split {
    feature: usize,
    threshold: f64,
    /// Number of sorted members going left
    cut: usize,
    impurity: f64,
}

impl DecisionTree {
    fn grow(
        x: &Array2<f64>,
        y: &[bool],
        members: Members,
        config: &ForestConfig,
        max_features: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0usize, members, 0usize)];
        while let Some((slot, members, depth)) = stack.pop() {
            let total: f64 = members.iter().map(|m| m.1).sum();
            let positive: f64 = members.iter().filter(|m| y[m.0]).map(|m| m.1).sum();
            let value = if total > 0.0 { positive / total } else { 0.0 };

            let pure = positive <= 0.0 || positive >= total;
            let too_small = members.len() < 2 * config.min_samples_leaf;
            let too_deep = config.max_depth.is_some_and(|d| depth >= d);
            let split = if pure || too_small || too_deep {
                None
            } else {
                best_split(x, y, &members, config.min_samples_leaf, max_features, rng)
            };
            let Some(split) = split else {
                nodes[slot] = Node::Leaf { value };
                continue;
            };

            let mut sorted = members;
            sorted.sort_by(|a, b| x[[a.0, split.feature]].total_cmp(&x[[b.0, split.feature]]));
            let right_members = sorted.split_off(split.cut);
            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[slot] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            stack.push((right, right_members, depth + 1));
            stack.push((left, sorted, depth + 1));
        }
        Self { nodes }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => node = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match &nodes[i] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

fn gini(positive: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let p = positive / total;
    2.0 * p * (1.0 - p)
}

/// Lowest weighted-Gini split. Features are visited in random order; the
/// search stops after `max_features` once any valid split has been seen.
fn best_split(
    x: &Array2<f64>,
    y: &[bool],
    members: &[(usize, f64)],
    min_leaf: usize,
    max_features: usize,
    rng: &mut StdRng,
) -> Option<Split> {
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut best: Option<Split> = None;
    let mut sorted: Vec<(f64, bool, f64)> = Vec::with_capacity(members.len());
    for (visited, &feature) in features.iter().enumerate() {
        if visited >= max_features && best.is_some() {
            break;
        }
        sorted.clear();
        sorted.extend(members.iter().map(|&(i, w)| (x[[i, feature]], y[i], w)));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total: f64 = sorted.iter().map(|s| s.2).sum();
        let positive: f64 = sorted.iter().filter(|s| s.1).map(|s| s.2).sum();
        let (mut lw, mut lp) = (0.0, 0.0);
        for cut in 1..sorted.len() {
            let (v, label, w) = sorted[cut - 1];
            lw += w;
            if label {
                lp += w;
            }
            if cut < min_leaf || sorted.len() - cut < min_leaf || v >= sorted[cut].0 {
                continue;
            }
            let (rw, rp) = (total - lw, positive - lp);
            let impurity = lw * gini(lp, lw) + rw * gini(rp, rw);
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mid = v + (sorted[cut].0 - v) / 2.0;
                let threshold = if mid < sorted[cut].0 { mid } else { v };
                best = Some(Split {
                    feature,
                    threshold,
                    cut,
                    impurity,
                });
            }
        }
    }
    best
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(x: &Array2<f64>, y: &[bool], config: &ForestConfig, seed: u64) -> Result<Self, DataQualityError> {
        // only validates that both classes exist
        balanced_weights(y)?;

        let n = x.nrows();
        let max_features = ((x.ncols() as f64).sqrt() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(config.n_estimators);
        for _ in 0..config.n_estimators {
            let draws: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let boot_y: Vec<bool> = draws.iter().map(|&i| y[i]).collect();
            let members: Members = match balanced_weights(&boot_y) {
                Ok(b) => draws.into_iter().zip(b.weights).collect(),
                // a one-class bootstrap still yields a (constant) tree
                Err(_) => draws.into_iter().map(|i| (i, 1.0)).collect(),
            };
            trees.push(DecisionTree::grow(x, y, members, config, max_features, &mut rng));
        }
        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        let n_trees = self.trees.len().max(1) as f64;
        x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes() -> (Array2<f64>, Vec<bool>) {
        let x = Array2::from_shape_fn((80, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 13) % 7) as f64,
            _ => 1.0,
        });
        let y = (0..80).map(|i| i >= 60).collect();
        (x, y)
    }

    #[test]
    fn learns_a_threshold() {
        let (x, y) = stripes();
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default(), 42).unwrap();
        let p = forest.predict_proba(&x);
        assert!(p[5] < 0.5);
        assert!(p[75] > 0.5);
    }

    #[test]
    fn leaves_respect_min_samples() {
        let (x, y) = stripes();
        let config = ForestConfig {
            n_estimators: 1,
            min_samples_leaf: 40,
            max_depth: None,
        };
        let forest = RandomForest::fit(&x, &y, &config, 3).unwrap();
        assert!(forest.trees[0].depth() <= 1);
    }

    #[test]
    fn deterministic_for_seed() {
        let (x, y) = stripes();
        let a = RandomForest::fit(&x, &y, &ForestConfig::default(), 9).unwrap().predict_proba(&x);
        let b = RandomForest::fit(&x, &y, &ForestConfig::default(), 9).unwrap().predict_proba(&x);
        assert_eq!(a, b);
    }

    #[test]
    fn gini_bounds() {
        assert_eq!(gini(0.0, 4.0), 0.0);
        assert_eq!(gini(2.0, 4.0), 0.5);
    }
}

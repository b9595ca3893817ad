//! Standard-scaled, class-balanced L2 logistic regression fitted by Newton steps.

use super::{balanced_weights, ClassBalance};
use crate::config::LinearConfig;
use crate::error::DataQualityError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column mean / population std; zero-variance columns pass through unscaled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

/// log(1 + e^t) without overflow.
fn softplus(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    scaler: StandardScaler,
    intercept: f64,
    coef: Array1<f64>,
    iterations: usize,
}

impl LogisticRegression {
    pub fn fit(x: &Array2<f64>, y: &[bool], config: &LinearConfig) -> Result<Self, DataQualityError> {
        let ClassBalance { weights, .. } = balanced_weights(y)?;
        let scaler = StandardScaler::fit(x);
        let z = design(&scaler.transform(x));
        let target: Array1<f64> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        let sw = Array1::from(weights);
        let alpha = 1.0 / config.c;

        let p = z.ncols();
        let mut beta = Array1::<f64>::zeros(p);
        let mut loss = objective(&z, &target, &sw, &beta, alpha);
        let mut iterations = 0;
        while iterations < config.max_iter {
            iterations += 1;
            let prob = (z.dot(&beta)).mapv(sigmoid);
            let mut grad = z.t().dot(&(&sw * &(&prob - &target)));
            let curvature = &sw * &prob.mapv(|q| q * (1.0 - q));
            let mut hess = z.t().dot(&(&z * &curvature.view().insert_axis(Axis(1))));
            for j in 1..p {
                grad[j] += alpha * beta[j];
                hess[[j, j]] += alpha;
            }
            // keeps the intercept row solvable when the fit saturates
            hess[[0, 0]] += 1e-12;

            let Some(step) = solve(hess, grad) else {
                break;
            };
            let mut t = 1.0;
            let mut accepted = false;
            for _ in 0..30 {
                let candidate = &beta - &(&step * t);
                let candidate_loss = objective(&z, &target, &sw, &candidate, alpha);
                if candidate_loss <= loss {
                    beta = candidate;
                    loss = candidate_loss;
                    accepted = true;
                    break;
                }
                t *= 0.5;
            }
            let size = step.iter().fold(0.0f64, |m, s| m.max((s * t).abs()));
            if !accepted || size < config.tol {
                break;
            }
        }

        Ok(Self {
            scaler,
            intercept: beta[0],
            coef: beta.slice(ndarray::s![1..]).to_owned(),
            iterations,
        })
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        let scaled = self.scaler.transform(x);
        scaled
            .dot(&self.coef)
            .iter()
            .map(|t| sigmoid(t + self.intercept))
            .collect()
    }

    pub fn coefficients(&self) -> (f64, &Array1<f64>) {
        (self.intercept, &self.coef)
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn n_features(&self) -> usize {
        self.coef.len()
    }
}

/// Prepend an intercept column of ones.
fn design(x: &Array2<f64>) -> Array2<f64> {
    let mut z = Array2::ones((x.nrows(), x.ncols() + 1));
    z.slice_mut(ndarray::s![.., 1..]).assign(x);
    z
}

fn objective(z: &Array2<f64>, y: &Array1<f64>, sw: &Array1<f64>, beta: &Array1<f64>, alpha: f64) -> f64 {
    let margin = z.dot(beta);
    let data: f64 = margin
        .iter()
        .zip(y.iter())
        .zip(sw.iter())
        .map(|((m, t), w)| w * (softplus(*m) - t * m))
        .sum();
    let penalty: f64 = beta.iter().skip(1).map(|b| b * b).sum::<f64>() * alpha * 0.5;
    data + penalty
}

/// Gaussian elimination with partial pivoting; `None` for a singular system.
pub(crate) fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-14 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut out = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * out[k]).sum();
        out[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solves_small_system() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_system_is_none() {
        assert!(solve(array![[1.0, 2.0], [2.0, 4.0]], array![1.0, 2.0]).is_none());
    }

    #[test]
    fn scaler_handles_constant_column() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let s = StandardScaler::fit(&x);
        let t = s.transform(&x);
        assert_eq!(t[[0, 0]], -1.0);
        assert_eq!(t[[1, 1]], 0.0);
    }

    #[test]
    fn separates_threshold_data() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let model = LogisticRegression::fit(&x, &y, &LinearConfig::default()).unwrap();
        let p = model.predict_proba(&x);
        assert!(p[0] < 0.1);
        assert!(p[39] > 0.9);
        assert!(p.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn single_class_is_rejected() {
        let x = Array2::zeros((5, 2));
        let err = LogisticRegression::fit(&x, &[true; 5], &LinearConfig::default()).unwrap_err();
        assert_eq!(err, DataQualityError::SingleClassTraining { class: true });
    }
}

//! Unsupervised activity anomaly flags.

mod scorer;

pub use scorer::{AnomalyLabel, AnomalyScorer};

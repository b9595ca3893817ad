//! Per-entity rolling feature engineering over daily records.

mod frame;
mod pipeline;
mod rolling;

pub use frame::{EntitySpan, FeatureFrame};
pub use pipeline::WindowedFeatureEngine;
pub use rolling::{trailing_stats, WindowStat};

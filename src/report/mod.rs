//! Report fusion and export.
//!
//! - [`fusion`] pairs fatigue risk with activity rows (key join or verified
//!   positional fallback, synthetic dates for undated entities)
//! - [`writer`] renders the daily CSV and JSON side files

pub mod fusion;
pub mod writer;

pub use fusion::{synthetic_offset, ActivitySignal, FusedReport, FusionMode, ReportFusion, UnifiedRow, SYNTHETIC_EPOCH};
pub use writer::{write_json, write_report, write_report_file, LABEL_FATIGUED, LABEL_NORMAL};

//! Error taxonomy shared by every pipeline stage.
//!
//! [`ConfigError`] aborts a run before any computation. [`DataQualityError`]
//! and [`AlignmentError`] are recoverable: stages hand them back inside their
//! result types so the orchestrator can keep going and annotate the report.

use serde::Serialize;
use thiserror::Error;

/// Invalid parameters or a table that lacks a required column.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("required column `{0}` is missing")]
    MissingColumn(String),
    #[error("feature column list for {stage} is empty")]
    EmptyColumns { stage: &'static str },
    #[error("feature matrix for {stage} has no rows")]
    EmptyMatrix { stage: &'static str },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// The data cannot support a stage; the caller decides whether to abort.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityError {
    #[error("no data: {reason}")]
    NoData { reason: String },
    #[error("degenerate split: {reason}")]
    DegenerateSplit { reason: String },
    #[error("training rows contain a single class ({class})")]
    SingleClassTraining { class: bool },
}

/// Positional fusion found sides that cannot be paired row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentError {
    #[error("row count mismatch: {left} risk rows vs {right} activity rows")]
    LengthMismatch { left: usize, right: usize },
    #[error("entity mismatch at row {position}: `{left}` vs `{right}`")]
    EntityMismatch {
        position: usize,
        left: String,
        right: String,
    },
    #[error("date mismatch at row {position}: {left} vs {right}")]
    TimestampMismatch {
        position: usize,
        left: String,
        right: String,
    },
}

/// Top-level failure for the binary and the file-backed collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact `{handle}`: {reason}")]
    Artifact { handle: String, reason: String },
}

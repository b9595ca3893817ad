//! Subscriber setup for pipeline runs and the one-line run summary.

use crate::config::LogConfig;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Final summary of a run, written once after export.
#[derive(Debug, Serialize)]
pub struct RunEvent<'a> {
    pub ts: String,
    pub level: &'a str,
    pub message: &'a str,
    pub rows: usize,
    pub removed_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_stages: Vec<String>,
}

/// Stage logs go through `tracing`; the run summary is written directly.
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn from_config(config: &LogConfig) {
        Self::init(config.json, &config.level);
    }

    /// `RUST_LOG` wins over `default_level` (the config's `log.level`).
    /// `json` selects ndjson lines instead of the human-readable format.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stdout);
            tracing_subscriber::registry().with(filter).with(fmt).init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                .init();
        }
    }

    /// Serialize `event` as one line on `w`; write errors are ignored.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(w, "{}", line);
        }
    }
}

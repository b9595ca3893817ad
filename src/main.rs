//! Wellness risk entrypoint: loads the daily CSV, runs every stage once and
//! writes the model artifacts and daily report to the export directory.

use wellness_risk::{
    config::PipelineConfig,
    dataset::load_csv,
    export::export_run,
    logging::{RunEvent, StructuredLogger},
    pipeline::{Pipeline, StageOutcome},
};
use std::path::PathBuf;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("WELLNESS_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = PipelineConfig::load(&config_path);

    StructuredLogger::from_config(&config.log);

    info!(data = ?config.data_path, export = ?config.export.dir, "wellness pipeline starting");

    let pipeline = Pipeline::new(config.clone())?;
    let (records, summary) = load_csv(&config.data_path)?;
    info!(
        rows = summary.rows_read,
        skipped = summary.rows_skipped,
        bad_dates = summary.bad_dates,
        "records loaded"
    );

    let run = pipeline.run(&records)?;
    let index = export_run(&run, &config.export)?;

    let selection = run.training.selection();
    let failed_stages: Vec<String> = run
        .stages
        .iter()
        .filter(|s| matches!(s.outcome, StageOutcome::Failed { .. }))
        .map(|s| s.stage.to_string())
        .collect();
    StructuredLogger::emit_json(
        &RunEvent {
            ts: chrono::Utc::now().to_rfc3339(),
            level: if failed_stages.is_empty() { "info" } else { "warn" },
            message: "run complete",
            rows: run.report.len(),
            removed_rows: run.removed_rows,
            model: selection.map(|s| s.kind().name()),
            auc: selection.and_then(|s| s.metrics().roc_auc),
            anomalies: run
                .anomaly_model
                .as_ref()
                .map(|_| run.anomalies.iter().filter(|a| a.is_anomaly).count()),
            failed_stages,
        },
        &mut std::io::stdout(),
    );
    info!(report = %index.report.display(), "wellness pipeline finished");
    Ok(())
}

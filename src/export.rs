//! Writes a run to the export directory and reads the fatigue model back.
//!
//! Layout under `ExportConfig::dir`:
//! - `<model_name>.json` selected fatigue model (artifact store blob)
//! - `<model_name>_features.json` feature manifest `{"features": [...]}`
//! - `<model_name>_metrics.json` held-out metrics of the selected model
//! - `anomaly_model.json` isolation forest (artifact store blob)
//! - `<report_file>` daily report CSV
//! - `export.json` handles of the above plus stage statuses

use crate::config::ExportConfig;
use crate::error::PipelineError;
use crate::model::{ArtifactHandle, ArtifactStore, FatigueModel, FeatureManifest, FsArtifactStore};
use crate::pipeline::{PipelineRun, StageStatus};
use crate::report::{write_json, write_report_file};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const ANOMALY_MODEL_NAME: &str = "anomaly_model";
pub const EXPORT_INDEX: &str = "export.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportIndex {
    pub fatigue_model: Option<ArtifactHandle>,
    pub features: Option<PathBuf>,
    pub metrics: Option<PathBuf>,
    pub anomaly_model: Option<ArtifactHandle>,
    pub report: PathBuf,
    #[serde(default, skip_deserializing)]
    pub stages: Vec<StageStatus>,
}

fn features_file(model_name: &str) -> String {
    format!("{model_name}_features.json")
}

fn metrics_file(model_name: &str) -> String {
    format!("{model_name}_metrics.json")
}

pub fn export_run(run: &PipelineRun, config: &ExportConfig) -> Result<ExportIndex, PipelineError> {
    let store = FsArtifactStore::open(&config.dir)?;

    let (fatigue_model, features, metrics) = match run.training.selection() {
        Some(selection) => {
            let handle = store.save(&config.model_name, &selection.model)?;
            let features = config.dir.join(features_file(&config.model_name));
            write_json(&selection.manifest(), &features)?;
            let metrics = config.dir.join(metrics_file(&config.model_name));
            write_json(&selection.metrics().to_export(), &metrics)?;
            (Some(handle), Some(features), Some(metrics))
        }
        None => (None, None, None),
    };

    let anomaly_model = run
        .anomaly_model
        .as_ref()
        .map(|m| store.save(ANOMALY_MODEL_NAME, m))
        .transpose()?;

    let report = config.dir.join(&config.report_file);
    write_report_file(&run.report, &report)?;

    let index = ExportIndex {
        fatigue_model,
        features,
        metrics,
        anomaly_model,
        report,
        stages: run.stages.clone(),
    };
    write_json(&index, &config.dir.join(EXPORT_INDEX))?;
    info!(dir = %config.dir.display(), "export complete");
    Ok(index)
}

/// Load the exported fatigue model and its manifest, rejecting a manifest
/// whose feature count differs from the model's input width.
pub fn load_fatigue_model(dir: &Path) -> Result<(FatigueModel, FeatureManifest), PipelineError> {
    let index: ExportIndex = serde_json::from_str(&std::fs::read_to_string(dir.join(EXPORT_INDEX))?)?;
    let (Some(handle), Some(features)) = (index.fatigue_model, index.features) else {
        return Err(PipelineError::Artifact {
            handle: EXPORT_INDEX.to_string(),
            reason: "export holds no fatigue model".to_string(),
        });
    };
    let store = FsArtifactStore::open(dir)?;
    let model: FatigueModel = store.load(&handle)?;
    let manifest: FeatureManifest = serde_json::from_str(&std::fs::read_to_string(features)?)?;
    if manifest.features.len() != model.n_features() {
        return Err(PipelineError::Artifact {
            handle: handle.to_string(),
            reason: format!(
                "manifest lists {} features, model expects {}",
                manifest.features.len(),
                model.n_features()
            ),
        });
    }
    Ok((model, manifest))
}

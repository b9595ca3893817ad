//! Daily report CSV and the small JSON side files written next to it.

use super::fusion::UnifiedRow;
use crate::error::PipelineError;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub const LABEL_NORMAL: &str = "Normal";
pub const LABEL_FATIGUED: &str = "Fatigued";

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One CSV line. Fatigue cells stay empty when scoring was unavailable.
#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    entity_id: &'a str,
    timestamp: String,
    fatigue_label: Option<&'static str>,
    fatigue_probability: Option<f64>,
    activity_anomaly: u8,
    activity_index: f64,
}

impl<'a> From<&'a UnifiedRow> for ReportLine<'a> {
    fn from(row: &'a UnifiedRow) -> Self {
        ReportLine {
            entity_id: row.entity_id.as_str(),
            timestamp: row.timestamp.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            fatigue_label: row
                .fatigue_flag
                .map(|f| if f { LABEL_FATIGUED } else { LABEL_NORMAL }),
            fatigue_probability: row.fatigue_probability.map(round2),
            activity_anomaly: u8::from(row.activity_anomaly),
            activity_index: round2(row.activity_index),
        }
    }
}

/// Write the unified rows as CSV with a header line.
pub fn write_report<W: Write>(rows: &[UnifiedRow], sink: W) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(sink);
    if rows.is_empty() {
        writer.write_record([
            "entity_id",
            "timestamp",
            "fatigue_label",
            "fatigue_probability",
            "activity_anomaly",
            "activity_index",
        ])?;
    }
    for row in rows {
        writer.serialize(ReportLine::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report_file(rows: &[UnifiedRow], path: &Path) -> Result<(), PipelineError> {
    let file = std::fs::File::create(path)?;
    write_report(rows, std::io::BufWriter::new(file))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "report written");
    Ok(())
}

/// Pretty-printed JSON, used for the metrics and feature manifest files.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PipelineError> {
    let data = serde_json::to_string_pretty(value)?;
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::EntityId;
    use chrono::NaiveDate;

    fn row(flag: Option<bool>, p: Option<f64>) -> UnifiedRow {
        UnifiedRow {
            entity_id: EntityId::from("7"),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 9),
            fatigue_flag: flag,
            fatigue_probability: p,
            activity_anomaly: true,
            activity_index: 0.87654,
        }
    }

    #[test]
    fn labels_and_rounding() {
        let mut out = Vec::new();
        write_report(&[row(Some(true), Some(0.73456)), row(Some(false), Some(0.1))], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "entity_id,timestamp,fatigue_label,fatigue_probability,activity_anomaly,activity_index"
        );
        assert_eq!(lines[1], "7,2024-03-09,Fatigued,0.73,1,0.88");
        assert_eq!(lines[2], "7,2024-03-09,Normal,0.1,1,0.88");
    }

    #[test]
    fn missing_fatigue_leaves_cells_empty() {
        let mut out = Vec::new();
        write_report(&[row(None, None)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("7,2024-03-09,,,1,0.88"));
    }

    #[test]
    fn empty_report_keeps_header() {
        let mut out = Vec::new();
        write_report(&[], &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("entity_id,timestamp,"));
    }

    #[test]
    fn json_side_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let mut m = std::collections::BTreeMap::new();
        m.insert("auc", 0.9);
        write_json(&m, &path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["auc"], 0.9);
    }
}

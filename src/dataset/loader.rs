//! CSV ingestion: header aliases → canonical columns, coerced dates, typed rows.

use super::{EntityId, Record, Sex};
use crate::error::{ConfigError, PipelineError};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const ENTITY: &[&str] = &["entity_id", "user_id", "participant_id"];
const TIMESTAMP: &[&str] = &["timestamp", "date"];
const STEPS: &[&str] = &["steps", "daily_steps", "steps_total"];
const SLEEP: &[&str] = &["sleep_hours", "hours_sleep", "sleep_hours_total"];
const CALORIES: &[&str] = &["calories", "calories_burned", "calories_total"];
const AGE: &[&str] = &["age"];
const SEX: &[&str] = &["sex", "gender"];
const HEIGHT: &[&str] = &["height", "height_cm"];
const WEIGHT: &[&str] = &["weight", "weight_kg"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: usize,
    /// Rows dropped for an empty or non-numeric measurement
    pub rows_skipped: usize,
    /// Rows whose date was present but unparseable
    pub bad_dates: usize,
    pub has_timestamp_column: bool,
}

struct Columns {
    entity: usize,
    timestamp: Option<usize>,
    steps: usize,
    sleep: usize,
    calories: usize,
    age: usize,
    sex: usize,
    height: usize,
    weight: usize,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, ConfigError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        let require = |aliases: &[&'static str]| {
            find(aliases).ok_or_else(|| ConfigError::MissingColumn(aliases[0].to_string()))
        };
        Ok(Self {
            entity: require(ENTITY)?,
            timestamp: find(TIMESTAMP),
            steps: require(STEPS)?,
            sleep: require(SLEEP)?,
            calories: require(CALORIES)?,
            age: require(AGE)?,
            sex: require(SEX)?,
            height: require(HEIGHT)?,
            weight: require(WEIGHT)?,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn parse_num(row: &StringRecord, idx: usize) -> Option<f64> {
    row.get(idx)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_row(row: &StringRecord, cols: &Columns) -> Option<Record> {
    let entity = row.get(cols.entity)?.trim();
    if entity.is_empty() {
        return None;
    }
    Some(Record {
        entity_id: EntityId::new(entity),
        timestamp: cols.timestamp.and_then(|i| row.get(i)).and_then(parse_date),
        steps: parse_num(row, cols.steps)?,
        sleep_hours: parse_num(row, cols.sleep)?,
        calories: parse_num(row, cols.calories)?,
        age: parse_num(row, cols.age)?,
        sex: row.get(cols.sex).map(Sex::parse).unwrap_or_default(),
        height: parse_num(row, cols.height)?,
        weight: parse_num(row, cols.weight)?,
    })
}

/// Read records from any CSV source. Missing required columns are a
/// configuration error; malformed rows are skipped and counted.
pub fn read_records<R: Read>(source: R) -> Result<(Vec<Record>, LoadSummary), PipelineError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(source);
    let cols = Columns::resolve(rdr.headers()?)?;

    let mut summary = LoadSummary {
        has_timestamp_column: cols.timestamp.is_some(),
        ..LoadSummary::default()
    };
    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        summary.rows_read += 1;
        match parse_row(&row, &cols) {
            Some(rec) => {
                let raw_date = cols.timestamp.and_then(|i| row.get(i)).map(str::trim).unwrap_or("");
                if rec.timestamp.is_none() && !raw_date.is_empty() {
                    summary.bad_dates += 1;
                }
                records.push(rec);
            }
            None => summary.rows_skipped += 1,
        }
    }

    if !summary.has_timestamp_column {
        warn!("no timestamp column; report dates will be synthetic");
    }
    if summary.bad_dates > 0 {
        warn!(bad_dates = summary.bad_dates, "unparseable dates treated as missing");
    }
    Ok((records, summary))
}

pub fn load_csv(path: &Path) -> Result<(Vec<Record>, LoadSummary), PipelineError> {
    let file = std::fs::File::open(path)?;
    let (records, summary) = read_records(file)?;
    info!(
        path = %path.display(),
        rows = records.len(),
        skipped = summary.rows_skipped,
        "dataset loaded"
    );
    Ok((records, summary))
}

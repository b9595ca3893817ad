//! Daily wellness records and their raw fields.
//! The CSV loader normalizes source headers into these types.

mod loader;

pub use loader::{load_csv, read_records, LoadSummary};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of one tracked user. Integer ids order numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_integer(), other.as_integer()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::new(s)
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        EntityId(n.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// `M…` is male, `F…` female, anything else unknown.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('M') => Sex::Male,
            Some('F') => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    /// Model encoding: male 1, everything else 0.
    pub fn as_numeric(self) -> f64 {
        match self {
            Sex::Male => 1.0,
            Sex::Female | Sex::Unknown => 0.0,
        }
    }
}

/// One (entity, day) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_id: EntityId,
    pub timestamp: Option<NaiveDate>,
    pub steps: f64,
    pub sleep_hours: f64,
    pub calories: f64,
    pub age: f64,
    pub sex: Sex,
    pub height: f64,
    pub weight: f64,
}

/// Raw numeric fields addressable by column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Steps,
    SleepHours,
    Calories,
    Age,
    Sex,
    Height,
    Weight,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Steps,
        Field::SleepHours,
        Field::Calories,
        Field::Age,
        Field::Sex,
        Field::Height,
        Field::Weight,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Field::Steps => "steps",
            Field::SleepHours => "sleep_hours",
            Field::Calories => "calories",
            Field::Age => "age",
            Field::Sex => "sex",
            Field::Height => "height",
            Field::Weight => "weight",
        }
    }

    /// Stem used in derived column names (`z_sleep`, `d_steps`).
    pub fn short(self) -> &'static str {
        match self {
            Field::SleepHours => "sleep",
            other => other.column(),
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Field::ALL.into_iter().find(|f| f.column() == name)
    }

    pub fn value(self, r: &Record) -> f64 {
        match self {
            Field::Steps => r.steps,
            Field::SleepHours => r.sleep_hours,
            Field::Calories => r.calories,
            Field::Age => r.age,
            Field::Sex => r.sex.as_numeric(),
            Field::Height => r.height,
            Field::Weight => r.weight,
        }
    }

    pub fn z_column(self) -> String {
        format!("z_{}", self.short())
    }

    pub fn d_column(self) -> String {
        format!("d_{}", self.short())
    }
}

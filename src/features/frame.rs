//! Engineered feature table: records plus `z_`/`d_` columns, grouped into
//! contiguous per-entity spans.

use crate::dataset::{EntityId, Field, Record};
use crate::error::ConfigError;
use chrono::NaiveDate;
use ndarray::Array2;

/// Contiguous rows of one entity inside a [`FeatureFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub entity: EntityId,
    pub start: usize,
    pub len: usize,
}

impl EntitySpan {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Derived columns for one tracked field, aligned with the frame rows.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DerivedColumns {
    pub field: Field,
    pub z: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    rows: Vec<Record>,
    spans: Vec<EntitySpan>,
    derived: Vec<DerivedColumns>,
    labels: Vec<(String, Vec<bool>)>,
}

/// Compute spans for rows already sorted by entity.
pub(crate) fn entity_spans(rows: &[Record]) -> Vec<EntitySpan> {
    let mut spans: Vec<EntitySpan> = Vec::new();
    for (i, r) in rows.iter().enumerate() {
        match spans.last_mut() {
            Some(s) if s.entity == r.entity_id => s.len += 1,
            _ => spans.push(EntitySpan {
                entity: r.entity_id.clone(),
                start: i,
                len: 1,
            }),
        }
    }
    spans
}

impl FeatureFrame {
    pub(crate) fn from_parts(rows: Vec<Record>, derived: Vec<DerivedColumns>) -> Self {
        let spans = entity_spans(&rows);
        Self {
            rows,
            spans,
            derived,
            labels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn spans(&self) -> &[EntitySpan] {
        &self.spans
    }

    pub fn entity(&self, row: usize) -> &EntityId {
        &self.rows[row].entity_id
    }

    pub fn timestamp(&self, row: usize) -> Option<NaiveDate> {
        self.rows[row].timestamp
    }

    pub fn tracked(&self) -> impl Iterator<Item = Field> + '_ {
        self.derived.iter().map(|d| d.field)
    }

    /// Every column name this frame can resolve, raw columns first.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Field::ALL.iter().map(|f| f.column().to_string()).collect();
        for d in &self.derived {
            names.push(d.field.z_column());
            names.push(d.field.d_column());
        }
        names
    }

    /// Value of a named numeric column at `row`. Unknown names are a
    /// configuration error; undefined or non-finite cells are `None`.
    pub fn value(&self, name: &str, row: usize) -> Result<Option<f64>, ConfigError> {
        let column = self.resolve(name)?;
        Ok(column.get(self, row))
    }

    /// Whole numeric column; see [`FeatureFrame::value`].
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>, ConfigError> {
        let column = self.resolve(name)?;
        Ok((0..self.len()).map(|i| column.get(self, i)).collect())
    }

    /// Dense `rows × columns` matrix; undefined cells become 0.0.
    pub fn matrix(&self, columns: &[String], stage: &'static str) -> Result<Array2<f64>, ConfigError> {
        if columns.is_empty() {
            return Err(ConfigError::EmptyColumns { stage });
        }
        let resolved = columns
            .iter()
            .map(|c| self.resolve(c))
            .collect::<Result<Vec<_>, _>>()?;
        if self.is_empty() {
            return Err(ConfigError::EmptyMatrix { stage });
        }
        Ok(Array2::from_shape_fn((self.len(), resolved.len()), |(i, j)| {
            resolved[j].get(self, i).unwrap_or(0.0)
        }))
    }

    /// Attach a boolean label column; an existing column of the same name is replaced.
    pub fn with_label(mut self, name: impl Into<String>, values: Vec<bool>) -> Result<Self, ConfigError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(ConfigError::invalid(
                "label",
                format!("`{name}` has {} values for {} rows", values.len(), self.len()),
            ));
        }
        self.labels.retain(|(n, _)| *n != name);
        self.labels.push((name, values));
        Ok(self)
    }

    pub fn label(&self, name: &str) -> Result<&[bool], ConfigError> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| ConfigError::MissingColumn(name.to_string()))
    }

    /// New frame holding `keep` rows (in the given order) and their cells.
    pub fn select(&self, keep: &[usize]) -> Self {
        let rows = keep.iter().map(|&i| self.rows[i].clone()).collect();
        let derived = self
            .derived
            .iter()
            .map(|d| DerivedColumns {
                field: d.field,
                z: keep.iter().map(|&i| d.z[i]).collect(),
                d: keep.iter().map(|&i| d.d[i]).collect(),
            })
            .collect();
        let mut out = Self::from_parts(rows, derived);
        out.labels = self
            .labels
            .iter()
            .map(|(n, v)| (n.clone(), keep.iter().map(|&i| v[i]).collect()))
            .collect();
        out
    }

    /// Explicit cleaning step: drop every row with an undefined tracked
    /// feature or a non-finite raw value. Returns the new frame and the
    /// number of rows removed.
    pub fn drop_incomplete(&self) -> (Self, usize) {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| {
                let raw_ok = Field::ALL.iter().all(|f| f.value(&self.rows[i]).is_finite());
                raw_ok && self.derived.iter().all(|d| d.z[i].is_some() && d.d[i].is_some())
            })
            .collect();
        let removed = self.len() - keep.len();
        (self.select(&keep), removed)
    }

    fn resolve(&self, name: &str) -> Result<ColumnRef<'_>, ConfigError> {
        if let Some(f) = Field::from_column(name) {
            return Ok(ColumnRef::Raw(f));
        }
        for d in &self.derived {
            if name == d.field.z_column() {
                return Ok(ColumnRef::Derived(&d.z));
            }
            if name == d.field.d_column() {
                return Ok(ColumnRef::Derived(&d.d));
            }
        }
        Err(ConfigError::MissingColumn(name.to_string()))
    }
}

enum ColumnRef<'a> {
    Raw(Field),
    Derived(&'a [Option<f64>]),
}

impl ColumnRef<'_> {
    fn get(&self, frame: &FeatureFrame, row: usize) -> Option<f64> {
        match self {
            ColumnRef::Raw(f) => Some(f.value(&frame.rows[row])).filter(|v| v.is_finite()),
            ColumnRef::Derived(values) => values[row],
        }
    }
}

//! In-memory tabular data shared by every source adapter and the engine.
//!
//! A [`Table`] owns an ordered column list and rows of [`Value`]s. Every row
//! holds exactly one value per column, so "all rows share the same column
//! set" holds by construction. Transformations (projection, sorting,
//! filtering) return a new table; nothing here mutates a table in place
//! except [`Table::push_row`] while it is being built.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ordered_float::OrderedFloat;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Rank used to order values of different kinds. Nulls sort last.
    fn kind_rank(&self) -> u8 {
        match self {
            Self::Int(_) | Self::Float(_) => 0,
            Self::Bool(_) => 1,
            Self::Date(_) | Self::Timestamp(_) => 2,
            Self::Text(_) => 3,
            Self::Null => 4,
        }
    }

    /// Total order used for tie-break sorting.
    ///
    /// Ints and floats compare numerically with each other, dates compare with
    /// timestamps at midnight, and NaN sorts after every other number.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                OrderedFloat(self.as_f64().unwrap_or(f64::NAN))
                    .cmp(&OrderedFloat(other.as_f64().unwrap_or(f64::NAN)))
            }
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Date(_) | Self::Timestamp(_), Self::Date(_) | Self::Timestamp(_)) => {
                self.as_timestamp().cmp(&other.as_timestamp())
            }
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(d) => Some(NaiveDateTime::new(*d, NaiveTime::MIN)),
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Display form with text wrapped in quotes, for key tuples in diagnostics.
    pub fn quoted(&self) -> String {
        match self {
            Self::Text(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" so 35 and 35.0 stay distinguishable
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("row {row} has {found} value(s), expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("record {record} does not have the same columns as the first record")]
    InconsistentColumns { record: usize },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column sequences differ: [{left}] vs [{right}]")]
    ColumnMismatch { left: String, right: String },
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given column sequence.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(TableError::DuplicateColumn(c.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from a list of row mappings.
    ///
    /// Column order comes from the first record; every other record must carry
    /// exactly the same keys (in any order).
    pub fn from_records<K: Into<String>>(
        records: impl IntoIterator<Item = Vec<(K, Value)>>,
    ) -> Result<Self, TableError> {
        let mut records = records.into_iter();
        let Some(first) = records.next() else {
            return Ok(Self::default());
        };

        let (columns, first_row): (Vec<String>, Vec<Value>) =
            first.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        let mut table = Self::new(columns)?;
        table.push_row(first_row)?;

        for (i, record) in records.enumerate() {
            let record_idx = i + 1;
            if record.len() != table.width() {
                return Err(TableError::InconsistentColumns { record: record_idx });
            }
            let mut slots: Vec<Option<Value>> = vec![None; table.width()];
            for (key, value) in record {
                let key = key.into();
                let idx = table
                    .column_index(&key)
                    .ok_or(TableError::InconsistentColumns { record: record_idx })?;
                if slots[idx].replace(value).is_some() {
                    return Err(TableError::InconsistentColumns { record: record_idx });
                }
            }
            // Length matched and no key repeated, so every slot is filled
            let row = slots.into_iter().map(|v| v.unwrap_or(Value::Null)).collect();
            table.rows.push(row);
        }

        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[Value]> {
        self.rows.get(idx).map(|r| r.as_slice())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns), as shown in shape diagnostics.
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.width())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    fn indices_of(&self, columns: &[String]) -> Result<Vec<usize>, TableError> {
        columns
            .iter()
            .map(|c| self.column_index(c).ok_or_else(|| TableError::UnknownColumn(c.clone())))
            .collect()
    }

    /// Re-project onto `columns`, in that order.
    pub fn project(&self, columns: &[String]) -> Result<Table, TableError> {
        let indices = self.indices_of(columns)?;
        let mut out = Table::new(columns.iter().cloned())?;
        out.rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(out)
    }

    /// Stable sort by the given key columns, using [`Value::sort_cmp`].
    pub fn sorted_by(&self, keys: &[String]) -> Result<Table, TableError> {
        let indices = self.indices_of(keys)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].sort_cmp(&b[i]))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Keep rows whose `column` value, in display form, is one of `values`.
    pub fn filter_in(&self, column: &str, values: &[String]) -> Result<Table, TableError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))?;
        let rows = self
            .rows
            .iter()
            .filter(|r| {
                let shown = r[idx].to_string();
                values.iter().any(|v| *v == shown)
            })
            .cloned()
            .collect();
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Append the rows of `other`, which must have the same column sequence.
    pub fn concat(mut self, other: Table) -> Result<Table, TableError> {
        if self.columns != other.columns {
            return Err(TableError::ColumnMismatch {
                left: self.columns.join(", "),
                right: other.columns.join(", "),
            });
        }
        self.rows.extend(other.rows);
        Ok(self)
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<Value>] {
        &mut self.rows
    }
}

//! Best-effort type coercion applied before cell comparison.
//!
//! Coercion is lenient: a cell that cannot be converted keeps its original
//! value. Every such cell is recorded as a [`CoercionMiss`] and logged, so a
//! mismatch hidden behind a failed conversion is visible in the output.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::ReconError;
use crate::model::Side;
use crate::table::{Table, Value};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A cell left unchanged because it could not be coerced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionMiss {
    pub side: Side,
    /// Row index in the table as loaded, before sorting.
    pub row: usize,
    pub column: String,
    pub value: Value,
    pub target_type: CoercionTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionTarget {
    Float,
    Timestamp,
}

/// Convert to `Float`. `None` when the value has no numeric reading.
pub fn coerce_numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Float(f) => Some(Value::Float(*f)),
        Value::Int(i) => Some(Value::Float(*i as f64)),
        Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Text(s) => s.trim().parse::<f64>().ok().map(Value::Float),
        Value::Date(_) | Value::Timestamp(_) => None,
    }
}

/// Convert to `Timestamp`; plain dates become midnight.
pub fn coerce_temporal(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Timestamp(ts) => Some(Value::Timestamp(*ts)),
        Value::Date(d) => Some(Value::Timestamp(NaiveDateTime::new(*d, NaiveTime::MIN))),
        Value::Text(s) => parse_temporal(s.trim()).map(Value::Timestamp),
        _ => None,
    }
}

fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| NaiveDateTime::new(d, NaiveTime::MIN))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        })
}

pub(crate) struct Normalized {
    pub table: Table,
    pub misses: Vec<CoercionMiss>,
}

/// Coerce the designated columns of `table`, returning a new table.
pub(crate) fn coerce_columns(
    table: &Table,
    side: Side,
    numeric: &[String],
    temporal: &[String],
) -> Result<Normalized, ReconError> {
    let mut plan: Vec<(usize, &str, CoercionTarget)> = Vec::new();
    for (columns, target_type) in [(numeric, CoercionTarget::Float), (temporal, CoercionTarget::Timestamp)] {
        for column in columns {
            let idx = table.column_index(column).ok_or_else(|| ReconError::MissingColumn {
                side,
                column: column.clone(),
            })?;
            plan.push((idx, column.as_str(), target_type));
        }
    }

    let mut out = table.clone();
    let mut misses = Vec::new();

    for (row_idx, row) in out.rows_mut().iter_mut().enumerate() {
        for &(col_idx, column, target_type) in &plan {
            let cell = &mut row[col_idx];
            let coerced = match target_type {
                CoercionTarget::Float => coerce_numeric(cell),
                CoercionTarget::Timestamp => coerce_temporal(cell),
            };
            match coerced {
                Some(v) => *cell = v,
                None => misses.push(CoercionMiss {
                    side,
                    row: row_idx,
                    column: column.to_string(),
                    value: cell.clone(),
                    target_type,
                }),
            }
        }
    }

    for miss in &misses {
        tracing::warn!(
            side = %miss.side,
            row = miss.row,
            column = %miss.column,
            value = %miss.value,
            "value left uncoerced"
        );
    }

    Ok(Normalized { table: out, misses })
}

//! Position-based cell comparison of two normalized tables.
//!
//! The two sides share no row identifier, so both are sorted by an explicit
//! tie-break key and compared row by row at the same sorted position.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{CheckStatus, Side};
use crate::normalize::{coerce_columns, CoercionMiss};
use crate::table::{Table, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellEqualityOptions {
    /// Tie-break key, applied in order. Must be non-empty.
    pub sort_keys: Vec<String>,
    /// Columns coerced to floats on both sides.
    pub numeric_columns: Vec<String>,
    /// Columns coerced to timestamps on both sides.
    pub date_columns: Vec<String>,
}

impl CellEqualityOptions {
    pub fn new<S: Into<String>>(sort_keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            sort_keys: sort_keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn numeric<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.numeric_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn dates<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.date_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that do not depend on table contents.
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.sort_keys.is_empty() {
            return Err(ReconError::invalid("tie-break key list is empty"));
        }
        let mut seen = HashSet::new();
        for key in &self.sort_keys {
            if !seen.insert(key.as_str()) {
                return Err(ReconError::invalid(format!("tie-break key '{key}' listed twice")));
            }
        }
        let numeric: HashSet<&str> = self.numeric_columns.iter().map(String::as_str).collect();
        if let Some(both) = self.date_columns.iter().find(|c| numeric.contains(c.as_str())) {
            return Err(ReconError::invalid(format!(
                "column '{both}' is designated both numeric and date"
            )));
        }
        Ok(())
    }

    fn designated(&self) -> impl Iterator<Item = &String> {
        self.sort_keys
            .iter()
            .chain(&self.numeric_columns)
            .chain(&self.date_columns)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellDiff {
    /// Position after sorting.
    pub row: usize,
    pub column: String,
    pub source: Value,
    pub target: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShapeMismatch {
    pub source: (usize, usize),
    pub target: (usize, usize),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CellEqualityOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_mismatch: Option<ShapeMismatch>,
    pub diffs: Vec<CellDiff>,
    pub coercion_misses: Vec<CoercionMiss>,
}

impl CellEqualityOutcome {
    pub fn is_match(&self) -> bool {
        self.shape_mismatch.is_none() && self.diffs.is_empty()
    }

    /// Failure detail, `None` when the tables matched. Uncoerced cells are
    /// counted at the end since they usually explain the mismatch.
    pub fn detail(&self) -> Option<String> {
        let mismatch = self.mismatch_detail()?;
        Some(match self.coercion_note() {
            Some(note) => format!("{mismatch}; {note}"),
            None => mismatch,
        })
    }

    pub fn coercion_note(&self) -> Option<String> {
        match self.coercion_misses.len() {
            0 => None,
            n => Some(format!("coercion: {n} cell(s) left uncoerced")),
        }
    }

    fn mismatch_detail(&self) -> Option<String> {
        if let Some(shape) = &self.shape_mismatch {
            return Some(format!(
                "shape mismatch: source={:?}, target={:?}",
                shape.source, shape.target
            ));
        }
        if self.diffs.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .diffs
            .iter()
            .map(|d| {
                format!(
                    "row {}, column '{}': source={} | target={}",
                    d.row, d.column, d.source, d.target
                )
            })
            .collect();
        Some(parts.join("; "))
    }

    pub fn status(&self) -> CheckStatus {
        match self.detail() {
            None => CheckStatus::Pass,
            Some(detail) => CheckStatus::Fail(detail),
        }
    }
}

/// Cell equality after normalization. NaN equals NaN here: both sides
/// holding a missing float is not a discrepancy.
fn cells_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

/// Compare `target` against `source` cell by cell.
///
/// The target must contain every source column; callers are expected to
/// have run the column-presence checks first.
pub fn cell_equality(
    source: &Table,
    target: &Table,
    options: &CellEqualityOptions,
) -> Result<CellEqualityOutcome, ReconError> {
    options.validate()?;
    if let Some(column) = options.designated().find(|c| !source.has_column(c)) {
        return Err(ReconError::MissingColumn {
            side: Side::Source,
            column: column.clone(),
        });
    }

    let target = target
        .project(source.columns())
        .map_err(|e| ReconError::on_side(e, Side::Target))?;

    let src = coerce_columns(source, Side::Source, &options.numeric_columns, &options.date_columns)?;
    let tgt = coerce_columns(&target, Side::Target, &options.numeric_columns, &options.date_columns)?;

    let mut coercion_misses = src.misses;
    coercion_misses.extend(tgt.misses);

    let src = src.table.sorted_by(&options.sort_keys)?;
    let tgt = tgt.table.sorted_by(&options.sort_keys)?;

    if src.shape() != tgt.shape() {
        return Ok(CellEqualityOutcome {
            shape_mismatch: Some(ShapeMismatch {
                source: src.shape(),
                target: tgt.shape(),
            }),
            diffs: Vec::new(),
            coercion_misses,
        });
    }

    let mut diffs = Vec::new();
    for (row_idx, (s_row, t_row)) in src.rows().iter().zip(tgt.rows()).enumerate() {
        for (col_idx, column) in src.columns().iter().enumerate() {
            let (s, t) = (&s_row[col_idx], &t_row[col_idx]);
            if !cells_equal(s, t) {
                diffs.push(CellDiff {
                    row: row_idx,
                    column: column.clone(),
                    source: s.clone(),
                    target: t.clone(),
                });
            }
        }
    }

    if !diffs.is_empty() {
        tracing::debug!(diffs = diffs.len(), "cell differences found");
    }

    Ok(CellEqualityOutcome {
        shape_mismatch: None,
        diffs,
        coercion_misses,
    })
}

//! Duplicate-row detection over a key tuple.
//!
//! Keys compare exactly: no normalization runs first, so `Int(1)` and
//! `Float(1.0)` are different keys. NaN keys are equal to each other.

use std::collections::{HashMap, HashSet};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{CheckKind, CheckResult};
use crate::table::{Table, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Stop at the first repeated key.
    FirstOnly,
    /// Report every repeated key with all of its rows.
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateKey {
    pub key: Vec<Value>,
    /// Row indices carrying this key, ascending.
    pub rows: Vec<usize>,
}

impl DuplicateKey {
    fn render_key(&self) -> String {
        let parts: Vec<String> = self.key.iter().map(Value::quoted).collect();
        format!("({})", parts.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateOutcome {
    pub policy: DuplicatePolicy,
    pub duplicates: Vec<DuplicateKey>,
}

impl DuplicateOutcome {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty()
    }

    pub fn detail(&self) -> Option<String> {
        match (self.policy, self.duplicates.as_slice()) {
            (_, []) => None,
            (DuplicatePolicy::FirstOnly, [first, ..]) => Some(format!(
                "duplicate key {} at rows {} and {}",
                first.render_key(),
                first.rows[0],
                first.rows[first.rows.len() - 1]
            )),
            (DuplicatePolicy::All, all) => {
                let parts: Vec<String> = all
                    .iter()
                    .map(|d| {
                        let rows: Vec<String> = d.rows.iter().map(usize::to_string).collect();
                        format!("{} at rows {}", d.render_key(), rows.join(", "))
                    })
                    .collect();
                let noun = if all.len() == 1 { "key" } else { "keys" };
                Some(format!("{} duplicated {noun}: {}", all.len(), parts.join("; ")))
            }
        }
    }
}

/// Hashable mirror of [`Value`] with exact equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyAtom {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Date(chrono::NaiveDate),
    Timestamp(chrono::NaiveDateTime),
    Text(String),
}

impl From<&Value> for KeyAtom {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(OrderedFloat(*f)),
            Value::Date(d) => Self::Date(*d),
            Value::Timestamp(ts) => Self::Timestamp(*ts),
            Value::Text(s) => Self::Text(s.clone()),
        }
    }
}

/// Empty and repeated key lists are rejected whatever the table holds.
fn validate_key_list(columns: &[String]) -> Result<(), ReconError> {
    if columns.is_empty() {
        return Err(ReconError::invalid("duplicate key column list is empty"));
    }
    let mut seen = HashSet::new();
    match columns.iter().find(|c| !seen.insert(c.as_str())) {
        Some(c) => Err(ReconError::invalid(format!("key column '{c}' listed twice"))),
        None => Ok(()),
    }
}

fn key_indices(table: &Table, key_columns: Option<&[String]>) -> Result<Vec<usize>, ReconError> {
    let Some(columns) = key_columns else {
        return Ok((0..table.width()).collect());
    };
    validate_key_list(columns)?;
    columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| ReconError::invalid(format!("key column '{c}' not in table")))
        })
        .collect()
}

/// Find rows sharing a key. `None` keys on the full row.
pub fn find_duplicates(
    table: &Table,
    key_columns: Option<&[String]>,
    policy: DuplicatePolicy,
) -> Result<DuplicateOutcome, ReconError> {
    let indices = key_indices(table, key_columns)?;

    // key -> position in `groups`
    let mut seen: HashMap<Vec<KeyAtom>, usize> = HashMap::new();
    let mut groups: Vec<DuplicateKey> = Vec::new();

    for (row_idx, row) in table.rows().iter().enumerate() {
        let atoms: Vec<KeyAtom> = indices.iter().map(|&i| KeyAtom::from(&row[i])).collect();
        match seen.get(&atoms) {
            Some(&g) => {
                groups[g].rows.push(row_idx);
                if policy == DuplicatePolicy::FirstOnly {
                    return Ok(DuplicateOutcome {
                        policy,
                        duplicates: vec![groups.swap_remove(g)],
                    });
                }
            }
            None => {
                seen.insert(atoms, groups.len());
                groups.push(DuplicateKey {
                    key: indices.iter().map(|&i| row[i].clone()).collect(),
                    rows: vec![row_idx],
                });
            }
        }
    }

    groups.retain(|g| g.rows.len() > 1);
    Ok(DuplicateOutcome {
        policy,
        duplicates: groups,
    })
}

/// The `no_duplicates` check for one table.
pub fn check_duplicates(
    dataset: &str,
    table: &Table,
    key_columns: Option<&[String]>,
    policy: DuplicatePolicy,
) -> Result<(CheckResult, DuplicateOutcome), ReconError> {
    let outcome = find_duplicates(table, key_columns, policy)?;
    let result = match outcome.detail() {
        None => CheckResult::pass(dataset, CheckKind::NoDuplicates),
        Some(detail) => {
            tracing::debug!(dataset, keys = outcome.duplicates.len(), "duplicate keys found");
            CheckResult::fail(dataset, CheckKind::NoDuplicates, detail)
        }
    };
    Ok((result, outcome))
}

/// [`check_duplicates`] for one side of a dataset run. A key column missing
/// from the loaded table fails the check rather than the run.
pub fn check_side_duplicates(
    dataset: &str,
    table: &Table,
    key_columns: Option<&[String]>,
    policy: DuplicatePolicy,
) -> Result<CheckResult, ReconError> {
    if let Some(columns) = key_columns {
        validate_key_list(columns)?;
        if let Some(missing) = columns.iter().find(|c| !table.has_column(c)) {
            tracing::warn!(dataset, column = %missing, "duplicate key column missing");
            return Ok(CheckResult::fail(
                dataset,
                CheckKind::NoDuplicates,
                format!("not attempted: key column '{missing}' missing"),
            ));
        }
    }
    check_duplicates(dataset, table, key_columns, policy).map(|(result, _)| result)
}

use std::collections::HashSet;

use crate::compare::{cell_equality, CellEqualityOptions};
use crate::error::ReconError;
use crate::model::{CheckKind, CheckResult, CheckStatus, Side};
use crate::table::Table;

/// Recorded for cell equality when the column checks did not both pass.
pub const NOT_ATTEMPTED: &str = "not attempted: column sets differ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// `None` skips the cell-level comparison entirely.
    pub cell_equality: Option<CellEqualityOptions>,
}

impl ReconcileOptions {
    pub fn with_cell_equality(options: CellEqualityOptions) -> Self {
        Self {
            cell_equality: Some(options),
        }
    }
}

/// Label under which the per-side emptiness check is reported.
pub fn side_label(name: &str, side: Side) -> String {
    format!("{name}-{side}")
}

/// Run every check for one dataset. Results come back in fixed order:
/// `not_empty` (source, target), both column checks, `row_count`, then
/// `cell_equality` when enabled.
///
/// Check failures are data. `Err` means the options themselves are unusable.
pub fn reconcile(
    name: &str,
    source: &Table,
    target: &Table,
    options: &ReconcileOptions,
) -> Result<Vec<CheckResult>, ReconError> {
    if let Some(ce) = &options.cell_equality {
        ce.validate()?;
    }

    let mut results = vec![
        check_not_empty(&side_label(name, Side::Source), source),
        check_not_empty(&side_label(name, Side::Target), target),
        check_columns_present_in_target(name, source, target),
        check_columns_present_in_source(name, source, target),
        check_row_count(name, source, target),
    ];

    if let Some(ce) = &options.cell_equality {
        let columns_agree = results[2].is_pass() && results[3].is_pass();
        let status = if columns_agree {
            let outcome = cell_equality(source, target, ce)?;
            if let (true, Some(note)) = (outcome.is_match(), outcome.coercion_note()) {
                tracing::warn!(dataset = name, "cell equality passed; {note}");
            }
            outcome.status()
        } else {
            CheckStatus::fail(NOT_ATTEMPTED)
        };
        results.push(CheckResult::new(name, CheckKind::CellEquality, status));
    }

    let failed = results.iter().filter(|r| !r.is_pass()).count();
    tracing::info!(dataset = name, checks = results.len(), failed, "reconciled");
    Ok(results)
}

/// The result list `reconcile` would have produced, with every entry failed
/// for the same reason. Used when a side could not be loaded.
pub fn retrieval_failed(name: &str, options: &ReconcileOptions, detail: &str) -> Vec<CheckResult> {
    let mut results = vec![
        CheckResult::fail(side_label(name, Side::Source), CheckKind::NotEmpty, detail),
        CheckResult::fail(side_label(name, Side::Target), CheckKind::NotEmpty, detail),
        CheckResult::fail(name, CheckKind::ColumnsPresentInTarget, detail),
        CheckResult::fail(name, CheckKind::ColumnsPresentInSource, detail),
        CheckResult::fail(name, CheckKind::RowCount, detail),
    ];
    if options.cell_equality.is_some() {
        results.push(CheckResult::fail(name, CheckKind::CellEquality, detail));
    }
    results
}

pub fn check_not_empty(dataset: &str, table: &Table) -> CheckResult {
    if table.is_empty() {
        CheckResult::fail(dataset, CheckKind::NotEmpty, "dataset is empty")
    } else {
        CheckResult::pass(dataset, CheckKind::NotEmpty)
    }
}

/// Every source column must exist in the target.
pub fn check_columns_present_in_target(dataset: &str, source: &Table, target: &Table) -> CheckResult {
    let missing = difference(source.columns(), target.columns());
    if missing.is_empty() {
        CheckResult::pass(dataset, CheckKind::ColumnsPresentInTarget)
    } else {
        CheckResult::fail(dataset, CheckKind::ColumnsPresentInTarget, format_column_set(&missing))
    }
}

/// The target must not carry columns the source lacks.
pub fn check_columns_present_in_source(dataset: &str, source: &Table, target: &Table) -> CheckResult {
    let extra = difference(target.columns(), source.columns());
    if extra.is_empty() {
        CheckResult::pass(dataset, CheckKind::ColumnsPresentInSource)
    } else {
        CheckResult::fail(dataset, CheckKind::ColumnsPresentInSource, format_column_set(&extra))
    }
}

pub fn check_row_count(dataset: &str, source: &Table, target: &Table) -> CheckResult {
    if source.len() == target.len() {
        CheckResult::pass(dataset, CheckKind::RowCount)
    } else {
        CheckResult::fail(
            dataset,
            CheckKind::RowCount,
            format!("source={}, target={}", source.len(), target.len()),
        )
    }
}

/// `{"a", "b"}`
pub fn format_column_set<S: AsRef<str>>(columns: &[S]) -> String {
    let inner: Vec<String> = columns.iter().map(|c| format!("{:?}", c.as_ref())).collect();
    format!("{{{}}}", inner.join(", "))
}

/// Columns of `left` absent from `right`, in `left` order.
fn difference<'a>(left: &'a [String], right: &[String]) -> Vec<&'a str> {
    let right: HashSet<&str> = right.iter().map(String::as_str).collect();
    left.iter()
        .map(String::as_str)
        .filter(|c| !right.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn people() -> Table {
        Table::from_rows(
            ["id", "name", "value"],
            vec![
                vec![Value::Int(1), "Alice".into(), Value::Int(10)],
                vec![Value::Int(2), "Bob".into(), Value::Int(20)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn column_set_rendering() {
        assert_eq!(format_column_set(&["value"]), r#"{"value"}"#);
        assert_eq!(format_column_set(&["a", "b"]), r#"{"a", "b"}"#);
    }

    #[test]
    fn column_checks_are_order_insensitive() {
        let reordered = people()
            .project(&["value".into(), "id".into(), "name".into()])
            .unwrap();
        assert!(check_columns_present_in_target("d", &people(), &reordered).is_pass());
        assert!(check_columns_present_in_source("d", &people(), &reordered).is_pass());
    }

    #[test]
    fn extra_target_columns_listed_in_target_order() {
        let wide = Table::from_rows(
            ["z", "id", "name", "value", "a"],
            Vec::<Vec<Value>>::new(),
        )
        .unwrap();
        let r = check_columns_present_in_source("d", &people(), &wide);
        assert_eq!(r.status.detail(), Some(r#"{"z", "a"}"#));
    }

    #[test]
    fn not_attempted_when_columns_differ() {
        let narrow = people().project(&["id".into(), "name".into()]).unwrap();
        let opts = ReconcileOptions::with_cell_equality(CellEqualityOptions::new(["id"]));
        let results = reconcile("people", &people(), &narrow, &opts).unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(results[5].check, CheckKind::CellEquality);
        assert_eq!(results[5].status.detail(), Some(NOT_ATTEMPTED));
    }

    #[test]
    fn uncoerced_cells_are_counted_in_cell_equality_detail() {
        let text = |v: &str| -> Table {
            Table::from_rows(
                ["id", "value"],
                vec![vec![Value::Int(1), v.into()], vec![Value::Int(2), "20".into()]],
            )
            .unwrap()
        };
        let opts = ReconcileOptions::with_cell_equality(
            CellEqualityOptions::new(["id"]).numeric(["value"]),
        );

        let results = reconcile("people", &text("ten"), &text("10"), &opts).unwrap();
        let detail = results[5].status.detail().unwrap();
        assert!(detail.starts_with("row 0, column 'value'"), "{detail}");
        assert!(detail.ends_with("; coercion: 1 cell(s) left uncoerced"), "{detail}");

        // The same unreadable cell on both sides still matches.
        let results = reconcile("people", &text("n/a"), &text("n/a"), &opts).unwrap();
        assert!(results[5].is_pass());
    }

    #[test]
    fn retrieval_failure_mirrors_result_shape() {
        let opts = ReconcileOptions::with_cell_equality(CellEqualityOptions::new(["id"]));
        let failed = retrieval_failed("people", &opts, "source unavailable: refused");
        let ok = reconcile("people", &people(), &people(), &opts).unwrap();

        assert_eq!(failed.len(), ok.len());
        for (f, o) in failed.iter().zip(&ok) {
            assert_eq!(f.dataset, o.dataset);
            assert_eq!(f.check, o.check);
            assert_eq!(f.status.detail(), Some("source unavailable: refused"));
        }

        assert_eq!(retrieval_failed("people", &ReconcileOptions::default(), "x").len(), 5);
    }

    #[test]
    fn bad_options_are_errors_even_when_columns_differ() {
        let narrow = people().project(&["id".into()]).unwrap();
        let opts = ReconcileOptions::with_cell_equality(CellEqualityOptions::default());
        assert!(matches!(
            reconcile("people", &people(), &narrow, &opts),
            Err(ReconError::InvalidInput(_))
        ));
    }
}

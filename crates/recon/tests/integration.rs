use crosscheck_recon::{
    check_duplicates, reconcile, CellEqualityOptions, CheckKind, CheckResult, DuplicatePolicy,
    ReconcileOptions, Report, Table, Value,
};

fn alice_bob() -> Table {
    Table::from_rows(
        ["id", "name", "value"],
        vec![
            vec![Value::Int(1), "Alice".into(), Value::Int(100)],
            vec![Value::Int(2), "Bob".into(), Value::Int(200)],
        ],
    )
    .unwrap()
}

fn full_options(keys: &[&str]) -> ReconcileOptions {
    ReconcileOptions::with_cell_equality(CellEqualityOptions::new(keys.iter().copied()))
}

fn by_check(results: &[CheckResult], kind: CheckKind) -> Vec<&CheckResult> {
    results.iter().filter(|r| r.check == kind).collect()
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn identical_tables_pass_everything() {
    let results = reconcile("people", &alice_bob(), &alice_bob(), &full_options(&["id"])).unwrap();

    assert_eq!(results.len(), 6);
    assert!(results.iter().all(CheckResult::is_pass), "{results:?}");

    let labels: Vec<&str> = results.iter().map(|r| r.dataset.as_str()).collect();
    assert_eq!(
        labels,
        ["people-source", "people-target", "people", "people", "people", "people"]
    );
    let kinds: Vec<&str> = results.iter().map(|r| r.check.as_str()).collect();
    assert_eq!(
        kinds,
        [
            "not_empty",
            "not_empty",
            "columns_present_in_target",
            "columns_present_in_source",
            "row_count",
            "cell_equality"
        ]
    );
}

#[test]
fn target_missing_value_column() {
    let target = alice_bob().project(&["id".into(), "name".into()]).unwrap();
    let results = reconcile("people", &alice_bob(), &target, &full_options(&["id"])).unwrap();

    let present = by_check(&results, CheckKind::ColumnsPresentInTarget);
    assert_eq!(present[0].status.detail(), Some(r#"{"value"}"#));
    assert!(by_check(&results, CheckKind::ColumnsPresentInSource)[0].is_pass());

    let cells = by_check(&results, CheckKind::CellEquality);
    assert_eq!(cells[0].status.detail(), Some("not attempted: column sets differ"));
}

#[test]
fn row_count_mismatch_reports_both_counts() {
    let source = alice_bob()
        .concat(
            Table::from_rows(
                ["id", "name", "value"],
                vec![vec![Value::Int(3), "Carol".into(), Value::Int(300)]],
            )
            .unwrap(),
        )
        .unwrap();
    let results = reconcile("people", &source, &alice_bob(), &ReconcileOptions::default()).unwrap();

    assert_eq!(results.len(), 5);
    let rc = by_check(&results, CheckKind::RowCount);
    assert_eq!(rc[0].status.detail(), Some("source=3, target=2"));

    // symmetric
    let results = reconcile("people", &alice_bob(), &source, &ReconcileOptions::default()).unwrap();
    let rc = by_check(&results, CheckKind::RowCount);
    assert_eq!(rc[0].status.detail(), Some("source=2, target=3"));
}

#[test]
fn chart_text_matches_file_float_with_numeric_coercion() {
    let chart = Table::from_rows(
        ["Facility Type", "Average Time Spent"],
        vec![
            vec!["Hospital".into(), "35".into()],
            vec!["Clinic".into(), " 12.5 ".into()],
        ],
    )
    .unwrap();
    let file = Table::from_rows(
        ["Facility Type", "Average Time Spent"],
        vec![
            vec!["Clinic".into(), Value::Float(12.5)],
            vec!["Hospital".into(), Value::Float(35.0)],
        ],
    )
    .unwrap();

    let opts = ReconcileOptions::with_cell_equality(
        CellEqualityOptions::new(["Facility Type"]).numeric(["Average Time Spent"]),
    );
    let results = reconcile("avg_time", &chart, &file, &opts).unwrap();
    assert!(results.iter().all(CheckResult::is_pass), "{results:?}");
}

#[test]
fn empty_target_fails_only_its_own_not_empty() {
    let empty = Table::new(["id", "name", "value"]).unwrap();
    let results = reconcile("people", &alice_bob(), &empty, &ReconcileOptions::default()).unwrap();

    let not_empty = by_check(&results, CheckKind::NotEmpty);
    assert!(not_empty[0].is_pass());
    assert_eq!(not_empty[1].dataset, "people-target");
    assert_eq!(not_empty[1].status.detail(), Some("dataset is empty"));
}

#[test]
fn report_accumulates_datasets_and_duplicates() {
    let mut report = Report::new();
    report.extend(reconcile("a", &alice_bob(), &alice_bob(), &ReconcileOptions::default()).unwrap());

    let dup = alice_bob()
        .concat(
            Table::from_rows(
                ["id", "name", "value"],
                vec![vec![Value::Int(1), "Alice".into(), Value::Int(999)]],
            )
            .unwrap(),
        )
        .unwrap();
    let keys = vec!["id".to_string(), "name".to_string()];
    let (result, outcome) = check_duplicates("a-target", &dup, Some(&keys[..]), DuplicatePolicy::All).unwrap();
    assert_eq!(outcome.duplicates[0].rows, vec![0, 2]);
    report.push(result);

    let summary = report.summary();
    assert_eq!(summary.total, 6);
    assert_eq!(summary.failed, 1);
    assert_eq!(report.failures().next().unwrap().check, CheckKind::NoDuplicates);
}

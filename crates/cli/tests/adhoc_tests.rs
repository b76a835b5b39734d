// `xcheck compare`, `xcheck dupes` and `xcheck scrape` argument handling.
//
// Run with: cargo test -p crosscheck-cli --test adhoc_tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn xcheck(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xcheck"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("XCHECK_CHROME")
        .args(args)
        .output()
        .expect("failed to spawn xcheck")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn fixtures() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    fs::write(p.join("source.csv"), "name,value\nAlice,35\nBob,12.5\n").unwrap();
    fs::write(p.join("target.csv"), "name,value\nBob,12.50\nAlice,35.0\n").unwrap();
    fs::write(p.join("narrow.csv"), "name\nAlice\nBob\n").unwrap();
    fs::write(p.join("dupes.csv"), "id,code\n1,a\n2,b\n1,a\n3,c\n").unwrap();
    dir
}

#[test]
fn compare_with_numeric_coercion_passes() {
    let dir = fixtures();
    let out = xcheck(
        dir.path(),
        &["compare", "source.csv", "target.csv", "--sort-key", "name", "--numeric", "value", "--json"],
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let json: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(json["summary"]["total"], 6);
    assert_eq!(json["summary"]["failed"], 0);
    assert!(dir.path().join("dq_report.csv").exists());
}

#[test]
fn compare_without_coercion_reports_cell_diffs() {
    let dir = fixtures();
    let out = xcheck(
        dir.path(),
        &["compare", "source.csv", "target.csv", "--sort-key", "name", "--fail-on-check-failure"],
    );
    assert_eq!(out.status.code(), Some(3));
    let text = stdout(&out);
    assert!(text.contains("cell_equality"), "{text}");
    assert!(text.contains("source=35 | target=35.0"), "{text}");
}

#[test]
fn compare_missing_column_skips_cell_equality() {
    let dir = fixtures();
    let out = xcheck(
        dir.path(),
        &["compare", "source.csv", "narrow.csv", "--sort-key", "name", "--report", "r/out.csv"],
    );
    assert_eq!(out.status.code(), Some(0));

    let report = fs::read_to_string(dir.path().join("r/out.csv")).unwrap();
    assert!(report.starts_with("dataset,check,result\n"));
    assert!(report.contains("adhoc,columns_present_in_target,\"FAIL: {\"\"value\"\"}\""), "{report}");
    assert!(report.contains("adhoc,cell_equality,FAIL: not attempted: column sets differ"), "{report}");
}

#[test]
fn compare_rejects_numeric_without_sort_key() {
    let dir = fixtures();
    let out = xcheck(dir.path(), &["compare", "source.csv", "target.csv", "--numeric", "value"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("hint:"));
}

#[test]
fn compare_missing_file_is_unavailable() {
    let dir = fixtures();
    let out = xcheck(dir.path(), &["compare", "source.csv", "gone.csv"]);
    assert_eq!(out.status.code(), Some(20));
}

#[test]
fn compare_unknown_extension_is_malformed() {
    let dir = fixtures();
    fs::write(dir.path().join("data.json"), "{}").unwrap();
    let out = xcheck(dir.path(), &["compare", "source.csv", "data.json"]);
    assert_eq!(out.status.code(), Some(21));
}

#[test]
fn dupes_exit_codes() {
    let dir = fixtures();

    let out = xcheck(dir.path(), &["dupes", "dupes.csv"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stdout(&out).contains("at rows 0, 2"), "{}", stdout(&out));

    let out = xcheck(dir.path(), &["dupes", "dupes.csv", "--key", "id", "--first-only"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stdout(&out).contains("duplicate key (\"1\") at rows 0 and 2"), "{}", stdout(&out));

    let out = xcheck(dir.path(), &["dupes", "source.csv"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "PASS");

    let out = xcheck(dir.path(), &["dupes", "dupes.csv", "--key", "missing"]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn scrape_requires_headers_and_layout() {
    let dir = fixtures();
    let out = xcheck(
        dir.path(),
        &["scrape", "report.html", "--layout", "sideways", "-o", "t.csv"],
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("sideways"));

    let out = xcheck(
        dir.path(),
        &["scrape", "report.html", "--layout", "pie_slices", "-o", "t.csv"],
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("needs --header"));
}

#[test]
fn scrape_missing_report_is_unavailable() {
    let dir = fixtures();
    let out = xcheck(
        dir.path(),
        &[
            "scrape",
            "missing.html",
            "--chrome",
            "/definitely/not/chrome",
            "--layout",
            "values_before_header",
            "--header",
            "a",
            "-o",
            "t.csv",
        ],
    );
    assert_eq!(out.status.code(), Some(20));
    assert!(!dir.path().join("t.csv").exists());
}

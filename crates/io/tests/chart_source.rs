// End-to-end chart loading against a scripted browser.
// Run with: cargo test -p crosscheck-io --test chart_source

use std::time::Duration;

use crosscheck_io::{ChartBrowser, ChartLayout, ChartSource, ChromeConfig, ReportHandle, RowFilter, Source, SourceError};
use crosscheck_recon::Value;
use serde_json::{json, Value as Json};
use url::Url;

const REPORT: &str = "http://ci.example.com/report.html";

/// Answers each script with the first canned value whose key it contains.
#[derive(Default)]
struct ScriptedBrowser {
    answers: Vec<(&'static str, Json)>,
    visited: Vec<String>,
    scripts: Vec<String>,
    closes: usize,
}

impl ScriptedBrowser {
    fn answer(mut self, key: &'static str, value: Json) -> Self {
        self.answers.push((key, value));
        self
    }
}

impl ChartBrowser for ScriptedBrowser {
    fn navigate(&mut self, url: &Url) -> Result<(), SourceError> {
        self.visited.push(url.to_string());
        Ok(())
    }

    fn evaluate(&mut self, script: &str) -> Result<Json, SourceError> {
        self.scripts.push(script.to_string());
        self.answers
            .iter()
            .find(|(key, _)| script.contains(key))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| SourceError::malformed(format!("script failed: no answer for {script}")))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.closes += 1;
        Ok(())
    }
}

fn headers() -> Vec<String> {
    ["Facility Type", "Visit Date", "Average Time Spent"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn source(layout: ChartLayout) -> ChartSource {
    let mut src = ChartSource::new(ChromeConfig::default(), layout, headers());
    src.ready_timeout = Duration::from_millis(200);
    src.poll_interval = Duration::from_millis(20);
    src
}

fn report_url() -> Url {
    Url::parse(REPORT).unwrap()
}

#[test]
fn values_before_header_table_is_extracted_and_filtered() {
    let mut browser = ScriptedBrowser::default()
        .answer("'g.table text').length", json!(13))
        .answer("textContent", json!([
            "Hospital", "Clinic", "Lab", "Facility Type",
            "2024-01-05", "2024-01-06", "2024-01-05", "Visit Date",
            "35", "12.5", "8", "Average Time Spent"
        ]));

    let mut src = source(ChartLayout::ValuesBeforeHeader);
    src.filter = Some(RowFilter::new("Visit Date", ["2024-01-05"]));
    let table = src.load_with(&mut browser, &report_url()).unwrap();

    assert_eq!(table.columns(), headers());
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1, "Facility Type"), Some(&Value::text("Lab")));
    assert_eq!(browser.visited, [REPORT]);
    assert_eq!(browser.closes, 1);
}

#[test]
fn header_first_reads_column_count_from_the_page() {
    let mut browser = ScriptedBrowser::default()
        .answer("'g.y-column').length", json!(2))
        .answer("textContent", json!(["Name", "Alice", "", "Score", "1", "2"]));

    let table = source(ChartLayout::HeaderFirst)
        .load_with(&mut browser, &report_url())
        .unwrap();

    assert_eq!(table.columns(), ["Name", "Score"]);
    assert_eq!(table.row(1).unwrap(), [Value::Null, Value::text("2")]);
    assert_eq!(browser.closes, 1);
}

#[test]
fn never_rendered_is_unavailable_and_browser_released() {
    let mut browser = ScriptedBrowser::default().answer(".length", json!(0));

    let err = source(ChartLayout::PieSlices)
        .load_with(&mut browser, &report_url())
        .unwrap_err();

    assert!(matches!(err, SourceError::Unavailable(ref m) if m.contains("g.pielayer g.slice")), "{err}");
    assert!(browser.scripts.len() > 1, "render wait should poll more than once");
    assert_eq!(browser.closes, 1);
}

#[test]
fn malformed_pie_label_releases_browser() {
    let mut browser = ScriptedBrowser::default()
        .answer(".length", json!(2))
        .answer("data-unformatted", json!(["Hospital<br>35", null]));

    let mut src = source(ChartLayout::PieSlices);
    src.headers = vec!["Facility Type".into(), "Min Average Time Spent".into()];
    let err = src.load_with(&mut browser, &report_url()).unwrap_err();

    assert!(matches!(err, SourceError::Malformed(ref m) if m.contains("slice 1")), "{err}");
    assert_eq!(browser.closes, 1);
}

#[test]
fn script_error_is_malformed() {
    let mut browser = ScriptedBrowser::default().answer(".length", json!(5));

    let err = source(ChartLayout::ValuesBeforeHeader)
        .load_with(&mut browser, &report_url())
        .unwrap_err();

    assert!(matches!(err, SourceError::Malformed(ref m) if m.contains("no answer")), "{err}");
    assert_eq!(browser.closes, 1);
}

#[test]
fn missing_local_report_fails_before_browser_starts() {
    // An executable that cannot exist: reaching the launch step would
    // surface its path in the error instead of the report's.
    let chrome = ChromeConfig {
        executable: Some("/definitely/not/chrome".into()),
        ..ChromeConfig::default()
    };
    let src = ChartSource::new(chrome, ChartLayout::ValuesBeforeHeader, headers());

    let err = src
        .load(&ReportHandle::parse("/definitely/not/here.html"))
        .unwrap_err();

    assert!(err.is_unavailable());
    assert!(err.to_string().contains("here.html"), "{err}");
}

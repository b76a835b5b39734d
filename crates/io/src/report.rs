//! Report writers. The CSV file is the run's record; JSON is a convenience
//! rendering of the same results plus a summary.

use std::path::Path;

use crosscheck_recon::{CheckResult, Report, ReportSummary};
use serde::Serialize;

pub const CSV_HEADER: [&str; 3] = ["dataset", "check", "result"];

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot write report {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("cannot write report {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    dataset: &'a str,
    check: &'a str,
    result: String,
}

impl<'a> From<&'a CheckResult> for CsvRow<'a> {
    fn from(r: &'a CheckResult) -> Self {
        Self {
            dataset: &r.dataset,
            check: r.check.as_str(),
            result: r.status.to_string(),
        }
    }
}

/// Write `dataset,check,result`, replacing any existing file.
pub fn write_csv(report: &Report, path: &Path) -> Result<(), ReportError> {
    let csv_err = |source| ReportError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(CSV_HEADER).map_err(csv_err)?;
    for result in report.results() {
        writer.serialize(CsvRow::from(result)).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(path = %path.display(), results = report.len(), "report written");
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub summary: ReportSummary,
    pub results: &'a [CheckResult],
}

pub fn to_json(report: &Report) -> JsonReport<'_> {
    JsonReport {
        summary: report.summary(),
        results: report.results(),
    }
}

pub fn to_json_string(report: &Report) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(&to_json(report))?)
}

pub fn write_json(report: &Report, path: &Path) -> Result<(), ReportError> {
    let body = to_json_string(report)?;
    std::fs::write(path, body + "\n").map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), "json report written");
    Ok(())
}

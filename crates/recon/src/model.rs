use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// Which table of a reconciliation a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Source of truth.
    Source,
    /// Candidate being validated.
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Check results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    NotEmpty,
    ColumnsPresentInTarget,
    ColumnsPresentInSource,
    RowCount,
    CellEquality,
    NoDuplicates,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotEmpty => "not_empty",
            Self::ColumnsPresentInTarget => "columns_present_in_target",
            Self::ColumnsPresentInSource => "columns_present_in_source",
            Self::RowCount => "row_count",
            Self::CellEquality => "cell_equality",
            Self::NoDuplicates => "no_duplicates",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Fail(String),
}

impl CheckStatus {
    pub fn fail(detail: impl Into<String>) -> Self {
        Self::Fail(detail.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail(detail) => Some(detail),
        }
    }
}

/// `PASS` or `FAIL: <detail>`, the `result` column of the report file.
impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail(detail) => write!(f, "FAIL: {detail}"),
        }
    }
}

/// One check outcome for one dataset label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub dataset: String,
    pub check: CheckKind,
    pub status: CheckStatus,
}

impl CheckResult {
    pub fn new(dataset: impl Into<String>, check: CheckKind, status: CheckStatus) -> Self {
        Self {
            dataset: dataset.into(),
            check,
            status,
        }
    }

    pub fn pass(dataset: impl Into<String>, check: CheckKind) -> Self {
        Self::new(dataset, check, CheckStatus::Pass)
    }

    pub fn fail(dataset: impl Into<String>, check: CheckKind, detail: impl Into<String>) -> Self {
        Self::new(dataset, check, CheckStatus::fail(detail))
    }

    pub fn is_pass(&self) -> bool {
        self.status.is_pass()
    }
}

impl Serialize for CheckResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Flat<'a> {
            dataset: &'a str,
            check: CheckKind,
            passed: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            detail: Option<&'a str>,
        }

        Flat {
            dataset: &self.dataset,
            check: self.check,
            passed: self.status.is_pass(),
            detail: self.status.detail(),
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Ordered, append-only list of check results for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    results: Vec<CheckResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = CheckResult>) {
        self.results.extend(results);
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.is_pass())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn summary(&self) -> ReportSummary {
        let failed = self.failures().count();
        ReportSummary {
            total: self.results.len(),
            passed: self.results.len() - failed,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_renders_report_cell() {
        assert_eq!(CheckStatus::Pass.to_string(), "PASS");
        assert_eq!(
            CheckStatus::fail("source=3, target=2").to_string(),
            "FAIL: source=3, target=2"
        );
    }

    #[test]
    fn check_result_json_shape() {
        let r = CheckResult::fail("visits", CheckKind::RowCount, "source=3, target=2");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["dataset"], "visits");
        assert_eq!(json["check"], "row_count");
        assert_eq!(json["passed"], false);
        assert_eq!(json["detail"], "source=3, target=2");

        let ok = serde_json::to_value(CheckResult::pass("visits", CheckKind::NotEmpty)).unwrap();
        assert!(ok.get("detail").is_none());
    }

    #[test]
    fn summary_counts() {
        let mut report = Report::new();
        report.push(CheckResult::pass("a", CheckKind::NotEmpty));
        report.push(CheckResult::fail("a", CheckKind::RowCount, "source=1, target=0"));
        report.extend([CheckResult::pass("b", CheckKind::NotEmpty)]);

        let s = report.summary();
        assert_eq!(s.total, 3);
        assert_eq!(s.passed, 2);
        assert_eq!(s.failed, 1);
        assert!(report.has_failures());
    }
}

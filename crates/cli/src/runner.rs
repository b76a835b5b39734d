//! `xcheck run` / `xcheck validate`: config-driven reconciliation.
//!
//! Datasets run one at a time. A side that cannot be loaded fails that
//! dataset's checks and the run moves on; the report is always written.

use std::path::{Path, PathBuf};

use crosscheck_config::{
    resolve_database, DatasetConfig, DuplicateSide, RunConfig, SideConfig, SourceSpec,
};
use crosscheck_io::report::{self, ReportError};
use crosscheck_io::{
    ChartSource, CsvSource, ExcelSource, ParquetSource, ReportHandle, RowFilter, Source, SourceError,
    SqlBackend, SqlSource,
};
use crosscheck_recon::engine::side_label;
use crosscheck_recon::{
    check_side_duplicates, reconcile, retrieval_failed, CheckKind, CheckResult, Report, Side, Table,
};

use crate::exit_codes::EXIT_CHECK_FAILED;
use crate::CliError;

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = RunConfig::load(&config_path)?;
    if config.database.is_some() {
        resolve_database(&config)?;
    }
    println!(
        "{}: ok ({} dataset{})",
        config_path.display(),
        config.datasets.len(),
        if config.datasets.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

pub fn cmd_run(
    config_path: PathBuf,
    report_override: Option<PathBuf>,
    json: bool,
    fail_on_check_failure: bool,
) -> Result<(), CliError> {
    let config = RunConfig::load(&config_path)?;
    let sql = match &config.database {
        Some(_) => {
            let backend = resolve_database(&config)?;
            tracing::info!(database = %describe_backend(&backend), "database configured");
            Some(SqlSource::new(backend))
        }
        None => None,
    };

    tracing::info!(
        run = config.display_name(),
        datasets = config.datasets.len(),
        "run started"
    );

    let loader = Loader { config: &config, sql: sql.as_ref() };
    let mut report = Report::new();
    for dataset in &config.datasets {
        report.extend(run_dataset(&loader, dataset)?);
    }

    let report_path = report_override.unwrap_or_else(|| config.report_path());
    write_report(&report, &report_path)?;
    if let Some(json_path) = config.json_report_path() {
        ensure_parent(&json_path)?;
        report::write_json(&report, &json_path)?;
    }

    let summary = report.summary();
    if json {
        println!("{}", report::to_json_string(&report)?);
    } else {
        eprintln!(
            "{} checks: {} passed, {} failed; report written to {}",
            summary.total,
            summary.passed,
            summary.failed,
            report_path.display()
        );
    }
    tracing::info!(total = summary.total, failed = summary.failed, "run finished");

    if report.has_failures() && (fail_on_check_failure || config.fail_on_check_failure) {
        return Err(CliError::silent(EXIT_CHECK_FAILED));
    }
    Ok(())
}

/// Reconcile one dataset, plus its duplicate checks when configured.
fn run_dataset(loader: &Loader<'_>, dataset: &DatasetConfig) -> Result<Vec<CheckResult>, CliError> {
    let options = dataset.reconcile_options();
    let name = dataset.name.as_str();

    let loaded = loader
        .load_side(&dataset.source)
        .map_err(|e| (Side::Source, e))
        .and_then(|source| {
            loader
                .load_side(&dataset.target)
                .map(|target| (source, target))
                .map_err(|e| (Side::Target, e))
        });

    let (source, target) = match loaded {
        Ok(pair) => pair,
        Err((side, err)) => {
            tracing::warn!(dataset = name, %side, error = %err, "retrieval failed");
            let detail = format!("retrieval failed ({side}): {err}");
            let mut results = retrieval_failed(name, &options, &detail);
            if let Some(dupes) = &dataset.duplicates {
                for &side in duplicate_sides(dupes.side) {
                    results.push(CheckResult::fail(side_label(name, side), CheckKind::NoDuplicates, &detail));
                }
            }
            return Ok(results);
        }
    };

    let mut results = reconcile(name, &source, &target, &options)?;

    if let Some(dupes) = &dataset.duplicates {
        for &side in duplicate_sides(dupes.side) {
            let table = match side {
                Side::Source => &source,
                Side::Target => &target,
            };
            results.push(check_side_duplicates(
                &side_label(name, side),
                table,
                dupes.key_columns.as_deref(),
                dupes.policy,
            )?);
        }
    }

    Ok(results)
}

fn duplicate_sides(side: DuplicateSide) -> &'static [Side] {
    match side {
        DuplicateSide::Source => &[Side::Source],
        DuplicateSide::Target => &[Side::Target],
        DuplicateSide::Both => &[Side::Source, Side::Target],
    }
}

/// Turns a side's config into a loaded, filtered table.
struct Loader<'a> {
    config: &'a RunConfig,
    sql: Option<&'a SqlSource>,
}

impl Loader<'_> {
    fn load_side(&self, side: &SideConfig) -> Result<Table, SourceError> {
        let table = self.load_spec(&side.spec)?;
        match &side.filter {
            Some(filter) => filter.apply(&table),
            None => Ok(table),
        }
    }

    fn load_spec(&self, spec: &SourceSpec) -> Result<Table, SourceError> {
        tracing::debug!(kind = spec.kind(), "loading side");
        match spec {
            SourceSpec::Sql { query } => {
                let sql = self
                    .sql
                    .ok_or_else(|| SourceError::unavailable("no [database] configured"))?;
                sql.load(query.as_str())
            }
            SourceSpec::Csv { path, delimiter } => {
                let src = match delimiter {
                    Some(d) => {
                        let byte = u8::try_from(*d)
                            .map_err(|_| SourceError::malformed(format!("delimiter '{d}' is not ASCII")))?;
                        CsvSource::with_delimiter(byte)
                    }
                    None => CsvSource::new(),
                };
                src.load(&self.config.resolve_path(path))
            }
            SourceSpec::Excel { path, sheet } => ExcelSource { sheet: sheet.clone() }
                .load(&self.config.resolve_path(path)),
            SourceSpec::Parquet { path } => ParquetSource.load(&self.config.resolve_path(path)),
            SourceSpec::Chart {
                report,
                layout,
                headers,
                min_text_nodes,
                date_column,
                date_filter,
            } => {
                let browser = self.config.browser.clone().unwrap_or_default();
                let mut chart =
                    ChartSource::new(browser.chrome(&self.config.base_dir), *layout, headers.clone());
                chart.ready_timeout = browser.ready_timeout();
                chart.poll_interval = browser.poll_interval();
                if let Some(min) = min_text_nodes {
                    chart.min_text_nodes = *min;
                }
                if let (Some(column), Some(date)) = (date_column, date_filter) {
                    chart.filter = Some(RowFilter::new(column.as_str(), [date.as_str()]));
                }
                let handle = match ReportHandle::parse(report) {
                    ReportHandle::File(path) => ReportHandle::File(self.config.resolve_path(&path)),
                    url => url,
                };
                chart.load(&handle)
            }
        }
    }
}

/// Backend description for logs, never including the password.
fn describe_backend(backend: &SqlBackend) -> String {
    match backend {
        SqlBackend::Postgres(p) => format!("postgres://{}@{}:{}/{}", p.user, p.host, p.port, p.database),
        SqlBackend::Sqlite(path) => format!("sqlite:{}", path.display()),
    }
}

pub(crate) fn write_report(report: &Report, path: &Path) -> Result<(), CliError> {
    ensure_parent(path)?;
    report::write_csv(report, path)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), CliError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir).map_err(|source| {
            CliError::from(ReportError::Io {
                path: path.display().to_string(),
                source,
            })
        }),
        _ => Ok(()),
    }
}

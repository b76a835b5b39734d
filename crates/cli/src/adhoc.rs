//! Single-shot commands that need no config file.

use std::path::PathBuf;
use std::time::Duration;

use crosscheck_io::csv::write_table;
use crosscheck_io::report::{self, ReportError};
use crosscheck_io::{load_file, ChartLayout, ChartSource, ChromeConfig, ReportHandle, Source};
use crosscheck_recon::{check_duplicates, reconcile, CellEqualityOptions, DuplicatePolicy, ReconcileOptions, Report};

use crate::exit_codes::EXIT_CHECK_FAILED;
use crate::runner::write_report;
use crate::CliError;

pub struct CompareArgs {
    pub source: PathBuf,
    pub target: PathBuf,
    pub sort_keys: Vec<String>,
    pub numeric: Vec<String>,
    pub dates: Vec<String>,
    pub sheet: Option<String>,
    pub name: String,
    pub report: PathBuf,
    pub json: bool,
    pub fail_on_check_failure: bool,
}

pub fn cmd_compare(args: CompareArgs) -> Result<(), CliError> {
    if args.sort_keys.is_empty() && !(args.numeric.is_empty() && args.dates.is_empty()) {
        return Err(CliError::usage("--numeric and --date need at least one --sort-key")
            .with_hint("cell equality sorts both sides by the sort keys before comparing"));
    }

    let options = if args.sort_keys.is_empty() {
        ReconcileOptions::default()
    } else {
        ReconcileOptions::with_cell_equality(
            CellEqualityOptions::new(args.sort_keys)
                .numeric(args.numeric)
                .dates(args.dates),
        )
    };

    let source = load_file(&args.source, args.sheet.as_deref())?;
    let target = load_file(&args.target, args.sheet.as_deref())?;

    let mut report = Report::new();
    report.extend(reconcile(&args.name, &source, &target, &options)?);
    write_report(&report, &args.report)?;

    if args.json {
        println!("{}", report::to_json_string(&report)?);
    } else {
        for failure in report.failures() {
            println!("{} {}: {}", failure.dataset, failure.check, failure.status);
        }
        let summary = report.summary();
        println!(
            "{} checks: {} passed, {} failed",
            summary.total, summary.passed, summary.failed
        );
    }

    if args.fail_on_check_failure && report.has_failures() {
        return Err(CliError::silent(EXIT_CHECK_FAILED));
    }
    Ok(())
}

pub fn cmd_dupes(
    file: PathBuf,
    keys: Vec<String>,
    first_only: bool,
    sheet: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let table = load_file(&file, sheet.as_deref())?;
    let policy = if first_only {
        DuplicatePolicy::FirstOnly
    } else {
        DuplicatePolicy::All
    };
    let key_columns = (!keys.is_empty()).then_some(keys.as_slice());
    let dataset = file.display().to_string();

    let (result, outcome) = check_duplicates(&dataset, &table, key_columns, policy)?;

    if json {
        let out = serde_json::to_string_pretty(&outcome).map_err(ReportError::from)?;
        println!("{out}");
    } else {
        println!("{}", result.status);
    }

    if outcome.is_clean() {
        Ok(())
    } else {
        Err(CliError::silent(EXIT_CHECK_FAILED))
    }
}

pub struct ScrapeArgs {
    pub report: String,
    pub chrome: Option<PathBuf>,
    pub layout: ChartLayout,
    pub headers: Vec<String>,
    pub headed: bool,
    pub ready_timeout_secs: u64,
    pub output: PathBuf,
}

pub fn cmd_scrape(args: ScrapeArgs) -> Result<(), CliError> {
    if args.layout != ChartLayout::HeaderFirst && args.headers.is_empty() {
        return Err(CliError::usage(format!(
            "layout {} needs --header for each column",
            args.layout.as_str()
        )));
    }

    let chrome = ChromeConfig {
        executable: args.chrome,
        headless: !args.headed,
        ..ChromeConfig::default()
    };
    let mut chart = ChartSource::new(chrome, args.layout, args.headers);
    chart.ready_timeout = Duration::from_secs(args.ready_timeout_secs);

    let table = chart.load(&ReportHandle::parse(&args.report))?;
    write_table(&table, &args.output).map_err(|source| ReportError::Csv {
        path: args.output.display().to_string(),
        source,
    })?;
    println!(
        "{} rows x {} columns written to {}",
        table.len(),
        table.width(),
        args.output.display()
    );
    Ok(())
}

// xcheck - cross-source data-quality reconciliation

mod adhoc;
mod exit_codes;
mod logging;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use crosscheck_config::ConfigError;
use crosscheck_io::report::ReportError;
use crosscheck_io::{ChartLayout, SourceError};
use crosscheck_recon::ReconError;

use exit_codes::{
    config_exit_code, source_exit_code, EXIT_ERROR, EXIT_INVALID_INPUT, EXIT_REPORT_WRITE, EXIT_SUCCESS, EXIT_USAGE,
};
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "xcheck")]
#[command(about = "Reconcile datasets across SQL, files and rendered charts")]
#[command(version)]
struct Cli {
    /// More log output (debug level)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every dataset in a TOML config and write the report
    #[command(after_help = "\
Examples:
  xcheck run dq.toml
  xcheck run dq.toml --report out/dq_report.csv
  xcheck run dq.toml --json --fail-on-check-failure")]
    Run {
        /// Path to the run config
        config: PathBuf,

        /// Report path (overrides [report] path)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit 3 when any check fails (after the report is written)
        #[arg(long)]
        fail_on_check_failure: bool,
    },

    /// Parse and validate a config, resolving credentials, without loading data
    #[command(after_help = "\
Examples:
  xcheck validate dq.toml")]
    Validate {
        config: PathBuf,
    },

    /// Reconcile two files directly
    #[command(after_help = "\
Examples:
  xcheck compare export.csv warehouse.parquet
  xcheck compare a.csv b.xlsx --sheet Data --sort-key id --numeric amount
  xcheck compare a.csv parquet_dir/ --sort-key id --date created_at --json")]
    Compare {
        source: PathBuf,
        target: PathBuf,

        /// Sort key for cell equality (repeatable; enables the check)
        #[arg(long = "sort-key", value_name = "COLUMN")]
        sort_keys: Vec<String>,

        /// Column to coerce to a number before comparing (repeatable)
        #[arg(long = "numeric", value_name = "COLUMN")]
        numeric: Vec<String>,

        /// Column to coerce to a timestamp before comparing (repeatable)
        #[arg(long = "date", value_name = "COLUMN")]
        dates: Vec<String>,

        /// Worksheet for Excel inputs
        #[arg(long)]
        sheet: Option<String>,

        /// Dataset name used in the report
        #[arg(long, default_value = "adhoc")]
        name: String,

        #[arg(long, default_value = "dq_report.csv")]
        report: PathBuf,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        fail_on_check_failure: bool,
    },

    /// Look for duplicated rows (or keys) in a file; exits 3 when any are found
    #[command(after_help = "\
Examples:
  xcheck dupes facilities.parquet
  xcheck dupes visits.csv --key facility --key visit_date --first-only")]
    Dupes {
        file: PathBuf,

        /// Key column (repeatable); whole rows are compared when omitted
        #[arg(long = "key", value_name = "COLUMN")]
        keys: Vec<String>,

        /// Report only the first duplicated key
        #[arg(long)]
        first_only: bool,

        #[arg(long)]
        sheet: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Extract a rendered chart table with headless Chrome and save it as CSV
    #[command(after_help = "\
Examples:
  xcheck scrape report.html --layout values_before_header \\
      --header 'Facility Type' --header 'Visit Date' -o table.csv
  xcheck scrape https://ci.example.com/report.html --chrome /usr/bin/chromium --layout header_first -o t.csv")]
    Scrape {
        /// Local report file or http(s) URL
        report: String,

        /// Chrome or Chromium binary (default: search common install paths)
        #[arg(long, env = "XCHECK_CHROME", value_name = "PATH")]
        chrome: Option<PathBuf>,

        /// values_before_header, header_first or pie_slices
        #[arg(long)]
        layout: ChartLayout,

        /// Expected (or output) column header (repeatable)
        #[arg(long = "header", value_name = "NAME")]
        headers: Vec<String>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        #[arg(long, default_value_t = 10)]
        ready_timeout_secs: u64,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    // Credentials may live in .env; load before any config is resolved.
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let result = match cli.command {
        Commands::Run {
            config,
            report,
            json,
            fail_on_check_failure,
        } => runner::cmd_run(config, report, json, fail_on_check_failure),
        Commands::Validate { config } => runner::cmd_validate(config),
        Commands::Compare {
            source,
            target,
            sort_keys,
            numeric,
            dates,
            sheet,
            name,
            report,
            json,
            fail_on_check_failure,
        } => adhoc::cmd_compare(adhoc::CompareArgs {
            source,
            target,
            sort_keys,
            numeric,
            dates,
            sheet,
            name,
            report,
            json,
            fail_on_check_failure,
        }),
        Commands::Dupes {
            file,
            keys,
            first_only,
            sheet,
            json,
        } => adhoc::cmd_dupes(file, keys, first_only, sheet, json),
        Commands::Scrape {
            report,
            chrome,
            layout,
            headers,
            headed,
            ready_timeout_secs,
            output,
        } => adhoc::cmd_scrape(adhoc::ScrapeArgs {
            report,
            chrome,
            layout,
            headers,
            headed,
            ready_timeout_secs,
            output,
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Exit with `code` and print nothing; the command already reported.
    pub fn silent(code: u8) -> Self {
        Self::new(code, "")
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::MissingCredential { var, .. } => Some(format!("export {}=<value>", var)),
            ConfigError::Validation(_) => Some("run `xcheck validate <config>` after editing".to_string()),
            _ => None,
        };
        Self {
            code: config_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        Self::new(EXIT_INVALID_INPUT, err.to_string())
    }
}

impl From<SourceError> for CliError {
    fn from(err: SourceError) -> Self {
        Self::new(source_exit_code(&err), err.to_string())
    }
}

impl From<ReportError> for CliError {
    fn from(err: ReportError) -> Self {
        let code = match err {
            ReportError::Json(_) => EXIT_ERROR,
            ReportError::Csv { .. } | ReportError::Io { .. } => EXIT_REPORT_WRITE,
        };
        Self::new(code, err.to_string())
    }
}

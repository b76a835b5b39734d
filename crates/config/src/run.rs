use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crosscheck_io::{ChartLayout, ChromeConfig, RowFilter};
use crosscheck_recon::{CellEqualityOptions, DuplicatePolicy, ReconcileOptions};
use serde::Deserialize;

use crate::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Exit non-zero when any check fails.
    #[serde(default)]
    pub fail_on_check_failure: bool,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub browser: Option<BrowserConfig>,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub json: Option<PathBuf>,
}

fn default_report_path() -> PathBuf {
    PathBuf::from("dq_report.csv")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            json: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

/// Connection settings. The password is never stored here in resolved form:
/// either `password` holds a literal or `password_env` names the variable.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
    /// SQLite database file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_pg_port() -> u16 {
    5432
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("path", &self.path)
            .finish()
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            DatabaseBackend::Postgres => {
                for (field, value) in [("host", &self.host), ("name", &self.name), ("user", &self.user)] {
                    if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                        return Err(ConfigError::invalid(format!(
                            "[database] postgres requires '{field}'"
                        )));
                    }
                }
                match (&self.password, &self.password_env) {
                    (Some(_), Some(_)) => Err(ConfigError::invalid(
                        "[database] set only one of 'password' and 'password_env'",
                    )),
                    (None, None) => Err(ConfigError::invalid(
                        "[database] postgres requires 'password_env' (or a literal 'password')",
                    )),
                    _ => Ok(()),
                }
            }
            DatabaseBackend::Sqlite => {
                if self.path.is_none() {
                    return Err(ConfigError::invalid("[database] sqlite requires 'path'"));
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Optional `[browser]` section; chart sources use the defaults without it.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Chrome or Chromium binary. Relative paths resolve against the config
    /// directory; common install locations are searched when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_ready_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    250
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            ready_timeout_secs: default_ready_timeout(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BrowserConfig {
    /// Launch settings, with `base_dir` anchoring a relative executable.
    pub fn chrome(&self, base_dir: &Path) -> ChromeConfig {
        ChromeConfig {
            executable: self.executable.as_ref().map(|p| base_dir.join(p)),
            headless: self.headless,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub source: SideConfig,
    pub target: SideConfig,
    #[serde(default)]
    pub cell_equality: Option<CellEqualityConfig>,
    #[serde(default)]
    pub duplicates: Option<DuplicatesConfig>,
}

impl DatasetConfig {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            cell_equality: self.cell_equality.as_ref().map(CellEqualityConfig::options),
        }
    }
}

/// One side of a dataset: where to load it from, plus an optional row filter
/// applied after loading.
#[derive(Debug, Clone, Deserialize)]
pub struct SideConfig {
    #[serde(flatten)]
    pub spec: SourceSpec,
    #[serde(default)]
    pub filter: Option<RowFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Sql {
        query: String,
    },
    Csv {
        path: PathBuf,
        #[serde(default)]
        delimiter: Option<char>,
    },
    Excel {
        path: PathBuf,
        #[serde(default)]
        sheet: Option<String>,
    },
    Parquet {
        path: PathBuf,
    },
    Chart {
        /// Local file (relative to the config) or http(s) URL.
        report: String,
        layout: ChartLayout,
        #[serde(default)]
        headers: Vec<String>,
        #[serde(default)]
        min_text_nodes: Option<usize>,
        #[serde(default)]
        date_column: Option<String>,
        #[serde(default)]
        date_filter: Option<String>,
    },
}

impl SourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sql { .. } => "sql",
            Self::Csv { .. } => "csv",
            Self::Excel { .. } => "excel",
            Self::Parquet { .. } => "parquet",
            Self::Chart { .. } => "chart",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellEqualityConfig {
    pub sort_keys: Vec<String>,
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default)]
    pub date_columns: Vec<String>,
}

impl CellEqualityConfig {
    pub fn options(&self) -> CellEqualityOptions {
        CellEqualityOptions {
            sort_keys: self.sort_keys.clone(),
            numeric_columns: self.numeric_columns.clone(),
            date_columns: self.date_columns.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSide {
    Source,
    #[default]
    Target,
    Both,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuplicatesConfig {
    #[serde(default)]
    pub side: DuplicateSide,
    /// `None` checks whole rows.
    #[serde(default)]
    pub key_columns: Option<Vec<String>>,
    #[serde(default)]
    pub policy: DuplicatePolicy,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl RunConfig {
    /// Parse and validate. Relative paths resolve against the current directory.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&input)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::debug!(
            path = %path.display(),
            datasets = config.datasets.len(),
            "config loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::invalid("at least one [[datasets]] entry is required"));
        }

        if let Some(db) = &self.database {
            db.validate()?;
        }

        let mut names = HashSet::new();
        for ds in &self.datasets {
            if ds.name.trim().is_empty() {
                return Err(ConfigError::invalid("dataset name must not be empty"));
            }
            if !names.insert(ds.name.as_str()) {
                return Err(ConfigError::invalid(format!("duplicate dataset name '{}'", ds.name)));
            }
            for (label, side) in [("source", &ds.source), ("target", &ds.target)] {
                self.validate_side(&ds.name, label, side)?;
            }
            if let Some(ce) = &ds.cell_equality {
                if ce.sort_keys.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "dataset '{}': cell_equality.sort_keys must not be empty",
                        ds.name
                    )));
                }
            }
            if let Some(dupes) = &ds.duplicates {
                if dupes.key_columns.as_ref().is_some_and(Vec::is_empty) {
                    return Err(ConfigError::invalid(format!(
                        "dataset '{}': duplicates.key_columns must not be empty (omit it to compare whole rows)",
                        ds.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_side(&self, dataset: &str, label: &str, side: &SideConfig) -> Result<(), ConfigError> {
        let at = |msg: String| ConfigError::invalid(format!("dataset '{dataset}' {label}: {msg}"));

        if let Some(filter) = &side.filter {
            if filter.values.is_empty() {
                return Err(at(format!("filter on '{}' has no values", filter.column)));
            }
        }

        match &side.spec {
            SourceSpec::Sql { query } => {
                if self.database.is_none() {
                    return Err(at("sql source requires a [database] section".into()));
                }
                if query.trim().is_empty() {
                    return Err(at("query must not be empty".into()));
                }
            }
            SourceSpec::Csv {
                delimiter: Some(d), ..
            } if !d.is_ascii() => {
                return Err(at(format!("delimiter '{d}' must be a single ASCII character")));
            }
            SourceSpec::Chart {
                layout,
                headers,
                date_column,
                date_filter,
                ..
            } => {
                match layout {
                    ChartLayout::ValuesBeforeHeader if headers.is_empty() => {
                        return Err(at("values_before_header layout requires 'headers'".into()));
                    }
                    ChartLayout::PieSlices if headers.len() != 2 => {
                        return Err(at(format!(
                            "pie_slices layout requires exactly two 'headers', got {}",
                            headers.len()
                        )));
                    }
                    _ => {}
                }
                if date_filter.is_some() && date_column.is_none() {
                    return Err(at("'date_filter' requires 'date_column'".into()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolve `path` against the config file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.resolve_path(&self.report.path)
    }

    pub fn json_report_path(&self) -> Option<PathBuf> {
        self.report.json.as_deref().map(|p| self.resolve_path(p))
    }

    /// Display name for logs.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("crosscheck")
    }
}

// Tabular source adapters and report writers

pub mod browser;
pub mod chart;
pub mod csv;
pub mod parquet;
pub mod report;
pub mod source;
pub mod sql;
pub mod xlsx;

pub use browser::{ChartBrowser, ChromeConfig, ChromiumBrowser};
pub use chart::{ChartLayout, ChartSource, ReportHandle};
pub use self::csv::CsvSource;
pub use self::parquet::ParquetSource;
pub use source::{RowFilter, Source, SourceError};
pub use sql::{PgParams, SqlBackend, SqlSource};
pub use xlsx::ExcelSource;

use std::path::Path;

use crosscheck_recon::Table;

/// File formats a path can be loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
    Parquet,
}

impl FileFormat {
    /// Pick a format from the extension; directories are Parquet datasets.
    pub fn detect(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(Self::Parquet);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Excel),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// Load a file with the adapter its extension selects.
pub fn load_file(path: &Path, sheet: Option<&str>) -> Result<Table, SourceError> {
    match FileFormat::detect(path) {
        Some(FileFormat::Csv) => CsvSource::new().load(path),
        Some(FileFormat::Excel) => ExcelSource {
            sheet: sheet.map(str::to_string),
        }
        .load(path),
        Some(FileFormat::Parquet) => ParquetSource.load(path),
        None => Err(SourceError::malformed(format!(
            "{}: unrecognized file type (expected csv, xlsx or parquet)",
            path.display()
        ))),
    }
}

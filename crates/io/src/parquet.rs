//! Parquet source. A directory locator loads every `*.parquet` file in it,
//! in file-name order, and concatenates them.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate};
use crosscheck_recon::{Table, Value};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

use crate::source::{Source, SourceError};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSource;

impl Source for ParquetSource {
    type Locator = Path;

    fn load(&self, path: &Path) -> Result<Table, SourceError> {
        if path.is_dir() {
            return load_dir(path);
        }
        if !path.exists() {
            return Err(SourceError::unavailable(format!("{}: not found", path.display())));
        }
        load_file(path)
    }
}

fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| SourceError::unavailable(format!("{}: {e}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| SourceError::unavailable(format!("{}: {e}", dir.display())))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_dir(dir: &Path) -> Result<Table, SourceError> {
    let files = parquet_files(dir)?;
    let Some((first, rest)) = files.split_first() else {
        return Err(SourceError::unavailable(format!(
            "{}: no .parquet files in directory",
            dir.display()
        )));
    };

    let mut table = load_file(first)?;
    for path in rest {
        let part = load_file(path)?;
        table = table.concat(part).map_err(|e| {
            SourceError::malformed(format!("{}: {e}", path.display()))
        })?;
    }
    tracing::info!(dir = %dir.display(), files = files.len(), rows = table.len(), "loaded parquet directory");
    Ok(table)
}

fn load_file(path: &Path) -> Result<Table, SourceError> {
    let file = File::open(path)
        .map_err(|e| SourceError::unavailable(format!("{}: {e}", path.display())))?;
    let reader = SerializedFileReader::new(file)
        .map_err(|e| SourceError::malformed(format!("{}: {e}", path.display())))?;

    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    let mut table = Table::new(columns)?;

    let rows = reader
        .get_row_iter(None)
        .map_err(|e| SourceError::malformed(format!("{}: {e}", path.display())))?;
    for row in rows {
        let row = row.map_err(|e| SourceError::malformed(format!("{}: {e}", path.display())))?;
        table.push_row(row.get_column_iter().map(|(_, field)| field_value(field)).collect())?;
    }

    tracing::debug!(path = %path.display(), rows = table.len(), "loaded parquet file");
    Ok(table)
}

fn field_value(field: &Field) -> Value {
    match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Bool(*b),
        Field::Byte(n) => Value::Int(i64::from(*n)),
        Field::Short(n) => Value::Int(i64::from(*n)),
        Field::Int(n) => Value::Int(i64::from(*n)),
        Field::Long(n) => Value::Int(*n),
        Field::UByte(n) => Value::Int(i64::from(*n)),
        Field::UShort(n) => Value::Int(i64::from(*n)),
        Field::UInt(n) => Value::Int(i64::from(*n)),
        Field::ULong(n) => i64::try_from(*n).map_or_else(|_| Value::Float(*n as f64), Value::Int),
        Field::Float(n) => Value::Float(f64::from(*n)),
        Field::Double(n) => Value::Float(*n),
        Field::Str(s) => Value::text(s.as_str()),
        Field::Date(days) => epoch_days(*days).map_or(Value::Int(i64::from(*days)), Value::Date),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map_or(Value::Int(*ms), |ts| Value::Timestamp(ts.naive_utc())),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map_or(Value::Int(*us), |ts| Value::Timestamp(ts.naive_utc())),
        // decimals, binary, nested groups: display form
        other => Value::text(other.to_string()),
    }
}

fn epoch_days(days: i32) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    if days >= 0 {
        epoch.checked_add_days(Days::new(u64::from(days.unsigned_abs())))
    } else {
        epoch.checked_sub_days(Days::new(u64::from(days.unsigned_abs())))
    }
}

// Excel source (xlsx, xls, xlsb, ods)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::NaiveTime;
use crosscheck_recon::{Table, Value};

use crate::source::{Source, SourceError};

/// Reads one worksheet; its first row is the header.
#[derive(Debug, Clone, Default)]
pub struct ExcelSource {
    /// `None` reads the first sheet.
    pub sheet: Option<String>,
}

impl ExcelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(name: impl Into<String>) -> Self {
        Self {
            sheet: Some(name.into()),
        }
    }
}

impl Source for ExcelSource {
    type Locator = Path;

    fn load(&self, path: &Path) -> Result<Table, SourceError> {
        if !path.exists() {
            return Err(SourceError::unavailable(format!("{}: file not found", path.display())));
        }

        let mut workbook: Sheets<_> = open_workbook_auto(path)
            .map_err(|e| SourceError::malformed(format!("failed to open {}: {e}", path.display())))?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        let sheet_name = match &self.sheet {
            Some(name) if sheet_names.contains(name) => name.clone(),
            Some(name) => {
                return Err(SourceError::unavailable(format!(
                    "{}: no sheet named '{name}' (sheets: {})",
                    path.display(),
                    sheet_names.join(", ")
                )))
            }
            None => sheet_names.first().cloned().ok_or_else(|| {
                SourceError::malformed(format!("{}: workbook contains no sheets", path.display()))
            })?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| SourceError::malformed(format!("failed to read sheet '{sheet_name}': {e}")))?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| SourceError::malformed(format!("sheet '{sheet_name}' is empty")))?;

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(idx, cell)| header_name(idx, cell))
            .collect();
        let mut table = Table::new(columns)?;

        for row in rows {
            table.push_row(row.iter().map(cell_value).collect())?;
        }

        tracing::info!(
            path = %path.display(),
            sheet = %sheet_name,
            rows = table.len(),
            "loaded spreadsheet"
        );
        Ok(table)
    }
}

fn header_name(idx: usize, cell: &Data) -> String {
    let name = match cell_value(cell) {
        Value::Null => String::new(),
        // whole-number headers (years) read as floats
        Value::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        other => other.to_string(),
    };
    let name = name.trim();
    if name.is_empty() {
        format!("Unnamed: {idx}")
    } else {
        name.to_string()
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::text(s.as_str()),
        Data::Float(n) => Value::Float(*n),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(e) => Value::text(e.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == NaiveTime::MIN => Value::Date(ts.date()),
            Some(ts) => Value::Timestamp(ts),
            None => Value::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::text(s.as_str()),
    }
}

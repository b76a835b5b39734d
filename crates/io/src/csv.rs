// CSV/TSV source and table export

use std::io::{ErrorKind, Read};
use std::path::Path;

use crosscheck_recon::{Table, Value};

use crate::source::{Source, SourceError};

/// Reads a delimited text file whose first row is the header.
///
/// Empty fields load as `Null`; everything else is `Text`.
#[derive(Debug, Clone, Default)]
pub struct CsvSource {
    /// `None` sniffs the delimiter from the first lines.
    pub delimiter: Option<u8>,
}

impl CsvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }
}

impl Source for CsvSource {
    type Locator = Path;

    fn load(&self, path: &Path) -> Result<Table, SourceError> {
        let content = read_file_as_utf8(path)?;
        let delimiter = self.delimiter.unwrap_or_else(|| sniff_delimiter(&content));
        let table = parse_table(&content, delimiter)
            .map_err(|e| SourceError::malformed(format!("{}: {e}", path.display())))?;
        tracing::info!(
            path = %path.display(),
            delimiter = %char::from(delimiter).escape_default(),
            rows = table.len(),
            "loaded csv"
        );
        Ok(table)
    }
}

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_RECORDS: usize = 20;

/// Pick the delimiter under which the most sampled records keep the header's
/// width, then the widest header. Comma when no candidate splits the header.
pub fn sniff_delimiter(content: &str) -> u8 {
    DELIMITERS
        .iter()
        .rev()
        .filter_map(|&delimiter| {
            let widths = record_widths(content, delimiter);
            let (&header, rows) = widths.split_first()?;
            (header > 1).then(|| {
                let agreeing = rows.iter().filter(|&&w| w == header).count();
                ((agreeing, header), delimiter)
            })
        })
        .max_by_key(|&(score, _)| score)
        .map_or(b',', |(_, delimiter)| delimiter)
}

/// Field counts of the leading records, quoting honoured.
fn record_widths(content: &str, delimiter: u8) -> Vec<usize> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
        .records()
        .map_while(Result::ok)
        .take(SNIFF_RECORDS)
        .map(|record| record.len())
        .collect()
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback for
/// Excel-exported CSVs).
pub fn read_file_as_utf8(path: &Path) -> Result<String, SourceError> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SourceError::unavailable(format!("{}: file not found", path.display())),
        _ => SourceError::unavailable(format!("{}: {e}", path.display())),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| SourceError::unavailable(format!("{}: {e}", path.display())))?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %path.display(), "not utf-8, decoding as windows-1252");
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn parse_table(content: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    if headers.is_empty() {
        return Err("no header row".to_string());
    }
    let mut table = Table::new(headers.iter()).map_err(|e| e.to_string())?;

    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::text(field)
                }
            })
            .collect();
        table.push_row(row).map_err(|e| e.to_string())?;
    }

    Ok(table)
}

/// Write `table` as comma-separated text with a header row, replacing any
/// existing file. `Null` cells are written empty.
pub fn write_table(table: &Table, path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| match v {
            Value::Null => String::new(),
            other => other.to_string(),
        }))?;
    }
    writer.flush()?;
    Ok(())
}

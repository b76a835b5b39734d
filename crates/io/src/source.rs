//! The adapter interface every table source implements.

use crosscheck_recon::{Table, TableError};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The locator could not be resolved: file missing, connection refused,
    /// rendered element absent.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source was reached but its content is not a rectangular table.
    #[error("malformed source: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<TableError> for SourceError {
    fn from(e: TableError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Load a dataset into a [`Table`].
///
/// Any live resource (connection, browser session) is acquired and released
/// within a single `load` call.
pub trait Source {
    type Locator: ?Sized;

    fn load(&self, locator: &Self::Locator) -> Result<Table, SourceError>;
}

/// Keep only rows whose `column` value, in display form, is one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub values: Vec<String>,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn apply(&self, table: &Table) -> Result<Table, SourceError> {
        if !table.has_column(&self.column) {
            return Err(SourceError::malformed(format!(
                "filter column '{}' not in table",
                self.column
            )));
        }
        let filtered = table.filter_in(&self.column, &self.values)?;
        tracing::debug!(
            column = %self.column,
            before = table.len(),
            after = filtered.len(),
            "row filter applied"
        );
        Ok(filtered)
    }
}

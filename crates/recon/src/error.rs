use crate::model::Side;
use crate::table::TableError;

/// Invalid usage of the engine. Check failures are never errors; they are
/// returned as [`crate::CheckStatus::Fail`].
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// Malformed options (empty key list, overlapping column designations, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A column required by the options is absent from one of the tables.
    #[error("{side} table has no column '{column}'")]
    MissingColumn { side: Side, column: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

impl ReconError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Map an unknown-column table error onto the side it came from.
    pub(crate) fn on_side(err: TableError, side: Side) -> Self {
        match err {
            TableError::UnknownColumn(column) => Self::MissingColumn { side, column },
            other => Self::Table(other),
        }
    }
}

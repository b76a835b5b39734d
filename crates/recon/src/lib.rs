//! `crosscheck-recon`: cross-source reconciliation engine.
//!
//! Pure engine crate: receives two already-loaded tables, returns check
//! results. No CLI or IO dependencies.

pub mod compare;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod table;

pub use compare::{cell_equality, CellDiff, CellEqualityOptions, CellEqualityOutcome, ShapeMismatch};
pub use duplicates::{check_duplicates, check_side_duplicates, find_duplicates, DuplicateKey, DuplicateOutcome, DuplicatePolicy};
pub use engine::{reconcile, retrieval_failed, ReconcileOptions};
pub use error::ReconError;
pub use model::{CheckKind, CheckResult, CheckStatus, Report, ReportSummary, Side};
pub use normalize::{CoercionMiss, CoercionTarget};
pub use table::{Table, TableError, Value};

// Run configuration loading

pub mod credentials;
pub mod run;

pub use credentials::{resolve_database, resolve_password};
pub use run::{
    BrowserConfig, CellEqualityConfig, DatabaseBackend, DatabaseConfig, DatasetConfig, DuplicateSide,
    DuplicatesConfig, ReportConfig, RunConfig, SideConfig, SourceSpec,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Validation(String),

    #[error("environment variable {var} not set (needed for {what})")]
    MissingCredential { var: String, what: String },

    #[error("environment variable {var} is empty (needed for {what})")]
    EmptyCredential { var: String, what: String },
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_credential(&self) -> bool {
        matches!(self, Self::MissingCredential { .. } | Self::EmptyCredential { .. })
    }
}

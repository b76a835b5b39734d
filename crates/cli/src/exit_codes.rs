//! CLI Exit Code Registry
//!
//! Single source of truth for `xcheck` exit codes. Scripts and schedulers
//! rely on them.
//!
//! | Code  | Meaning                                            |
//! |-------|----------------------------------------------------|
//! | 0     | Success (check failures alone do not change this)  |
//! | 1     | General error                                      |
//! | 2     | Usage error (bad args, unreadable config file)     |
//! | 3     | Check failures, when opted in; duplicates (`dupes`)|
//! | 4     | Invalid engine input (sort keys, key columns)      |
//! | 5     | Report could not be written                        |
//! | 10    | Config parse or validation error                   |
//! | 11    | Missing or empty credential                        |
//! | 20    | Source unavailable (single-shot commands)          |
//! | 21    | Source malformed (single-shot commands)            |

use crosscheck_config::ConfigError;
use crosscheck_io::SourceError;

pub const EXIT_SUCCESS: u8 = 0;

/// Unspecified failure. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

pub const EXIT_USAGE: u8 = 2;

/// At least one check failed and the run asked to fail on that.
pub const EXIT_CHECK_FAILED: u8 = 3;

/// Options the engine cannot act on, e.g. a sort key that is not a column.
pub const EXIT_INVALID_INPUT: u8 = 4;

pub const EXIT_REPORT_WRITE: u8 = 5;

pub const EXIT_CONFIG: u8 = 10;

/// A `password_env` variable is unset or blank.
pub const EXIT_MISSING_CREDENTIAL: u8 = 11;

pub const EXIT_SOURCE_UNAVAILABLE: u8 = 20;

pub const EXIT_SOURCE_MALFORMED: u8 = 21;

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Read { .. } => EXIT_USAGE,
        ConfigError::Parse(_) | ConfigError::Validation(_) => EXIT_CONFIG,
        ConfigError::MissingCredential { .. } | ConfigError::EmptyCredential { .. } => {
            EXIT_MISSING_CREDENTIAL
        }
    }
}

pub fn source_exit_code(err: &SourceError) -> u8 {
    match err {
        SourceError::Unavailable(_) => EXIT_SOURCE_UNAVAILABLE,
        SourceError::Malformed(_) => EXIT_SOURCE_MALFORMED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_map_to_11() {
        let err = ConfigError::MissingCredential {
            var: "DQ_DB_PASSWORD".into(),
            what: "database password".into(),
        };
        assert_eq!(config_exit_code(&err), EXIT_MISSING_CREDENTIAL);
        assert_eq!(config_exit_code(&ConfigError::Validation("x".into())), EXIT_CONFIG);
    }

    #[test]
    fn source_errors_are_distinct() {
        assert_eq!(source_exit_code(&SourceError::unavailable("down")), EXIT_SOURCE_UNAVAILABLE);
        assert_eq!(source_exit_code(&SourceError::malformed("bad")), EXIT_SOURCE_MALFORMED);
        assert_ne!(EXIT_CHECK_FAILED, EXIT_SUCCESS);
    }
}

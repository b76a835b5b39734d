// Credential resolution from the environment

use crosscheck_io::{PgParams, SqlBackend};

use crate::{ConfigError, DatabaseBackend, DatabaseConfig, RunConfig};

/// Read `var` from the process environment; trimmed, must be non-empty.
pub fn resolve_password(var: &str, what: &str) -> Result<String, ConfigError> {
    resolve_with(var, what, |name| std::env::var(name).ok())
}

fn resolve_with(
    var: &str,
    what: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let value = lookup(var).ok_or_else(|| ConfigError::MissingCredential {
        var: var.to_string(),
        what: what.to_string(),
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyCredential {
            var: var.to_string(),
            what: what.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Turn the `[database]` section into a connectable backend.
///
/// Postgres passwords come from `password_env` unless a literal `password`
/// is configured. SQLite paths resolve against the config directory.
pub fn resolve_database(config: &RunConfig) -> Result<SqlBackend, ConfigError> {
    resolve_database_with(config, |name| std::env::var(name).ok())
}

fn resolve_database_with(
    config: &RunConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SqlBackend, ConfigError> {
    let db = config
        .database
        .as_ref()
        .ok_or_else(|| ConfigError::invalid("no [database] section configured"))?;

    match db.backend {
        DatabaseBackend::Sqlite => {
            let path = db
                .path
                .as_deref()
                .ok_or_else(|| ConfigError::invalid("[database] sqlite requires 'path'"))?;
            Ok(SqlBackend::Sqlite(config.resolve_path(path)))
        }
        DatabaseBackend::Postgres => {
            let password = match (&db.password, &db.password_env) {
                (Some(literal), _) => {
                    tracing::warn!("[database] uses a literal password; prefer password_env");
                    literal.clone()
                }
                (None, Some(var)) => resolve_with(var, "database password", &lookup)?,
                (None, None) => {
                    return Err(ConfigError::invalid(
                        "[database] postgres requires 'password_env' (or a literal 'password')",
                    ))
                }
            };
            Ok(SqlBackend::Postgres(pg_params(db, password)?))
        }
    }
}

fn pg_params(db: &DatabaseConfig, password: String) -> Result<PgParams, ConfigError> {
    let field = |name: &str, value: &Option<String>| {
        value
            .clone()
            .ok_or_else(|| ConfigError::invalid(format!("[database] postgres requires '{name}'")))
    };
    Ok(PgParams {
        host: field("host", &db.host)?,
        port: db.port,
        database: field("name", &db.name)?,
        user: field("user", &db.user)?,
        password,
    })
}

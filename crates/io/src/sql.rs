//! SQL query source. One connection per `load`, closed before returning.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use crosscheck_recon::{Table, Value};
use postgres::types::Type;
use postgres::SimpleQueryMessage;
use rusqlite::types::ValueRef;
use rusqlite::OpenFlags;

use crate::source::{Source, SourceError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for a PostgreSQL server.
#[derive(Clone)]
pub struct PgParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for PgParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SqlBackend {
    Postgres(PgParams),
    /// Opened read-only; the file must exist.
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SqlSource {
    pub backend: SqlBackend,
}

impl SqlSource {
    pub fn new(backend: SqlBackend) -> Self {
        Self { backend }
    }
}

impl Source for SqlSource {
    type Locator = str;

    fn load(&self, query: &str) -> Result<Table, SourceError> {
        let table = match &self.backend {
            SqlBackend::Postgres(params) => load_postgres(params, query)?,
            SqlBackend::Sqlite(path) => load_sqlite(path, query)?,
        };
        tracing::info!(query, rows = table.len(), "loaded query");
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

fn load_postgres(params: &PgParams, query: &str) -> Result<Table, SourceError> {
    let mut config = postgres::Config::new();
    config
        .host(&params.host)
        .port(params.port)
        .dbname(&params.database)
        .user(&params.user)
        .password(&params.password)
        .connect_timeout(CONNECT_TIMEOUT);

    tracing::debug!(host = %params.host, port = params.port, database = %params.database, "connecting");
    let mut client = config.connect(postgres::NoTls).map_err(|e| {
        SourceError::unavailable(format!(
            "cannot connect to postgres at {}:{}/{}: {e}",
            params.host, params.port, params.database
        ))
    })?;

    // prepare() only describes the statement; its column types drive conversion
    let statement = client
        .prepare(query)
        .map_err(|e| SourceError::malformed(format!("query failed: {e}")))?;
    let types: Vec<Type> = statement.columns().iter().map(|c| c.type_().clone()).collect();
    let mut table = Table::new(statement.columns().iter().map(|c| c.name()))?;

    let messages = client
        .simple_query(query)
        .map_err(|e| SourceError::malformed(format!("query failed: {e}")))?;
    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            let values = (0..row.len())
                .map(|i| match row.get(i) {
                    None => Value::Null,
                    Some(text) => pg_text_value(types.get(i), text),
                })
                .collect();
            table.push_row(values)?;
        }
    }

    if let Err(e) = client.close() {
        tracing::warn!(error = %e, "postgres connection did not close cleanly");
    }
    Ok(table)
}

/// Convert a value in PostgreSQL text format according to its declared type.
/// Unparseable input stays `Text`.
pub fn pg_text_value(ty: Option<&Type>, text: &str) -> Value {
    let Some(ty) = ty else {
        return Value::text(text);
    };
    let parsed = if *ty == Type::BOOL {
        match text {
            "t" => Some(Value::Bool(true)),
            "f" => Some(Value::Bool(false)),
            _ => None,
        }
    } else if [Type::INT2, Type::INT4, Type::INT8, Type::OID].contains(ty) {
        text.parse().ok().map(Value::Int)
    } else if [Type::FLOAT4, Type::FLOAT8, Type::NUMERIC].contains(ty) {
        text.parse().ok().map(Value::Float)
    } else if *ty == Type::DATE {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().map(Value::Date)
    } else if *ty == Type::TIMESTAMP {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(Value::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .ok()
            .map(|ts| Value::Timestamp(ts.naive_utc()))
    } else {
        None
    };
    parsed.unwrap_or_else(|| Value::text(text))
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

fn load_sqlite(path: &std::path::Path, query: &str) -> Result<Table, SourceError> {
    if !path.exists() {
        return Err(SourceError::unavailable(format!(
            "sqlite database {} not found",
            path.display()
        )));
    }
    let conn = rusqlite::Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| SourceError::unavailable(format!("cannot open {}: {e}", path.display())))?;

    let table = {
        let mut stmt = conn
            .prepare(query)
            .map_err(|e| SourceError::malformed(format!("query failed: {e}")))?;
        let mut table = Table::new(stmt.column_names())?;
        let width = table.width();

        let mut rows = stmt
            .query([])
            .map_err(|e| SourceError::malformed(format!("query failed: {e}")))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| SourceError::malformed(format!("query failed: {e}")))?
        {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let cell = row
                    .get_ref(i)
                    .map_err(|e| SourceError::malformed(format!("column {i}: {e}")))?;
                values.push(sqlite_value(cell));
            }
            table.push_row(values)?;
        }
        table
    };

    if let Err((_, e)) = conn.close() {
        tracing::warn!(error = %e, "sqlite connection did not close cleanly");
    }
    Ok(table)
}

fn sqlite_value(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::text(String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => Value::text(format!("<{} bytes>", bytes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture_db(path: &std::path::Path) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE facilities (id INTEGER, name TEXT, avg_time REAL, opened TEXT);
             INSERT INTO facilities VALUES (1, 'Clinic', 12.5, '2024-01-05');
             INSERT INTO facilities VALUES (2, 'Hospital', 35.0, NULL);",
        )
        .unwrap();
    }

    #[test]
    fn test_sqlite_query() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("dq.db");
        fixture_db(&db);

        let source = SqlSource::new(SqlBackend::Sqlite(db));
        let table = source
            .load("SELECT id, name, avg_time, opened FROM facilities ORDER BY id")
            .unwrap();
        assert_eq!(table.columns(), ["id", "name", "avg_time", "opened"]);
        assert_eq!(
            table.row(0).unwrap(),
            [
                Value::Int(1),
                Value::text("Clinic"),
                Value::Float(12.5),
                Value::text("2024-01-05"),
            ]
        );
        assert_eq!(table.get(1, "opened"), Some(&Value::Null));
    }

    #[test]
    fn test_sqlite_is_read_only() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("dq.db");
        fixture_db(&db);

        let source = SqlSource::new(SqlBackend::Sqlite(db));
        let err = source.load("DELETE FROM facilities").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)), "{err}");
    }

    #[test]
    fn test_sqlite_errors() {
        let dir = tempdir().unwrap();
        let missing = SqlSource::new(SqlBackend::Sqlite(dir.path().join("none.db")));
        assert!(missing.load("SELECT 1").unwrap_err().is_unavailable());

        let db = dir.path().join("dq.db");
        fixture_db(&db);
        let bad = SqlSource::new(SqlBackend::Sqlite(db));
        assert!(matches!(
            bad.load("SELECT * FROM no_such_table"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_postgres_refused_is_unavailable() {
        let source = SqlSource::new(SqlBackend::Postgres(PgParams {
            host: "127.0.0.1".into(),
            port: 1,
            database: "dq".into(),
            user: "dq".into(),
            password: "not-a-secret".into(),
        }));
        assert!(source.load("SELECT 1").unwrap_err().is_unavailable());
    }

    #[test]
    fn test_pg_params_debug_redacts_password() {
        let p = PgParams {
            host: "db".into(),
            port: 5432,
            database: "dq".into(),
            user: "dq".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{p:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_pg_text_conversion() {
        assert_eq!(pg_text_value(Some(&Type::INT4), "42"), Value::Int(42));
        assert_eq!(pg_text_value(Some(&Type::NUMERIC), "35.50"), Value::Float(35.5));
        assert_eq!(pg_text_value(Some(&Type::BOOL), "t"), Value::Bool(true));
        assert_eq!(
            pg_text_value(Some(&Type::DATE), "2024-01-05"),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert_eq!(
            pg_text_value(Some(&Type::TIMESTAMP), "2024-01-05 10:30:00"),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(10, 30, 0).unwrap()
            )
        );
        assert_eq!(
            pg_text_value(Some(&Type::TIMESTAMPTZ), "2024-01-05 10:30:00+02"),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(8, 30, 0).unwrap()
            )
        );
        assert_eq!(pg_text_value(Some(&Type::TEXT), "Clinic"), Value::text("Clinic"));
        assert_eq!(pg_text_value(Some(&Type::INT4), "x"), Value::text("x"));
    }
}

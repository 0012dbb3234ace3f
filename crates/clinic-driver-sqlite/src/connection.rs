//! SQLite connection implementation

use clinic_core::{
    ClinicError, ColumnMeta, Connection, QueryResult, Result, Row, SchemaIntrospection,
    StatementResult, Transaction, Value,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use std::sync::Arc;

use crate::SqliteTransaction;

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        let expanded_path = Self::expand_path(path)?;
        if !expanded_path.starts_with("file:") {
            let file_path = std::path::Path::new(&expanded_path);
            if let Some(parent) = file_path.parent()
                && !parent.exists()
            {
                return Err(ClinicError::Connection(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
            ClinicError::Connection(format!(
                "Failed to open SQLite database at '{}': {}",
                expanded_path, e
            ))
        })?;

        // WAL only makes sense for file-backed databases
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| ClinicError::Connection(format!("Failed to set journal mode: {}", e)))?;

        Self::configure(conn, &expanded_path)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            ClinicError::Connection(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::configure(conn, ":memory:")
    }

    fn configure(conn: RusqliteConnection, path: &str) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| ClinicError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| ClinicError::Connection(format!("Failed to set synchronous mode: {}", e)))?;

        tracing::info!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Expand path to handle ~ (home directory) and relative paths
    fn expand_path(path: &str) -> Result<String> {
        if path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            match std::env::var_os("HOME") {
                Some(home) => std::path::PathBuf::from(home)
                    .join(rest)
                    .to_string_lossy()
                    .to_string(),
                None => {
                    return Err(ClinicError::Configuration(
                        "Unable to determine HOME directory".into(),
                    ));
                }
            }
        } else if path.starts_with('~') {
            return Err(ClinicError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        let result = if path_buf.is_relative() {
            std::env::current_dir()
                .map_err(ClinicError::Io)?
                .join(path_buf)
                .to_string_lossy()
                .to_string()
        } else {
            expanded
        };

        Ok(result)
    }

    /// Get database file information
    pub fn get_info(&self) -> Result<DatabaseFileInfo> {
        let conn = self.conn.lock();

        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .map_err(|e| ClinicError::Query(e.to_string()))?;
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .map_err(|e| ClinicError::Query(e.to_string()))?;
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .map_err(|e| ClinicError::Query(e.to_string()))?;
        let foreign_keys: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get::<_, i64>(0))
            .map_err(|e| ClinicError::Query(e.to_string()))?
            != 0;

        Ok(DatabaseFileInfo {
            file_size_bytes: page_count * page_size,
            page_count: page_count as usize,
            page_size: page_size as usize,
            journal_mode,
            foreign_keys_enabled: foreign_keys,
        })
    }
}

/// Information about the SQLite database file
#[derive(Debug, Clone)]
pub struct DatabaseFileInfo {
    pub file_size_bytes: i64,
    pub page_count: usize,
    pub page_size: usize,
    pub journal_mode: String,
    pub foreign_keys_enabled: bool,
}

impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL batch");
        let conn = self.conn.lock();
        conn.execute_batch(sql)
            .map_err(|e| ClinicError::Query(format!("Failed to execute batch: {}", e)))
    }

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning SQLite transaction");
        {
            let conn = self.conn.lock();
            // DEFERRED: the write lock is only taken on the first write
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| ClinicError::Query(format!("Failed to begin transaction: {}", e)))?;
        }
        Ok(Box::new(SqliteTransaction::new(Arc::clone(&self.conn))))
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

/// Execute a data-modifying statement on a locked connection
pub(crate) fn run_execute(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<StatementResult> {
    let rusqlite_params = values_to_rusqlite(params);

    let rows_affected = conn
        .execute(sql, params_from_iter(rusqlite_params.iter()))
        .map_err(|e| ClinicError::Query(format!("Failed to execute statement: {}", e)))?;

    let last_insert_id = match conn.last_insert_rowid() {
        0 => None,
        id => Some(id),
    };

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(StatementResult {
        affected_rows: rows_affected as u64,
        last_insert_id,
    })
}

/// Run a row-returning query on a locked connection
pub(crate) fn run_query(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let rusqlite_params = values_to_rusqlite(params);

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ClinicError::Query(format!("Failed to prepare query: {}", e)))?;

    let mut column_names: Vec<String> = Vec::with_capacity(stmt.column_count());
    let mut columns: Vec<ColumnMeta> = Vec::with_capacity(stmt.column_count());
    for (idx, col) in stmt.columns().iter().enumerate() {
        let name = col.name().to_string();
        // sqlite3_column_decltype: the type from CREATE TABLE, when known
        let data_type = col.decl_type().unwrap_or("DYNAMIC").to_string();
        column_names.push(name.clone());
        columns.push(ColumnMeta {
            name,
            data_type,
            ordinal: idx,
        });
    }

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(rusqlite_params.iter()))
        .map_err(|e| ClinicError::Query(format!("Failed to execute query: {}", e)))?;

    while let Some(row) = query_rows
        .next()
        .map_err(|e| ClinicError::Query(format!("Failed to fetch row: {}", e)))?
    {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(rusqlite_to_value(row, i)?);
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms = execution_time_ms,
        "query executed successfully"
    );
    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms,
    })
}

/// Convert our Value types to rusqlite-compatible types
fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Date(d) => rusqlite::types::Value::Text(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => rusqlite::types::Value::Text(t.format("%H:%M:%S").to_string()),
        Value::DateTime(dt) => {
            rusqlite::types::Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())
        }
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| ClinicError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        // Text stored in untyped columns may come back as a BLOB
        ValueRef::Blob(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn memory() -> SqliteConnection {
        SqliteConnection::open_in_memory().expect("in-memory database")
    }

    #[test]
    fn test_execute_and_query_roundtrip() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE Client (Id INTEGER PRIMARY KEY, Name TEXT NOT NULL)")
            .unwrap();

        let inserted = conn
            .execute(
                "INSERT INTO Client (Id, Name) VALUES (?, ?)",
                &[Value::Int64(4), Value::String("Ann".into())],
            )
            .unwrap();
        assert_eq!(inserted.affected_rows, 1);
        assert_eq!(inserted.last_insert_id, Some(4));

        let result = conn.query("SELECT Id, Name FROM Client", &[]).unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.columns[0].data_type, "INTEGER");
        assert_eq!(result.rows[0].get_by_name("Name").and_then(|v| v.as_str()), Some("Ann"));
    }

    #[test]
    fn test_dates_are_stored_as_iso_text() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE Visit (Day DATE)").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        conn.execute("INSERT INTO Visit (Day) VALUES (?)", &[Value::Date(day)])
            .unwrap();

        let result = conn.query("SELECT Day FROM Visit", &[]).unwrap();
        assert_eq!(result.scalar(), Some(&Value::String("2024-01-31".into())));
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let info = memory().get_info().unwrap();
        assert!(info.foreign_keys_enabled);
    }

    #[test]
    fn test_open_rejects_missing_parent_directory() {
        let result = SqliteConnection::open("/definitely/not/here/clinic.db");
        assert!(matches!(result, Err(ClinicError::Connection(_))));
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let conn = SqliteConnection::open(path.to_str().unwrap()).unwrap();
        conn.execute_batch("CREATE TABLE T (Id INTEGER)").unwrap();
        assert_eq!(conn.get_info().unwrap().journal_mode.to_lowercase(), "wal");
    }
}

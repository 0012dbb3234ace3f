//! SQLite transaction implementation

use clinic_core::{
    ClinicError, QueryResult, Result, Savepoint, SavepointSupport, StatementResult, Transaction,
    Value,
};
use parking_lot::Mutex;
use rusqlite::Connection as RusqliteConnection;
use std::sync::Arc;

use crate::connection::{run_execute, run_query};

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL so that it can share
/// the connection `Arc<Mutex<…>>` without running into rusqlite's borrow-based
/// transaction lifetime requirements.
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    committed: bool,
    rolled_back: bool,
}

impl SqliteTransaction {
    pub(crate) fn new(conn: Arc<Mutex<RusqliteConnection>>) -> Self {
        Self {
            conn,
            committed: false,
            rolled_back: false,
        }
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // Abandoned transactions are rolled back so the connection stays usable
        if !self.committed && !self.rolled_back {
            tracing::warn!(
                "SQLite transaction dropped without commit or rollback, issuing automatic rollback"
            );
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

impl Transaction for SqliteTransaction {
    fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");

        if self.rolled_back {
            return Err(ClinicError::Query("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(ClinicError::Query("Transaction already committed".into()));
        }

        let conn = self.conn.lock();
        conn.execute_batch("COMMIT")
            .map_err(|e| ClinicError::Query(format!("Failed to commit transaction: {}", e)))?;
        drop(conn);

        self.committed = true;
        tracing::debug!("SQLite transaction committed successfully");
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");

        if self.committed {
            return Err(ClinicError::Query("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        let conn = self.conn.lock();
        conn.execute_batch("ROLLBACK")
            .map_err(|e| ClinicError::Query(format!("Failed to rollback transaction: {}", e)))?;
        drop(conn);

        self.rolled_back = true;
        tracing::debug!("SQLite transaction rolled back successfully");
        Ok(())
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in SQLite transaction");
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }
}

impl SavepointSupport for SqliteTransaction {
    fn savepoint(&self, name: &str) -> Result<Savepoint> {
        validate_savepoint_name(name)?;
        tracing::debug!(savepoint = %name, "creating savepoint");
        let conn = self.conn.lock();
        conn.execute_batch(&format!("SAVEPOINT {}", name))
            .map_err(|e| ClinicError::Query(format!("Failed to create savepoint: {}", e)))?;
        Ok(Savepoint::new(name))
    }

    fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        validate_savepoint_name(name)?;
        tracing::debug!(savepoint = %name, "rolling back to savepoint");
        let conn = self.conn.lock();
        conn.execute_batch(&format!("ROLLBACK TO SAVEPOINT {}", name))
            .map_err(|e| ClinicError::Query(format!("Failed to rollback to savepoint: {}", e)))
    }

    fn release_savepoint(&self, name: &str) -> Result<()> {
        validate_savepoint_name(name)?;
        tracing::debug!(savepoint = %name, "releasing savepoint");
        let conn = self.conn.lock();
        conn.execute_batch(&format!("RELEASE SAVEPOINT {}", name))
            .map_err(|e| ClinicError::Query(format!("Failed to release savepoint: {}", e)))
    }
}

/// Savepoint names are interpolated into SQL, so only identifiers are allowed
fn validate_savepoint_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ClinicError::Query(format!(
            "Invalid savepoint name: '{}'",
            name
        )))
    }
}

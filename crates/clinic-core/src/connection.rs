//! Connection trait and transaction handling
//!
//! All storage access is synchronous: the form engine runs on a single
//! event-driven thread and blocks on every read and write.

use crate::{QueryResult, Result, SavepointSupport, SchemaIntrospection, StatementResult, Value};

/// A database connection
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute several statements separated by semicolons, without parameters
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Begin a transaction
    fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Get schema introspection interface if supported
    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// A database transaction
///
/// Every transaction supports savepoints; the session uses them to give
/// nested dialogs their own unit of work inside the outer transaction.
pub trait Transaction: SavepointSupport {
    /// Commit the transaction
    fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    fn rollback(self: Box<Self>) -> Result<()>;

    /// Execute a query within the transaction
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute a statement within the transaction
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;
}

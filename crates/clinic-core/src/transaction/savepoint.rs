//! Savepoint support for database transactions
//!
//! Savepoints are named points within a transaction that can be rolled back
//! to without aborting the entire transaction.

use crate::Result;

/// A savepoint within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    /// The name of the savepoint
    name: String,
}

impl Savepoint {
    /// Create a new savepoint with the given name.
    ///
    /// Names should be plain identifiers (alphanumeric and underscores).
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name of the savepoint for the given nesting depth (1-based)
    pub fn for_depth(depth: usize) -> Self {
        Self::new(format!("clinic_scope_{}", depth))
    }

    /// Get the name of the savepoint.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trait for transactions that support savepoints.
///
/// # Example
/// ```ignore
/// let tx = conn.begin_transaction()?;
/// tx.execute("INSERT INTO Client VALUES (1, 'Alice')", &[])?;
///
/// let sp = tx.savepoint("before_bob")?;
/// tx.execute("INSERT INTO Client VALUES (2, 'Bob')", &[])?;
///
/// // Undo Bob's insert only
/// tx.rollback_to_savepoint(sp.name())?;
/// tx.release_savepoint(sp.name())?;
/// tx.commit()?;
/// ```
pub trait SavepointSupport: Send + Sync {
    /// Create a savepoint with the given name.
    fn savepoint(&self, name: &str) -> Result<Savepoint>;

    /// Rollback to a previously created savepoint.
    ///
    /// All changes made after the savepoint was created are undone. The
    /// savepoint itself remains valid until released.
    fn rollback_to_savepoint(&self, name: &str) -> Result<()>;

    /// Release (delete) a savepoint, keeping its changes in the transaction.
    fn release_savepoint(&self, name: &str) -> Result<()>;
}

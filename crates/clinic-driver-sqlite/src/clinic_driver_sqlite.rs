//! SQLite storage driver implementation

mod connection;
mod schema;
mod transaction;

pub use connection::{DatabaseFileInfo, SqliteConnection};
pub use transaction::SqliteTransaction;

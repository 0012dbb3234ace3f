//! Clinic Core - Core abstractions and traits for the clinic form engine
//!
//! This crate provides the fundamental traits and types that all other
//! clinic crates depend on. It defines:
//!
//! - `Connection` - Trait for synchronous database connections
//! - `Transaction` - Trait for an open transaction with savepoint support
//! - `SchemaIntrospection` - Trait for reflecting a live schema
//! - Common types like `Value`, `Row`, `QueryResult`, etc.

mod connection;
mod error;
mod schema;
pub mod transaction;
mod types;

pub use connection::*;
pub use error::*;
pub use schema::*;
pub use transaction::*;
pub use types::*;

//! Clinic Query - Records and sessions for the form engine
//!
//! A [`Session`] owns exactly one open transaction at a time and acts as the
//! unit of work for in-memory [`Record`]s: new records are registered with
//! `add`, edited ones with `track`, and both are written on `commit`.
//! Nested scopes backed by savepoints isolate the work of stacked dialogs.

mod record;
mod session;
mod sql;

pub use record::{Record, RecordId, RecordRef, RecordState};
pub use session::{FetchedRow, ScopeHandle, Session};

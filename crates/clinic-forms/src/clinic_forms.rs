//! Clinic Forms - Metadata-driven forms for the clinic application
//!
//! Forms are synthesized from table descriptors:
//! - [`Input`]s validate typed text per column, including uniqueness
//! - [`TableView`] lists, filters, pages and selects rows
//! - Modes ([`Edit`], [`Add`], [`View`], [`Choose`], [`AddOrChoose`],
//!   [`OptionallyAddMultiple`]) compose into an element tree whose validity
//!   is aggregated bottom-up
//! - [`Form`] owns the tree and gates submission on its validity
//! - [`Dialog`] wraps a form in a session scope

mod dialog;
mod element;
mod events;
mod form;
mod input;
mod modes;
mod table_view;
mod validation;

pub use dialog::{open_dialogs, Dialog, DialogState};
pub use element::{
    aggregate_validity, find, find_mut, invalidate_path, walk, Element, ElementId, ValidityCache,
};
pub use events::FormEvent;
pub use form::Form;
pub use input::{display_text, Input, Inputs, SharedText};
pub use modes::{Add, AddOrChoose, Choose, Edit, Mode, OptionallyAddMultiple, Overrides, View};
pub use table_view::{Selection, TableView, ViewOptions};
pub use validation::{validate_column, validate_format, Validation, ValidationState};

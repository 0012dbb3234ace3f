//! Form modes
//!
//! A mode is a composable unit of form behaviour with its own validity and a
//! `perform` action run on submit.

mod add;
mod edit;
mod multiple;
mod view;

use clinic_core::Result;
use clinic_query::{RecordRef, Session};
use clinic_schema::humanize;
use indexmap::IndexMap;

pub use add::Add;
pub use edit::Edit;
pub use multiple::OptionallyAddMultiple;
pub use view::{AddOrChoose, Choose, View};

use crate::element::Element;
use crate::input::SharedText;

/// Column name to the text cell a mirrored input follows
pub type Overrides = IndexMap<String, SharedText>;

pub trait Mode: Element {
    /// Apply the mode's edits to its records
    fn perform(&self, session: &mut Session) -> Result<()>;

    fn as_element(&self) -> &dyn Element;

    fn as_element_mut(&mut self) -> &mut dyn Element;

    /// Records created by this mode and everything below it
    fn owned_records(&self) -> Vec<RecordRef> {
        Vec::new()
    }
}

/// "Add client", "Edit client type", ...
pub(crate) fn mode_title(verb: &str, table: &str) -> String {
    humanize(&format!("{} {}", verb, table))
}

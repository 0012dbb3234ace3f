//! Events emitted by forms

use crate::element::ElementId;

/// Events emitted by a [`Form`](crate::Form)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// Aggregate validity flipped; submit is enabled iff `valid`
    ValidityChanged { valid: bool },

    /// Every mode was performed and the session committed
    Submitted {
        /// Transaction open after the commit
        transaction_id: u64,
    },

    /// A dependant row was appended to a repeatable editor
    RowAdded { editor: ElementId, row: ElementId },

    /// The most recent dependant row was removed
    RowRemoved { editor: ElementId, row: ElementId },
}

//! Modal dialogs around forms
//!
//! Dialogs stack: opening one while another is open runs the new dialog in a
//! nested session scope, so closing it discards only its own work and
//! submitting it merges that work into the enclosing dialog's transaction.
//! Dropping an open dialog abandons its scope, which the session then rolls
//! back like a close.

use std::cell::Cell;

use clinic_core::{ClinicError, Result};
use clinic_query::{ScopeHandle, Session};

use crate::form::Form;

thread_local! {
    static OPEN_DIALOGS: Cell<usize> = const { Cell::new(0) };
}

/// Number of dialogs currently open on this thread
pub fn open_dialogs() -> usize {
    OPEN_DIALOGS.with(Cell::get)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Open,
    Submitted,
    Closed,
}

#[derive(Debug)]
pub struct Dialog {
    title: String,
    form: Form,
    nested: bool,
    scope: ScopeHandle,
    state: DialogState,
}

impl Dialog {
    /// Open a dialog around the form built by `build`.
    ///
    /// When another dialog is open a nested scope is begun first and `build`
    /// registers its records there. A failing `build` rolls that work back.
    #[must_use = "dropping a dialog discards its work"]
    pub fn open(
        session: &mut Session,
        title: &str,
        build: impl FnOnce(&mut Session) -> Result<Form>,
    ) -> Result<Self> {
        let nested = open_dialogs() > 0;
        if nested {
            session.begin_nested()?;
        }

        let form = match build(session) {
            Ok(form) => form,
            Err(err) => {
                tracing::warn!(title, error = %err, "dialog could not be built");
                session.rollback()?;
                return Err(err);
            }
        };

        OPEN_DIALOGS.with(|open| open.set(open.get() + 1));
        tracing::debug!(title, nested, depth = session.depth(), "dialog opened");
        Ok(Self {
            title: title.to_string(),
            form,
            nested,
            scope: session.scope_handle(),
            state: DialogState::Open,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    pub fn is_open(&self) -> bool {
        self.state == DialogState::Open
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ClinicError::Other(format!(
                "Dialog '{}' is already {:?}",
                self.title, self.state
            )))
        }
    }

    fn finish(&mut self, state: DialogState) {
        self.state = state;
        OPEN_DIALOGS.with(|open| open.set(open.get().saturating_sub(1)));
    }

    /// Submit the form and close.
    ///
    /// An invalid form leaves the dialog open.
    pub fn submit(&mut self, session: &mut Session) -> Result<()> {
        self.ensure_open()?;
        self.form.submit(session)?;
        self.finish(DialogState::Submitted);
        tracing::debug!(title = %self.title, "dialog submitted");
        Ok(())
    }

    /// Close without submitting, discarding the dialog's work
    pub fn close(&mut self, session: &mut Session) -> Result<()> {
        self.ensure_open()?;
        self.finish(DialogState::Closed);
        tracing::debug!(title = %self.title, nested = self.nested, "dialog closed");
        session.rollback()
    }
}

impl Drop for Dialog {
    fn drop(&mut self) {
        if self.is_open() {
            tracing::warn!(
                title = %self.title,
                depth = self.scope.depth(),
                "dialog dropped while open"
            );
            self.scope.abandon();
            self.finish(DialogState::Closed);
        }
    }
}

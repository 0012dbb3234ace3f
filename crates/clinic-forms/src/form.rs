//! The root of a mode tree

use clinic_core::{ClinicError, Result, Value};
use clinic_query::{RecordRef, Session};
use uuid::Uuid;

use crate::dialog::Dialog;
use crate::element::{
    aggregate_validity, find, find_mut, invalidate_path, walk, Element, ElementId, ValidityCache,
};
use crate::events::FormEvent;
use crate::input::Input;
use crate::modes::Mode;
use crate::table_view::TableView;
use crate::validation::ValidationState;

/// A composition of modes that is submitted as one unit.
///
/// Every mutation goes through the form by element id, so the validity
/// caches on the path to the changed element are cleared and the submit
/// flag recomputed.
pub struct Form {
    id: ElementId,
    cache: ValidityCache,
    modes: Vec<Box<dyn Mode>>,
    submit_enabled: bool,
    events: Vec<FormEvent>,
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("title", &self.title())
            .field("submit_enabled", &self.submit_enabled)
            .finish()
    }
}

impl Form {
    pub fn new(modes: Vec<Box<dyn Mode>>) -> Self {
        let mut form = Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            modes,
            submit_enabled: false,
            events: Vec::new(),
        };
        form.submit_enabled = aggregate_validity(&form);
        form
    }

    pub fn modes(&self) -> &[Box<dyn Mode>] {
        &self.modes
    }

    pub fn is_valid(&self) -> bool {
        aggregate_validity(self)
    }

    pub fn submit_enabled(&self) -> bool {
        self.submit_enabled
    }

    /// Events emitted since the last call
    pub fn take_events(&mut self) -> Vec<FormEvent> {
        std::mem::take(&mut self.events)
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut dyn Element> {
        find_mut(self, id).ok_or_else(|| ClinicError::NotFound(format!("Element {}", id)))
    }

    fn table_view_mut(&mut self, id: ElementId) -> Result<&mut TableView> {
        self.element_mut(id)?
            .as_table_view_mut()
            .ok_or_else(|| ClinicError::NotFound(format!("Table view {}", id)))
    }

    /// Clear the caches on the path to `id` and recompute the submit flag
    fn revalidate(&mut self, id: ElementId) {
        invalidate_path(self, id);
        let valid = aggregate_validity(self);
        if valid != self.submit_enabled {
            self.submit_enabled = valid;
            tracing::debug!(form = %self.title(), valid, "form validity changed");
            self.events.push(FormEvent::ValidityChanged { valid });
        }
    }

    /// Edit the text of an input
    pub fn set_text(
        &mut self,
        session: &Session,
        input: ElementId,
        text: &str,
    ) -> Result<ValidationState> {
        let outcome = self
            .element_mut(input)?
            .as_input_mut()
            .ok_or_else(|| ClinicError::NotFound(format!("Input {}", input)))?
            .set_text(session, text);
        self.revalidate(input);
        outcome
    }

    /// Click a visible row of a listing; returns whether the selection changed
    pub fn click_row(&mut self, view: ElementId, visible_index: usize) -> Result<bool> {
        let changed = self.table_view_mut(view)?.click(visible_index);
        self.revalidate(view);
        Ok(changed)
    }

    /// A click outside any row; only re-triggers validation
    pub fn click_empty(&mut self, view: ElementId) {
        self.revalidate(view);
    }

    pub fn select_key(&mut self, view: ElementId, key: &Value) -> Result<bool> {
        let found = self.table_view_mut(view)?.select_key(key);
        self.revalidate(view);
        Ok(found)
    }

    pub fn set_filter(&mut self, view: ElementId, column: usize, text: &str) -> Result<()> {
        self.table_view_mut(view)?.set_filter(column, text);
        Ok(())
    }

    pub fn next_page(&mut self, view: ElementId) -> Result<bool> {
        Ok(self.table_view_mut(view)?.next_page())
    }

    pub fn previous_page(&mut self, view: ElementId) -> Result<bool> {
        Ok(self.table_view_mut(view)?.previous_page())
    }

    /// Reload a listing's rows
    pub fn refresh_view(&mut self, session: &Session, view: ElementId) -> Result<()> {
        self.table_view_mut(view)?.load(session)?;
        self.revalidate(view);
        Ok(())
    }

    /// Append a row to a repeatable dependant editor
    pub fn add_row(&mut self, session: &mut Session, editor: ElementId) -> Result<ElementId> {
        let row = self
            .element_mut(editor)?
            .as_multiple_mut()
            .ok_or_else(|| ClinicError::NotFound(format!("Repeatable editor {}", editor)))?
            .add_row(session)?;
        self.revalidate(editor);
        self.events.push(FormEvent::RowAdded { editor, row });
        Ok(row)
    }

    /// Remove the most recent row of a repeatable dependant editor
    pub fn remove_row(
        &mut self,
        session: &mut Session,
        editor: ElementId,
    ) -> Result<Option<ElementId>> {
        let row = self
            .element_mut(editor)?
            .as_multiple_mut()
            .ok_or_else(|| ClinicError::NotFound(format!("Repeatable editor {}", editor)))?
            .remove_row(session);
        if let Some(row) = row {
            self.revalidate(editor);
            self.events.push(FormEvent::RowRemoved { editor, row });
        }
        Ok(row)
    }

    /// Open the nested Add dialog of an AddOrChoose
    pub fn open_add_dialog(&mut self, session: &mut Session, chooser: ElementId) -> Result<Dialog> {
        self.element_mut(chooser)?
            .as_add_or_choose_mut()
            .ok_or_else(|| ClinicError::NotFound(format!("Add-or-choose {}", chooser)))?
            .open_add_dialog(session)
    }

    /// Open an Edit dialog for the row selected in a View
    pub fn open_editor(&self, session: &mut Session, view: ElementId) -> Result<Option<Dialog>> {
        find(self, view)
            .and_then(|e| e.as_view())
            .ok_or_else(|| ClinicError::NotFound(format!("View {}", view)))?
            .open_editor(session)
    }

    pub fn input(&self, id: ElementId) -> Option<&Input> {
        find(self, id).and_then(|e| e.as_input())
    }

    pub fn table_view(&self, id: ElementId) -> Option<&TableView> {
        find(self, id).and_then(|e| e.as_table_view())
    }

    /// Id of the first input editing `table.column`
    pub fn find_input(&self, table: &str, column: &str) -> Option<ElementId> {
        self.find_inputs(table, column).into_iter().next()
    }

    /// Ids of every input editing `table.column`, in tree order
    pub fn find_inputs(&self, table: &str, column: &str) -> Vec<ElementId> {
        let mut found = Vec::new();
        walk(self, &mut |element| {
            if let Some(input) = element.as_input() {
                if input.column().table == table && input.column().name == column {
                    found.push(element.id());
                }
            }
        });
        found
    }

    /// Id of the first element whose title matches, e.g. "Choose client type"
    pub fn find_titled(&self, title: &str) -> Option<ElementId> {
        let mut found = None;
        walk(self, &mut |element| {
            if found.is_none() && element.title() == title {
                found = Some(element.id());
            }
        });
        found
    }

    /// Records created by the form's modes
    pub fn records(&self) -> Vec<RecordRef> {
        self.modes.iter().flat_map(|m| m.owned_records()).collect()
    }

    /// Perform every mode in order and commit the session once
    #[tracing::instrument(skip_all, fields(form = %self.title()))]
    pub fn submit(&mut self, session: &mut Session) -> Result<()> {
        if !self.is_valid() {
            return Err(ClinicError::Validation(format!(
                "Form '{}' has invalid fields",
                self.title()
            )));
        }
        for mode in &self.modes {
            mode.perform(session)?;
        }
        session.commit()?;
        let transaction_id = session.transaction_id();
        tracing::debug!(transaction_id, "form submitted");
        self.events.push(FormEvent::Submitted { transaction_id });
        Ok(())
    }
}

impl Element for Form {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        self.modes
            .iter()
            .map(|m| m.title())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn children(&self) -> Vec<&dyn Element> {
        self.modes.iter().map(|m| m.as_element()).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Element> {
        self.modes.iter_mut().map(|m| m.as_element_mut()).collect()
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }
}

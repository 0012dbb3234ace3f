//! Listing modes: View, Choose and AddOrChoose

use clinic_core::{Result, Value};
use clinic_query::{RecordRef, Session};
use uuid::Uuid;

use super::{mode_title, Add, Edit, Mode, Overrides};
use crate::dialog::Dialog;
use crate::element::{Element, ElementId, ValidityCache};
use crate::form::Form;
use crate::table_view::{Selection, TableView, ViewOptions};

/// Read-only listing with single selection
#[derive(Debug)]
pub struct View {
    id: ElementId,
    cache: ValidityCache,
    view: TableView,
}

impl View {
    pub fn new(session: &Session, table: &str, options: ViewOptions) -> Result<Self> {
        let mut view = TableView::new(table, options, Selection::Single);
        view.load(session)?;
        Ok(Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            view,
        })
    }

    pub fn table_view(&self) -> &TableView {
        &self.view
    }

    pub fn selected_record(&self) -> Option<RecordRef> {
        self.view.selected_record()
    }

    /// Open an Edit dialog for the selected row; `None` when nothing is selected
    pub fn open_editor(&self, session: &mut Session) -> Result<Option<Dialog>> {
        let Some(record) = self.selected_record() else {
            return Ok(None);
        };
        let table = record.borrow().table().to_string();
        let options = self.view.options();
        let dialog = Dialog::open(session, &mode_title("Edit", &table), |session| {
            let edit = Edit::new(session, record, Overrides::new(), options)?;
            Ok(Form::new(vec![Box::new(edit)]))
        })?;
        Ok(Some(dialog))
    }
}

impl Element for View {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        mode_title("View", self.view.table())
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }

    fn as_table_view(&self) -> Option<&TableView> {
        Some(&self.view)
    }

    fn as_table_view_mut(&mut self) -> Option<&mut TableView> {
        Some(&mut self.view)
    }

    fn as_view(&self) -> Option<&View> {
        Some(self)
    }
}

impl Mode for View {
    fn perform(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn as_element(&self) -> &dyn Element {
        self
    }

    fn as_element_mut(&mut self) -> &mut dyn Element {
        self
    }
}

/// Listing that is valid iff exactly one row is selected
#[derive(Debug)]
pub struct Choose {
    id: ElementId,
    cache: ValidityCache,
    view: TableView,
}

impl Choose {
    pub fn new(session: &Session, table: &str, options: ViewOptions) -> Result<Self> {
        let mut view = TableView::new(table, options, Selection::Single);
        view.load(session)?;
        Ok(Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            view,
        })
    }

    pub fn table(&self) -> &str {
        self.view.table()
    }

    pub fn table_view(&self) -> &TableView {
        &self.view
    }

    pub fn table_view_mut(&mut self) -> &mut TableView {
        &mut self.view
    }

    pub fn selected_record(&self) -> Option<RecordRef> {
        self.view.selected_record()
    }

    pub fn select_key(&mut self, key: &Value) -> bool {
        self.view.select_key(key)
    }

    /// Reload rows, keeping the selection when the row still exists
    pub fn refresh(&mut self, session: &Session) -> Result<()> {
        self.view.load(session)
    }
}

impl Element for Choose {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        mode_title("Choose", self.view.table())
    }

    fn own_validity(&self) -> bool {
        self.view.selected_count() == 1
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }

    fn as_table_view(&self) -> Option<&TableView> {
        Some(&self.view)
    }

    fn as_table_view_mut(&mut self) -> Option<&mut TableView> {
        Some(&mut self.view)
    }
}

impl Mode for Choose {
    fn perform(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn as_element(&self) -> &dyn Element {
        self
    }

    fn as_element_mut(&mut self) -> &mut dyn Element {
        self
    }
}

/// A Choose that can also add a new row through a nested dialog
#[derive(Debug)]
pub struct AddOrChoose {
    choose: Choose,
}

impl AddOrChoose {
    pub fn new(session: &Session, table: &str, options: ViewOptions) -> Result<Self> {
        Ok(Self {
            choose: Choose::new(session, table, options)?,
        })
    }

    pub fn choose(&self) -> &Choose {
        &self.choose
    }

    pub fn choose_mut(&mut self) -> &mut Choose {
        &mut self.choose
    }

    pub fn selected_record(&self) -> Option<RecordRef> {
        self.choose.selected_record()
    }

    pub fn select_key(&mut self, key: &Value) -> bool {
        self.choose.select_key(key)
    }

    /// Open an Add dialog for the listed table
    pub fn open_add_dialog(&self, session: &mut Session) -> Result<Dialog> {
        let table = self.choose.table().to_string();
        let options = self.choose.view.options();
        Dialog::open(session, &mode_title("Add", &table), |session| {
            let add = Add::new(session, &table, Overrides::new(), options)?;
            Ok(Form::new(vec![Box::new(add)]))
        })
    }

    pub fn refresh(&mut self, session: &Session) -> Result<()> {
        self.choose.refresh(session)
    }
}

impl Element for AddOrChoose {
    fn id(&self) -> ElementId {
        self.choose.id
    }

    fn title(&self) -> String {
        mode_title("Add or choose", self.choose.table())
    }

    fn own_validity(&self) -> bool {
        self.choose.own_validity()
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.choose.cache
    }

    fn as_table_view(&self) -> Option<&TableView> {
        Some(&self.choose.view)
    }

    fn as_table_view_mut(&mut self) -> Option<&mut TableView> {
        Some(&mut self.choose.view)
    }

    fn as_add_or_choose_mut(&mut self) -> Option<&mut AddOrChoose> {
        Some(self)
    }
}

impl Mode for AddOrChoose {
    fn perform(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn as_element(&self) -> &dyn Element {
        self
    }

    fn as_element_mut(&mut self) -> &mut dyn Element {
        self
    }
}

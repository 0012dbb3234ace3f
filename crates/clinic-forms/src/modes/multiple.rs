use std::rc::Rc;

use clinic_core::Result;
use clinic_query::{RecordRef, Session};
use clinic_schema::Relationship;
use uuid::Uuid;

use super::{mode_title, Add, Mode, Overrides};
use crate::element::{Element, ElementId, ValidityCache};
use crate::input::SharedText;
use crate::table_view::ViewOptions;

/// Zero or more new dependant rows whose foreign key mirrors `source`
#[derive(Debug)]
pub struct OptionallyAddMultiple {
    id: ElementId,
    cache: ValidityCache,
    relationship: Relationship,
    source: SharedText,
    options: ViewOptions,
    rows: Vec<Add>,
}

impl OptionallyAddMultiple {
    pub fn new(relationship: Relationship, source: SharedText, options: ViewOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            relationship,
            source,
            options,
            rows: Vec::new(),
        }
    }

    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    pub fn rows(&self) -> &[Add] {
        &self.rows
    }

    /// Append a new dependant row; returns its element id
    pub fn add_row(&mut self, session: &mut Session) -> Result<ElementId> {
        let mut overrides = Overrides::new();
        overrides.insert(
            self.relationship.from_column.clone(),
            Rc::clone(&self.source),
        );
        let row = Add::new(session, &self.relationship.from_table, overrides, self.options)?;
        let id = row.id();
        self.rows.push(row);
        tracing::debug!(relationship = %self.relationship, rows = self.rows.len(), "row added");
        Ok(id)
    }

    /// Drop the most recent row and forget its records; `None` when empty
    pub fn remove_row(&mut self, session: &mut Session) -> Option<ElementId> {
        let row = self.rows.pop()?;
        for record in row.owned_records() {
            session.expunge(&record);
        }
        tracing::debug!(relationship = %self.relationship, rows = self.rows.len(), "row removed");
        Some(row.id())
    }
}

impl Element for OptionallyAddMultiple {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        mode_title("Add", &self.relationship.from_table)
    }

    fn children(&self) -> Vec<&dyn Element> {
        self.rows.iter().map(|r| r as &dyn Element).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Element> {
        self.rows.iter_mut().map(|r| r as &mut dyn Element).collect()
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }

    fn as_multiple_mut(&mut self) -> Option<&mut OptionallyAddMultiple> {
        Some(self)
    }
}

impl Mode for OptionallyAddMultiple {
    fn perform(&self, session: &mut Session) -> Result<()> {
        for row in &self.rows {
            row.perform(session)?;
        }
        Ok(())
    }

    fn as_element(&self) -> &dyn Element {
        self
    }

    fn as_element_mut(&mut self) -> &mut dyn Element {
        self
    }

    fn owned_records(&self) -> Vec<RecordRef> {
        self.rows.iter().flat_map(|r| r.owned_records()).collect()
    }
}

use std::rc::Rc;

use clinic_core::Result;
use clinic_query::{Record, RecordRef, Session};
use uuid::Uuid;

use super::{mode_title, Edit, Mode, OptionallyAddMultiple, Overrides};
use crate::element::{Element, ElementId, ValidityCache};
use crate::input::Inputs;
use crate::table_view::ViewOptions;

/// Creates one record, optionally with dependant rows referencing it
#[derive(Debug)]
pub struct Add {
    id: ElementId,
    cache: ValidityCache,
    edit: Edit,
    dependants: Vec<OptionallyAddMultiple>,
}

impl Add {
    pub fn new(
        session: &mut Session,
        table: &str,
        overrides: Overrides,
        options: ViewOptions,
    ) -> Result<Self> {
        let descriptor = session.describe(table)?;
        let record = Record::new(&descriptor).into_ref();
        session.add(&record)?;

        let mut edit = Edit::new(session, record, overrides, options)?;
        edit.seed(session)?;

        let mut dependants = Vec::new();
        for relationship in descriptor.dependants() {
            let Some(source) = edit.inputs().get(&relationship.to_column) else {
                tracing::warn!(
                    relationship = %relationship,
                    "no input for the referenced column, dependant rows disabled"
                );
                continue;
            };
            dependants.push(OptionallyAddMultiple::new(
                relationship.clone(),
                source.shared_text(),
                options,
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            edit,
            dependants,
        })
    }

    pub fn record(&self) -> &RecordRef {
        self.edit.record()
    }

    pub fn edit(&self) -> &Edit {
        &self.edit
    }

    pub fn inputs(&self) -> &Inputs {
        self.edit.inputs()
    }

    pub fn dependants(&self) -> &[OptionallyAddMultiple] {
        &self.dependants
    }

    pub fn dependants_mut(&mut self) -> &mut [OptionallyAddMultiple] {
        &mut self.dependants
    }
}

impl Element for Add {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        mode_title("Add", self.edit.descriptor().name())
    }

    fn children(&self) -> Vec<&dyn Element> {
        let mut children: Vec<&dyn Element> = vec![&self.edit];
        children.extend(self.dependants.iter().map(|d| d as &dyn Element));
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Element> {
        let mut children: Vec<&mut dyn Element> = vec![&mut self.edit];
        children.extend(self.dependants.iter_mut().map(|d| d as &mut dyn Element));
        children
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }
}

impl Mode for Add {
    fn perform(&self, session: &mut Session) -> Result<()> {
        self.edit.perform(session)?;
        for dependant in &self.dependants {
            dependant.perform(session)?;
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
        let mut records = vec![Rc::clone(self.edit.record())];
        for dependant in &self.dependants {
            records.extend(dependant.owned_records());
        }
        records
    }
}

use std::rc::Rc;
use std::sync::Arc;

use clinic_core::{Result, Value};
use clinic_query::{RecordRef, Session};
use clinic_schema::{Relationship, TableDescriptor};
use uuid::Uuid;

use super::{mode_title, AddOrChoose, Mode, Overrides};
use crate::element::{Element, ElementId, ValidityCache};
use crate::input::{Input, Inputs};
use crate::table_view::ViewOptions;

/// Edits one record: an input per plain column and a chooser per foreign key.
///
/// Overridden columns get a disabled input mirroring the override's text.
#[derive(Debug)]
pub struct Edit {
    id: ElementId,
    cache: ValidityCache,
    descriptor: Arc<TableDescriptor>,
    record: RecordRef,
    inputs: Inputs,
    dependencies: Vec<(Relationship, AddOrChoose)>,
}

impl Edit {
    pub fn new(
        session: &mut Session,
        record: RecordRef,
        overrides: Overrides,
        options: ViewOptions,
    ) -> Result<Self> {
        let table = record.borrow().table().to_string();
        let descriptor = session.describe(&table)?;

        let mut inputs = Vec::new();
        let mut dependencies = Vec::new();
        for column in descriptor.columns() {
            if let Some(source) = overrides.get(&column.name) {
                inputs.push(Input::mirror(column.clone(), Rc::clone(source)));
                continue;
            }
            let relationship = descriptor
                .dependencies()
                .iter()
                .find(|r| r.from_column == column.name);
            match relationship {
                Some(relationship) => {
                    let mut chooser = AddOrChoose::new(session, &relationship.to_table, options)?;
                    let current = record.borrow().get(&column.name).clone();
                    if !current.is_null() && !chooser.select_key(&current) {
                        tracing::warn!(
                            relationship = %relationship,
                            value = %current,
                            "referenced row not found"
                        );
                    }
                    dependencies.push((relationship.clone(), chooser));
                }
                None => inputs.push(Input::for_record(column.clone(), &record)),
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            descriptor,
            record,
            inputs: Inputs::new(inputs),
            dependencies,
        })
    }

    pub fn descriptor(&self) -> &Arc<TableDescriptor> {
        &self.descriptor
    }

    pub fn record(&self) -> &RecordRef {
        &self.record
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut Inputs {
        &mut self.inputs
    }

    pub fn dependencies(&self) -> &[(Relationship, AddOrChoose)] {
        &self.dependencies
    }

    /// Seed unique integer inputs with their next free value
    pub fn seed(&mut self, session: &Session) -> Result<()> {
        for input in self.inputs.iter_mut() {
            input.seed(session)?;
        }
        Ok(())
    }
}

impl Element for Edit {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        mode_title("Edit", self.descriptor.name())
    }

    fn children(&self) -> Vec<&dyn Element> {
        let inputs = self.inputs.iter().map(|i| i as &dyn Element);
        let choosers = self.dependencies.iter().map(|(_, c)| c as &dyn Element);
        inputs.chain(choosers).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Element> {
        let inputs = self.inputs.iter_mut().map(|i| i as &mut dyn Element);
        let choosers = self
            .dependencies
            .iter_mut()
            .map(|(_, c)| c as &mut dyn Element);
        inputs.chain(choosers).collect()
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }
}

impl Mode for Edit {
    /// Copy input values and chosen keys onto the record
    fn perform(&self, session: &mut Session) -> Result<()> {
        self.inputs.set_values_for(&self.record)?;
        for (relationship, chooser) in &self.dependencies {
            let parent = chooser.selected_record();
            let key = parent
                .as_ref()
                .map(|p| p.borrow().get(&relationship.to_column).clone())
                .unwrap_or(Value::Null);
            self.record
                .borrow_mut()
                .set(&relationship.from_column, key)?;
        }
        if self.record.borrow().is_persistent() {
            session.track(&self.record)?;
        }
        Ok(())
    }

    fn as_element(&self) -> &dyn Element {
        self
    }

    fn as_element_mut(&mut self) -> &mut dyn Element {
        self
    }
}

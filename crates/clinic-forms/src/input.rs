//! Editable inputs bound to table columns

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use clinic_core::{ClinicError, Result, Value};
use clinic_query::{RecordRef, Session};
use clinic_schema::{Column, ColumnType};
use uuid::Uuid;

use crate::element::{Element, ElementId, ValidityCache};
use crate::validation::{validate_column, Validation, ValidationState};

/// Text cell shared between a source input and the inputs mirroring it
pub type SharedText = Rc<RefCell<String>>;

/// Text shown for a stored value; NULL is empty
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One editable text control bound to one column
#[derive(Debug)]
pub struct Input {
    id: ElementId,
    cache: ValidityCache,
    column: Column,
    text: SharedText,
    valid: bool,
    mirrored: bool,
    except_values: Vec<Value>,
    owner: Option<RecordRef>,
}

impl Input {
    /// An empty input for a column
    pub fn new(column: Column) -> Self {
        let valid = validate_column(&column, "", 0).is_acceptable();
        Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            column,
            text: Rc::new(RefCell::new(String::new())),
            valid,
            mirrored: false,
            except_values: Vec::new(),
            owner: None,
        }
    }

    /// An input pre-populated from a record.
    ///
    /// For unique columns the record's own value is never reported as a
    /// duplicate.
    pub fn for_record(column: Column, record: &RecordRef) -> Self {
        let value = record.borrow().get(&column.name).clone();
        let mut input = Self::new(column);
        *input.text.borrow_mut() = display_text(&value);
        input.valid = validate_column(&input.column, &input.text(), 0).is_acceptable();
        if input.column.requires_unique_values() && !value.is_null() {
            input.except_values.push(value);
        }
        input.owner = Some(Rc::clone(record));
        input
    }

    /// A disabled input whose text follows `source`; always valid
    pub fn mirror(column: Column, source: SharedText) -> Self {
        Self {
            id: Uuid::new_v4(),
            cache: ValidityCache::default(),
            column,
            text: source,
            valid: true,
            mirrored: true,
            except_values: Vec::new(),
            owner: None,
        }
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    /// The text cell, for inputs that mirror this one
    pub fn shared_text(&self) -> SharedText {
        Rc::clone(&self.text)
    }

    pub fn is_valid(&self) -> bool {
        self.mirrored || self.valid
    }

    pub fn is_enabled(&self) -> bool {
        !self.mirrored
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn except_values(&self) -> &[Value] {
        &self.except_values
    }

    /// Record excluded from uniqueness probes against pending records
    pub fn set_owner(&mut self, record: Option<RecordRef>) {
        self.owner = record;
    }

    /// Validate a candidate text: format first, then uniqueness for unique
    /// and primary-key columns
    pub fn validate(&self, session: &Session, text: &str, pos: usize) -> Result<Validation> {
        let validation = validate_column(&self.column, text, pos);
        if !validation.is_acceptable() || text.is_empty() {
            return Ok(validation);
        }

        let Some(value) = self.column.column_type.parse_text(text) else {
            return Ok(Validation::new(ValidationState::Invalid, text, pos));
        };
        if !self.column.requires_unique_values() {
            return Ok(validation);
        }
        let excepted = self
            .except_values
            .iter()
            .any(|v| v.compare(&value) == Some(Ordering::Equal));
        if excepted {
            return Ok(validation);
        }

        let taken = session.value_exists(
            &self.column.table,
            &self.column.name,
            &value,
            self.owner.as_ref(),
        )?;
        if taken {
            tracing::debug!(column = %self.column.key(), value = %value, "duplicate value");
            Ok(Validation::new(ValidationState::Intermediate, text, pos))
        } else {
            Ok(validation)
        }
    }

    /// Apply an edit.
    ///
    /// Invalid candidates are rejected and leave text and flag untouched;
    /// anything else is stored and the flag becomes `state == Acceptable`.
    pub fn set_text(&mut self, session: &Session, text: &str) -> Result<ValidationState> {
        if self.mirrored {
            return Err(ClinicError::Validation(format!(
                "Input for '{}' mirrors another input and cannot be edited",
                self.column.key()
            )));
        }
        let validation = self.validate(session, text, text.chars().count())?;
        if validation.state == ValidationState::Invalid {
            return Ok(validation.state);
        }
        *self.text.borrow_mut() = validation.text;
        self.valid = validation.state == ValidationState::Acceptable;
        self.sync_owner()?;
        Ok(validation.state)
    }

    /// Keep a pending owner's value in step with acceptable text, so that
    /// sibling records see it in uniqueness probes and maximum lookups
    fn sync_owner(&self) -> Result<()> {
        let Some(owner) = &self.owner else {
            return Ok(());
        };
        if self.mirrored || !self.valid || !owner.borrow().is_pending() {
            return Ok(());
        }
        let value = self.value()?;
        owner.borrow_mut().set(&self.column.name, value)
    }

    /// Recompute the validity flag for the current text
    pub fn revalidate(&mut self, session: &Session) -> Result<bool> {
        if !self.mirrored {
            let text = self.text();
            let pos = text.chars().count();
            self.valid = self.validate(session, &text, pos)?.is_acceptable();
        }
        Ok(self.is_valid())
    }

    /// Seed unique integer columns with one past the current maximum.
    ///
    /// Pending records count; an empty table seeds 0.
    pub fn seed(&mut self, session: &Session) -> Result<()> {
        if self.mirrored
            || self.column.column_type != ColumnType::Integer
            || !self.column.requires_unique_values()
        {
            return Ok(());
        }
        let maximum = session
            .max_value(&self.column.table, &self.column.name)?
            .as_i64()
            .unwrap_or(-1);
        let Some(next) = maximum.checked_add(1) else {
            tracing::warn!(column = %self.column.key(), "no free identifier to seed");
            return Ok(());
        };
        *self.text.borrow_mut() = next.to_string();
        self.revalidate(session)?;
        self.sync_owner()
    }

    /// Typed value of the current text
    pub fn value(&self) -> Result<Value> {
        let text = self.text();
        self.column.column_type.parse_text(&text).ok_or_else(|| {
            ClinicError::Validation(format!(
                "'{}' is not a valid value for {}",
                text,
                self.column.key()
            ))
        })
    }
}

impl Element for Input {
    fn id(&self) -> ElementId {
        self.id
    }

    fn title(&self) -> String {
        clinic_schema::humanize(&self.column.name)
    }

    fn own_validity(&self) -> bool {
        self.is_valid()
    }

    fn validity_cache(&self) -> &ValidityCache {
        &self.cache
    }

    fn as_input(&self) -> Option<&Input> {
        Some(self)
    }

    fn as_input_mut(&mut self) -> Option<&mut Input> {
        Some(self)
    }
}

/// Inputs of one record, in column order
#[derive(Debug, Default)]
pub struct Inputs {
    items: Vec<Input>,
}

impl Inputs {
    pub fn new(items: Vec<Input>) -> Self {
        Self { items }
    }

    pub fn get(&self, column: &str) -> Option<&Input> {
        self.items.iter().find(|i| i.column.name == column)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Input> {
        self.items.iter_mut().find(|i| i.column.name == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Input> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Input> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Write every input's value onto the record
    pub fn set_values_for(&self, record: &RecordRef) -> Result<()> {
        let mut record = record.borrow_mut();
        for input in &self.items {
            record.set(&input.column.name, input.value()?)?;
        }
        Ok(())
    }

    /// Load every editable input's text from the record and revalidate
    pub fn set_values_from(&mut self, session: &Session, record: &RecordRef) -> Result<()> {
        for input in self.items.iter_mut().filter(|i| !i.mirrored) {
            let value = record.borrow().get(&input.column.name).clone();
            *input.text.borrow_mut() = display_text(&value);
            input.revalidate(session)?;
        }
        Ok(())
    }
}

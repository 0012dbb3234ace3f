//! In-memory row instances

use std::cell::RefCell;
use std::rc::Rc;

use clinic_core::{ClinicError, Result, Value};
use clinic_schema::TableDescriptor;
use indexmap::IndexMap;
use uuid::Uuid;

/// Stable identity of a record for the lifetime of the process
pub type RecordId = Uuid;

/// Records are shared between the session and the forms editing them
pub type RecordRef = Rc<RefCell<Record>>;

/// Persistence state of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    /// Registered with a session but not yet written
    Pending,
    /// Stored; `key` is the primary-key value it was loaded or written with
    Persistent { key: Value },
    /// Discarded by a rollback or expunge
    Detached,
}

/// One row of one table
#[derive(Debug, Clone)]
pub struct Record {
    id: RecordId,
    table: String,
    values: IndexMap<String, Value>,
    state: RecordState,
    dirty: bool,
}

impl Record {
    /// A new pending record with every column NULL
    pub fn new(descriptor: &TableDescriptor) -> Self {
        let values = descriptor
            .columns()
            .iter()
            .map(|c| (c.name.clone(), Value::Null))
            .collect();
        Self {
            id: Uuid::new_v4(),
            table: descriptor.name().to_string(),
            values,
            state: RecordState::Pending,
            dirty: false,
        }
    }

    /// A persistent record built from stored values
    pub fn loaded(descriptor: &TableDescriptor, values: IndexMap<String, Value>) -> Self {
        let key = descriptor
            .primary_key()
            .and_then(|pk| values.get(&pk.name).cloned())
            .unwrap_or(Value::Null);
        Self {
            id: Uuid::new_v4(),
            table: descriptor.name().to_string(),
            values,
            state: RecordState::Persistent { key },
            dirty: false,
        }
    }

    pub fn into_ref(self) -> RecordRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Value of a column; NULL for unknown columns
    pub fn get(&self, column: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values.get(column).unwrap_or(NULL)
    }

    /// Set a column value, marking the record dirty when it changes
    pub fn set(&mut self, column: &str, value: Value) -> Result<()> {
        let slot = self.values.get_mut(column).ok_or_else(|| {
            ClinicError::Schema(format!("Table '{}' has no column '{}'", self.table, column))
        })?;
        if *slot != value {
            *slot = value;
            self.dirty = true;
        }
        Ok(())
    }

    /// Column values in declaration order
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn state(&self) -> &RecordState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == RecordState::Pending
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.state, RecordState::Persistent { .. })
    }

    pub fn is_detached(&self) -> bool {
        self.state == RecordState::Detached
    }

    /// Primary-key value the stored row is addressed by
    pub fn key(&self) -> Option<&Value> {
        match &self.state {
            RecordState::Persistent { key } => Some(key),
            _ => None,
        }
    }

    /// Whether values changed since the record was loaded or written
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_persistent(&mut self, key: Value) {
        self.state = RecordState::Persistent { key };
        self.dirty = false;
    }

    pub(crate) fn detach(&mut self) {
        self.state = RecordState::Detached;
    }

    /// Overwrite a value without marking the record dirty
    pub(crate) fn assign(&mut self, column: &str, value: Value) {
        if let Some(slot) = self.values.get_mut(column) {
            *slot = value;
        }
    }
}

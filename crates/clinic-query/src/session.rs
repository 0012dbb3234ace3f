//! Session: one open transaction plus a unit of work

use std::cell::Cell;
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

use clinic_core::{ClinicError, Connection, Result, Savepoint, Transaction, Value};
use clinic_schema::{SchemaRegistry, TableDescriptor};
use indexmap::IndexMap;

use crate::record::{Record, RecordRef};
use crate::sql;

/// A fetched row: the root record and its display values in
/// recursive-column order
#[derive(Debug, Clone)]
pub struct FetchedRow {
    pub record: RecordRef,
    pub display: Vec<Value>,
}

/// Records registered at one nesting depth
#[derive(Default)]
struct Scope {
    savepoint: Option<Savepoint>,
    added: Vec<RecordRef>,
    tracked: Vec<RecordRef>,
    /// Written inside this scope, discarded again if it rolls back
    flushed: Vec<RecordRef>,
}

impl Scope {
    fn contains(&self, record: &RecordRef) -> bool {
        self.added
            .iter()
            .chain(&self.tracked)
            .any(|r| Rc::ptr_eq(r, record))
    }

    fn detach_all(&self) {
        for record in self.added.iter().chain(&self.flushed) {
            let mut record = record.borrow_mut();
            if !record.is_detached() {
                record.detach();
            }
        }
    }
}

/// Lets the owner of a scope give it up without borrowing the session.
///
/// An abandoned scope, together with every scope nested in it, is rolled
/// back before the session's next change to its unit of work, and its
/// pending records stop counting in lookups right away.
#[derive(Debug, Clone)]
pub struct ScopeHandle {
    depth: usize,
    abandoned: Rc<Cell<Option<usize>>>,
}

impl ScopeHandle {
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn abandon(&self) {
        let depth = self
            .abandoned
            .get()
            .map_or(self.depth, |d| d.min(self.depth));
        self.abandoned.set(Some(depth));
    }
}

/// Database session.
///
/// Exactly one transaction is open for the whole life of the session. It is
/// replaced by a fresh one after every top-level `commit` or `rollback`, and
/// `transaction_id` counts those replacements.
pub struct Session {
    connection: Arc<dyn Connection>,
    registry: Arc<SchemaRegistry>,
    transaction: Option<Box<dyn Transaction>>,
    transaction_id: u64,
    scopes: Vec<Scope>,
    abandoned: Rc<Cell<Option<usize>>>,
}

impl Session {
    /// Open a session and its first transaction
    pub fn new(connection: Arc<dyn Connection>, registry: Arc<SchemaRegistry>) -> Result<Self> {
        let transaction = connection.begin_transaction()?;
        tracing::info!(driver = connection.driver_name(), "session opened");
        Ok(Self {
            connection,
            registry,
            transaction: Some(transaction),
            transaction_id: 1,
            scopes: vec![Scope::default()],
            abandoned: Rc::new(Cell::new(None)),
        })
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn describe(&self, table: &str) -> Result<Arc<TableDescriptor>> {
        self.registry.describe(table)
    }

    /// Counter of the open transaction
    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Number of nested scopes currently open
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Handle on the innermost scope
    pub fn scope_handle(&self) -> ScopeHandle {
        ScopeHandle {
            depth: self.depth(),
            abandoned: Rc::clone(&self.abandoned),
        }
    }

    /// Scopes not abandoned through a handle
    fn live_scopes(&self) -> &[Scope] {
        let live = self
            .abandoned
            .get()
            .map_or(self.scopes.len(), |depth| depth.min(self.scopes.len()));
        &self.scopes[..live]
    }

    /// Roll back an abandoned scope and the scopes nested in it
    fn unwind_abandoned(&mut self) -> Result<()> {
        let Some(depth) = self.abandoned.take() else {
            return Ok(());
        };
        if depth > self.depth() {
            return Ok(());
        }
        tracing::warn!(depth, current_depth = self.depth(), "rolling back abandoned scope");
        while self.depth() > depth {
            self.rollback_innermost()?;
        }
        self.rollback_innermost()
    }

    /// Whether any registered record still needs writing
    pub fn is_dirty(&self) -> bool {
        self.live_scopes().iter().any(|scope| {
            scope.added.iter().any(|r| r.borrow().is_pending())
                || scope.tracked.iter().any(|r| r.borrow().is_dirty())
        })
    }

    fn transaction(&self) -> Result<&dyn Transaction> {
        self.transaction
            .as_deref()
            .ok_or_else(|| ClinicError::Query("Session has no open transaction".into()))
    }

    fn top_scope(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    // Fetching

    /// Up to `limit` rows of `table` with every foreign column eager-loaded
    pub fn fetch(&self, table: &str, limit: usize) -> Result<Vec<FetchedRow>> {
        self.fetch_page(table, limit, 0)
    }

    #[tracing::instrument(skip(self))]
    pub fn fetch_page(&self, table: &str, limit: usize, offset: usize) -> Result<Vec<FetchedRow>> {
        let descriptor = self.describe(table)?;
        let params = [
            Value::Int64(i64::try_from(limit).unwrap_or(i64::MAX)),
            Value::Int64(i64::try_from(offset).unwrap_or(i64::MAX)),
        ];
        let result = self
            .transaction()?
            .query(&sql::select_joined(&descriptor), &params)?;

        let root_len = descriptor.columns().len();
        let rows = result
            .rows
            .iter()
            .map(|row| {
                let values = descriptor
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let raw = row.get(i).cloned().unwrap_or(Value::Null);
                        (c.name.clone(), c.column_type.coerce(raw))
                    })
                    .collect();
                let display = descriptor
                    .recursive_columns()
                    .iter()
                    .enumerate()
                    .map(|(i, d)| {
                        let raw = row.get(root_len + i).cloned().unwrap_or(Value::Null);
                        d.column.column_type.coerce(raw)
                    })
                    .collect();
                FetchedRow {
                    record: Record::loaded(&descriptor, values).into_ref(),
                    display,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(table = %table, rows = rows.len(), "fetched rows");
        Ok(rows)
    }

    /// Records matching every `(column, value)` condition
    pub fn fetch_by(&self, table: &str, conditions: &[(&str, Value)]) -> Result<Vec<RecordRef>> {
        let descriptor = self.describe(table)?;
        let mut columns = Vec::with_capacity(conditions.len());
        let mut params = Vec::with_capacity(conditions.len());
        for (column, value) in conditions {
            if descriptor.column(column).is_none() {
                return Err(ClinicError::Schema(format!(
                    "Table '{}' has no column '{}'",
                    table, column
                )));
            }
            columns.push(*column);
            params.push(value.clone());
        }

        let result = self
            .transaction()?
            .query(&sql::select_where(&descriptor, &columns), &params)?;
        Ok(result
            .rows
            .iter()
            .map(|row| {
                let values: IndexMap<String, Value> = descriptor
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let raw = row.get(i).cloned().unwrap_or(Value::Null);
                        (c.name.clone(), c.column_type.coerce(raw))
                    })
                    .collect();
                Record::loaded(&descriptor, values).into_ref()
            })
            .collect())
    }

    /// First record whose primary key equals `value`
    pub fn get_by_primary_key(&self, table: &str, value: Value) -> Result<Option<RecordRef>> {
        let descriptor = self.describe(table)?;
        let pk = descriptor.primary_key().ok_or_else(|| {
            ClinicError::Schema(format!("Table '{}' has no single primary key", table))
        })?;
        Ok(self
            .fetch_by(table, &[(pk.name.as_str(), value)])?
            .into_iter()
            .next())
    }

    /// Largest value of a column over stored rows and pending records
    pub fn max_value(&self, table: &str, column: &str) -> Result<Value> {
        let descriptor = self.describe(table)?;
        let declared = descriptor.column(column).ok_or_else(|| {
            ClinicError::Schema(format!("Table '{}' has no column '{}'", table, column))
        })?;

        let sql = format!(
            "SELECT MAX({}) FROM {}",
            sql::quote(column),
            sql::quote(table)
        );
        let result = self.transaction()?.query(&sql, &[])?;
        let stored = declared
            .column_type
            .coerce(result.scalar().cloned().unwrap_or(Value::Null));

        Ok(self
            .pending_records(table)
            .map(|r| r.borrow().get(column).clone())
            .fold(stored, |max, value| {
                if value.compare(&max) == Some(Ordering::Greater) {
                    value
                } else {
                    max
                }
            }))
    }

    /// Whether `value` already occurs in `column`, in storage or among pending
    /// records other than `owner`. NULL never collides.
    pub fn value_exists(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        owner: Option<&RecordRef>,
    ) -> Result<bool> {
        if value.is_null() {
            return Ok(false);
        }
        let descriptor = self.describe(table)?;
        if descriptor.column(column).is_none() {
            return Err(ClinicError::Schema(format!(
                "Table '{}' has no column '{}'",
                table, column
            )));
        }

        let pending_hit = self
            .pending_records(table)
            .filter(|r| owner.is_none_or(|o| !Rc::ptr_eq(o, r)))
            .any(|r| r.borrow().get(column).compare(value) == Some(Ordering::Equal));
        if pending_hit {
            return Ok(true);
        }

        let mut sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?",
            sql::quote(table),
            sql::quote(column)
        );
        let mut params = vec![value.clone()];
        let owner_key = owner.and_then(|o| o.borrow().key().cloned());
        if let (Some(key), Some(pk)) = (owner_key, descriptor.primary_key()) {
            sql.push_str(&format!(" AND {} <> ?", sql::quote(&pk.name)));
            params.push(key);
        }
        sql.push_str(" LIMIT 1");

        Ok(self.transaction()?.query(&sql, &params)?.has_rows())
    }

    fn pending_records<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a RecordRef> + 'a {
        self.live_scopes()
            .iter()
            .flat_map(|scope| scope.added.iter())
            .filter(move |r| {
                let r = r.borrow();
                r.is_pending() && r.table() == table
            })
    }

    // Unit of work

    /// Register a new record to be inserted on commit
    pub fn add(&mut self, record: &RecordRef) -> Result<()> {
        self.unwind_abandoned()?;
        if !record.borrow().is_pending() {
            return Err(ClinicError::Query(
                "Only pending records can be added to a session".into(),
            ));
        }
        if self.scopes.iter().any(|s| s.contains(record)) {
            return Ok(());
        }
        tracing::debug!(table = %record.borrow().table(), depth = self.depth(), "record added");
        self.top_scope().added.push(Rc::clone(record));
        Ok(())
    }

    /// Register a stored record to be updated on commit if it changed
    pub fn track(&mut self, record: &RecordRef) -> Result<()> {
        self.unwind_abandoned()?;
        if !record.borrow().is_persistent() {
            return Err(ClinicError::Query(
                "Only persistent records can be tracked".into(),
            ));
        }
        if self.scopes.iter().any(|s| s.contains(record)) {
            return Ok(());
        }
        self.top_scope().tracked.push(Rc::clone(record));
        Ok(())
    }

    /// Forget a record and detach it
    pub fn expunge(&mut self, record: &RecordRef) {
        for scope in &mut self.scopes {
            scope.added.retain(|r| !Rc::ptr_eq(r, record));
            scope.tracked.retain(|r| !Rc::ptr_eq(r, record));
            scope.flushed.retain(|r| !Rc::ptr_eq(r, record));
        }
        tracing::debug!(table = %record.borrow().table(), "record expunged");
        record.borrow_mut().detach();
    }

    /// Open a nested scope backed by a savepoint; returns its depth
    pub fn begin_nested(&mut self) -> Result<usize> {
        self.unwind_abandoned()?;
        let depth = self.scopes.len();
        let savepoint = self
            .transaction()?
            .savepoint(Savepoint::for_depth(depth).name())?;
        tracing::debug!(depth, savepoint = %savepoint.name(), "nested scope opened");
        self.scopes.push(Scope {
            savepoint: Some(savepoint),
            ..Scope::default()
        });
        Ok(depth)
    }

    /// Write the innermost scope.
    ///
    /// A nested scope releases its savepoint into the enclosing one. At the
    /// top level the transaction is committed and a fresh one opened.
    #[tracing::instrument(skip(self), fields(transaction_id = self.transaction_id, depth = self.depth()))]
    pub fn commit(&mut self) -> Result<()> {
        self.unwind_abandoned()?;
        self.flush()?;

        if self.depth() > 0 {
            let Some(scope) = self.scopes.pop() else {
                return Ok(());
            };
            if let Some(savepoint) = &scope.savepoint {
                self.transaction()?.release_savepoint(savepoint.name())?;
            }
            self.top_scope().flushed.extend(scope.flushed);
            tracing::debug!("nested scope committed");
            return Ok(());
        }

        let transaction = self.transaction.take().ok_or_else(|| {
            ClinicError::Query("Session has no open transaction".into())
        })?;
        transaction.commit()?;
        self.scopes = vec![Scope::default()];
        self.transaction_id += 1;
        self.transaction = Some(self.connection.begin_transaction()?);
        tracing::debug!(next_transaction_id = self.transaction_id, "session committed");
        Ok(())
    }

    /// Discard the innermost scope.
    ///
    /// Pending records of the discarded work become detached. At the top
    /// level a fresh transaction is opened afterwards.
    #[tracing::instrument(skip(self), fields(transaction_id = self.transaction_id, depth = self.depth()))]
    pub fn rollback(&mut self) -> Result<()> {
        self.unwind_abandoned()?;
        self.rollback_innermost()
    }

    fn rollback_innermost(&mut self) -> Result<()> {
        if self.depth() > 0 {
            let Some(scope) = self.scopes.pop() else {
                return Ok(());
            };
            if let Some(savepoint) = &scope.savepoint {
                let transaction = self.transaction()?;
                transaction.rollback_to_savepoint(savepoint.name())?;
                transaction.release_savepoint(savepoint.name())?;
            }
            scope.detach_all();
            tracing::debug!("nested scope rolled back");
            return Ok(());
        }

        let outcome = match self.transaction.take() {
            Some(transaction) => transaction.rollback(),
            None => Ok(()),
        };
        for scope in self.scopes.drain(..) {
            scope.detach_all();
        }
        self.scopes.push(Scope::default());
        self.transaction_id += 1;
        self.transaction = Some(self.connection.begin_transaction()?);
        tracing::debug!(next_transaction_id = self.transaction_id, "session rolled back");
        outcome
    }

    /// Roll back everything and end the session without opening a new transaction
    pub fn close(mut self) -> Result<()> {
        for scope in self.scopes.drain(..) {
            scope.detach_all();
        }
        match self.transaction.take() {
            Some(transaction) => transaction.rollback(),
            None => Ok(()),
        }
    }

    /// Write the innermost scope's pending inserts, parents first, then its
    /// changed tracked records
    fn flush(&mut self) -> Result<()> {
        let index = self.scopes.len() - 1;
        let mut inserts: Vec<RecordRef> = self.scopes[index]
            .added
            .iter()
            .filter(|r| r.borrow().is_pending())
            .cloned()
            .collect();
        inserts.sort_by_key(|r| self.registry.insertion_rank(r.borrow().table()));
        let updates: Vec<RecordRef> = self.scopes[index]
            .tracked
            .iter()
            .filter(|r| {
                let r = r.borrow();
                r.is_persistent() && r.is_dirty()
            })
            .cloned()
            .collect();

        tracing::debug!(inserts = inserts.len(), updates = updates.len(), "flushing session");
        for record in inserts {
            self.insert_record(&record)?;
            self.scopes[index].flushed.push(record);
        }
        for record in &updates {
            self.update_record(record)?;
        }

        let scope = &mut self.scopes[index];
        scope.added.retain(|r| r.borrow().is_pending());
        scope.tracked.clear();
        Ok(())
    }

    fn insert_record(&self, record: &RecordRef) -> Result<()> {
        let table = record.borrow().table().to_string();
        let descriptor = self.describe(&table)?;

        let (columns, params): (Vec<&str>, Vec<Value>) = {
            let current = record.borrow();
            descriptor
                .columns()
                .iter()
                .filter(|c| !(c.auto_increment && current.get(&c.name).is_null()))
                .map(|c| (c.name.as_str(), current.get(&c.name).clone()))
                .unzip()
        };
        let result = self
            .transaction()?
            .execute(&sql::insert(&table, &columns), &params)?;

        let mut current = record.borrow_mut();
        let key = match descriptor.primary_key() {
            Some(pk) => {
                if current.get(&pk.name).is_null() {
                    if let Some(id) = result.last_insert_id {
                        current.assign(&pk.name, Value::Int64(id));
                    }
                }
                current.get(&pk.name).clone()
            }
            None => Value::Null,
        };
        tracing::debug!(table = %table, key = %key, "inserted record");
        current.mark_persistent(key);
        Ok(())
    }

    fn update_record(&self, record: &RecordRef) -> Result<()> {
        let table = record.borrow().table().to_string();
        let descriptor = self.describe(&table)?;
        let pk = descriptor.primary_key().ok_or_else(|| {
            ClinicError::Schema(format!(
                "Cannot update a row of '{}' without a single primary key",
                table
            ))
        })?;

        let (columns, mut params): (Vec<&str>, Vec<Value>) = {
            let current = record.borrow();
            descriptor
                .columns()
                .iter()
                .map(|c| (c.name.as_str(), current.get(&c.name).clone()))
                .unzip()
        };
        let key = record.borrow().key().cloned().unwrap_or(Value::Null);
        params.push(key);
        self.transaction()?
            .execute(&sql::update(&table, &columns, &pk.name), &params)?;

        let mut current = record.borrow_mut();
        let new_key = current.get(&pk.name).clone();
        tracing::debug!(table = %table, key = %new_key, "updated record");
        current.mark_persistent(new_key);
        Ok(())
    }
}

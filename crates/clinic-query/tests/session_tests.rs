//! Session tests against an in-memory SQLite database

use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clinic_core::{Connection, Value};
use clinic_driver_sqlite::SqliteConnection;
use clinic_query::{Record, RecordState, Session};
use clinic_schema::{DdlGenerator, SchemaManifest, SchemaRegistry};
use indoc::indoc;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

const MANIFEST: &str = indoc! {r#"
    [[table]]
    name = "ClientType"
    column = [
        { name = "Id", type = "integer", primary_key = true, auto_increment = true },
        { name = "Name", type = "text", nullable = false, unique = true },
    ]

    [[table]]
    name = "Client"
    column = [
        { name = "Id", type = "integer", primary_key = true, auto_increment = true },
        { name = "Name", type = "text", nullable = false },
        { name = "BirthDate", type = "date" },
        { name = "TypeId", type = "integer", nullable = false, references = { table = "ClientType" } },
    ]
"#};

fn initialize_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("clinic_query=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

struct Clinic {
    conn: Arc<SqliteConnection>,
    session: Session,
}

impl Clinic {
    fn count(&self, table: &str) -> i64 {
        self.conn
            .query(&format!("SELECT COUNT(*) FROM \"{}\"", table), &[])
            .unwrap()
            .scalar()
            .and_then(Value::as_i64)
            .unwrap()
    }
}

#[fixture]
fn clinic() -> Clinic {
    initialize_logging();
    let manifest = SchemaManifest::from_toml_str(MANIFEST).unwrap();
    let conn = Arc::new(SqliteConnection::open_in_memory().unwrap());
    for statement in DdlGenerator::new().create_tables(&manifest) {
        conn.execute_batch(&statement).unwrap();
    }
    conn.execute_batch(indoc! {"
        INSERT INTO ClientType (Id, Name) VALUES (1, 'Private'), (2, 'Insured');
        INSERT INTO Client (Id, Name, BirthDate, TypeId) VALUES
            (5, 'Ann', '1990-04-01', 2),
            (7, 'Bob', NULL, 1);
    "})
    .unwrap();

    let registry = Arc::new(SchemaRegistry::from_manifest(&manifest).unwrap());
    let session = Session::new(conn.clone(), registry).unwrap();
    Clinic { conn, session }
}

fn new_client(session: &Session, id: i64, name: &str, type_id: i64) -> Result<clinic_query::RecordRef> {
    let descriptor = session.describe("Client")?;
    let record = Record::new(&descriptor).into_ref();
    {
        let mut r = record.borrow_mut();
        r.set("Id", Value::Int64(id))?;
        r.set("Name", Value::from(name))?;
        r.set("TypeId", Value::Int64(type_id))?;
    }
    Ok(record)
}

#[rstest]
fn test_fetch_eager_loads_foreign_columns(clinic: Clinic) -> Result<()> {
    let rows = clinic.session.fetch("Client", 10)?;
    assert_eq!(rows.len(), 2);

    let ann = &rows[0];
    assert_eq!(
        ann.display,
        vec![
            Value::Int64(5),
            Value::from("Ann"),
            Value::Date(NaiveDate::from_ymd_opt(1990, 4, 1).context("date")?),
            Value::Int64(2),
            Value::from("Insured"),
        ]
    );
    let record = ann.record.borrow();
    assert_eq!(record.get("TypeId"), &Value::Int64(2));
    assert_eq!(record.state(), &RecordState::Persistent { key: Value::Int64(5) });
    Ok(())
}

#[rstest]
fn test_fetch_page_and_limit(clinic: Clinic) -> Result<()> {
    assert_eq!(clinic.session.fetch("Client", 1)?.len(), 1);
    let second = clinic.session.fetch_page("Client", 1, 1)?;
    assert_eq!(second[0].record.borrow().get("Name"), &Value::from("Bob"));
    assert!(clinic.session.fetch_page("Client", 10, 5)?.is_empty());
    Ok(())
}

#[rstest]
fn test_fetch_by_and_primary_key(clinic: Clinic) -> Result<()> {
    let insured = clinic
        .session
        .fetch_by("Client", &[("TypeId", Value::Int64(2))])?;
    assert_eq!(insured.len(), 1);
    assert_eq!(clinic.session.fetch_by("Client", &[])?.len(), 2);
    assert!(clinic.session.fetch_by("Client", &[("Nope", Value::Null)]).is_err());

    let bob = clinic
        .session
        .get_by_primary_key("Client", Value::Int64(7))?
        .context("Bob should exist")?;
    assert_eq!(bob.borrow().get("Name"), &Value::from("Bob"));
    assert!(clinic.session.get_by_primary_key("Client", Value::Int64(99))?.is_none());
    Ok(())
}

#[rstest]
fn test_max_value_includes_pending(mut clinic: Clinic) -> Result<()> {
    assert_eq!(clinic.session.max_value("Client", "Id")?, Value::Int64(7));

    let record = new_client(&clinic.session, 12, "Cleo", 1)?;
    clinic.session.add(&record)?;
    assert_eq!(clinic.session.max_value("Client", "Id")?, Value::Int64(12));
    Ok(())
}

#[rstest]
fn test_value_exists(mut clinic: Clinic) -> Result<()> {
    let session = &mut clinic.session;
    assert!(session.value_exists("ClientType", "Name", &Value::from("Private"), None)?);
    assert!(!session.value_exists("ClientType", "Name", &Value::from("Staff"), None)?);
    assert!(!session.value_exists("ClientType", "Name", &Value::Null, None)?);

    let stored = session
        .get_by_primary_key("ClientType", Value::Int64(1))?
        .context("type 1")?;
    assert!(!session.value_exists("ClientType", "Name", &Value::from("Private"), Some(&stored))?);

    let record = new_client(session, 8, "Dan", 1)?;
    session.add(&record)?;
    assert!(session.value_exists("Client", "Id", &Value::Int64(8), None)?);
    assert!(!session.value_exists("Client", "Id", &Value::Int64(8), Some(&record))?);
    Ok(())
}

#[rstest]
fn test_commit_writes_and_replaces_transaction(mut clinic: Clinic) -> Result<()> {
    let before = clinic.session.transaction_id();
    let record = new_client(&clinic.session, 8, "Dan", 1)?;
    clinic.session.add(&record)?;
    assert!(clinic.session.is_dirty());

    clinic.session.commit()?;

    assert_eq!(clinic.session.transaction_id(), before + 1);
    assert!(clinic.session.has_transaction());
    assert!(!clinic.session.is_dirty());
    assert_eq!(record.borrow().key(), Some(&Value::Int64(8)));
    assert_eq!(clinic.count("Client"), 3);
    Ok(())
}

#[rstest]
fn test_commit_orders_parents_first(mut clinic: Clinic) -> Result<()> {
    let session = &mut clinic.session;
    let client = new_client(session, 9, "Eve", 3)?;
    session.add(&client)?;

    let type_descriptor = session.describe("ClientType")?;
    let client_type = Record::new(&type_descriptor).into_ref();
    client_type.borrow_mut().set("Id", Value::Int64(3))?;
    client_type.borrow_mut().set("Name", Value::from("Staff"))?;
    session.add(&client_type)?;

    session.commit()?;
    assert_eq!(clinic.count("ClientType"), 3);
    assert_eq!(clinic.count("Client"), 3);
    Ok(())
}

#[rstest]
fn test_auto_increment_key_assigned_on_insert(mut clinic: Clinic) -> Result<()> {
    let descriptor = clinic.session.describe("ClientType")?;
    let record = Record::new(&descriptor).into_ref();
    record.borrow_mut().set("Name", Value::from("Staff"))?;
    clinic.session.add(&record)?;
    clinic.session.commit()?;

    assert_eq!(record.borrow().get("Id"), &Value::Int64(3));
    assert_eq!(record.borrow().key(), Some(&Value::Int64(3)));
    Ok(())
}

#[rstest]
fn test_rollback_detaches_pending(mut clinic: Clinic) -> Result<()> {
    let before = clinic.session.transaction_id();
    let record = new_client(&clinic.session, 8, "Dan", 1)?;
    clinic.session.add(&record)?;

    clinic.session.rollback()?;

    assert_eq!(clinic.session.transaction_id(), before + 1);
    assert!(clinic.session.has_transaction());
    assert!(record.borrow().is_detached());
    assert_eq!(clinic.count("Client"), 2);
    Ok(())
}

#[rstest]
fn test_tracked_record_is_updated(mut clinic: Clinic) -> Result<()> {
    let bob = clinic
        .session
        .get_by_primary_key("Client", Value::Int64(7))?
        .context("Bob")?;
    clinic.session.track(&bob)?;
    bob.borrow_mut().set("Name", Value::from("Robert"))?;
    clinic.session.commit()?;

    let reloaded = clinic
        .session
        .get_by_primary_key("Client", Value::Int64(7))?
        .context("Bob again")?;
    assert_eq!(reloaded.borrow().get("Name"), &Value::from("Robert"));
    Ok(())
}

#[rstest]
fn test_nested_scope_rollback_keeps_outer_work(mut clinic: Clinic) -> Result<()> {
    let outer = new_client(&clinic.session, 8, "Dan", 1)?;
    clinic.session.add(&outer)?;

    assert_eq!(clinic.session.begin_nested()?, 1);
    let inner = new_client(&clinic.session, 9, "Eve", 1)?;
    clinic.session.add(&inner)?;
    let transaction_id = clinic.session.transaction_id();
    clinic.session.rollback()?;

    assert_eq!(clinic.session.depth(), 0);
    assert_eq!(clinic.session.transaction_id(), transaction_id);
    assert!(inner.borrow().is_detached());
    assert!(outer.borrow().is_pending());

    clinic.session.commit()?;
    assert_eq!(clinic.count("Client"), 3);
    Ok(())
}

#[rstest]
fn test_nested_scope_commit_joins_outer_transaction(mut clinic: Clinic) -> Result<()> {
    clinic.session.begin_nested()?;
    let inner = new_client(&clinic.session, 9, "Eve", 1)?;
    clinic.session.add(&inner)?;
    clinic.session.commit()?;

    assert!(inner.borrow().is_persistent());
    assert_eq!(clinic.count("Client"), 3);

    clinic.session.rollback()?;
    assert!(inner.borrow().is_detached());
    assert_eq!(clinic.count("Client"), 2);
    Ok(())
}

#[rstest]
fn test_expunge_forgets_record(mut clinic: Clinic) -> Result<()> {
    let record = new_client(&clinic.session, 8, "Dan", 1)?;
    clinic.session.add(&record)?;
    clinic.session.expunge(&record);

    assert!(record.borrow().is_detached());
    assert!(!clinic.session.is_dirty());
    clinic.session.commit()?;
    assert_eq!(clinic.count("Client"), 2);
    Ok(())
}

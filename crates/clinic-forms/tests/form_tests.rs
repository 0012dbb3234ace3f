//! Form, mode and dialog tests against an in-memory SQLite database

use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use clinic_core::{ClinicError, Connection, Value};
use clinic_driver_sqlite::SqliteConnection;
use clinic_forms::{
    open_dialogs, Add, AddOrChoose, Choose, DialogState, Edit, Element, Form, FormEvent,
    Overrides, Selection, TableView, ValidationState, View, ViewOptions,
};
use clinic_query::Session;
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
                    .add_directive("clinic_forms=debug".parse().unwrap()),
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

    fn client_name(&self, id: i64) -> Option<Value> {
        self.conn
            .query("SELECT Name FROM Client WHERE Id = ?", &[Value::Int64(id)])
            .unwrap()
            .scalar()
            .cloned()
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

fn add_form(session: &mut Session, table: &str) -> clinic_core::Result<Form> {
    let add = Add::new(session, table, Overrides::new(), ViewOptions::default())?;
    Ok(Form::new(vec![Box::new(add)]))
}

#[rstest]
fn test_add_seeds_next_primary_key(mut clinic: Clinic) -> Result<()> {
    let form = add_form(&mut clinic.session, "Client")?;
    let id = form.find_input("Client", "Id").context("id input")?;
    assert_eq!(form.input(id).context("input")?.text(), "8");
    assert_eq!(form.title(), "Add client");
    Ok(())
}

#[rstest]
fn test_submit_follows_every_leaf(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "Client")?;
    let name = form.find_input("Client", "Name").context("name input")?;
    let chooser = form
        .find_titled("Add or choose client type")
        .context("chooser")?;
    assert!(!form.submit_enabled());

    form.set_text(&clinic.session, name, "Carla")?;
    assert!(!form.submit_enabled());

    assert!(form.click_row(chooser, 0)?);
    assert!(form.submit_enabled());

    // clearing a required input disables submit again
    assert_eq!(
        form.set_text(&clinic.session, name, "")?,
        ValidationState::Intermediate
    );
    assert!(!form.submit_enabled());
    form.set_text(&clinic.session, name, "Carla")?;
    assert!(form.submit_enabled());

    assert_eq!(
        form.take_events(),
        vec![
            FormEvent::ValidityChanged { valid: true },
            FormEvent::ValidityChanged { valid: false },
            FormEvent::ValidityChanged { valid: true },
        ]
    );
    Ok(())
}

#[rstest]
fn test_invalid_text_is_rejected(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "Client")?;
    let birth_date = form.find_input("Client", "BirthDate").context("date input")?;

    assert_eq!(
        form.set_text(&clinic.session, birth_date, "1990-0")?,
        ValidationState::Intermediate
    );
    assert_eq!(
        form.set_text(&clinic.session, birth_date, "1990-0x")?,
        ValidationState::Invalid
    );
    assert_eq!(form.input(birth_date).context("input")?.text(), "1990-0");
    assert!(!form.input(birth_date).context("input")?.is_valid());
    Ok(())
}

#[rstest]
fn test_submit_invalid_form_fails(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "Client")?;
    let err = form.submit(&mut clinic.session).unwrap_err();
    assert!(matches!(err, ClinicError::Validation(_)));
    assert_eq!(clinic.session.transaction_id(), 1);
    Ok(())
}

#[rstest]
fn test_submit_commits_once(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "Client")?;
    let name = form.find_input("Client", "Name").context("name input")?;
    let chooser = form
        .find_titled("Add or choose client type")
        .context("chooser")?;
    form.set_text(&clinic.session, name, "Carla")?;
    assert!(form.select_key(chooser, &Value::Int64(2))?);
    form.take_events();

    form.submit(&mut clinic.session)?;

    assert_eq!(clinic.session.transaction_id(), 2);
    assert_eq!(
        form.take_events(),
        vec![FormEvent::Submitted { transaction_id: 2 }]
    );
    assert_eq!(clinic.count("Client"), 3);
    assert_eq!(clinic.client_name(8), Some(Value::from("Carla")));
    let stored = clinic.session.fetch_by("Client", &[("Id", Value::Int64(8))])?;
    assert_eq!(stored[0].borrow().get("TypeId"), &Value::Int64(2));
    Ok(())
}

#[rstest]
fn test_add_remove_add_leaves_one_row(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "ClientType")?;
    let rows = form.find_titled("Add client").context("dependant editor")?;

    let first = form.add_row(&mut clinic.session, rows)?;
    let removed = form.remove_row(&mut clinic.session, rows)?;
    assert_eq!(removed, Some(first));
    let second = form.add_row(&mut clinic.session, rows)?;

    assert_eq!(
        form.take_events(),
        vec![
            FormEvent::RowAdded { editor: rows, row: first },
            FormEvent::RowRemoved { editor: rows, row: first },
            FormEvent::RowAdded { editor: rows, row: second },
        ]
    );
    assert_eq!(form.find_inputs("Client", "Name").len(), 1);
    assert_eq!(form.records().len(), 2);
    Ok(())
}

#[rstest]
fn test_remove_row_on_empty_editor(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "ClientType")?;
    let rows = form.find_titled("Add client").context("dependant editor")?;
    assert_eq!(form.remove_row(&mut clinic.session, rows)?, None);
    assert!(form.take_events().is_empty());
    Ok(())
}

#[rstest]
fn test_dependant_rows_follow_parent(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "ClientType")?;
    let type_name = form.find_input("ClientType", "Name").context("type name")?;
    let rows = form.find_titled("Add client").context("dependant editor")?;
    form.set_text(&clinic.session, type_name, "Corporate")?;
    assert!(form.submit_enabled());

    form.add_row(&mut clinic.session, rows)?;
    form.add_row(&mut clinic.session, rows)?;
    // new rows start with an empty required name
    assert!(!form.submit_enabled());

    let ids: Vec<String> = form
        .find_inputs("Client", "Id")
        .into_iter()
        .filter_map(|id| form.input(id).map(|i| i.text()))
        .collect();
    assert_eq!(ids, vec!["8".to_string(), "9".to_string()]);

    for (i, name) in form.find_inputs("Client", "Name").into_iter().enumerate() {
        form.set_text(&clinic.session, name, &format!("Employee {}", i))?;
    }
    let type_ids = form.find_inputs("Client", "TypeId");
    let mirrored = form.input(type_ids[0]).context("mirrored input")?;
    assert!(mirrored.is_mirrored());
    assert_eq!(mirrored.text(), "3");
    assert!(form.submit_enabled());

    form.submit(&mut clinic.session)?;
    assert_eq!(clinic.count("ClientType"), 3);
    assert_eq!(clinic.count("Client"), 4);
    let employees = clinic.session.fetch_by("Client", &[("TypeId", Value::Int64(3))])?;
    assert_eq!(employees.len(), 2);
    Ok(())
}

#[rstest]
fn test_choose_select_then_deselect(clinic: Clinic) -> Result<()> {
    let choose = Choose::new(&clinic.session, "ClientType", ViewOptions::default())?;
    let mut form = Form::new(vec![Box::new(choose)]);
    let view = form.find_titled("Choose client type").context("choose")?;
    assert!(!form.is_valid());

    form.click_row(view, 1)?;
    assert!(form.is_valid());
    form.click_empty(view);
    assert!(form.is_valid());

    form.click_row(view, 1)?;
    assert!(!form.is_valid());
    assert!(!form.submit_enabled());

    // a click past the last row changes nothing
    assert!(!form.click_row(view, 5)?);
    let err = form.click_row(uuid_of_nothing(), 0).unwrap_err();
    assert!(matches!(err, ClinicError::NotFound(_)));
    Ok(())
}

fn uuid_of_nothing() -> clinic_forms::ElementId {
    clinic_forms::ElementId::nil()
}

#[rstest]
fn test_unique_input_excludes_own_value(mut clinic: Clinic) -> Result<()> {
    let record = clinic
        .session
        .get_by_primary_key("ClientType", Value::Int64(1))?
        .context("client type 1")?;
    let edit = Edit::new(&mut clinic.session, record, Overrides::new(), ViewOptions::default())?;
    let mut form = Form::new(vec![Box::new(edit)]);
    let name = form.find_input("ClientType", "Name").context("name input")?;
    assert!(form.submit_enabled());

    assert_eq!(
        form.set_text(&clinic.session, name, "Insured")?,
        ValidationState::Intermediate
    );
    assert!(!form.submit_enabled());
    assert_eq!(
        form.set_text(&clinic.session, name, "Private")?,
        ValidationState::Acceptable
    );
    assert_eq!(
        form.set_text(&clinic.session, name, "Self-pay")?,
        ValidationState::Acceptable
    );

    form.submit(&mut clinic.session)?;
    let stored = clinic
        .session
        .get_by_primary_key("ClientType", Value::Int64(1))?
        .context("client type 1")?;
    assert_eq!(stored.borrow().get("Name"), &Value::from("Self-pay"));
    Ok(())
}

#[rstest]
fn test_edit_preselects_current_parent(mut clinic: Clinic) -> Result<()> {
    let record = clinic
        .session
        .get_by_primary_key("Client", Value::Int64(5))?
        .context("client 5")?;
    let edit = Edit::new(&mut clinic.session, record, Overrides::new(), ViewOptions::default())?;
    let (_, chooser) = &edit.dependencies()[0];
    let selected = chooser.selected_record().context("selected type")?;
    assert_eq!(selected.borrow().get("Name"), &Value::from("Insured"));
    assert_eq!(edit.inputs().len(), 3);
    Ok(())
}

#[rstest]
fn test_view_opens_editor(mut clinic: Clinic) -> Result<()> {
    let view = View::new(&clinic.session, "Client", ViewOptions::default())?;
    let mut form = Form::new(vec![Box::new(view)]);
    let listing = form.find_titled("View client").context("view")?;
    assert!(form.open_editor(&mut clinic.session, listing)?.is_none());

    form.click_row(listing, 0)?;
    let mut dialog = form
        .open_editor(&mut clinic.session, listing)?
        .context("editor dialog")?;
    assert_eq!(dialog.title(), "Edit client");
    assert!(!dialog.is_nested());
    assert!(dialog.form().submit_enabled());

    let name = dialog
        .form()
        .find_input("Client", "Name")
        .context("name input")?;
    dialog.form_mut().set_text(&clinic.session, name, "Anne")?;
    dialog.submit(&mut clinic.session)?;

    assert_eq!(dialog.state(), DialogState::Submitted);
    assert_eq!(open_dialogs(), 0);
    assert_eq!(clinic.client_name(5), Some(Value::from("Anne")));
    assert_eq!(clinic.session.transaction_id(), 2);
    Ok(())
}

#[rstest]
fn test_nested_dialog_close_keeps_outer_work(mut clinic: Clinic) -> Result<()> {
    let mut outer = clinic_forms::Dialog::open(&mut clinic.session, "Add client", |s| {
        add_form(s, "Client")
    })?;
    let chooser = outer
        .form()
        .find_titled("Add or choose client type")
        .context("chooser")?;

    let mut inner = outer
        .form_mut()
        .open_add_dialog(&mut clinic.session, chooser)?;
    assert!(inner.is_nested());
    assert_eq!(open_dialogs(), 2);
    assert_eq!(clinic.session.depth(), 1);
    inner.close(&mut clinic.session)?;

    assert_eq!(open_dialogs(), 1);
    assert_eq!(clinic.session.depth(), 0);
    assert!(outer.is_open());
    assert!(outer.form().records()[0].borrow().is_pending());
    outer.close(&mut clinic.session)?;
    assert_eq!(open_dialogs(), 0);
    Ok(())
}

#[rstest]
fn test_nested_dialog_submit_then_outer_close(mut clinic: Clinic) -> Result<()> {
    let mut outer = clinic_forms::Dialog::open(&mut clinic.session, "Add client", |s| {
        add_form(s, "Client")
    })?;
    let chooser = outer
        .form()
        .find_titled("Add or choose client type")
        .context("chooser")?;

    let mut inner = outer
        .form_mut()
        .open_add_dialog(&mut clinic.session, chooser)?;
    let type_name = inner
        .form()
        .find_input("ClientType", "Name")
        .context("type name")?;
    inner
        .form_mut()
        .set_text(&clinic.session, type_name, "Corporate")?;
    inner.submit(&mut clinic.session)?;
    assert_eq!(clinic.session.transaction_id(), 1);
    assert_eq!(clinic.count("ClientType"), 3);

    outer.form_mut().refresh_view(&clinic.session, chooser)?;
    let listed = outer.form().table_view(chooser).context("listing")?;
    assert_eq!(listed.rows().len(), 3);

    outer.close(&mut clinic.session)?;
    assert_eq!(outer.state(), DialogState::Closed);
    assert_eq!(clinic.count("ClientType"), 2);
    assert_eq!(clinic.session.transaction_id(), 2);
    Ok(())
}

#[rstest]
fn test_dropped_nested_dialog_is_rolled_back(mut clinic: Clinic) -> Result<()> {
    let mut outer = clinic_forms::Dialog::open(&mut clinic.session, "Add client", |s| {
        add_form(s, "Client")
    })?;
    let chooser = outer
        .form()
        .find_titled("Add or choose client type")
        .context("chooser")?;

    let inner = outer
        .form_mut()
        .open_add_dialog(&mut clinic.session, chooser)?;
    let abandoned = inner.form().records()[0].clone();
    drop(inner);
    assert_eq!(open_dialogs(), 1);

    let name = outer
        .form()
        .find_input("Client", "Name")
        .context("name input")?;
    outer.form_mut().set_text(&clinic.session, name, "Carl")?;
    assert!(outer.form_mut().click_row(chooser, 0)?);
    assert!(outer.form().submit_enabled());

    outer.submit(&mut clinic.session)?;
    assert!(abandoned.borrow().is_detached());
    assert_eq!(clinic.session.depth(), 0);
    assert_eq!(clinic.session.transaction_id(), 2);
    assert_eq!(clinic.count("ClientType"), 2);
    assert_eq!(clinic.client_name(8), Some(Value::from("Carl")));
    Ok(())
}

#[rstest]
fn test_integer_out_of_range_is_rejected(mut clinic: Clinic) -> Result<()> {
    let mut form = add_form(&mut clinic.session, "Client")?;
    let id = form.find_input("Client", "Id").context("id input")?;
    let valid_before = form.is_valid();

    assert_eq!(
        form.set_text(&clinic.session, id, "99999999999999999999")?,
        ValidationState::Invalid
    );
    assert_eq!(form.input(id).context("input")?.text(), "8");
    assert_eq!(form.is_valid(), valid_before);
    assert_eq!(form.take_events(), vec![]);
    Ok(())
}

#[rstest]
fn test_seed_stops_at_largest_identifier(mut clinic: Clinic) -> Result<()> {
    clinic
        .conn
        .execute_batch("INSERT INTO ClientType (Id, Name) VALUES (9223372036854775807, 'Last')")?;
    let form = add_form(&mut clinic.session, "ClientType")?;
    let id = form.find_input("ClientType", "Id").context("id input")?;
    assert_eq!(form.input(id).context("input")?.text(), "");
    Ok(())
}

#[rstest]
fn test_add_or_choose_refresh_keeps_selection(clinic: Clinic) -> Result<()> {
    let mut chooser = AddOrChoose::new(&clinic.session, "ClientType", ViewOptions::default())?;
    assert!(chooser.select_key(&Value::Int64(2)));
    chooser.refresh(&clinic.session)?;
    let selected = chooser.selected_record().context("selection")?;
    assert_eq!(selected.borrow().get("Name"), &Value::from("Insured"));
    Ok(())
}

#[rstest]
fn test_table_view_filter_paging_selection(clinic: Clinic) -> Result<()> {
    let options = ViewOptions {
        page_size: 1,
        ..ViewOptions::default()
    };
    let mut view = TableView::new("Client", options, Selection::Multiple);
    view.load(&clinic.session)?;
    assert_eq!(
        view.labels(),
        [
            "Client id",
            "Client name",
            "Client birth date",
            "Client type id",
            "Client type name",
        ]
    );
    assert_eq!(view.page_count(), 2);

    assert!(view.click(0));
    assert!(view.next_page());
    assert!(!view.next_page());
    assert!(view.click(0));
    assert_eq!(view.selected_count(), 2);

    view.set_filter(1, "BOB");
    assert_eq!(view.page(), 0);
    assert_eq!(view.filtered_rows().len(), 1);
    assert!(view.is_selected(view.visible_rows()[0]));

    // filtering never drops a selection
    view.set_filter(1, "");
    let names: Vec<Value> = view
        .selected_records()
        .iter()
        .map(|r| r.borrow().get("Name").clone())
        .collect();
    assert_eq!(names, vec![Value::from("Ann"), Value::from("Bob")]);

    assert!(!view.previous_page());
    view.set_filter(4, "insured");
    assert_eq!(view.filtered_rows().len(), 1);
    Ok(())
}

#[rstest]
fn test_table_view_case_sensitive_filter(clinic: Clinic) -> Result<()> {
    let options = ViewOptions {
        case_sensitive: true,
        ..ViewOptions::default()
    };
    let mut view = TableView::new("ClientType", options, Selection::None);
    view.load(&clinic.session)?;
    view.set_filter(1, "private");
    assert!(view.visible_rows().is_empty());
    assert_eq!(view.page_count(), 1);
    view.set_filter(1, "Private");
    assert_eq!(view.visible_rows().len(), 1);
    assert!(!view.click(0));
    Ok(())
}

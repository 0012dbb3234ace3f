//! Application state: one database, one registry, one session

use std::sync::Arc;

use anyhow::{Context, Result};
use clinic_core::{Connection, Value};
use clinic_driver_sqlite::SqliteConnection;
use clinic_forms::{Add, Dialog, Form, Overrides, View, ViewOptions};
use clinic_query::Session;
use clinic_schema::{humanize, DdlGenerator, SchemaManifest, SchemaRegistry};
use clinic_settings::{ClinicSettings, DatabaseSettings, SchemaSource};

/// Schema shipped with the application
pub const BUNDLED_MANIFEST: &str = include_str!("../assets/clinic_schema.toml");

/// Row count and relationship summary of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOverview {
    pub title: String,
    pub rows: i64,
    pub dependencies: usize,
    pub dependants: usize,
}

pub struct ClinicApp {
    settings: ClinicSettings,
    manifest: SchemaManifest,
    connection: Arc<SqliteConnection>,
    registry: Arc<SchemaRegistry>,
    session: Session,
}

/// The configured manifest, or the bundled one
fn load_manifest(
    database: &DatabaseSettings,
    connection: &SqliteConnection,
) -> Result<SchemaManifest> {
    match (database.source, &database.manifest_path) {
        (SchemaSource::Reflect, _) => SchemaManifest::from_introspection(connection)
            .context("Failed to reflect the database schema"),
        (SchemaSource::Manifest, Some(path)) => SchemaManifest::from_path(path)
            .with_context(|| format!("Failed to load schema manifest {:?}", path)),
        (SchemaSource::Manifest, None) => {
            SchemaManifest::from_toml_str(BUNDLED_MANIFEST).context("Bundled manifest is invalid")
        }
    }
}

impl ClinicApp {
    /// Open the database, resolve the schema and start a session
    #[tracing::instrument(skip_all, fields(database = %settings.database.path.display()))]
    pub fn bootstrap(settings: ClinicSettings) -> Result<Self> {
        let path = &settings.database.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let connection = Arc::new(
            SqliteConnection::open(&path.to_string_lossy())
                .with_context(|| format!("Failed to open database {:?}", path))?,
        );

        let manifest = load_manifest(&settings.database, &connection)?;
        if settings.database.bootstrap && settings.database.source == SchemaSource::Manifest {
            for statement in DdlGenerator::new().create_tables(&manifest) {
                connection
                    .execute_batch(&statement)
                    .with_context(|| format!("Failed to bootstrap schema:\n{}", statement))?;
            }
            tracing::info!(tables = manifest.tables.len(), "schema bootstrapped");
        }

        let registry = Arc::new(
            SchemaRegistry::from_manifest(&manifest).context("Failed to resolve the schema")?,
        );
        let session = Session::new(connection.clone(), registry.clone())?;
        tracing::info!(tables = registry.len(), "clinic started");

        Ok(Self {
            settings,
            manifest,
            connection,
            registry,
            session,
        })
    }

    pub fn settings(&self) -> &ClinicSettings {
        &self.settings
    }

    pub fn manifest(&self) -> &SchemaManifest {
        &self.manifest
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn view_options(&self) -> ViewOptions {
        let views = &self.settings.views;
        ViewOptions {
            page_size: views.page_size,
            fetch_limit: views.fetch_limit,
            case_sensitive: views.case_sensitive_search,
        }
    }

    /// One entry per table, parents first
    pub fn overview(&self) -> Result<Vec<TableOverview>> {
        let mut overview = Vec::new();
        for name in self.registry.insertion_order() {
            let descriptor = self.registry.describe(name)?;
            let rows = self
                .connection
                .query(&format!("SELECT COUNT(*) FROM \"{}\"", name), &[])
                .with_context(|| format!("Failed to count rows of {}", name))?
                .scalar()
                .and_then(Value::as_i64)
                .unwrap_or(0);
            overview.push(TableOverview {
                title: descriptor.title(),
                rows,
                dependencies: descriptor.dependencies().len(),
                dependants: descriptor.dependants().len(),
            });
        }
        Ok(overview)
    }

    /// Top-level Add dialog for a table
    pub fn open_add_dialog(&mut self, table: &str) -> Result<Dialog> {
        let options = self.view_options();
        let title = humanize(&format!("Add {}", self.registry.describe(table)?.name()));
        Dialog::open(&mut self.session, &title, |session| {
            let add = Add::new(session, table, Overrides::new(), options)?;
            Ok(Form::new(vec![Box::new(add)]))
        })
        .with_context(|| format!("Failed to open the add dialog for {}", table))
    }

    /// Listing form for a table
    pub fn view_form(&self, table: &str) -> Result<Form> {
        let view = View::new(&self.session, table, self.view_options())?;
        Ok(Form::new(vec![Box::new(view)]))
    }

    /// Roll back unsaved work and close the session
    pub fn shutdown(self) -> Result<()> {
        if self.session.is_dirty() {
            tracing::warn!("discarding unsaved changes on shutdown");
        }
        self.session.close()?;
        tracing::info!("clinic stopped");
        Ok(())
    }
}

//! Statically declared schema manifest
//!
//! A manifest lists every table the engine knows about, in declaration order.
//! It is either parsed from TOML or reflected from a live database, and is
//! resolved exactly once into a [`SchemaRegistry`](crate::SchemaRegistry).

use std::collections::HashSet;
use std::path::Path;

use clinic_core::{ClinicError, Result, SchemaIntrospection};
use serde::{Deserialize, Serialize};

use crate::column::ColumnType;

/// The full schema: tables in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaManifest {
    #[serde(rename = "table", default)]
    pub tables: Vec<TableDef>,
}

/// One declared table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(rename = "column", default)]
    pub columns: Vec<ColumnDef>,
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ReferenceDef>,
}

fn default_nullable() -> bool {
    true
}

/// Foreign-key target of a column.
///
/// When `column` is omitted the target table's primary key is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDef {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            references: None,
        }
    }

    /// Mark as an auto-incrementing integer primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = self.column_type == ColumnType::Integer;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(ReferenceDef {
            table: table.into(),
            column: None,
        });
        self
    }
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Name of the single primary-key column, if the table has exactly one
    pub fn primary_key(&self) -> Option<&str> {
        let mut keys = self.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(column), None) => Some(&column.name),
            _ => None,
        }
    }

    /// Tables this table references through its foreign keys
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|r| r.table.as_str()))
    }
}

impl SchemaManifest {
    pub fn new(tables: Vec<TableDef>) -> Self {
        Self { tables }
    }

    /// Parse a TOML manifest
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let manifest: SchemaManifest = toml::from_str(source)
            .map_err(|e| ClinicError::Configuration(format!("Invalid schema manifest: {}", e)))?;
        tracing::debug!(tables = manifest.tables.len(), "parsed schema manifest");
        Ok(manifest)
    }

    /// Read and parse a TOML manifest file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading schema manifest");
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ClinicError::Other(format!("Failed to serialize manifest: {}", e)))
    }

    /// Reflect a live database into a manifest
    #[tracing::instrument(skip(introspection))]
    pub fn from_introspection(introspection: &dyn SchemaIntrospection) -> Result<Self> {
        let mut tables = Vec::new();
        for table in introspection.list_tables()? {
            let columns = introspection
                .get_columns(&table.name)?
                .into_iter()
                .map(|info| ColumnDef {
                    column_type: ColumnType::from_sql_type(&info.data_type),
                    nullable: info.nullable,
                    unique: info.is_unique,
                    primary_key: info.is_primary_key,
                    auto_increment: info.is_auto_increment,
                    references: info.foreign_key.map(|fk| ReferenceDef {
                        table: fk.table,
                        column: (!fk.column.is_empty()).then_some(fk.column),
                    }),
                    name: info.name,
                })
                .collect();
            tables.push(TableDef::new(table.name, columns));
        }
        tracing::info!(tables = tables.len(), "reflected schema manifest");
        Ok(Self { tables })
    }

    /// Look up a table definition by name
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Table names ordered parents first.
    ///
    /// Depth-first post-order over foreign-key dependencies, visiting tables
    /// and their references in declaration order. Edges that close a cycle
    /// are ignored, so every table appears exactly once.
    pub fn insertion_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.tables.len());
        let mut done: HashSet<&str> = HashSet::new();
        let mut visiting: HashSet<&str> = HashSet::new();

        for table in &self.tables {
            self.visit(table, &mut visiting, &mut done, &mut order);
        }
        order
    }

    fn visit<'a>(
        &'a self,
        table: &'a TableDef,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if done.contains(table.name.as_str()) || !visiting.insert(table.name.as_str()) {
            return;
        }
        for parent in table.referenced_tables() {
            if let Some(parent) = self.table(parent) {
                self.visit(parent, visiting, done, order);
            }
        }
        visiting.remove(table.name.as_str());
        done.insert(table.name.as_str());
        order.push(table.name.clone());
    }
}

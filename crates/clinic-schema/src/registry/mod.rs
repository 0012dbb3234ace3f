//! Schema registry
//!
//! Resolves a [`SchemaManifest`] into one [`TableDescriptor`] per table. The
//! registry is the only owner of descriptors; `describe` hands out shared
//! references, so two lookups of the same table yield the same instance.

mod descriptor;


use std::collections::HashSet;
use std::sync::Arc;

use clinic_core::{ClinicError, Result};
use indexmap::IndexMap;

pub use descriptor::{DisplayColumn, JoinStep, Relationship, TableDescriptor, ROOT_ALIAS};

use crate::column::{Column, ColumnKey};
use crate::manifest::{SchemaManifest, TableDef};

/// Arena of resolved table descriptors keyed by table name
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: IndexMap<String, Arc<TableDescriptor>>,
    insertion_order: Vec<String>,
}

impl SchemaRegistry {
    /// Resolve every table of the manifest.
    ///
    /// Fails on duplicate tables or columns and on references to unknown
    /// tables or columns.
    #[tracing::instrument(skip(manifest), fields(tables = manifest.tables.len()))]
    pub fn from_manifest(manifest: &SchemaManifest) -> Result<Self> {
        let columns = resolve_columns(manifest)?;

        let mut dependencies: IndexMap<String, Vec<Relationship>> = IndexMap::new();
        for (table, cols) in &columns {
            let rels = cols.iter().filter_map(relationship).collect();
            dependencies.insert(table.clone(), rels);
        }

        let mut tables = IndexMap::new();
        for (name, cols) in &columns {
            let mut expansion = Expansion::new(&columns);
            let mut path = vec![name.clone()];
            expansion.expand(name, ROOT_ALIAS, &mut path);

            let dependants = dependencies
                .values()
                .flatten()
                .filter(|rel| &rel.to_table == name)
                .cloned()
                .collect();

            let native_count = cols.iter().filter(|c| !c.is_foreign_key()).count();
            let descriptor = TableDescriptor {
                name: name.clone(),
                columns: cols.clone(),
                recursive: expansion.display,
                native_count,
                joins: expansion.joins,
                dependencies: dependencies.get(name).cloned().unwrap_or_default(),
                dependants,
                cyclic_references: expansion.cyclic,
            };
            tracing::debug!(
                table = %name,
                columns = descriptor.columns.len(),
                joins = descriptor.joins.len(),
                "resolved table descriptor"
            );
            tables.insert(name.clone(), Arc::new(descriptor));
        }

        let insertion_order = manifest.insertion_order();
        tracing::info!(tables = tables.len(), "schema registry ready");
        Ok(Self {
            tables,
            insertion_order,
        })
    }

    /// Descriptor for a table; repeated calls return the same instance
    pub fn describe(&self, table: &str) -> Result<Arc<TableDescriptor>> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("Table '{}' is not in the schema", table)))
    }

    /// All descriptors in manifest order
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDescriptor>> {
        self.tables.values()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table names ordered parents first
    pub fn insertion_order(&self) -> &[String] {
        &self.insertion_order
    }

    /// Position of a table in the insertion order
    pub fn insertion_rank(&self, table: &str) -> usize {
        self.insertion_order
            .iter()
            .position(|t| t == table)
            .unwrap_or(usize::MAX)
    }
}

fn relationship(column: &Column) -> Option<Relationship> {
    column.references.as_ref().map(|target| Relationship {
        from_table: column.table.clone(),
        from_column: column.name.clone(),
        to_table: target.table.clone(),
        to_column: target.column.clone(),
    })
}

/// Validate the manifest and turn its definitions into columns
fn resolve_columns(manifest: &SchemaManifest) -> Result<IndexMap<String, Vec<Column>>> {
    let mut seen = HashSet::new();
    for table in &manifest.tables {
        if !seen.insert(table.name.as_str()) {
            return Err(ClinicError::Schema(format!(
                "Table '{}' is declared more than once",
                table.name
            )));
        }
    }

    let mut resolved = IndexMap::new();
    for table in &manifest.tables {
        let mut names = HashSet::new();
        let mut columns = Vec::with_capacity(table.columns.len());
        for def in &table.columns {
            if !names.insert(def.name.as_str()) {
                return Err(ClinicError::Schema(format!(
                    "Column '{}.{}' is declared more than once",
                    table.name, def.name
                )));
            }
            let references = match &def.references {
                Some(reference) => Some(resolve_reference(
                    manifest,
                    table,
                    &def.name,
                    &reference.table,
                    reference.column.as_deref(),
                )?),
                None => None,
            };
            columns.push(Column {
                table: table.name.clone(),
                name: def.name.clone(),
                column_type: def.column_type,
                nullable: def.nullable && !def.primary_key,
                unique: def.unique,
                primary_key: def.primary_key,
                auto_increment: def.auto_increment,
                references,
            });
        }
        resolved.insert(table.name.clone(), columns);
    }
    Ok(resolved)
}

fn resolve_reference(
    manifest: &SchemaManifest,
    owner: &TableDef,
    column: &str,
    target_table: &str,
    target_column: Option<&str>,
) -> Result<ColumnKey> {
    let target = manifest.table(target_table).ok_or_else(|| {
        ClinicError::Schema(format!(
            "Column '{}.{}' references unknown table '{}'",
            owner.name, column, target_table
        ))
    })?;

    let target_column = match target_column {
        Some(name) => name,
        None => target.primary_key().ok_or_else(|| {
            ClinicError::Schema(format!(
                "Column '{}.{}' references '{}', which has no single-column primary key",
                owner.name, column, target_table
            ))
        })?,
    };

    if !target.columns.iter().any(|c| c.name == target_column) {
        return Err(ClinicError::Schema(format!(
            "Column '{}.{}' references unknown column '{}.{}'",
            owner.name, column, target_table, target_column
        )));
    }
    Ok(ColumnKey::new(target_table, target_column))
}

/// Depth-first expansion of foreign columns for one root table
struct Expansion<'a> {
    columns: &'a IndexMap<String, Vec<Column>>,
    display: Vec<DisplayColumn>,
    joins: Vec<JoinStep>,
    cyclic: Vec<Relationship>,
}

impl<'a> Expansion<'a> {
    fn new(columns: &'a IndexMap<String, Vec<Column>>) -> Self {
        Self {
            columns,
            display: Vec::new(),
            joins: Vec::new(),
            cyclic: Vec::new(),
        }
    }

    /// Emit `table`'s native columns, then recurse through its foreign keys.
    ///
    /// `path` holds the tables on the current join chain; a foreign key back
    /// into the chain is shown as its raw key and not joined.
    fn expand(&mut self, table: &str, alias: &str, path: &mut Vec<String>) {
        let Some(columns) = self.columns.get(table) else {
            return;
        };

        for column in columns.iter().filter(|c| !c.is_foreign_key()) {
            self.display.push(DisplayColumn {
                alias: alias.to_string(),
                column: column.clone(),
            });
        }

        for column in columns.iter().filter(|c| c.is_foreign_key()) {
            let Some(rel) = relationship(column) else {
                continue;
            };

            if path.contains(&rel.to_table) {
                tracing::warn!(
                    root = %path[0],
                    reference = %rel,
                    "foreign key cycle detected, showing raw key instead of joining"
                );
                if !self.cyclic.contains(&rel) {
                    self.cyclic.push(rel);
                }
                self.display.push(DisplayColumn {
                    alias: alias.to_string(),
                    column: column.clone(),
                });
                continue;
            }

            let joined_alias = format!("t{}", self.joins.len() + 1);
            self.joins.push(JoinStep {
                alias: joined_alias.clone(),
                table: rel.to_table.clone(),
                parent_alias: alias.to_string(),
                parent_column: rel.from_column.clone(),
                target_column: rel.to_column.clone(),
            });

            path.push(rel.to_table.clone());
            self.expand(&rel.to_table, &joined_alias, path);
            path.pop();
        }
    }
}

//! Schema introspection traits and types

use crate::Result;
use serde::{Deserialize, Serialize};

/// Schema introspection interface
///
/// Used once at startup to reflect a live database into a schema manifest.
pub trait SchemaIntrospection: Send + Sync {
    /// List all tables
    fn list_tables(&self) -> Result<Vec<TableInfo>>;

    /// Get columns for a table
    fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Get indexes for a table
    fn get_indexes(&self, table: &str) -> Result<Vec<IndexInfo>>;

    /// Get foreign keys for a table
    fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>>;

    /// Get primary key for a table
    fn get_primary_key(&self, table: &str) -> Result<Option<PrimaryKeyInfo>> {
        let columns: Vec<String> = self
            .get_columns(table)?
            .into_iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name)
            .collect();
        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(PrimaryKeyInfo {
                name: None,
                columns,
            }))
        }
    }
}

/// Table information (basic)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub table_type: TableType,
    pub row_count: Option<i64>,
}

/// Table type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableType {
    Table,
    View,
    System,
}

/// Column information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub ordinal: usize,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    pub is_unique: bool,
    pub foreign_key: Option<ForeignKeyRef>,
}

/// Foreign key reference (for column info)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Index information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
}

/// Foreign key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_update: ForeignKeyAction,
    pub on_delete: ForeignKeyAction,
}

/// Foreign key action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    /// Parse the textual action reported by a driver
    pub fn parse(action: &str) -> Self {
        match action.to_uppercase().as_str() {
            "CASCADE" => ForeignKeyAction::Cascade,
            "SET NULL" => ForeignKeyAction::SetNull,
            "SET DEFAULT" => ForeignKeyAction::SetDefault,
            "RESTRICT" => ForeignKeyAction::Restrict,
            _ => ForeignKeyAction::NoAction,
        }
    }
}

/// Primary key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyInfo {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

//! Resolved table descriptors

use std::collections::HashSet;

use crate::column::Column;
use crate::labels::humanize;

/// Alias of the root table in every fetch query
pub const ROOT_ALIAS: &str = "t0";

/// A foreign-key edge between two tables
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    /// Table owning the foreign key (foreign side)
    pub from_table: String,
    pub from_column: String,
    /// Referenced table (primary side)
    pub to_table: String,
    pub to_column: String,
}

impl Relationship {
    pub fn is_self_reference(&self) -> bool {
        self.from_table == self.to_table
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
    }
}

/// One LEFT JOIN of a fetch query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Alias given to the joined table
    pub alias: String,
    /// Joined table
    pub table: String,
    /// Alias of the table owning the foreign key
    pub parent_alias: String,
    /// Foreign-key column on the parent alias
    pub parent_column: String,
    /// Referenced column on the joined table
    pub target_column: String,
}

impl JoinStep {
    /// Render as a SQLite `LEFT JOIN` clause
    pub fn to_sql(&self) -> String {
        format!(
            "LEFT JOIN \"{}\" AS {} ON {}.\"{}\" = {}.\"{}\"",
            self.table,
            self.alias,
            self.alias,
            self.target_column,
            self.parent_alias,
            self.parent_column
        )
    }
}

/// A column as it appears in a fetch query, qualified by its join alias
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayColumn {
    pub alias: String,
    pub column: Column,
}

impl DisplayColumn {
    pub fn to_sql(&self) -> String {
        format!("{}.\"{}\"", self.alias, self.column.name)
    }
}

/// Metadata for one table, resolved once by the registry
#[derive(Debug)]
pub struct TableDescriptor {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) recursive: Vec<DisplayColumn>,
    pub(crate) native_count: usize,
    pub(crate) joins: Vec<JoinStep>,
    pub(crate) dependencies: Vec<Relationship>,
    pub(crate) dependants: Vec<Relationship>,
    pub(crate) cyclic_references: Vec<Relationship>,
}

impl TableDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns without a foreign key
    pub fn native_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_foreign_key())
    }

    /// Columns reached through joins, in expansion order
    pub fn foreign_columns(&self) -> &[DisplayColumn] {
        &self.recursive[self.native_count..]
    }

    /// Native columns followed by foreign columns
    pub fn recursive_columns(&self) -> &[DisplayColumn] {
        &self.recursive
    }

    /// LEFT JOIN steps needed to load every foreign column
    pub fn join_plan(&self) -> &[JoinStep] {
        &self.joins
    }

    /// Relationships where this table owns the foreign key
    pub fn dependencies(&self) -> &[Relationship] {
        &self.dependencies
    }

    /// Relationships where another table references this one
    pub fn dependants(&self) -> &[Relationship] {
        &self.dependants
    }

    /// Foreign-key edges left unexpanded because they close a cycle
    pub fn cyclic_references(&self) -> &[Relationship] {
        &self.cyclic_references
    }

    /// The single primary-key column, if any
    pub fn primary_key(&self) -> Option<&Column> {
        let mut keys = self.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(column), None) => Some(column),
            _ => None,
        }
    }

    /// Sentence-case labels for the recursive columns.
    ///
    /// Labels carry the table name when the columns come from more than one table.
    pub fn recursive_column_labels(&self) -> Vec<String> {
        let tables: HashSet<&str> = self
            .recursive
            .iter()
            .map(|d| d.column.table.as_str())
            .collect();
        let prefixed = tables.len() > 1;

        self.recursive
            .iter()
            .map(|d| {
                if prefixed {
                    humanize(&format!("{} {}", d.column.table, d.column.name))
                } else {
                    humanize(&d.column.name)
                }
            })
            .collect()
    }

    /// Title used by forms, e.g. "Client type"
    pub fn title(&self) -> String {
        humanize(&self.name)
    }
}

//! DDL generation for bootstrapping an empty database

use crate::manifest::{SchemaManifest, TableDef};

/// Generates SQLite DDL from a schema manifest
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlGenerator;

impl DdlGenerator {
    pub fn new() -> Self {
        Self
    }

    /// `CREATE TABLE IF NOT EXISTS` statements for every table, parents first
    pub fn create_tables(&self, manifest: &SchemaManifest) -> Vec<String> {
        manifest
            .insertion_order()
            .iter()
            .filter_map(|name| manifest.table(name))
            .map(|table| self.create_table(table))
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` for one table
    pub fn create_table(&self, table: &TableDef) -> String {
        let key_count = table.columns.iter().filter(|c| c.primary_key).count();
        let mut parts: Vec<String> = Vec::new();

        for column in &table.columns {
            let mut def = format!("    {} {}", quote(&column.name), column.column_type.sql_type());
            if column.primary_key && key_count == 1 {
                def.push_str(" PRIMARY KEY");
                if column.auto_increment {
                    def.push_str(" AUTOINCREMENT");
                }
            } else if !column.nullable {
                def.push_str(" NOT NULL");
            }
            if column.unique && !column.primary_key {
                def.push_str(" UNIQUE");
            }
            parts.push(def);
        }

        if key_count > 1 {
            let keys = table
                .columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| quote(&c.name))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("    PRIMARY KEY ({})", keys));
        }

        for column in &table.columns {
            if let Some(reference) = &column.references {
                let target = reference
                    .column
                    .as_deref()
                    .map(|c| format!(" ({})", quote(c)))
                    .unwrap_or_default();
                parts.push(format!(
                    "    FOREIGN KEY ({}) REFERENCES {}{}",
                    quote(&column.name),
                    quote(&reference.table),
                    target
                ));
            }
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            quote(&table.name),
            parts.join(",\n")
        )
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::manifest::ColumnDef;
    use clinic_core::{Connection, SchemaIntrospection};
    use clinic_driver_sqlite::SqliteConnection;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn manifest() -> SchemaManifest {
        SchemaManifest::new(vec![
            TableDef::new(
                "Client",
                vec![
                    ColumnDef::new("Id", ColumnType::Integer).primary_key(),
                    ColumnDef::new("Email", ColumnType::Text).unique(),
                    ColumnDef::new("TypeId", ColumnType::Integer)
                        .not_null()
                        .references("ClientType"),
                ],
            ),
            TableDef::new(
                "ClientType",
                vec![
                    ColumnDef::new("Id", ColumnType::Integer).primary_key(),
                    ColumnDef::new("Name", ColumnType::Text).not_null(),
                ],
            ),
        ])
    }

    #[test]
    fn test_create_table_sql() {
        let manifest = manifest();
        let sql = DdlGenerator::new().create_table(manifest.table("Client").unwrap());
        assert_eq!(
            sql,
            indoc! {r#"
                CREATE TABLE IF NOT EXISTS "Client" (
                    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
                    "Email" TEXT UNIQUE,
                    "TypeId" INTEGER NOT NULL,
                    FOREIGN KEY ("TypeId") REFERENCES "ClientType"
                );"#}
        );
    }

    #[test]
    fn test_composite_primary_key() {
        let table = TableDef::new(
            "ServiceToUser",
            vec![
                ColumnDef::new("ServiceId", ColumnType::Integer).primary_key(),
                ColumnDef::new("UserId", ColumnType::Integer).primary_key(),
            ],
        );
        let sql = DdlGenerator::new().create_table(&table);
        assert!(sql.contains(r#"PRIMARY KEY ("ServiceId", "UserId")"#));
        assert!(sql.contains(r#""ServiceId" INTEGER NOT NULL"#));
    }

    #[test]
    fn test_bootstrap_then_reflect() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let original = manifest();
        for statement in DdlGenerator::new().create_tables(&original) {
            conn.execute_batch(&statement).unwrap();
        }

        let reflected = SchemaManifest::from_introspection(&conn).unwrap();
        let names: Vec<&str> = reflected.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ClientType", "Client"]);

        let client = reflected.table("Client").unwrap();
        assert_eq!(client.primary_key(), Some("Id"));
        assert!(client.columns[1].unique);
        let reference = client.columns[2].references.as_ref().unwrap();
        assert_eq!(reference.table, "ClientType");
        assert_eq!(reference.column.as_deref(), Some("Id"));

        let tables = conn.list_tables().unwrap();
        assert_eq!(tables.len(), 2);
    }
}

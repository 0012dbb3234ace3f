//! SQLite schema introspection

use clinic_core::{
    ColumnInfo, Connection, ForeignKeyAction, ForeignKeyInfo, ForeignKeyRef, IndexInfo, Result,
    SchemaIntrospection, TableInfo, TableType,
};

use crate::SqliteConnection;

impl SchemaIntrospection for SqliteConnection {
    #[tracing::instrument(skip(self))]
    fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let result = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
            &[],
        )?;

        let tables = result
            .rows
            .iter()
            .filter_map(|row| row.get(0).and_then(|v| v.as_str()).map(str::to_string))
            .map(|name| TableInfo {
                name,
                table_type: TableType::Table,
                row_count: None,
            })
            .collect();

        Ok(tables)
    }

    #[tracing::instrument(skip(self))]
    fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        tracing::trace!(table = %table, "fetching column information");
        let result = self.query(&format!("PRAGMA table_info('{}')", escape(table)), &[])?;

        let unique_columns: Vec<String> = self
            .get_indexes(table)?
            .into_iter()
            .filter(|index| index.is_unique && !index.is_primary && index.columns.len() == 1)
            .flat_map(|index| index.columns)
            .collect();
        let foreign_keys = self.get_foreign_keys(table)?;
        let primary_key_count = result
            .rows
            .iter()
            .filter(|row| row.get(5).and_then(|v| v.as_i64()).unwrap_or(0) > 0)
            .count();

        let columns = result
            .rows
            .iter()
            .map(|row| {
                let ordinal = row.get(0).and_then(|v| v.as_i64()).unwrap_or(0) as usize;
                let name = row
                    .get(1)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let data_type = row
                    .get(2)
                    .and_then(|v| v.as_str())
                    .unwrap_or("TEXT")
                    .to_string();
                let nullable = row.get(3).and_then(|v| v.as_i64()).unwrap_or(0) == 0;
                let default_value = row.get(4).and_then(|v| {
                    if v.is_null() {
                        None
                    } else {
                        Some(v.to_string())
                    }
                });
                let is_primary_key = row.get(5).and_then(|v| v.as_i64()).unwrap_or(0) > 0;
                // Only a lone INTEGER PRIMARY KEY aliases the rowid
                let is_auto_increment = is_primary_key
                    && primary_key_count == 1
                    && data_type.eq_ignore_ascii_case("INTEGER");
                let foreign_key = foreign_keys
                    .iter()
                    .find(|fk| fk.columns.len() == 1 && fk.columns[0] == name)
                    .map(|fk| ForeignKeyRef {
                        table: fk.referenced_table.clone(),
                        column: fk.referenced_columns.first().cloned().unwrap_or_default(),
                    });

                ColumnInfo {
                    is_unique: unique_columns.contains(&name),
                    name,
                    ordinal,
                    data_type,
                    nullable: nullable && !is_primary_key,
                    default_value,
                    is_primary_key,
                    is_auto_increment,
                    foreign_key,
                }
            })
            .collect();

        Ok(columns)
    }

    #[tracing::instrument(skip(self))]
    fn get_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        tracing::trace!(table = %table, "fetching index information");
        let result = self.query(&format!("PRAGMA index_list('{}')", escape(table)), &[])?;

        let mut indexes = Vec::new();
        for row in &result.rows {
            let name = match row.get(1).and_then(|v| v.as_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };
            let is_unique = row.get(2).and_then(|v| v.as_i64()).unwrap_or(0) == 1;
            let origin = row.get(3).and_then(|v| v.as_str()).unwrap_or("c");

            let cols_result = self.query(&format!("PRAGMA index_info('{}')", escape(&name)), &[])?;
            let columns: Vec<String> = cols_result
                .rows
                .iter()
                .filter_map(|r| r.get(2).and_then(|v| v.as_str()).map(|s| s.to_string()))
                .collect();

            indexes.push(IndexInfo {
                name,
                columns,
                is_unique,
                is_primary: origin == "pk",
            });
        }

        Ok(indexes)
    }

    #[tracing::instrument(skip(self))]
    fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        tracing::trace!(table = %table, "fetching foreign key information");
        let result = self.query(
            &format!("PRAGMA foreign_key_list('{}')", escape(table)),
            &[],
        )?;

        let fks = result
            .rows
            .iter()
            .map(|row| {
                let ref_table = row
                    .get(2)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let from_col = row
                    .get(3)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                // NULL "to" means the parent's primary key
                let to_col = row
                    .get(4)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let on_update = row.get(5).and_then(|v| v.as_str()).unwrap_or("NO ACTION");
                let on_delete = row.get(6).and_then(|v| v.as_str()).unwrap_or("NO ACTION");

                ForeignKeyInfo {
                    name: format!("fk_{}_{}_{}", table, from_col, ref_table),
                    columns: vec![from_col],
                    referenced_table: ref_table,
                    referenced_columns: vec![to_col],
                    on_update: ForeignKeyAction::parse(on_update),
                    on_delete: ForeignKeyAction::parse(on_delete),
                }
            })
            .collect::<Vec<_>>();

        let mut resolved = Vec::with_capacity(fks.len());
        for mut fk in fks {
            if fk.referenced_columns.iter().all(|c| c.is_empty()) {
                let parent_pk = self
                    .get_primary_key(&fk.referenced_table)?
                    .map(|pk| pk.columns)
                    .unwrap_or_default();
                fk.referenced_columns = parent_pk;
            }
            resolved.push(fk);
        }

        Ok(resolved)
    }

    fn get_primary_key(&self, table: &str) -> Result<Option<clinic_core::PrimaryKeyInfo>> {
        let result = self.query(&format!("PRAGMA table_info('{}')", escape(table)), &[])?;
        let mut keyed: Vec<(i64, String)> = result
            .rows
            .iter()
            .filter_map(|row| {
                let position = row.get(5).and_then(|v| v.as_i64()).unwrap_or(0);
                let name = row.get(1).and_then(|v| v.as_str())?.to_string();
                (position > 0).then_some((position, name))
            })
            .collect();
        if keyed.is_empty() {
            return Ok(None);
        }
        keyed.sort();
        Ok(Some(clinic_core::PrimaryKeyInfo {
            name: None,
            columns: keyed.into_iter().map(|(_, name)| name).collect(),
        }))
    }
}

fn escape(identifier: &str) -> String {
    identifier.replace('\'', "''")
}

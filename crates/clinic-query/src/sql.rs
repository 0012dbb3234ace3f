//! SQL text for fetches and writes

use clinic_schema::{TableDescriptor, ROOT_ALIAS};

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `SELECT` of every root column followed by every recursive column, joined
/// through the descriptor's join plan.
///
/// Takes `LIMIT ? OFFSET ?` parameters.
pub(crate) fn select_joined(descriptor: &TableDescriptor) -> String {
    let root = descriptor
        .columns()
        .iter()
        .map(|c| format!("{}.{}", ROOT_ALIAS, quote(&c.name)));
    let display = descriptor.recursive_columns().iter().map(|d| d.to_sql());
    let select = root.chain(display).collect::<Vec<_>>().join(", ");

    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        select,
        quote(descriptor.name()),
        ROOT_ALIAS
    );
    for join in descriptor.join_plan() {
        sql.push(' ');
        sql.push_str(&join.to_sql());
    }
    sql.push_str(&order_by(descriptor));
    sql.push_str(" LIMIT ? OFFSET ?");
    sql
}

/// `SELECT` of the root columns filtered by equality on `columns`
pub(crate) fn select_where(descriptor: &TableDescriptor, columns: &[&str]) -> String {
    let select = descriptor
        .columns()
        .iter()
        .map(|c| format!("{}.{}", ROOT_ALIAS, quote(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        select,
        quote(descriptor.name()),
        ROOT_ALIAS
    );
    if !columns.is_empty() {
        let conditions = columns
            .iter()
            .map(|c| format!("{}.{} = ?", ROOT_ALIAS, quote(c)))
            .collect::<Vec<_>>()
            .join(" AND ");
        sql.push_str(" WHERE ");
        sql.push_str(&conditions);
    }
    sql.push_str(&order_by(descriptor));
    sql
}

fn order_by(descriptor: &TableDescriptor) -> String {
    match descriptor.primary_key() {
        Some(pk) => format!(" ORDER BY {}.{}", ROOT_ALIAS, quote(&pk.name)),
        None => String::new(),
    }
}

pub(crate) fn insert(table: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote(table));
    }
    let names = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
    let params = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", quote(table), names, params)
}

pub(crate) fn update(table: &str, columns: &[&str], key_column: &str) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{} = ?", quote(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote(table),
        assignments,
        quote(key_column)
    )
}

//! Column model and declared value types

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clinic_core::Value;
use serde::{Deserialize, Serialize};

/// Declared value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    #[default]
    Text,
    Float,
    Date,
    Time,
    DateTime,
}

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

impl ColumnType {
    /// Map a SQL declared type to a column type.
    ///
    /// Follows SQLite affinity rules loosely; anything unrecognised is text.
    pub fn from_sql_type(declared: &str) -> Self {
        let upper = declared.to_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            ColumnType::DateTime
        } else if upper.contains("DATE") {
            ColumnType::Date
        } else if upper.contains("TIME") {
            ColumnType::Time
        } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"]
            .iter()
            .any(|t| upper.contains(t))
        {
            ColumnType::Float
        } else {
            ColumnType::Text
        }
    }

    /// SQL type name used when generating DDL
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Float => "REAL",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::DateTime => "DATETIME",
        }
    }

    /// Parse user-entered text into a typed value.
    ///
    /// Empty text is NULL. Returns `None` when the text is not a complete
    /// value of this type.
    pub fn parse_text(&self, text: &str) -> Option<Value> {
        let text = text.trim();
        if text.is_empty() {
            return Some(Value::Null);
        }
        match self {
            ColumnType::Integer => text.parse::<i64>().ok().map(Value::Int64),
            ColumnType::Float => text.parse::<f64>().ok().map(Value::Float64),
            ColumnType::Text => Some(Value::String(text.to_string())),
            ColumnType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(Value::Date),
            ColumnType::Time => TIME_FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
                .map(Value::Time),
            ColumnType::DateTime => DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(Value::DateTime),
        }
    }

    /// Coerce a raw storage value into this column's type.
    ///
    /// Values that cannot be converted are returned unchanged.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Float, Value::Int64(i)) => Value::Float64(i as f64),
            (ColumnType::Integer, Value::String(s))
            | (ColumnType::Float, Value::String(s))
            | (ColumnType::Date, Value::String(s))
            | (ColumnType::Time, Value::String(s))
            | (ColumnType::DateTime, Value::String(s)) => match self.parse_text(&s) {
                Some(parsed) if !parsed.is_null() => parsed,
                _ => Value::String(s),
            },
            (_, other) => other,
        }
    }
}

/// Identifies one column of one table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnKey {
    pub table: String,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A resolved column of a table descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Owning table
    pub table: String,
    /// Column name
    pub name: String,
    /// Declared value type
    pub column_type: ColumnType,
    /// Whether NULL values are allowed
    pub nullable: bool,
    /// Whether a unique constraint covers exactly this column
    pub unique: bool,
    /// Whether this column is (part of) the primary key
    pub primary_key: bool,
    /// Whether new values are generated by the database
    pub auto_increment: bool,
    /// Target of the foreign key on this column, if any
    pub references: Option<ColumnKey>,
}

impl Column {
    /// Whether this column carries a foreign key
    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }

    /// Whether values of this column must be unique across rows
    pub fn requires_unique_values(&self) -> bool {
        self.unique || self.primary_key
    }

    /// Key identifying this column
    pub fn key(&self) -> ColumnKey {
        ColumnKey::new(&self.table, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sql_type() {
        assert_eq!(ColumnType::from_sql_type("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::from_sql_type("bigint"), ColumnType::Integer);
        assert_eq!(ColumnType::from_sql_type("VARCHAR(50)"), ColumnType::Text);
        assert_eq!(ColumnType::from_sql_type("DATETIME"), ColumnType::DateTime);
        assert_eq!(ColumnType::from_sql_type("date"), ColumnType::Date);
        assert_eq!(ColumnType::from_sql_type("TIME"), ColumnType::Time);
        assert_eq!(ColumnType::from_sql_type("DECIMAL(10,2)"), ColumnType::Float);
        assert_eq!(ColumnType::from_sql_type("BLOB"), ColumnType::Text);
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(ColumnType::Integer.parse_text("42"), Some(Value::Int64(42)));
        assert_eq!(ColumnType::Integer.parse_text("4x"), None);
        assert_eq!(ColumnType::Integer.parse_text(""), Some(Value::Null));
        assert_eq!(
            ColumnType::Date.parse_text("2024-02-29"),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(ColumnType::Date.parse_text("2023-02-29"), None);
        assert!(matches!(
            ColumnType::Time.parse_text("09:30"),
            Some(Value::Time(_))
        ));
        assert!(matches!(
            ColumnType::DateTime.parse_text("2024-01-01T09:30:00"),
            Some(Value::DateTime(_))
        ));
    }

    #[test]
    fn test_coerce_storage_text() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            ColumnType::Date.coerce(Value::String("2024-05-01".into())),
            Value::Date(date)
        );
        assert_eq!(
            ColumnType::Date.coerce(Value::String("someday".into())),
            Value::String("someday".into())
        );
        assert_eq!(ColumnType::Float.coerce(Value::Int64(3)), Value::Float64(3.0));
        assert_eq!(ColumnType::Text.coerce(Value::Int64(3)), Value::Int64(3));
        assert_eq!(ColumnType::Integer.coerce(Value::Null), Value::Null);
    }
}

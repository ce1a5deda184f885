//! Schema and metadata types for database tables, columns, indexes, and constraints.
//!
//! These types provide a dialect-neutral representation of the source catalog,
//! populated during introspection and consumed by the DDL emitter, row copier,
//! and trigger synthesizer.

use serde::{Deserialize, Serialize};

/// Collation case-sensitivity of a column.
///
/// This is a tri-state on purpose: absent collation information must not be
/// silently rendered as case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
    /// Collation mask was missing or NULL for this column.
    Unknown,
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type token, lowercased and already mapped to its SQLite-friendly
    /// form (e.g. "datetime", "numeric", "blob").
    pub data_type: String,

    /// Maximum length for string/binary types (0 = unspecified).
    pub max_length: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Normalized DEFAULT expression (empty = no default).
    pub default_value: String,

    /// Whether the column is an identity column.
    pub is_identity: bool,

    /// Collation case-sensitivity.
    pub case_sensitive: CaseSensitivity,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Source-side schema (namespace) name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Column definitions, ordered by source ordinal position.
    pub columns: Vec<Column>,

    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// Non-primary-key indexes.
    pub indexes: Vec<Index>,
}

impl Table {
    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Check if the table has a single-column primary key.
    pub fn has_single_pk(&self) -> bool {
        self.primary_key.len() == 1
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Foreign key metadata.
///
/// Single-column form: the source catalog join yields one row per referencing
/// column, and the trigger synthesizer operates per column pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Owning table name.
    pub table_name: String,

    /// Referencing column name.
    pub column_name: String,

    /// Referenced table name.
    pub foreign_table_name: String,

    /// Referenced column name.
    pub foreign_column_name: String,

    /// Whether the source declared ON DELETE CASCADE.
    pub cascade_on_delete: bool,

    /// Mirrors the referencing column's nullability. Used by the trigger
    /// synthesizer to guard the existence check.
    pub is_nullable: bool,
}

/// A single key column of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,

    /// Sort direction.
    pub ascending: bool,
}

/// Index metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Key columns in stored order.
    pub columns: Vec<IndexColumn>,
}

/// View metadata. `sql` holds the source DDL body after the
/// dialect-neutralizing rewrites applied during introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub sql: String,
}

/// Trigger firing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
}

impl std::fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerTiming::Before => write!(f, "BEFORE"),
            TriggerTiming::After => write!(f, "AFTER"),
        }
    }
}

/// Trigger firing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEvent::Insert => write!(f, "INSERT"),
            TriggerEvent::Update => write!(f, "UPDATE"),
            TriggerEvent::Delete => write!(f, "DELETE"),
        }
    }
}

/// Trigger metadata. `body` is the raw SQL fragment executed inside
/// BEGIN … END.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub table: String,
    pub body: String,
}

/// The full introspected catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    pub tables: Vec<Table>,
    pub views: Vec<View>,
}

impl Database {
    /// Check whether a table with the given name was introspected.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_column(name: &str, data_type: &str) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            max_length: 0,
            is_nullable: true,
            default_value: String::new(),
            is_identity: false,
            case_sensitive: CaseSensitivity::Unknown,
            ordinal_pos: 1,
        }
    }

    fn make_test_table(columns: Vec<Column>) -> Table {
        Table {
            schema: "dbo".to_string(),
            name: "TestTable".to_string(),
            columns,
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        }
    }

    #[test]
    fn test_table_full_name() {
        let table = make_test_table(vec![]);
        assert_eq!(table.full_name(), "dbo.TestTable");
    }

    #[test]
    fn test_has_single_pk() {
        let mut table = make_test_table(vec![make_test_column("Id", "integer")]);
        assert!(!table.has_single_pk());

        table.primary_key = vec!["Id".to_string()];
        assert!(table.has_single_pk());

        table.primary_key = vec!["Id".to_string(), "Rev".to_string()];
        assert!(!table.has_single_pk());
    }

    #[test]
    fn test_column_lookup() {
        let table = make_test_table(vec![
            make_test_column("Id", "integer"),
            make_test_column("Name", "varchar"),
        ]);
        assert!(table.column("Name").is_some());
        assert!(table.column("name").is_none());
        assert!(table.column("Missing").is_none());
    }

    #[test]
    fn test_trigger_keywords_render_as_sql() {
        assert_eq!(TriggerTiming::Before.to_string(), "BEFORE");
        assert_eq!(TriggerEvent::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_database_has_table() {
        let db = Database {
            tables: vec![make_test_table(vec![])],
            views: vec![],
        };
        assert!(db.has_table("TestTable"));
        assert!(!db.has_table("Other"));
    }
}

//! DDL emission and execution against the destination database.
//!
//! Renders the schema model into SQLite CREATE statements and executes them.
//! Table and index failures are fatal; view failures are recoverable through
//! the front-end handler.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::core::identifier::quote_ident;
use crate::core::schema::{Column, Database, Index, Table, Trigger, View};
use crate::error::{ConvertError, Result};
use crate::handler::{ConvertHandler, ViewFailureDecision};
use crate::typemap;

/// Render the CREATE TABLE statement for a table.
pub fn table_ddl(table: &Table) -> String {
    let mut sb = String::new();
    sb.push_str(&format!("CREATE TABLE {} (\n", quote_ident(&table.name)));

    let mut inline_pkey = false;
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|col| column_definition(col, table, &mut inline_pkey))
        .collect();

    // A standalone PRIMARY KEY clause is skipped when a column was already
    // emitted as integer PRIMARY KEY AUTOINCREMENT.
    if !table.primary_key.is_empty() && !inline_pkey {
        let cols = table
            .primary_key
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("\tPRIMARY KEY ({})", cols));
    }

    for fk in &table.foreign_keys {
        parts.push(format!(
            "\tFOREIGN KEY ({}) REFERENCES {}({})",
            quote_ident(&fk.column_name),
            quote_ident(&fk.foreign_table_name),
            quote_ident(&fk.foreign_column_name)
        ));
    }

    sb.push_str(&parts.join(",\n"));
    sb.push_str("\n);\n");
    sb
}

fn column_definition(col: &Column, table: &Table, inline_pkey: &mut bool) -> String {
    let mut sb = String::new();
    sb.push('\t');
    sb.push_str(&quote_ident(&col.name));
    sb.push(' ');

    let mut autoincrement = false;
    if col.is_identity {
        // An identity column becomes the rowid alias only for a single-column
        // primary key over an integral type; otherwise it is stored as a
        // plain integer and the PK clause is emitted separately.
        if table.primary_key.len() == 1 && typemap::is_integral(&col.data_type) {
            sb.push_str("integer PRIMARY KEY AUTOINCREMENT");
            *inline_pkey = true;
            autoincrement = true;
        } else {
            sb.push_str("integer");
        }
    } else if col.data_type == "int" {
        sb.push_str("integer");
    } else {
        sb.push_str(&col.data_type);
        if col.max_length > 0 {
            sb.push_str(&format!("({})", col.max_length));
        }
    }

    // INTEGER PRIMARY KEY is implicitly NOT NULL; no suffix on that path.
    if !col.is_nullable && !autoincrement {
        sb.push_str(" NOT NULL");
    }

    if col.case_sensitive == crate::core::schema::CaseSensitivity::Insensitive {
        sb.push_str(" COLLATE NOCASE");
    }

    if let Some(default) = typemap::default_clause(&col.default_value) {
        sb.push_str(&format!(" DEFAULT {}", default));
    }

    sb
}

/// Render the CREATE INDEX statement for a non-PK index.
pub fn index_ddl(table_name: &str, index: &Index) -> String {
    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let cols = index
        .columns
        .iter()
        .map(|c| {
            if c.ascending {
                quote_ident(&c.name)
            } else {
                format!("{} DESC", quote_ident(&c.name))
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        quote_ident(&format!("{}_{}", table_name, index.name)),
        quote_ident(table_name),
        cols
    )
}

/// Render the CREATE TRIGGER statement for a synthesized trigger.
pub fn trigger_ddl(trigger: &Trigger) -> String {
    format!(
        "CREATE TRIGGER {} {} {} ON {} BEGIN {} END;",
        quote_ident(&trigger.name),
        trigger.timing,
        trigger.event,
        quote_ident(&trigger.table),
        trigger.body
    )
}

/// Verify that every foreign key references a table that is part of the
/// migrated set. Violations are hard failures at emission time.
pub fn validate_foreign_keys(db: &Database) -> Result<()> {
    for table in &db.tables {
        for fk in &table.foreign_keys {
            if !db.has_table(&fk.foreign_table_name) {
                return Err(ConvertError::ddl(
                    format!("table {}", table.name),
                    format!(
                        "foreign key on column {} references unknown table {}",
                        fk.column_name, fk.foreign_table_name
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Create a table and its indexes on the destination.
pub fn create_table(conn: &Connection, table: &Table) -> Result<()> {
    let ddl = table_ddl(table);
    debug!("creating table {}:\n{}", table.name, ddl);
    conn.execute_batch(&ddl)
        .map_err(|e| ConvertError::ddl(format!("table {}", table.name), e.to_string()))?;

    for index in &table.indexes {
        let ddl = index_ddl(&table.name, index);
        debug!("creating index {}_{}", table.name, index.name);
        conn.execute_batch(&ddl).map_err(|e| {
            ConvertError::ddl(format!("index {}_{}", table.name, index.name), e.to_string())
        })?;
    }

    Ok(())
}

/// Execute a view's DDL inside a transaction, consulting the handler on
/// failure. Returns `false` when the handler chose to discard the view.
pub fn create_view(conn: &Connection, view: &View, handler: &dyn ConvertHandler) -> Result<bool> {
    let mut current = view.clone();

    loop {
        let tx = conn.unchecked_transaction()?;
        match tx.execute_batch(&current.sql) {
            Ok(()) => {
                tx.commit()?;
                debug!("created view {}", current.name);
                return Ok(true);
            }
            Err(e) => {
                // Dropping the transaction rolls back the partial execution.
                drop(tx);
                warn!("view {} failed to compile: {}", current.name, e);

                match handler.on_view_failure(&current, &e.to_string()) {
                    ViewFailureDecision::Replace(sql) => {
                        current.sql = sql;
                    }
                    ViewFailureDecision::Discard => {
                        info!("discarding view {} at front-end request", current.name);
                        return Ok(false);
                    }
                    ViewFailureDecision::NotHandled => {
                        return Err(ConvertError::ddl(
                            format!("view {}", current.name),
                            e.to_string(),
                        ));
                    }
                }
            }
        }
    }
}

/// Create a trigger on the destination.
pub fn create_trigger(conn: &Connection, trigger: &Trigger) -> Result<()> {
    let ddl = trigger_ddl(trigger);
    debug!("creating trigger {}", trigger.name);
    conn.execute_batch(&ddl)
        .map_err(|e| ConvertError::ddl(format!("trigger {}", trigger.name), e.to_string()))
}

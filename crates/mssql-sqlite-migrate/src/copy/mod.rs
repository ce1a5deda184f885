//! Streaming row copy from the source server into the destination file.
//!
//! Each table is read with a single streaming SELECT and written through a
//! prepared INSERT under transactional batching. A batch commits every 1000
//! rows; cancellation is polled at every commit point, and a failed row rolls
//! back only the uncommitted batch.

use futures::TryStreamExt;
use rusqlite::{Connection, ToSql};
use tiberius::QueryItem;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::identifier::{parameter_names, qualify_source_table, quote_ident};
use crate::core::schema::{Database, Table};
use crate::core::value::{coerce, Affinity, SqlValue};
use crate::error::{ConvertError, Result};
use crate::handler::{ConvertHandler, ProgressUpdate};
use crate::introspect::MssqlClient;

/// Rows per destination transaction.
pub const BATCH_SIZE: i64 = 1000;

/// Build the streaming SELECT issued against the source.
fn select_sql(table: &Table) -> String {
    let cols = table
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {}",
        cols,
        qualify_source_table(&table.schema, &table.name)
    )
}

/// Build the prepared INSERT with normalized `@` parameter names.
fn insert_sql(table: &Table, params: &[String]) -> String {
    let cols = table
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&table.name),
        cols,
        params.join(", ")
    )
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ConvertError::Cancelled);
    }
    Ok(())
}

/// Copy all tables in source order. Progress covers the 50–100% band.
pub async fn copy_database(
    client: &mut MssqlClient,
    conn: &Connection,
    handler: &dyn ConvertHandler,
    cancel: &CancellationToken,
    db: &Database,
) -> Result<i64> {
    let total = db.tables.len().max(1);
    let mut total_rows = 0i64;

    for (i, table) in db.tables.iter().enumerate() {
        check_cancelled(cancel)?;

        let percent = (50 + (i + 1) * 50 / total) as u8;
        let rows = copy_table(client, conn, handler, cancel, table, percent).await?;
        total_rows += rows;

        handler.on_progress(&ProgressUpdate::working(
            percent,
            format!("finished copying table {} ({} rows)", table.name, rows),
        ));
    }

    info!("Copied {} rows across {} tables", total_rows, db.tables.len());
    Ok(total_rows)
}

/// Copy one table. On any error the uncommitted batch is rolled back and the
/// error surfaces to the caller.
async fn copy_table(
    client: &mut MssqlClient,
    conn: &Connection,
    handler: &dyn ConvertHandler,
    cancel: &CancellationToken,
    table: &Table,
    percent: u8,
) -> Result<i64> {
    let affinities = table
        .columns
        .iter()
        .map(|c| Affinity::of(&c.data_type))
        .collect::<Result<Vec<_>>>()?;

    let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
    let params = parameter_names(&columns);
    let insert = insert_sql(table, &params);

    let mut stmt = conn
        .prepare(&insert)
        .map_err(|e| ConvertError::row_copy(&table.name, e.to_string()))?;

    conn.execute_batch("BEGIN")
        .map_err(|e| ConvertError::row_copy(&table.name, e.to_string()))?;

    let result = stream_rows(
        client, conn, handler, cancel, table, &mut stmt, &affinities, &params, percent,
    )
    .await;

    match result {
        Ok(rows) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| ConvertError::row_copy(&table.name, e.to_string()))?;
            debug!("{}: copied {} rows", table.full_name(), rows);
            Ok(rows)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn stream_rows(
    client: &mut MssqlClient,
    conn: &Connection,
    handler: &dyn ConvertHandler,
    cancel: &CancellationToken,
    table: &Table,
    stmt: &mut rusqlite::Statement<'_>,
    affinities: &[Affinity],
    params: &[String],
    percent: u8,
) -> Result<i64> {
    let select = select_sql(table);
    let mut stream = client.simple_query(&select).await?;
    let mut counter = 0i64;

    while let Some(item) = stream.try_next().await? {
        let QueryItem::Row(row) = item else {
            continue;
        };

        let mut values = Vec::with_capacity(affinities.len());
        for (idx, data) in row.into_iter().enumerate() {
            let affinity = *affinities.get(idx).ok_or_else(|| {
                ConvertError::row_copy(&table.name, "row wider than column metadata")
            })?;
            let value = SqlValue::from_column_data(&data)?;
            let value = coerce(value, affinity)
                .map_err(|e| ConvertError::row_copy(&table.name, e.to_string()))?;
            values.push(value);
        }

        let bound: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .map(String::as_str)
            .zip(values.iter().map(|v| v as &dyn ToSql))
            .collect();
        stmt.execute(&bound[..])
            .map_err(|e| ConvertError::row_copy(&table.name, e.to_string()))?;

        counter += 1;
        if counter % BATCH_SIZE == 0 {
            check_cancelled(cancel)?;
            conn.execute_batch("COMMIT; BEGIN")
                .map_err(|e| ConvertError::row_copy(&table.name, e.to_string()))?;
            handler.on_progress(&ProgressUpdate::working(
                percent,
                format!("copied {} rows of table {} so far", counter, table.name),
            ));
        }
    }

    // Final rows of the table: one more cancellation check before the
    // caller's closing commit.
    check_cancelled(cancel)?;
    Ok(counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{CaseSensitivity, Column};

    fn make_table(names: &[&str]) -> Table {
        Table {
            schema: "dbo".into(),
            name: "Orders".into(),
            columns: names
                .iter()
                .map(|n| Column {
                    name: n.to_string(),
                    data_type: "int".into(),
                    max_length: 0,
                    is_nullable: true,
                    default_value: String::new(),
                    is_identity: false,
                    case_sensitive: CaseSensitivity::Unknown,
                    ordinal_pos: 0,
                })
                .collect(),
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        }
    }

    #[test]
    fn test_select_sql_qualifies_schema_bare() {
        let table = make_table(&["Id", "Total"]);
        assert_eq!(
            select_sql(&table),
            "SELECT [Id], [Total] FROM dbo.[Orders]"
        );
    }

    #[test]
    fn test_insert_sql_uses_normalized_params() {
        let table = make_table(&["Id", "Order Date"]);
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let params = parameter_names(&columns);
        assert_eq!(
            insert_sql(&table, &params),
            "INSERT INTO [Orders] ([Id], [Order Date]) VALUES (@Id, @Order_Date)"
        );
    }

    #[test]
    fn test_named_binding_order_matches_columns() {
        // The prepared statement binds by name, so the sanitized names and
        // the column order must stay aligned end to end.
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t ([a b] integer, [a_b] integer)")
            .unwrap();

        let columns = vec!["a b".to_string(), "a_b".to_string()];
        let params = parameter_names(&columns);
        assert_eq!(params, vec!["@a_b", "@a_b_"]);

        let mut stmt = conn
            .prepare("INSERT INTO t ([a b], [a_b]) VALUES (@a_b, @a_b_)")
            .unwrap();
        let values = [SqlValue::I64(1), SqlValue::I64(2)];
        let bound: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .map(String::as_str)
            .zip(values.iter().map(|v| v as &dyn ToSql))
            .collect();
        stmt.execute(&bound[..]).unwrap();

        let (a, b): (i64, i64) = conn
            .query_row("SELECT [a b], [a_b] FROM t", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((a, b), (1, 2));
    }
}

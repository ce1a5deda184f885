//! Source catalog introspection.
//!
//! Reads SQL Server metadata through a fixed sequence of catalog queries and
//! stored procedures, and normalizes it into the dialect-neutral schema model.
//! Type mapping happens here, so downstream stages only ever see the
//! SQLite-friendly type tokens.

use std::sync::OnceLock;

use regex::Regex;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::schema::{
    CaseSensitivity, Column, Database, ForeignKey, Index, IndexColumn, Table, View,
};
use crate::error::{ConvertError, Result};
use crate::handler::{ConvertHandler, ProgressUpdate};
use crate::typemap;

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// Connected TDS client over a Tokio TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

fn build_config(config: &SourceConfig) -> Config {
    let mut tds = Config::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));

    if config.encrypt {
        if config.trust_server_cert {
            tds.trust_cert();
        }
        tds.encryption(EncryptionLevel::Required);
    } else {
        tds.encryption(EncryptionLevel::NotSupported);
    }

    tds.packet_size(TDS_MAX_PACKET_SIZE);
    tds
}

/// Connect to the source server and validate the session with `SELECT 1`.
pub async fn connect(config: &SourceConfig) -> Result<MssqlClient> {
    let tds = build_config(config);
    let tcp = TcpStream::connect(tds.get_addr()).await?;
    tcp.set_nodelay(true).ok();

    let mut client = Client::connect(tds, tcp.compat_write()).await?;
    client.simple_query("SELECT 1").await?.into_row().await?;

    info!(
        "Connected to MSSQL source: {}:{}/{}",
        config.host, config.port, config.database
    );
    Ok(client)
}

/// Escape a value for embedding in a single-quoted T-SQL literal. Needed for
/// the stored procedures, which cannot take `@P` placeholders through
/// `simple_query`.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Catalog reader for one conversion run.
pub struct Introspector<'a> {
    client: &'a mut MssqlClient,
    handler: &'a dyn ConvertHandler,
    cancel: &'a CancellationToken,
}

impl<'a> Introspector<'a> {
    pub fn new(
        client: &'a mut MssqlClient,
        handler: &'a dyn ConvertHandler,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            handler,
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }
        Ok(())
    }

    /// Read the full catalog into a [`Database`].
    ///
    /// Tables occupy the 0–50% band of the reported progress, views 50–100%.
    pub async fn read_database(&mut self) -> Result<Database> {
        let names = self.table_names().await?;
        let total = names.len().max(1);

        let mut tables = Vec::with_capacity(names.len());
        for (i, (schema, name)) in names.into_iter().enumerate() {
            let table = self.read_table(&schema, &name).await?;
            tables.push(table);

            let percent = ((i + 1) * 50 / total) as u8;
            self.handler.on_progress(&ProgressUpdate::working(
                percent,
                format!("parsed table {}", name),
            ));
            self.check_cancelled()?;
        }

        let views = self.read_views().await?;

        info!(
            "Introspected {} tables and {} views",
            tables.len(),
            views.len()
        );
        Ok(Database { tables, views })
    }

    /// Enumerate base tables (views excluded).
    async fn table_names(&mut self) -> Result<Vec<(String, String)>> {
        let sql = r#"
            SELECT TABLE_SCHEMA, TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let stream = self.client.simple_query(sql).await?;
        let rows = stream.into_first_result().await?;

        let names = rows
            .iter()
            .map(|row| {
                (
                    row.get::<&str, _>(0).unwrap_or_default().to_string(),
                    row.get::<&str, _>(1).unwrap_or_default().to_string(),
                )
            })
            .collect::<Vec<_>>();

        debug!("Found {} base tables", names.len());
        Ok(names)
    }

    async fn read_table(&mut self, schema: &str, name: &str) -> Result<Table> {
        let mut table = Table {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        };

        self.load_columns(&mut table).await?;
        self.load_primary_key(&mut table).await?;
        self.load_collations(&mut table).await?;
        self.load_indexes(&mut table).await?;
        self.load_foreign_keys(&mut table).await?;

        Ok(table)
    }

    /// Load columns in ordinal order, applying the type map and the DEFAULT
    /// normalization pipeline.
    async fn load_columns(&mut self, table: &mut Table) -> Result<()> {
        let sql = r#"
            SELECT
                COLUMN_NAME,
                ORDINAL_POSITION,
                COLUMN_DEFAULT,
                CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                DATA_TYPE,
                ISNULL(COLUMNPROPERTY(OBJECT_ID(TABLE_SCHEMA + '.' + TABLE_NAME), COLUMN_NAME, 'IsIdentity'), 0),
                CAST(ISNULL(CHARACTER_MAXIMUM_LENGTH, 0) AS INT)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;

        let mut query = Query::new(sql);
        query.bind(&table.schema);
        query.bind(&table.name);

        let stream = query.query(self.client).await?;
        let rows = stream.into_first_result().await?;

        for row in rows {
            let name = row.get::<&str, _>(0).unwrap_or_default().to_string();
            let ordinal_pos = row.get::<i32, _>(1).unwrap_or(0);
            let raw_default = row.get::<&str, _>(2).unwrap_or_default().to_string();
            let is_nullable = row.get::<i32, _>(3).unwrap_or(0) == 1;
            let raw_type = row
                .get::<&str, _>(4)
                .unwrap_or_default()
                .to_lowercase();
            let is_identity = row.get::<i32, _>(5).unwrap_or(0) == 1;
            let max_length = row.get::<i32, _>(6).unwrap_or(0);

            let data_type = typemap::map_type(&raw_type).ok_or_else(|| {
                ConvertError::UnsupportedType {
                    table: table.name.clone(),
                    column: name.clone(),
                    data_type: raw_type.clone(),
                }
            })?;

            let default_value = typemap::normalize_default(&raw_default, &raw_type);

            table.columns.push(Column {
                name,
                data_type,
                max_length,
                is_nullable,
                default_value,
                is_identity,
                case_sensitive: CaseSensitivity::Unknown,
                ordinal_pos,
            });
        }

        debug!(
            "Loaded {} columns for {}",
            table.columns.len(),
            table.full_name()
        );
        Ok(())
    }

    async fn load_primary_key(&mut self, table: &mut Table) -> Result<()> {
        let sql = format!(
            "EXEC sp_pkeys @table_name = N'{}', @table_owner = N'{}'",
            escape_literal(&table.name),
            escape_literal(&table.schema)
        );

        let stream = self.client.simple_query(&sql).await?;
        let rows = stream.into_first_result().await?;

        let mut keys: Vec<(i16, String)> = rows
            .iter()
            .map(|row| {
                (
                    row.get::<i16, _>(4).unwrap_or(0),
                    row.get::<&str, _>(3).unwrap_or_default().to_string(),
                )
            })
            .collect();
        keys.sort_by_key(|(seq, _)| *seq);
        table.primary_key = keys.into_iter().map(|(_, name)| name).collect();

        debug!(
            "Primary key for {}: {:?}",
            table.full_name(),
            table.primary_key
        );
        Ok(())
    }

    /// Load collation masks and decode case sensitivity per column. Columns
    /// missing from the result (or with a NULL mask) stay `Unknown`.
    async fn load_collations(&mut self, table: &mut Table) -> Result<()> {
        let sql = format!(
            "EXEC sp_tablecollations N'{}.{}'",
            escape_literal(&table.schema),
            escape_literal(&table.name)
        );

        let stream = self.client.simple_query(&sql).await?;
        let rows = stream.into_first_result().await?;

        for row in rows {
            let name = row.get::<&str, _>("name").unwrap_or_default().to_string();
            let mask = row.get::<&[u8], _>("tds_collation");

            if let Some(sensitivity) = mask.map(decode_collation_mask) {
                if let Some(col) = table.columns.iter_mut().find(|c| c.name == name) {
                    col.case_sensitive = sensitivity;
                }
            }
        }

        Ok(())
    }

    /// Load non-PK indexes via `sp_helpindex`. A failing query degrades to a
    /// warning and an empty index list instead of aborting the run.
    async fn load_indexes(&mut self, table: &mut Table) -> Result<()> {
        let sql = format!(
            "EXEC sp_helpindex N'{}.{}'",
            escape_literal(&table.schema),
            escape_literal(&table.name)
        );

        let rows = match self.client.simple_query(&sql).await {
            Ok(stream) => match stream.into_first_result().await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Index query failed for {}: {}", table.full_name(), e);
                    return Ok(());
                }
            },
            Err(e) => {
                warn!("Index query failed for {}: {}", table.full_name(), e);
                return Ok(());
            }
        };

        for row in rows {
            let name = row.get::<&str, _>(0).unwrap_or_default().to_string();
            let description = row.get::<&str, _>(1).unwrap_or_default();
            let keys = row.get::<&str, _>(2).unwrap_or_default();

            // The primary key index is rendered by the CREATE TABLE statement.
            if description.contains("primary key") {
                continue;
            }

            let index = Index {
                name,
                is_unique: description_is_unique(description),
                columns: parse_index_keys(keys)?,
            };
            table.indexes.push(index);
        }

        debug!(
            "Loaded {} indexes for {}",
            table.indexes.len(),
            table.full_name()
        );
        Ok(())
    }

    async fn load_foreign_keys(&mut self, table: &mut Table) -> Result<()> {
        let sql = r#"
            SELECT
                ColumnName = CU.COLUMN_NAME,
                ForeignTableName = PK.TABLE_NAME,
                ForeignColumnName = PT.COLUMN_NAME,
                DeleteRule = C.DELETE_RULE,
                IsNullable = COL.IS_NULLABLE
            FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS C
            INNER JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS FK
                ON C.CONSTRAINT_NAME = FK.CONSTRAINT_NAME
            INNER JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS PK
                ON C.UNIQUE_CONSTRAINT_NAME = PK.CONSTRAINT_NAME
            INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE CU
                ON C.CONSTRAINT_NAME = CU.CONSTRAINT_NAME
            INNER JOIN (
                SELECT i1.TABLE_NAME, i2.COLUMN_NAME
                FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS i1
                INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE i2
                    ON i1.CONSTRAINT_NAME = i2.CONSTRAINT_NAME
                WHERE i1.CONSTRAINT_TYPE = 'PRIMARY KEY'
            ) PT ON PT.TABLE_NAME = PK.TABLE_NAME
            INNER JOIN INFORMATION_SCHEMA.COLUMNS COL
                ON CU.COLUMN_NAME = COL.COLUMN_NAME AND FK.TABLE_NAME = COL.TABLE_NAME
            WHERE FK.TABLE_NAME = @P1
            ORDER BY CU.COLUMN_NAME
        "#;

        let mut query = Query::new(sql);
        query.bind(&table.name);

        let stream = query.query(self.client).await?;
        let rows = stream.into_first_result().await?;

        for row in rows {
            let fk = ForeignKey {
                table_name: table.name.clone(),
                column_name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                foreign_table_name: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                foreign_column_name: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                cascade_on_delete: row.get::<&str, _>(3).unwrap_or_default() == "CASCADE",
                is_nullable: row.get::<&str, _>(4).unwrap_or_default() == "YES",
            };
            table.foreign_keys.push(fk);
        }

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.full_name()
        );
        Ok(())
    }

    /// Enumerate views and apply the dialect-neutralizing rewrite.
    ///
    /// Views occupy the 50–100% band of reported progress.
    async fn read_views(&mut self) -> Result<Vec<View>> {
        let sql = r#"
            SELECT TABLE_NAME, VIEW_DEFINITION
            FROM INFORMATION_SCHEMA.VIEWS
            ORDER BY TABLE_NAME
        "#;

        let stream = self.client.simple_query(sql).await?;
        let rows = stream.into_first_result().await?;
        let total = rows.len().max(1);

        let mut views = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let name = row.get::<&str, _>(0).unwrap_or_default().to_string();
            let definition = row.get::<&str, _>(1).unwrap_or_default();

            if !definition.is_empty() {
                views.push(View {
                    name: name.clone(),
                    sql: strip_default_schema(definition),
                });
            }

            let percent = (50 + (i + 1) * 50 / total) as u8;
            self.handler.on_progress(&ProgressUpdate::working(
                percent,
                format!("parsed view {}", name),
            ));
            self.check_cancelled()?;
        }

        Ok(views)
    }
}

/// Decode the TDS collation mask: bit 4 of byte 2 marks a case-insensitive
/// collation. A mask too short to carry the flag reads as `Unknown`.
fn decode_collation_mask(mask: &[u8]) -> CaseSensitivity {
    match mask.get(2) {
        Some(byte) if byte & 0x10 != 0 => CaseSensitivity::Insensitive,
        Some(_) => CaseSensitivity::Sensitive,
        None => CaseSensitivity::Unknown,
    }
}

/// `sp_helpindex` renders index properties as a comma-separated description.
fn description_is_unique(description: &str) -> bool {
    description.split(',').any(|part| part.trim() == "unique")
}

fn index_key_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"^([\w\s]+)(\(\-\))?$").unwrap())
}

/// Parse the `sp_helpindex` keys string: comma-separated identifiers, each
/// optionally suffixed with `(-)` to mark descending order. Whitespace inside
/// an identifier is tolerated.
fn parse_index_keys(keys: &str) -> Result<Vec<IndexColumn>> {
    let mut columns = Vec::new();

    for part in keys.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let caps = index_key_rx().captures(part).ok_or_else(|| {
            ConvertError::SchemaExtraction(format!("illegal index key name [{}]", part))
        })?;

        columns.push(IndexColumn {
            name: caps[1].trim().to_string(),
            ascending: caps.get(2).is_none(),
        });
    }

    Ok(columns)
}

fn dbo_prefix_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?i)dbo\.").unwrap())
}

/// Strip the source's default-schema prefix from a view body.
fn strip_default_schema(sql: &str) -> String {
    dbo_prefix_rx().replace_all(sql, "").into_owned()
}

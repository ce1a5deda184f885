//! Configuration type definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Source database configuration (MSSQL).
    pub source: SourceConfig,

    /// Destination database configuration (SQLite file).
    pub destination: DestinationConfig,

    /// Conversion behavior configuration.
    #[serde(default)]
    pub options: ConvertOptions,
}

/// Source database (MSSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(skip_serializing, default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

// Manual Debug to keep passwords out of logs.
impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Destination (SQLite) configuration.
///
/// Page size (4096) and UTF-16 encoding are fixed connection parameters of
/// the produced file, not configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Path of the output file. Deleted first if it already exists.
    pub path: PathBuf,

    /// Optional encryption password. When set, `PRAGMA key` is issued on
    /// every destination connection before any other statement; honoring it
    /// requires an SQLCipher-linked SQLite.
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Conversion behavior flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Synthesize FK-emulation triggers on the destination (default: true).
    #[serde(default = "default_true")]
    pub create_triggers: bool,

    /// Translate and create source views on the destination (default: true).
    #[serde(default = "default_true")]
    pub create_views: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            create_triggers: true,
            create_views: true,
        }
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

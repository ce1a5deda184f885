//! Error types for the conversion library.

use thiserror::Error;

/// Main error type for conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Destination database error
    #[error("Destination database error: {0}")]
    Destination(#[from] rusqlite::Error),

    /// Schema introspection failed
    #[error("Schema introspection failed: {0}")]
    SchemaExtraction(String),

    /// Source column has a data type outside the accepted set
    #[error("Unsupported data type '{data_type}' on column {table}.{column}")]
    UnsupportedType {
        table: String,
        column: String,
        data_type: String,
    },

    /// Internal affinity table does not cover a column type. Indicates a
    /// mapper bug, not bad user input.
    #[error("Illegal affinity for column type '{0}'")]
    IllegalAffinity(String),

    /// A CREATE statement failed on the destination
    #[error("DDL failed for {object}: {message}")]
    Ddl { object: String, message: String },

    /// Row copy failed for a specific table
    #[error("Row copy failed for table {table}: {message}")]
    RowCopy { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Conversion was cancelled by the user
    #[error("Conversion cancelled by user")]
    Cancelled,
}

impl ConvertError {
    /// Create a Ddl error naming the object that failed.
    pub fn ddl(object: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::Ddl {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Create a RowCopy error.
    pub fn row_copy(table: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::RowCopy {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

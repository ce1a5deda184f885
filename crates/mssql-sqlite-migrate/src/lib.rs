//! # mssql-sqlite-migrate
//!
//! MSSQL to SQLite database conversion library.
//!
//! Converts a live SQL Server database into a freshly created SQLite file:
//!
//! - **Catalog introspection** into a dialect-neutral schema model
//! - **Type and DEFAULT mapping** from the SQL Server type system
//! - **Streaming row copy** with transactional batching and progress
//! - **FK-emulation triggers** approximating declarative foreign keys
//! - **View translation** with front-end assisted recovery
//!
//! The conversion runs on a background worker; progress, table selection,
//! and view-failure decisions flow through a [`ConvertHandler`] supplied by
//! the front-end.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mssql_sqlite_migrate::{convert, ConvertConfig, ConvertHandler, ProgressUpdate};
//!
//! struct PrintProgress;
//!
//! impl ConvertHandler for PrintProgress {
//!     fn on_progress(&self, update: &ProgressUpdate) {
//!         println!("[{:3}%] {}", update.percent, update.message);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> mssql_sqlite_migrate::Result<()> {
//!     let config = ConvertConfig::load("convert.yaml")?;
//!     let handle = convert(config, Arc::new(PrintProgress))?;
//!     handle.join().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Limitations
//!
//! A non-integral identity column is stored as `integer` without
//! AUTOINCREMENT and its values are copied verbatim; whether they fit is not
//! checked. Stored procedures are not translated, and there is no
//! incremental or resumable mode: a run either completes or leaves a partial
//! file that the next run overwrites.

pub mod config;
pub mod copy;
pub mod core;
pub mod emit;
pub mod error;
pub mod handler;
pub mod introspect;
pub mod orchestrator;
pub mod triggers;
pub mod typemap;

// Re-exports for convenient access
pub use crate::core::schema::{
    CaseSensitivity, Column, Database, ForeignKey, Index, IndexColumn, Table, Trigger,
    TriggerEvent, TriggerTiming, View,
};
pub use crate::core::value::{Affinity, SqlValue};
pub use config::{ConvertConfig, ConvertOptions, DestinationConfig, SourceConfig};
pub use error::{ConvertError, Result};
pub use handler::{ConvertHandler, ProgressUpdate, ViewFailureDecision};
pub use orchestrator::{convert, ConversionHandle};

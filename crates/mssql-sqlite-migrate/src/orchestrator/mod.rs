//! Conversion orchestrator - drives introspection, DDL emission, row copy,
//! and trigger synthesis on a background worker.
//!
//! The public entry point returns immediately; all results flow to the
//! front-end through the [`ConvertHandler`]. Cancellation and the activity
//! flag are scoped to the returned [`ConversionHandle`], not process-global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConvertConfig, DestinationConfig};
use crate::copy;
use crate::emit;
use crate::error::{ConvertError, Result};
use crate::handler::{ConvertHandler, ProgressUpdate};
use crate::introspect::{self, Introspector};
use crate::triggers;

/// Fixed page size of the produced file.
const DEST_PAGE_SIZE: u32 = 4096;

/// Fixed text encoding of the produced file.
const DEST_ENCODING: &str = "UTF-16";

/// Handle to an in-flight conversion.
pub struct ConversionHandle {
    cancel: CancellationToken,
    active: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ConversionHandle {
    /// Request cancellation. The worker aborts at its next checkpoint, rolls
    /// back the in-flight transaction, and reports failure through the
    /// progress handler.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the conversion worker is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for the worker to finish. Results have already been delivered
    /// through the handler by the time this returns.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Start a conversion on a background worker.
///
/// Configuration errors are returned directly, before the worker spawns; the
/// progress handler is never invoked for them. Every other outcome - success,
/// failure, or cancellation - arrives through the handler, with exactly one
/// terminal `done = true` update.
///
/// Must be called from within a Tokio runtime.
pub fn convert(
    config: ConvertConfig,
    handler: Arc<dyn ConvertHandler>,
) -> Result<ConversionHandle> {
    config.validate()?;

    let cancel = CancellationToken::new();
    let active = Arc::new(AtomicBool::new(true));

    let worker_cancel = cancel.clone();
    let worker_active = active.clone();
    let join = tokio::spawn(async move {
        let result = run_pipeline(&config, handler.as_ref(), &worker_cancel).await;
        match result {
            Ok(summary) => {
                info!("Conversion finished: {}", summary);
                handler.on_progress(&ProgressUpdate::finished(summary));
            }
            Err(e) => {
                warn!("Conversion failed: {}", e.format_detailed());
                handler.on_progress(&ProgressUpdate::failed(e.to_string()));
            }
        }
        worker_active.store(false, Ordering::SeqCst);
    });

    Ok(ConversionHandle {
        cancel,
        active,
        join,
    })
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ConvertError::Cancelled);
    }
    Ok(())
}

/// Open a destination connection and apply the fixed connection parameters.
/// The encryption key, when configured, must be the first statement issued.
fn open_destination(config: &DestinationConfig) -> Result<Connection> {
    let conn = Connection::open(&config.path)?;
    if let Some(password) = &config.password {
        conn.pragma_update(None, "key", password)?;
    }
    conn.pragma_update(None, "page_size", DEST_PAGE_SIZE)?;
    conn.pragma_update(None, "encoding", DEST_ENCODING)?;
    Ok(conn)
}

async fn run_pipeline(
    config: &ConvertConfig,
    handler: &dyn ConvertHandler,
    cancel: &CancellationToken,
) -> Result<String> {
    check_cancelled(cancel)?;

    // A previous output file is overwritten, never appended to.
    let dest_path = &config.destination.path;
    if dest_path.exists() {
        std::fs::remove_file(dest_path)?;
        debug!("Deleted existing destination file {}", dest_path.display());
    }

    check_cancelled(cancel)?;
    let mut client = introspect::connect(&config.source).await?;
    let mut db = Introspector::new(&mut client, handler, cancel)
        .read_database()
        .await?;

    if let Some(filtered) = handler.filter_tables(&db.tables) {
        debug!(
            "Front-end filtered tables: {} of {} kept",
            filtered.len(),
            db.tables.len()
        );
        db.tables = filtered;
    }

    check_cancelled(cancel)?;
    emit::validate_foreign_keys(&db)?;

    // DDL phase: tables occupy the 0-50% band. The connection is scoped so
    // it closes before the copy connection opens on the same file.
    {
        let conn = open_destination(&config.destination)?;
        let total = db.tables.len().max(1);

        for (i, table) in db.tables.iter().enumerate() {
            check_cancelled(cancel)?;
            emit::create_table(&conn, table)?;
            handler.on_progress(&ProgressUpdate::working(
                ((i + 1) * 50 / total) as u8,
                format!("created table {}", table.name),
            ));
        }

        if config.options.create_views {
            check_cancelled(cancel)?;
            let mut created = 0usize;
            for view in &db.views {
                if emit::create_view(&conn, view, handler)? {
                    created += 1;
                }
            }
            info!("Created {} of {} views", created, db.views.len());
        }
    }

    check_cancelled(cancel)?;
    let total_rows = {
        let conn = open_destination(&config.destination)?;
        copy::copy_database(&mut client, &conn, handler, cancel, &db).await?
    };

    if config.options.create_triggers {
        check_cancelled(cancel)?;
        let conn = open_destination(&config.destination)?;
        let total = db.tables.len().max(1);

        for (i, table) in db.tables.iter().enumerate() {
            check_cancelled(cancel)?;
            for trigger in triggers::table_triggers(table) {
                emit::create_trigger(&conn, &trigger)?;
            }
            handler.on_progress(&ProgressUpdate::working(
                ((i + 1) * 100 / total) as u8,
                format!("added foreign key triggers for table {}", table.name),
            ));
        }
    }

    Ok(format!(
        "converted {} tables ({} rows) into {}",
        db.tables.len(),
        total_rows,
        dest_path.display()
    ))
}

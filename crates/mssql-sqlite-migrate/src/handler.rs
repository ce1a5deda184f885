//! The contract between the conversion core and any front-end.
//!
//! All progress, error reporting, and interactive decisions leave the core
//! through this interface. Handlers are invoked on the worker task; a GUI
//! collaborator is responsible for marshaling to its own context.

use crate::core::schema::{Table, View};

/// A progress report from the conversion worker.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Whether the run has finished. Exactly one update per run has
    /// `done = true`.
    pub done: bool,

    /// Whether the run succeeded. Only meaningful when `done` is true.
    pub success: bool,

    /// Progress within the current phase, 0..=100.
    pub percent: u8,

    /// Human-readable status message.
    pub message: String,
}

impl ProgressUpdate {
    /// An in-flight progress report.
    pub fn working(percent: u8, message: impl Into<String>) -> Self {
        Self {
            done: false,
            success: true,
            percent: percent.min(100),
            message: message.into(),
        }
    }

    /// The terminal success report.
    pub fn finished(message: impl Into<String>) -> Self {
        Self {
            done: true,
            success: true,
            percent: 100,
            message: message.into(),
        }
    }

    /// The terminal failure report.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            done: true,
            success: false,
            percent: 100,
            message: message.into(),
        }
    }
}

/// Outcome of consulting the front-end about a view whose DDL failed.
#[derive(Debug, Clone)]
pub enum ViewFailureDecision {
    /// The front-end does not handle view failures; the failure is fatal.
    NotHandled,

    /// Retry with a corrected DDL string.
    Replace(String),

    /// Drop the view from the output and continue.
    Discard,
}

/// Front-end contract for a conversion run.
///
/// `filter_tables` and `on_view_failure` have opt-out defaults so a minimal
/// front-end only needs to sink progress.
pub trait ConvertHandler: Send + Sync {
    /// Receive a progress, completion, or failure report.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Offered the full introspected table list once, after introspection and
    /// before DDL emission. Return a (possibly filtered) replacement list, or
    /// `None` to keep the original.
    fn filter_tables(&self, _tables: &[Table]) -> Option<Vec<Table>> {
        None
    }

    /// Consulted when a view's DDL failed to execute on the destination.
    fn on_view_failure(&self, _view: &View, _error: &str) -> ViewFailureDecision {
        ViewFailureDecision::NotHandled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink;

    impl ConvertHandler for Sink {
        fn on_progress(&self, _update: &ProgressUpdate) {}
    }

    #[test]
    fn test_defaults_keep_tables_and_reject_view_failures() {
        let handler = Sink;
        assert!(handler.filter_tables(&[]).is_none());
        assert!(matches!(
            handler.on_view_failure(
                &View {
                    name: "v".into(),
                    sql: "CREATE VIEW v AS SELECT 1".into()
                },
                "boom"
            ),
            ViewFailureDecision::NotHandled
        ));
    }

    #[test]
    fn test_progress_update_constructors() {
        let u = ProgressUpdate::working(130, "copying");
        assert!(!u.done);
        assert_eq!(u.percent, 100);

        let u = ProgressUpdate::finished("ok");
        assert!(u.done && u.success);

        let u = ProgressUpdate::failed("bad");
        assert!(u.done && !u.success);
    }
}

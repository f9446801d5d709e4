use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::IngestionError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (transport, timeout, or other infrastructure failures).
    Critical,
}

/// Compute the severity of an error.
///
/// Transport-level failures are `Critical`; remote API refusals and malformed payloads are
/// `Error`. Wrapper variants take the severity of what they wrap.
pub fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Io(_)
        | IngestionError::Http(_)
        | IngestionError::Task(_)
        | IngestionError::Timeout { .. }
        | IngestionError::DeadlineExceeded { .. } => IngestionSeverity::Critical,
        IngestionError::MetadataFetch { source, .. }
        | IngestionError::TabProcessing { source, .. }
        | IngestionError::Export { source, .. } => severity_for_error(source),
        IngestionError::Cleanup { .. } => IngestionSeverity::Warning,
        IngestionError::Json(_)
        | IngestionError::Api { .. }
        | IngestionError::Config { .. }
        | IngestionError::Upload { .. }
        | IngestionError::InvalidExport { .. } => IngestionSeverity::Error,
        #[cfg(feature = "excel")]
        IngestionError::Excel(_) => IngestionSeverity::Error,
    }
}

/// Which path a successfully ingested tab took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    /// Parsed into columns and rows.
    Tabular,
    /// Exported and uploaded as a file snapshot.
    Graphical,
}

/// Context about the tab an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionContext {
    /// Source document id.
    pub document_id: String,
    /// Tab id.
    pub tab_id: i64,
    /// Tab display name.
    pub tab_name: String,
}

/// Minimal stats reported on successful tab ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    pub kind: TabKind,
    /// Number of emitted rows (padding included). Zero for graphical tabs.
    pub rows: usize,
    /// Number of emitted columns. Zero for graphical tabs.
    pub columns: usize,
}

/// Observer interface for per-tab ingestion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a tab produced a descriptor.
    fn on_tab_ingested(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a tab failed.
    fn on_tab_failed(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a tab failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_tab_failed`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_tab_failed(ctx, severity, error)
    }

    /// Called when features could not be fetched and classification used the blank check.
    fn on_classification_degraded(&self, _ctx: &IngestionContext, _error: &IngestionError) {}

    /// Called when a temporary export copy could not be deleted.
    fn on_cleanup_failed(&self, _ctx: &IngestionContext, _error: &IngestionError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_tab_ingested(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_tab_ingested(ctx, stats);
        }
    }

    fn on_tab_failed(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_tab_failed(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }

    fn on_classification_degraded(&self, ctx: &IngestionContext, error: &IngestionError) {
        for o in &self.observers {
            o.on_classification_degraded(ctx, error);
        }
    }

    fn on_cleanup_failed(&self, ctx: &IngestionContext, error: &IngestionError) {
        for o in &self.observers {
            o.on_cleanup_failed(ctx, error);
        }
    }
}

/// Emits ingestion events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_tab_ingested(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            document_id = %ctx.document_id,
            tab = %ctx.tab_name,
            kind = ?stats.kind,
            rows = stats.rows,
            columns = stats.columns,
            "tab ingested"
        );
    }

    fn on_tab_failed(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::warn!(
            document_id = %ctx.document_id,
            tab = %ctx.tab_name,
            ?severity,
            error = %error,
            "tab failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            document_id = %ctx.document_id,
            tab = %ctx.tab_name,
            ?severity,
            error = %error,
            "ALERT: tab failed"
        );
    }

    fn on_classification_degraded(&self, ctx: &IngestionContext, error: &IngestionError) {
        tracing::warn!(
            document_id = %ctx.document_id,
            tab = %ctx.tab_name,
            error = %error,
            "classification degraded"
        );
    }

    fn on_cleanup_failed(&self, ctx: &IngestionContext, error: &IngestionError) {
        tracing::warn!(
            document_id = %ctx.document_id,
            tab = %ctx.tab_name,
            error = %error,
            "temporary copy cleanup failed"
        );
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_tab_ingested(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{} ok kind={:?} document={} tab={} rows={} columns={}",
            unix_ts(),
            stats.kind,
            ctx.document_id,
            ctx.tab_name,
            stats.rows,
            stats.columns
        ));
    }

    fn on_tab_failed(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "{} fail severity={:?} document={} tab={} err={}",
            unix_ts(),
            severity,
            ctx.document_id,
            ctx.tab_name,
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} document={} tab={} err={}",
            unix_ts(),
            severity,
            ctx.document_id,
            ctx.tab_name,
            error
        ));
    }

    fn on_classification_degraded(&self, ctx: &IngestionContext, error: &IngestionError) {
        self.append_line(&format!(
            "{} degraded document={} tab={} err={}",
            unix_ts(),
            ctx.document_id,
            ctx.tab_name,
            error
        ));
    }

    fn on_cleanup_failed(&self, ctx: &IngestionContext, error: &IngestionError) {
        self.append_line(&format!(
            "{} cleanup_failed document={} tab={} err={}",
            unix_ts(),
            ctx.document_id,
            ctx.tab_name,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

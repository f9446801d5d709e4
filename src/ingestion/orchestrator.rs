//! Ingestion orchestrator.
//!
//! Most callers should use [`SpreadsheetIngestor::ingest`], which turns every tab of a remote
//! spreadsheet into a [`crate::types::TableDescriptor`]:
//!
//! - the tab list is fetched once; failing to fetch it is the only fatal error
//! - each tab is classified; tabular tabs are normalized and padded, graphical tabs are exported
//!   and uploaded as a file snapshot
//! - a failing tab never aborts the call: it is skipped, or reported as an empty descriptor with
//!   an `importError` when [`FailedTabPolicy::Report`] is configured
//! - output order follows source tab order
//!
//! If an [`IngestionObserver`] is provided, per-tab successes, failures and alerts are reported
//! to it.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sheet_import::config::{BlobStoreConfig, GoogleApiConfig};
//! use sheet_import::ingestion::{IngestionOptions, SpreadsheetIngestor, TracingObserver};
//! use sheet_import::remote::Credentials;
//!
//! # async fn run() -> Result<(), sheet_import::IngestionError> {
//! let options = IngestionOptions {
//!     observer: Some(Arc::new(TracingObserver)),
//!     ..Default::default()
//! };
//! let ingestor = SpreadsheetIngestor::google(
//!     GoogleApiConfig::default(),
//!     BlobStoreConfig::new("https://files.example.com/upload"),
//!     options,
//! )?;
//!
//! let tables = ingestor.ingest("1AbCdEf", &Credentials::bearer("ya29.token")).await?;
//! for t in &tables {
//!     println!("{} rows={} preview={:?}", t.table_name, t.row_count(), t.excel_preview);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{BlobStoreConfig, FailedTabPolicy, GoogleApiConfig, IngestionConfig};
use crate::error::{IngestionError, IngestionResult};
use crate::execution::{run_ordered, ExecutionMetrics, TabResult};
use crate::remote::{
    with_timeout, BlobStore, Credentials, DocumentService, GoogleWorkspaceClient, HttpBlobStore, SpreadsheetService,
};
use crate::types::{TabMetadata, TabOutcome, TableDescriptor};

use super::classifier::{TabClassifier, Verdict};
use super::export::TabExporter;
use super::header::normalize_headers;
use super::observability::{
    severity_for_error, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TabKind,
};
use super::rows::{column_descriptors, materialize_rows};

/// Options controlling ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// Heuristics, limits and timeouts.
    pub config: IngestionConfig,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("config", &self.config)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            config: IngestionConfig::default(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Turns the tabs of a remote spreadsheet into table descriptors.
pub struct SpreadsheetIngestor {
    sheets: Arc<dyn SpreadsheetService>,
    classifier: TabClassifier,
    exporter: TabExporter,
    options: IngestionOptions,
    metrics: Arc<ExecutionMetrics>,
}

impl fmt::Debug for SpreadsheetIngestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetIngestor")
            .field("classifier", &self.classifier)
            .field("exporter", &self.exporter)
            .field("options", &self.options)
            .finish()
    }
}

impl SpreadsheetIngestor {
    /// Create an ingestor over the given collaborators.
    ///
    /// Returns [`IngestionError::Config`] if `options.config` is invalid.
    pub fn new(
        sheets: Arc<dyn SpreadsheetService>,
        documents: Arc<dyn DocumentService>,
        blobs: Arc<dyn BlobStore>,
        options: IngestionOptions,
    ) -> IngestionResult<Self> {
        options.config.validate()?;
        let cfg = &options.config;

        let classifier = TabClassifier::new(Arc::clone(&sheets), cfg.fill_ratio_threshold, cfg.request_timeout());
        let mut exporter = TabExporter::new(
            Arc::clone(&sheets),
            documents,
            blobs,
            cfg.export_mime_type.clone(),
            cfg.request_timeout(),
        )
        .with_verification(cfg.verify_exports);
        if let Some(obs) = &options.observer {
            exporter = exporter.with_observer(Arc::clone(obs));
        }

        Ok(Self {
            sheets,
            classifier,
            exporter,
            options,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Create an ingestor backed by the Google Sheets/Drive APIs and an HTTP blob store.
    pub fn google(google: GoogleApiConfig, blob: BlobStoreConfig, options: IngestionOptions) -> IngestionResult<Self> {
        let timeout = options.config.request_timeout();
        let client = Arc::new(GoogleWorkspaceClient::new(google, timeout)?);
        let blobs = Arc::new(HttpBlobStore::new(blob, timeout)?);
        Self::new(client.clone(), client, blobs, options)
    }

    /// Get a handle to real-time execution metrics.
    ///
    /// Metrics belong to this ingestor and describe its most recent [`Self::ingest`] call only:
    /// each call resets them, so concurrent calls on one ingestor overwrite each other's counters.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The classifier used for every tab.
    pub fn classifier(&self) -> &TabClassifier {
        &self.classifier
    }

    /// The exporter used for graphical tabs.
    pub fn exporter(&self) -> &TabExporter {
        &self.exporter
    }

    /// Ingest every tab of `document_id`.
    ///
    /// Returns an error only when the tab list cannot be fetched or the configured deadline is
    /// exceeded. Tabs that fail are skipped or reported according to the failed-tab policy.
    pub async fn ingest(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<Vec<TableDescriptor>> {
        let run = self.metrics.start_run();
        let result = match self.options.config.deadline() {
            Some(after) => tokio::time::timeout(after, self.ingest_all(document_id, credentials))
                .await
                .map_err(|_| {
                    error!(document_id, ?after, "ingestion deadline exceeded");
                    IngestionError::DeadlineExceeded { after }
                })?,
            None => self.ingest_all(document_id, credentials).await,
        };
        drop(run);

        if let Ok(tables) = &result {
            info!(document_id, tables = tables.len(), metrics = %self.metrics.snapshot(), "spreadsheet ingested");
        }
        result
    }

    async fn ingest_all(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<Vec<TableDescriptor>> {
        let tabs = with_timeout(
            "list_tabs",
            self.options.config.request_timeout(),
            self.sheets.list_tabs(document_id, credentials),
        )
        .await
        .map_err(|e| {
            error!(document_id, error = %e, "failed to list tabs");
            IngestionError::MetadataFetch {
                document_id: document_id.to_string(),
                source: Box::new(e),
            }
        })?;
        info!(document_id, tabs = tabs.len(), "ingesting spreadsheet");

        let limit = self.options.config.max_concurrent_tabs;
        let results = run_ordered(tabs, limit, |tab| self.process_tab(document_id, tab, credentials)).await;
        Ok(results.into_iter().flatten().collect())
    }

    async fn process_tab(
        &self,
        document_id: &str,
        tab: TabMetadata,
        credentials: &Credentials,
    ) -> Option<TableDescriptor> {
        self.metrics.on_tab_start();
        let ctx = IngestionContext {
            document_id: document_id.to_string(),
            tab_id: tab.tab_id,
            tab_name: tab.tab_name.clone(),
        };

        match self.ingest_tab(document_id, &tab, credentials).await {
            Ok(outcome) => {
                let stats = stats_for(&outcome);
                self.metrics.on_tab_end(match stats.map(|s| s.kind) {
                    Some(TabKind::Tabular) => TabResult::Tabular,
                    Some(TabKind::Graphical) => TabResult::Graphical,
                    None => TabResult::Failed,
                });
                if let (Some(stats), Some(obs)) = (stats, &self.options.observer) {
                    obs.on_tab_ingested(&ctx, stats);
                }
                Some(TableDescriptor::from_outcome(tab.tab_name, outcome))
            }
            Err(e) => {
                self.metrics.on_tab_end(TabResult::Failed);
                let err = IngestionError::TabProcessing {
                    tab: tab.tab_name.clone(),
                    source: Box::new(e),
                };
                let severity = severity_for_error(&err);
                warn!(document_id, tab = %tab.tab_name, ?severity, error = %err, "tab failed");
                if let Some(obs) = &self.options.observer {
                    obs.on_tab_failed(&ctx, severity, &err);
                    if severity >= self.options.alert_at_or_above {
                        obs.on_alert(&ctx, severity, &err);
                    }
                }

                match self.options.config.failed_tab_policy {
                    FailedTabPolicy::Skip => None,
                    FailedTabPolicy::Report => Some(TableDescriptor::from_outcome(
                        tab.tab_name,
                        TabOutcome::Failed {
                            message: err.to_string(),
                        },
                    )),
                }
            }
        }
    }

    /// Classify one tab and route it to the tabular or the export path.
    ///
    /// Unlike [`Self::ingest`], errors are returned as-is.
    pub async fn ingest_tab(
        &self,
        document_id: &str,
        tab: &TabMetadata,
        credentials: &Credentials,
    ) -> IngestionResult<TabOutcome> {
        let inspection = self.classifier.inspect(document_id, tab, credentials).await?;
        if let (Some(err), Some(obs)) = (&inspection.degraded, &self.options.observer) {
            let ctx = IngestionContext {
                document_id: document_id.to_string(),
                tab_id: tab.tab_id,
                tab_name: tab.tab_name.clone(),
            };
            obs.on_classification_degraded(&ctx, err);
        }

        match inspection.verdict {
            Verdict::Graphical(reason) => {
                info!(document_id, tab = %tab.tab_name, %reason, "tab is graphical; exporting");
                let preview_path = self
                    .exporter
                    .export_tab(document_id, tab.tab_id, &tab.tab_name, credentials)
                    .await?;
                Ok(TabOutcome::Graphical { preview_path })
            }
            Verdict::Tabular => Ok(self.tabular_outcome(inspection.values)),
        }
    }

    /// First row is the header, the rest is data. The header is widened to the widest row so no
    /// data cell is lost.
    fn tabular_outcome(&self, mut values: Vec<Vec<String>>) -> TabOutcome {
        let cfg = &self.options.config;
        let width = values.iter().map(Vec::len).max().unwrap_or(0);
        let data = values.split_off(values.len().min(1));
        let mut header = values.pop().unwrap_or_default();
        header.resize(width, String::new());

        let names = normalize_headers(&header);
        let rows = materialize_rows(&data, &names, cfg.row_floor);
        let columns = column_descriptors(&names, cfg.column_width);
        TabOutcome::Tabular { columns, rows }
    }
}

/// Stats for a successful outcome; `None` for [`TabOutcome::Failed`].
fn stats_for(outcome: &TabOutcome) -> Option<IngestionStats> {
    match outcome {
        TabOutcome::Tabular { columns, rows } => Some(IngestionStats {
            kind: TabKind::Tabular,
            rows: rows.len(),
            columns: columns.len(),
        }),
        TabOutcome::Graphical { .. } => Some(IngestionStats {
            kind: TabKind::Graphical,
            rows: 0,
            columns: 0,
        }),
        TabOutcome::Failed { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::stats_for;
    use crate::ingestion::observability::TabKind;
    use crate::ingestion::rows::{column_descriptors, materialize_rows};
    use crate::types::TabOutcome;

    #[test]
    fn stats_follow_outcome_kind() {
        let names = vec!["a".to_string(), "b".to_string()];
        let tabular = TabOutcome::Tabular {
            columns: column_descriptors(&names, 150),
            rows: materialize_rows(&[vec!["1", "2"]], &names, 3),
        };
        let stats = stats_for(&tabular).unwrap();
        assert_eq!((stats.kind, stats.rows, stats.columns), (TabKind::Tabular, 3, 2));

        let graphical = TabOutcome::Graphical {
            preview_path: "uploads/a.xlsx".to_string(),
        };
        assert_eq!(stats_for(&graphical).map(|s| s.kind), Some(TabKind::Graphical));
    }

    #[test]
    fn failed_outcome_has_no_stats() {
        let failed = TabOutcome::Failed {
            message: "boom".to_string(),
        };
        assert!(stats_for(&failed).is_none());
    }
}

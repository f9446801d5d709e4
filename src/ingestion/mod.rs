//! Spreadsheet ingestion.
//!
//! Most callers should use [`SpreadsheetIngestor::ingest`] (from [`orchestrator`]) which:
//!
//! - lists the tabs of a remote spreadsheet
//! - classifies each tab as tabular or graphical ([`classifier`])
//! - normalizes headers ([`header`]) and materializes padded rows ([`rows`]) for tabular tabs
//! - exports and uploads a single-tab snapshot for graphical tabs ([`export`])
//! - optionally reports per-tab outcomes and alerts to an [`IngestionObserver`]
//!
//! The building blocks are public so they can be used on their own.

pub mod classifier;
#[cfg(feature = "excel")]
pub mod excel;
pub mod export;
pub mod header;
pub mod observability;
pub mod orchestrator;
pub mod rows;

pub use classifier::{classify, GraphicalReason, Inspection, TabClassifier, Verdict};
pub use export::{TabExporter, TemporaryCopy};
pub use header::normalize_headers;
pub use observability::{
    severity_for_error, CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, TabKind, TracingObserver,
};
pub use orchestrator::{IngestionOptions, SpreadsheetIngestor};
pub use rows::{column_descriptors, materialize_rows};

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Step of the export-and-upload fallback in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// Duplicating the source document.
    Copy,
    /// Deleting every tab except the target from the duplicate.
    Strip,
    /// Rendering the duplicate as a spreadsheet file.
    Export,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Copy => "copy",
            Self::Strip => "strip",
            Self::Export => "export",
        };
        f.write_str(s)
    }
}

/// Error type returned by ingestion functions.
///
/// Only [`IngestionError::MetadataFetch`] and [`IngestionError::DeadlineExceeded`] escape
/// [`crate::ingestion::SpreadsheetIngestor::ingest`]; every other variant stays confined to the
/// tab that raised it.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (config file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (connection refused, TLS failure, body decode).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "excel")]
    /// The exported workbook could not be read back (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// A spawned background task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A remote API answered with a non-success status.
    #[error("{operation} failed with status {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// A single remote call exceeded its per-request timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The whole ingestion call exceeded the caller-supplied deadline.
    #[error("ingestion deadline exceeded after {after:?}")]
    DeadlineExceeded { after: Duration },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The spreadsheet's tab list could not be fetched. Fatal for the whole call.
    #[error("failed to list tabs of document '{document_id}': {source}")]
    MetadataFetch {
        document_id: String,
        #[source]
        source: Box<IngestionError>,
    },

    /// A single tab could not be ingested.
    #[error("tab '{tab}' could not be ingested: {source}")]
    TabProcessing {
        tab: String,
        #[source]
        source: Box<IngestionError>,
    },

    /// The copy, strip or export step of the fallback path failed.
    #[error("{stage} step failed: {source}")]
    Export {
        stage: ExportStage,
        #[source]
        source: Box<IngestionError>,
    },

    /// The blob store rejected the upload.
    #[error("upload failed with status {status}: {body}")]
    Upload { status: u16, body: String },

    /// The exported payload is not the single-tab workbook that was requested.
    #[error("invalid export: {message}")]
    InvalidExport { message: String },

    /// The temporary duplicate could not be deleted. Logged, never returned by an export.
    #[error("failed to delete temporary document '{document_id}': {source}")]
    Cleanup {
        document_id: String,
        #[source]
        source: Box<IngestionError>,
    },
}

impl IngestionError {
    pub(crate) fn export(stage: ExportStage, source: IngestionError) -> Self {
        Self::Export {
            stage,
            source: Box::new(source),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

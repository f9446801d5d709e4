//! Collaborator abstractions for the remote spreadsheet, document and blob-storage services.
//!
//! The ingestion pipeline only talks to these traits. HTTP implementations are provided in
//! [`google`] (Sheets v4 + Drive v3) and [`blob`] (multipart upload endpoint); tests substitute
//! in-memory fakes.

pub mod blob;
pub mod google;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{TabFeatures, TabMetadata};

pub use blob::HttpBlobStore;
pub use google::GoogleWorkspaceClient;

/// Bearer credentials forwarded to every remote call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
}

impl Credentials {
    /// Wrap an OAuth access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Spreadsheet metadata and value service.
#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// List the tabs of a document in source order.
    async fn list_tabs(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<Vec<TabMetadata>>;

    /// Structural features of a single tab.
    async fn tab_features(
        &self,
        document_id: &str,
        tab_id: i64,
        credentials: &Credentials,
    ) -> IngestionResult<TabFeatures>;

    /// All cell values of a tab as strings, row-major. Trailing empty cells may be omitted.
    async fn get_values(
        &self,
        document_id: &str,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<Vec<Vec<String>>>;
}

/// Document duplication, mutation and export service.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Create a full duplicate of a document and return the duplicate's id.
    async fn copy_document(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<String>;

    /// Delete the listed tabs from a document.
    async fn delete_tabs(&self, document_id: &str, tab_ids: &[i64], credentials: &Credentials) -> IngestionResult<()>;

    /// Render a document as a file of the given MIME type.
    async fn export_document(
        &self,
        document_id: &str,
        mime_type: &str,
        credentials: &Credentials,
    ) -> IngestionResult<Vec<u8>>;

    /// Permanently delete a document.
    async fn delete_document(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<()>;
}

/// A file handed to the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Blob-storage service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a file and return its storage path.
    async fn upload(&self, file: UploadFile, credentials: &Credentials) -> IngestionResult<String>;
}

/// Run `fut` under a per-request timeout.
pub(crate) async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> IngestionResult<T>
where
    F: Future<Output = IngestionResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(IngestionError::Timeout { operation, after }),
    }
}

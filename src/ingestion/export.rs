//! Export-and-upload fallback for graphical tabs.
//!
//! `copy → strip → export → upload`, then the temporary copy is deleted whatever happened. The
//! copy is owned by a [`TemporaryCopy`] guard: an explicit release deletes it, and if the owning
//! future is dropped first (deadline, caller cancellation) the guard's `Drop` schedules the delete
//! on the current runtime. The delete is issued exactly once either way.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::error::{ExportStage, IngestionError, IngestionResult};
use crate::remote::blob::export_file_name;
use crate::remote::{with_timeout, BlobStore, Credentials, DocumentService, SpreadsheetService, UploadFile};

use super::observability::{IngestionContext, IngestionObserver};

/// A temporary duplicate document that must be deleted once.
pub struct TemporaryCopy {
    documents: Arc<dyn DocumentService>,
    document_id: String,
    credentials: Credentials,
    timeout: Duration,
    armed: bool,
}

impl TemporaryCopy {
    fn new(
        documents: Arc<dyn DocumentService>,
        document_id: String,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            documents,
            document_id,
            credentials,
            timeout,
            armed: true,
        }
    }

    /// Id of the duplicate.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Delete the duplicate now.
    ///
    /// The delete runs as its own task, so it completes even if the caller stops awaiting it.
    pub async fn release(mut self) -> IngestionResult<()> {
        let document_id = self.document_id.clone();
        let Some(delete) = self.take_delete() else {
            return Ok(());
        };

        let deleted = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle
                .spawn(delete)
                .await
                .map_err(IngestionError::from)
                .and_then(|r| r),
            Err(_) => delete.await,
        };
        deleted.map_err(|e| IngestionError::Cleanup {
            document_id,
            source: Box::new(e),
        })
    }

    /// Disarm the guard and build the delete. Returns `None` once disarmed.
    fn take_delete(&mut self) -> Option<BoxFuture<'static, IngestionResult<()>>> {
        if !self.armed {
            return None;
        }
        self.armed = false;

        let documents = Arc::clone(&self.documents);
        let document_id = std::mem::take(&mut self.document_id);
        let credentials = self.credentials.clone();
        let timeout = self.timeout;
        Some(
            async move {
                with_timeout(
                    "delete_document",
                    timeout,
                    documents.delete_document(&document_id, &credentials),
                )
                .await
            }
            .boxed(),
        )
    }
}

impl fmt::Debug for TemporaryCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCopy")
            .field("document_id", &self.document_id)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for TemporaryCopy {
    fn drop(&mut self) {
        let document_id = self.document_id.clone();
        let Some(delete) = self.take_delete() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    document_id = %document_id,
                    "export abandoned; deleting temporary copy in background"
                );
                handle.spawn(async move {
                    if let Err(e) = delete.await {
                        warn!(document_id = %document_id, error = %e, "background cleanup failed");
                    }
                });
            }
            Err(_) => {
                warn!(document_id = %document_id, "no runtime available; temporary copy leaked");
            }
        }
    }
}

/// Produces a single-tab file snapshot of a tab and stores it in blob storage.
#[derive(Clone)]
pub struct TabExporter {
    sheets: Arc<dyn SpreadsheetService>,
    documents: Arc<dyn DocumentService>,
    blobs: Arc<dyn BlobStore>,
    mime_type: String,
    timeout: Duration,
    verify: bool,
    observer: Option<Arc<dyn IngestionObserver>>,
}

impl fmt::Debug for TabExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabExporter")
            .field("mime_type", &self.mime_type)
            .field("timeout", &self.timeout)
            .field("verify", &self.verify)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl TabExporter {
    pub fn new(
        sheets: Arc<dyn SpreadsheetService>,
        documents: Arc<dyn DocumentService>,
        blobs: Arc<dyn BlobStore>,
        mime_type: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            sheets,
            documents,
            blobs,
            mime_type: mime_type.into(),
            timeout,
            verify: false,
            observer: None,
        }
    }

    /// Read the exported workbook back before uploading it. Ignored without feature `excel` and
    /// for exports that are not `.xlsx` or `.ods` workbooks.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Report cleanup failures to an observer.
    pub fn with_observer(mut self, observer: Arc<dyn IngestionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Export one tab and return the storage path of the uploaded snapshot.
    ///
    /// Failures in copy, strip, export or upload are returned; a failure deleting the temporary
    /// copy is only logged and reported to the observer.
    pub async fn export_tab(
        &self,
        document_id: &str,
        tab_id: i64,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<String> {
        let copy_id = with_timeout(
            "copy_document",
            self.timeout,
            self.documents.copy_document(document_id, credentials),
        )
        .await
        .map_err(|e| IngestionError::export(ExportStage::Copy, e))?;
        debug!(document_id, copy_id = %copy_id, tab = %tab_name, "created temporary copy");

        let copy = TemporaryCopy::new(
            Arc::clone(&self.documents),
            copy_id,
            credentials.clone(),
            self.timeout,
        );

        let outcome = self
            .export_from_copy(copy.document_id(), tab_id, tab_name, credentials)
            .await;

        let copy_id = copy.document_id().to_string();
        match copy.release().await {
            Ok(()) => debug!(copy_id = %copy_id, "deleted temporary copy"),
            Err(e) => {
                warn!(copy_id = %copy_id, tab = %tab_name, error = %e, "failed to delete temporary copy");
                if let Some(obs) = &self.observer {
                    let ctx = IngestionContext {
                        document_id: document_id.to_string(),
                        tab_id,
                        tab_name: tab_name.to_string(),
                    };
                    obs.on_cleanup_failed(&ctx, &e);
                }
            }
        }

        if let Ok(path) = &outcome {
            info!(document_id, tab = %tab_name, path = %path, "exported graphical tab");
        }
        outcome
    }

    async fn export_from_copy(
        &self,
        copy_id: &str,
        tab_id: i64,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<String> {
        self.strip(copy_id, tab_id, tab_name, credentials)
            .await
            .map_err(|e| IngestionError::export(ExportStage::Strip, e))?;

        let payload = with_timeout(
            "export_document",
            self.timeout,
            self.documents.export_document(copy_id, &self.mime_type, credentials),
        )
        .await
        .map_err(|e| IngestionError::export(ExportStage::Export, e))?;
        debug!(copy_id, bytes = payload.len(), "exported temporary copy");

        self.verify_payload(&payload, tab_name)
            .map_err(|e| IngestionError::export(ExportStage::Export, e))?;

        let file = UploadFile {
            file_name: export_file_name(tab_name, &self.mime_type),
            content_type: self.mime_type.clone(),
            bytes: payload,
        };
        with_timeout("upload", self.timeout, self.blobs.upload(file, credentials)).await
    }

    /// Delete every tab of the copy except the target.
    ///
    /// Tab ids survive a copy; the name is used only if the id is not found.
    async fn strip(
        &self,
        copy_id: &str,
        tab_id: i64,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<()> {
        let tabs = with_timeout("list_tabs", self.timeout, self.sheets.list_tabs(copy_id, credentials)).await?;

        let keep = tabs
            .iter()
            .find(|t| t.tab_id == tab_id)
            .or_else(|| tabs.iter().find(|t| t.tab_name == tab_name))
            .map(|t| t.tab_id)
            .ok_or_else(|| IngestionError::InvalidExport {
                message: format!("tab '{tab_name}' ({tab_id}) not found in temporary copy '{copy_id}'"),
            })?;

        let doomed: Vec<i64> = tabs.iter().map(|t| t.tab_id).filter(|id| *id != keep).collect();
        if doomed.is_empty() {
            return Ok(());
        }
        debug!(copy_id, removed = doomed.len(), "stripping temporary copy");
        with_timeout(
            "delete_tabs",
            self.timeout,
            self.documents.delete_tabs(copy_id, &doomed, credentials),
        )
        .await
    }

    #[cfg(feature = "excel")]
    fn verify_payload(&self, payload: &[u8], tab_name: &str) -> IngestionResult<()> {
        let workbook = matches!(crate::remote::blob::extension_for_mime(&self.mime_type), "xlsx" | "ods");
        if self.verify && workbook {
            super::excel::verify_single_tab_export(payload, tab_name)?;
        }
        Ok(())
    }

    #[cfg(not(feature = "excel"))]
    fn verify_payload(&self, _payload: &[u8], _tab_name: &str) -> IngestionResult<()> {
        Ok(())
    }
}

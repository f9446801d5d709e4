#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sheet_import::config::IngestionConfig;
use sheet_import::ingestion::{
    IngestionContext, IngestionObserver, IngestionOptions, IngestionSeverity, IngestionStats, SpreadsheetIngestor,
};
use sheet_import::remote::{BlobStore, Credentials, DocumentService, SpreadsheetService, UploadFile};
use sheet_import::types::{TabFeatures, TabMetadata};
use sheet_import::{IngestionError, IngestionResult};

pub const SOURCE_DOC: &str = "doc-1";

/// Remote operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListTabs,
    TabFeatures,
    GetValues,
    Copy,
    DeleteTabs,
    Export,
    Delete,
    Upload,
}

#[derive(Debug, Clone)]
pub struct FakeTab {
    pub id: i64,
    pub name: String,
    pub features: TabFeatures,
    pub values: Vec<Vec<String>>,
}

impl FakeTab {
    pub fn new(id: i64, name: &str, values: &[&[&str]]) -> Self {
        Self {
            id,
            name: name.to_string(),
            features: TabFeatures::default(),
            values: grid(values),
        }
    }

    pub fn with_charts(mut self) -> Self {
        self.features.has_charts = true;
        self
    }

    pub fn with_merges(mut self) -> Self {
        self.features.has_merges = true;
        self
    }
}

pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

/// In-memory spreadsheet, document and blob service.
///
/// Every call is appended to `calls` as `"{op}:{target}"`.
#[derive(Default)]
pub struct FakeWorkspace {
    documents: Mutex<HashMap<String, Vec<FakeTab>>>,
    failures: Mutex<HashSet<(Op, Option<String>)>>,
    delays: Mutex<HashMap<(Op, Option<String>), Duration>>,
    export_payload: Mutex<Option<Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<UploadFile>>,
    copies: AtomicUsize,
}

impl FakeWorkspace {
    pub fn new(tabs: Vec<FakeTab>) -> Arc<Self> {
        let ws = Self::default();
        ws.documents.lock().unwrap().insert(SOURCE_DOC.to_string(), tabs);
        Arc::new(ws)
    }

    /// Fail every call of `op`.
    pub fn fail(&self, op: Op) {
        self.failures.lock().unwrap().insert((op, None));
    }

    /// Fail calls of `op` that target the tab named `tab`.
    pub fn fail_tab(&self, op: Op, tab: &str) {
        self.failures.lock().unwrap().insert((op, Some(tab.to_string())));
    }

    /// Delay calls of `op` that target the tab named `tab`.
    pub fn delay_tab(&self, op: Op, tab: &str, by: Duration) {
        self.delays.lock().unwrap().insert((op, Some(tab.to_string())), by);
    }

    /// Delay every call of `op`.
    pub fn delay(&self, op: Op, by: Duration) {
        self.delays.lock().unwrap().insert((op, None), by);
    }

    /// Bytes returned by `export_document`. Defaults to a short marker.
    pub fn set_export_payload(&self, bytes: Vec<u8>) {
        *self.export_payload.lock().unwrap() = Some(bytes);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn uploads(&self) -> Vec<UploadFile> {
        self.uploads.lock().unwrap().clone()
    }

    /// Ids of temporary copies that still exist.
    pub fn live_copies(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .documents
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.as_str() != SOURCE_DOC)
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn gate(&self, op: Op, tab: Option<&str>) -> IngestionResult<()> {
        let delay = {
            let delays = self.delays.lock().unwrap();
            tab.and_then(|t| delays.get(&(op, Some(t.to_string()))).copied())
                .or_else(|| delays.get(&(op, None)).copied())
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let failures = self.failures.lock().unwrap();
        let failing = failures.contains(&(op, None))
            || tab.is_some_and(|t| failures.contains(&(op, Some(t.to_string()))));
        if failing {
            return Err(IngestionError::Api {
                operation: "fake",
                status: 500,
                body: format!("{op:?} failed"),
            });
        }
        Ok(())
    }

    fn tabs_of(&self, document_id: &str) -> IngestionResult<Vec<FakeTab>> {
        self.documents
            .lock()
            .unwrap()
            .get(document_id)
            .cloned()
            .ok_or_else(|| IngestionError::Api {
                operation: "fake",
                status: 404,
                body: format!("no document '{document_id}'"),
            })
    }

    fn tab_name(&self, document_id: &str, tab_id: i64) -> Option<String> {
        self.tabs_of(document_id)
            .ok()?
            .into_iter()
            .find(|t| t.id == tab_id)
            .map(|t| t.name)
    }
}

#[async_trait]
impl SpreadsheetService for FakeWorkspace {
    async fn list_tabs(&self, document_id: &str, _credentials: &Credentials) -> IngestionResult<Vec<TabMetadata>> {
        self.record(format!("list_tabs:{document_id}"));
        self.gate(Op::ListTabs, None).await?;
        Ok(self
            .tabs_of(document_id)?
            .into_iter()
            .map(|t| TabMetadata::new(t.id, t.name))
            .collect())
    }

    async fn tab_features(
        &self,
        document_id: &str,
        tab_id: i64,
        _credentials: &Credentials,
    ) -> IngestionResult<TabFeatures> {
        let name = self.tab_name(document_id, tab_id);
        self.record(format!("tab_features:{}", name.as_deref().unwrap_or("?")));
        self.gate(Op::TabFeatures, name.as_deref()).await?;
        self.tabs_of(document_id)?
            .into_iter()
            .find(|t| t.id == tab_id)
            .map(|t| t.features)
            .ok_or_else(|| IngestionError::Api {
                operation: "fake",
                status: 404,
                body: format!("no tab {tab_id}"),
            })
    }

    async fn get_values(
        &self,
        document_id: &str,
        tab_name: &str,
        _credentials: &Credentials,
    ) -> IngestionResult<Vec<Vec<String>>> {
        self.record(format!("get_values:{tab_name}"));
        self.gate(Op::GetValues, Some(tab_name)).await?;
        Ok(self
            .tabs_of(document_id)?
            .into_iter()
            .find(|t| t.name == tab_name)
            .map(|t| t.values)
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentService for FakeWorkspace {
    async fn copy_document(&self, document_id: &str, _credentials: &Credentials) -> IngestionResult<String> {
        self.record(format!("copy:{document_id}"));
        self.gate(Op::Copy, None).await?;
        let tabs = self.tabs_of(document_id)?;
        let id = format!("copy-{}", self.copies.fetch_add(1, Ordering::SeqCst) + 1);
        self.documents.lock().unwrap().insert(id.clone(), tabs);
        Ok(id)
    }

    async fn delete_tabs(&self, document_id: &str, tab_ids: &[i64], _credentials: &Credentials) -> IngestionResult<()> {
        self.record(format!("delete_tabs:{document_id}:{tab_ids:?}"));
        self.gate(Op::DeleteTabs, None).await?;
        let mut docs = self.documents.lock().unwrap();
        if let Some(tabs) = docs.get_mut(document_id) {
            tabs.retain(|t| !tab_ids.contains(&t.id));
        }
        Ok(())
    }

    async fn export_document(
        &self,
        document_id: &str,
        mime_type: &str,
        _credentials: &Credentials,
    ) -> IngestionResult<Vec<u8>> {
        self.record(format!("export:{document_id}"));
        self.gate(Op::Export, None).await?;
        let tabs = self.tabs_of(document_id)?;
        Ok(self
            .export_payload
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("{mime_type}:{}", tabs.len()).into_bytes()))
    }

    async fn delete_document(&self, document_id: &str, _credentials: &Credentials) -> IngestionResult<()> {
        self.record(format!("delete:{document_id}"));
        self.gate(Op::Delete, None).await?;
        self.documents.lock().unwrap().remove(document_id);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FakeWorkspace {
    async fn upload(&self, file: UploadFile, _credentials: &Credentials) -> IngestionResult<String> {
        self.record(format!("upload:{}", file.file_name));
        self.gate(Op::Upload, None).await?;
        let path = format!("uploads/{}", file.file_name);
        self.uploads.lock().unwrap().push(file);
        Ok(path)
    }
}

/// Config for tests: no export verification, everything else default.
pub fn test_config() -> IngestionConfig {
    IngestionConfig {
        verify_exports: false,
        ..Default::default()
    }
}

pub fn ingestor(ws: &Arc<FakeWorkspace>, options: IngestionOptions) -> SpreadsheetIngestor {
    SpreadsheetIngestor::new(ws.clone(), ws.clone(), ws.clone(), options).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials::bearer("test-token")
}

#[derive(Default)]
pub struct RecordingObserver {
    pub ingested: Mutex<Vec<(String, IngestionStats)>>,
    pub failures: Mutex<Vec<(String, IngestionSeverity)>>,
    pub alerts: Mutex<Vec<(String, IngestionSeverity)>>,
    pub degraded: Mutex<Vec<String>>,
    pub cleanup_failures: Mutex<Vec<String>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_tab_ingested(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.ingested.lock().unwrap().push((ctx.tab_name.clone(), stats));
    }

    fn on_tab_failed(&self, ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push((ctx.tab_name.clone(), severity));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push((ctx.tab_name.clone(), severity));
    }

    fn on_classification_degraded(&self, ctx: &IngestionContext, _error: &IngestionError) {
        self.degraded.lock().unwrap().push(ctx.tab_name.clone());
    }

    fn on_cleanup_failed(&self, ctx: &IngestionContext, _error: &IngestionError) {
        self.cleanup_failures.lock().unwrap().push(ctx.tab_name.clone());
    }
}

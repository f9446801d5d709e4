//! Google Sheets v4 / Drive v3 implementation of [`SpreadsheetService`] and [`DocumentService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::json;

use super::{Credentials, DocumentService, SpreadsheetService};
use crate::config::GoogleApiConfig;
use crate::error::{IngestionError, IngestionResult};
use crate::types::{TabFeatures, TabMetadata};

const SHEET_FIELDS: &str = "sheets(properties(sheetId,title),charts(chartId),merges)";

/// HTTP client for the Google Sheets and Drive REST APIs.
///
/// The Sheets API does not report over-grid images or drawings, so `has_drawings` is always
/// `false` here; embedded charts are reported through `has_charts`.
#[derive(Debug, Clone)]
pub struct GoogleWorkspaceClient {
    client: Client,
    config: GoogleApiConfig,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetResource>,
}

#[derive(Debug, Deserialize)]
struct SheetResource {
    properties: SheetProperties,
    #[serde(default)]
    charts: Vec<serde_json::Value>,
    #[serde(default)]
    merges: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    id: String,
}

impl SheetResource {
    fn features(&self) -> TabFeatures {
        TabFeatures {
            has_drawings: false,
            has_charts: !self.charts.is_empty(),
            has_merges: !self.merges.is_empty(),
        }
    }
}

impl GoogleWorkspaceClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(config: GoogleApiConfig, timeout: Duration) -> IngestionResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, base: &str, segments: &[&str]) -> IngestionResult<Url> {
        let mut url = Url::parse(base).map_err(|e| IngestionError::config(format!("bad base url '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| IngestionError::config(format!("base url '{base}' cannot carry a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_sheets(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<Vec<SheetResource>> {
        let url = self.url(&self.config.sheets_base_url, &["spreadsheets", document_id])?;
        let req = self.client.get(url).query(&[("fields", SHEET_FIELDS)]);
        let resp = send("spreadsheets.get", req, credentials).await?;
        let body: SpreadsheetResponse = resp.json().await?;
        Ok(body.sheets)
    }
}

#[async_trait]
impl SpreadsheetService for GoogleWorkspaceClient {
    async fn list_tabs(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<Vec<TabMetadata>> {
        let sheets = self.fetch_sheets(document_id, credentials).await?;
        Ok(sheets
            .into_iter()
            .map(|s| {
                let features = s.features();
                TabMetadata::new(s.properties.sheet_id, s.properties.title).with_features(features)
            })
            .collect())
    }

    async fn tab_features(
        &self,
        document_id: &str,
        tab_id: i64,
        credentials: &Credentials,
    ) -> IngestionResult<TabFeatures> {
        let sheets = self.fetch_sheets(document_id, credentials).await?;
        sheets
            .iter()
            .find(|s| s.properties.sheet_id == tab_id)
            .map(SheetResource::features)
            .ok_or_else(|| IngestionError::Api {
                operation: "spreadsheets.get",
                status: 404,
                body: format!("tab {tab_id} not found in document '{document_id}'"),
            })
    }

    async fn get_values(
        &self,
        document_id: &str,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<Vec<Vec<String>>> {
        let range = a1_tab_range(tab_name);
        let url = self.url(
            &self.config.sheets_base_url,
            &["spreadsheets", document_id, "values", &range],
        )?;
        let req = self.client.get(url).query(&[
            ("majorDimension", "ROWS"),
            ("valueRenderOption", "FORMATTED_VALUE"),
        ]);
        let resp = send("values.get", req, credentials).await?;
        let body: ValueRangeResponse = resp.json().await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

#[async_trait]
impl DocumentService for GoogleWorkspaceClient {
    async fn copy_document(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<String> {
        let url = self.url(&self.config.drive_base_url, &["files", document_id, "copy"])?;
        let req = self
            .client
            .post(url)
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({}));
        let resp = send("files.copy", req, credentials).await?;
        let file: FileResponse = resp.json().await?;
        Ok(file.id)
    }

    async fn delete_tabs(&self, document_id: &str, tab_ids: &[i64], credentials: &Credentials) -> IngestionResult<()> {
        if tab_ids.is_empty() {
            return Ok(());
        }
        let segment = format!("{document_id}:batchUpdate");
        let url = self.url(&self.config.sheets_base_url, &["spreadsheets", &segment])?;
        let body = json!({ "requests": delete_sheet_requests(tab_ids) });
        let req = self.client.post(url).json(&body);
        send("spreadsheets.batchUpdate", req, credentials).await?;
        Ok(())
    }

    async fn export_document(
        &self,
        document_id: &str,
        mime_type: &str,
        credentials: &Credentials,
    ) -> IngestionResult<Vec<u8>> {
        let url = self.url(&self.config.drive_base_url, &["files", document_id, "export"])?;
        let req = self.client.get(url).query(&[("mimeType", mime_type)]);
        let resp = send("files.export", req, credentials).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn delete_document(&self, document_id: &str, credentials: &Credentials) -> IngestionResult<()> {
        let url = self.url(&self.config.drive_base_url, &["files", document_id])?;
        let req = self.client.delete(url).query(&[("supportsAllDrives", "true")]);
        send("files.delete", req, credentials).await?;
        Ok(())
    }
}

async fn send(operation: &'static str, req: RequestBuilder, credentials: &Credentials) -> IngestionResult<Response> {
    let resp = req.bearer_auth(credentials.access_token()).send().await?;
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(IngestionError::Api {
            operation,
            status,
            body,
        });
    }
    Ok(resp)
}

/// A1 range covering a whole tab: the tab name quoted, with embedded quotes doubled.
fn a1_tab_range(tab_name: &str) -> String {
    format!("'{}'", tab_name.replace('\'', "''"))
}

fn delete_sheet_requests(tab_ids: &[i64]) -> Vec<serde_json::Value> {
    tab_ids
        .iter()
        .map(|id| json!({ "deleteSheet": { "sheetId": id } }))
        .collect()
}

fn cell_to_string(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

//! Multipart-upload implementation of [`BlobStore`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{BlobStore, Credentials, UploadFile};
use crate::config::{BlobStoreConfig, ODS_MIME_TYPE, XLSX_MIME_TYPE};
use crate::error::{IngestionError, IngestionResult};

/// Uploads files to an HTTP endpoint that answers `{ "path": "<storage path>" }`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    config: BlobStoreConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    path: String,
}

impl HttpBlobStore {
    /// Create a store whose uploads time out after `timeout`.
    pub fn new(config: BlobStoreConfig, timeout: Duration) -> IngestionResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, file: UploadFile, credentials: &Credentials) -> IngestionResult<String> {
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        let form = Form::new().part(self.config.field_name.clone(), part);

        let response = self
            .client
            .post(&self.config.upload_url)
            .bearer_auth(credentials.access_token())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestionError::Upload { status, body });
        }

        let body: UploadResponse = response.json().await?;
        Ok(body.path)
    }
}

/// File extension for an export MIME type. Unknown types get `bin`.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        XLSX_MIME_TYPE => "xlsx",
        ODS_MIME_TYPE | "application/x-vnd.oasis.opendocument.spreadsheet" => "ods",
        "application/pdf" => "pdf",
        "text/csv" => "csv",
        "text/tab-separated-values" => "tsv",
        "application/zip" => "zip",
        _ => "bin",
    }
}

/// File name for an exported tab: the tab name with path separators and control characters
/// replaced, plus the extension matching `mime_type`.
pub fn export_file_name(tab_name: &str, mime_type: &str) -> String {
    let stem: String = tab_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() { "sheet" } else { stem.as_str() };
    format!("{stem}.{}", extension_for_mime(mime_type))
}

//! Configuration for spreadsheet ingestion.
//!
//! [`IngestionConfig`] holds the tunable heuristics and timeouts of the pipeline. Every field has
//! a default, so a TOML file only needs to mention what it overrides:
//!
//! ```
//! use sheet_import::config::{FailedTabPolicy, IngestionConfig};
//!
//! let cfg = IngestionConfig::from_toml_str(
//!     r#"
//!     fill_ratio_threshold = 0.4
//!     max_concurrent_tabs = 4
//!     failed_tab_policy = "report"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(cfg.row_floor, 1000);
//! assert_eq!(cfg.failed_tab_policy, FailedTabPolicy::Report);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};

/// MIME type of an Office Open XML workbook (`.xlsx`).
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// MIME type of an OpenDocument spreadsheet (`.ods`).
pub const ODS_MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

/// What to do with a tab whose processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedTabPolicy {
    /// Drop the tab from the result.
    #[default]
    Skip,
    /// Emit an empty descriptor carrying the error message.
    Report,
}

/// Tunable settings of the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Tabs with merges whose filled-cell ratio is below this value are treated as graphical.
    pub fill_ratio_threshold: f64,
    /// Minimum row count of a tabular table; shorter tables are padded with blank rows.
    pub row_floor: usize,
    /// Display width assigned to every imported column.
    pub column_width: u32,
    /// Timeout applied to each remote call, in seconds.
    pub request_timeout_secs: u64,
    /// Optional deadline for a whole ingestion call, in seconds.
    pub deadline_secs: Option<u64>,
    /// Number of tabs processed concurrently. `1` means strictly sequential.
    pub max_concurrent_tabs: usize,
    /// Failed-tab handling.
    pub failed_tab_policy: FailedTabPolicy,
    /// MIME type requested when exporting a graphical tab. Also picks the uploaded file's
    /// extension.
    pub export_mime_type: String,
    /// Read the exported workbook back before uploading it (requires feature `excel`; only
    /// applies to `.xlsx` and `.ods` exports).
    pub verify_exports: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            fill_ratio_threshold: 0.5,
            row_floor: 1000,
            column_width: 150,
            request_timeout_secs: 30,
            deadline_secs: None,
            max_concurrent_tabs: 1,
            failed_tab_policy: FailedTabPolicy::Skip,
            export_mime_type: XLSX_MIME_TYPE.to_string(),
            verify_exports: true,
        }
    }
}

impl IngestionConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> IngestionResult<Self> {
        let cfg: Self = toml::from_str(input).map_err(|e| IngestionError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> IngestionResult<()> {
        if !(0.0..=1.0).contains(&self.fill_ratio_threshold) {
            return Err(IngestionError::config(format!(
                "fill_ratio_threshold must be within [0, 1], got {}",
                self.fill_ratio_threshold
            )));
        }
        if self.max_concurrent_tabs == 0 {
            return Err(IngestionError::config("max_concurrent_tabs must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(IngestionError::config("request_timeout_secs must be > 0"));
        }
        if self.deadline_secs == Some(0) {
            return Err(IngestionError::config("deadline_secs must be > 0 when set"));
        }
        if self.export_mime_type.trim().is_empty() {
            return Err(IngestionError::config("export_mime_type must not be empty"));
        }
        Ok(())
    }

    /// Per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whole-call deadline as a [`Duration`], if set.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Base URLs of the Google Sheets and Drive REST APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleApiConfig {
    pub sheets_base_url: String,
    pub drive_base_url: String,
}

impl Default for GoogleApiConfig {
    fn default() -> Self {
        Self {
            sheets_base_url: "https://sheets.googleapis.com/v4".to_string(),
            drive_base_url: "https://www.googleapis.com/drive/v3".to_string(),
        }
    }
}

/// Blob-storage upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// URL that accepts a multipart file upload and answers `{ "path": ... }`.
    pub upload_url: String,
    /// Multipart field carrying the file.
    #[serde(default = "default_field_name")]
    pub field_name: String,
}

impl BlobStoreConfig {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            field_name: default_field_name(),
        }
    }
}

fn default_field_name() -> String {
    "file".to_string()
}

#[cfg(test)]
mod tests {
    use super::{BlobStoreConfig, FailedTabPolicy, IngestionConfig, XLSX_MIME_TYPE};

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = IngestionConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, IngestionConfig::default());
        assert_eq!(cfg.fill_ratio_threshold, 0.5);
        assert_eq!(cfg.row_floor, 1000);
        assert_eq!(cfg.export_mime_type, XLSX_MIME_TYPE);
        assert_eq!(cfg.failed_tab_policy, FailedTabPolicy::Skip);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = IngestionConfig::from_toml_str("fill_ratio_threshold = 1.5").unwrap_err();
        assert!(err.to_string().contains("fill_ratio_threshold"));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = IngestionConfig::from_toml_str("max_concurrent_tabs = 0").unwrap_err();
        assert!(err.to_string().contains("max_concurrent_tabs"));
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(IngestionConfig::from_toml_str(r#"failed_tab_policy = "explode""#).is_err());
    }

    #[test]
    fn blob_store_field_name_defaults_to_file() {
        let cfg: BlobStoreConfig = toml::from_str(r#"upload_url = "https://blob.local/upload""#).unwrap();
        assert_eq!(cfg, BlobStoreConfig::new("https://blob.local/upload"));
    }
}

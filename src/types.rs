//! Core data model types for ingestion.
//!
//! A spreadsheet is ingested tab by tab. Each tab produces a [`TabOutcome`], which is collapsed
//! into the serializable [`TableDescriptor`] only at the output boundary.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use uuid::Uuid;

/// Provenance tag carried by every descriptor produced by this crate.
pub const CREATED_BY_IMPORT: &str = "sheet-import";

/// Logical data type of an imported column.
///
/// No type inference is performed: every imported column is a string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, Deserialize)]
pub enum DataType {
    /// UTF-8 string.
    #[default]
    #[serde(rename = "string")]
    Utf8,
}

/// One column of an imported table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Fresh identifier.
    pub id: String,
    /// Column data type (always [`DataType::Utf8`]).
    pub data_type: DataType,
    /// Normalized header name, unique within the table.
    pub col_name: String,
    /// Display width.
    pub width: u32,
}

impl ColumnDescriptor {
    /// Create a string column with a fresh id.
    pub fn new(col_name: impl Into<String>, width: u32) -> Self {
        Self {
            id: fresh_id(),
            data_type: DataType::Utf8,
            col_name: col_name.into(),
            width,
        }
    }
}

/// A single materialized row.
///
/// Rows of one table share their column names, so a row stores only its values and a handle to
/// the shared name list. It serializes as a JSON object keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// Build a row from shared names and values. Values are padded or truncated to the name count.
    pub fn new(names: Arc<[String]>, mut values: Vec<String>) -> Self {
        values.resize(names.len(), String::new());
        Self { names, values }
    }

    /// A row with every column set to the empty string.
    pub fn blank(names: Arc<[String]>) -> Self {
        Self::new(names, Vec::new())
    }

    /// Value of `column`, if the column exists.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == column)
            .map(|idx| self.values[idx].as_str())
    }

    /// Column names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Values in column order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// True when every value is the empty string.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(String::is_empty)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Reference to an exported file snapshot in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct ExcelPreview {
    /// Storage path returned by the blob store.
    pub path: String,
}

/// Result of ingesting one tab, before it is flattened into a [`TableDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TabOutcome {
    /// The tab was parsed as row/column data.
    Tabular {
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Row>,
    },
    /// The tab was exported as a file snapshot.
    Graphical { preview_path: String },
    /// The tab failed and the failed-tab policy asks for it to be reported.
    Failed { message: String },
}

/// The normalized output unit for one tab.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    /// Fresh identifier.
    pub id: String,
    /// Source tab name.
    pub table_name: String,
    /// Columns; empty for graphical and failed tabs.
    pub columns: Vec<ColumnDescriptor>,
    /// Rows; empty for graphical and failed tabs.
    pub rows: Vec<Row>,
    /// Provenance tag, always [`CREATED_BY_IMPORT`].
    pub created_by: &'static str,
    /// Present only for tabs that took the export fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excel_preview: Option<ExcelPreview>,
    /// Present only for failed tabs under [`crate::config::FailedTabPolicy::Report`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_error: Option<String>,
}

impl TableDescriptor {
    /// Flatten a tab outcome into the serializable descriptor shape.
    pub fn from_outcome(table_name: impl Into<String>, outcome: TabOutcome) -> Self {
        let (columns, rows, excel_preview, import_error) = match outcome {
            TabOutcome::Tabular { columns, rows } => (columns, rows, None, None),
            TabOutcome::Graphical { preview_path } => (
                Vec::new(),
                Vec::new(),
                Some(ExcelPreview { path: preview_path }),
                None,
            ),
            TabOutcome::Failed { message } => (Vec::new(), Vec::new(), None, Some(message)),
        };
        Self {
            id: fresh_id(),
            table_name: table_name.into(),
            columns,
            rows,
            created_by: CREATED_BY_IMPORT,
            excel_preview,
            import_error,
        }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.col_name.as_str())
    }

    /// True when the tab took the export fallback.
    pub fn is_graphical(&self) -> bool {
        self.excel_preview.is_some()
    }
}

/// Structural features of a tab reported by the metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabFeatures {
    /// The tab has embedded drawings (images, shapes).
    pub has_drawings: bool,
    /// The tab has embedded charts.
    pub has_charts: bool,
    /// The tab has merged cell ranges.
    pub has_merges: bool,
}

/// Tab listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabMetadata {
    /// Internal tab identifier.
    pub tab_id: i64,
    /// Display name.
    pub tab_name: String,
    /// Structural features, when the listing carried them.
    pub features: Option<TabFeatures>,
}

impl TabMetadata {
    /// A listing entry without structural features.
    pub fn new(tab_id: i64, tab_name: impl Into<String>) -> Self {
        Self {
            tab_id,
            tab_name: tab_name.into(),
            features: None,
        }
    }

    /// Attach structural features.
    pub fn with_features(mut self, features: TabFeatures) -> Self {
        self.features = Some(features);
        self
    }
}

pub(crate) fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

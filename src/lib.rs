//! `sheet-import` turns the tabs of a remote spreadsheet into table descriptors that can be
//! loaded into a grid data model.
//!
//! The primary entrypoint is [`ingestion::SpreadsheetIngestor::ingest`]. For every tab it either
//! produces columns and rows, or, when the tab is mostly visual, a snapshot file uploaded to blob
//! storage.
//!
//! ## What a tab becomes
//!
//! A tab is **graphical** when the first of these holds:
//!
//! 1. it contains drawings
//! 2. it contains charts
//! 3. its value range is empty
//! 4. every cell is blank
//! 5. it has merged cells and fewer than half of its cells are filled
//!
//! Anything else is **tabular**:
//!
//! - the first row is the header; names are trimmed, blanks become `Column{n}` and duplicates get
//!   `_2`, `_3`, ... suffixes
//! - every column is a string column
//! - rows are padded with blank rows up to a floor of 1000
//!
//! Graphical tabs are duplicated, stripped down to the one tab, exported as `.xlsx`, uploaded,
//! and the duplicate is deleted whatever happened.
//!
//! A failing tab never fails the call. Only a failure to list the tabs does.
//!
//! ## Quick example
//!
//! ```no_run
//! use sheet_import::config::{BlobStoreConfig, GoogleApiConfig, IngestionConfig};
//! use sheet_import::ingestion::{IngestionOptions, SpreadsheetIngestor};
//! use sheet_import::remote::Credentials;
//!
//! # async fn run() -> Result<(), sheet_import::IngestionError> {
//! let options = IngestionOptions {
//!     config: IngestionConfig::from_path("sheet-import.toml")?,
//!     ..Default::default()
//! };
//! let ingestor = SpreadsheetIngestor::google(
//!     GoogleApiConfig::default(),
//!     BlobStoreConfig::new("https://files.example.com/upload"),
//!     options,
//! )?;
//!
//! let tables = ingestor.ingest("1AbCdEf", &Credentials::bearer("ya29.token")).await?;
//! println!("tables={}", tables.len());
//! # Ok(())
//! # }
//! ```
//!
//! The pure steps work without any remote service:
//!
//! ```rust
//! use sheet_import::ingestion::{materialize_rows, normalize_headers};
//!
//! let names = normalize_headers(&[" Name ", "", "Name"]);
//! assert_eq!(names, vec!["Name", "Column2", "Name_2"]);
//!
//! let rows = materialize_rows(&[vec!["Ada", "x"]], &names, 1000);
//! assert_eq!(rows.len(), 1000);
//! assert_eq!(rows[0].get("Name"), Some("Ada"));
//! assert_eq!(rows[0].get("Name_2"), Some(""));
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: orchestrator, classifier, header/row steps, export fallback, observers
//! - [`remote`]: collaborator traits and their Google Sheets/Drive and HTTP blob-store clients
//! - [`config`]: heuristics, limits, timeouts and endpoints
//! - [`execution`]: ordered bounded concurrency and run metrics
//! - [`types`]: table descriptors, rows and tab metadata
//! - [`error`]: error types used across ingestion

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod remote;
pub mod types;

pub use error::{IngestionError, IngestionResult};

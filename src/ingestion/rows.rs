//! Row materialization.

use std::sync::Arc;

use crate::types::{ColumnDescriptor, Row};

/// Build uniform rows keyed by `names` from raw data rows, padded with blank rows up to `floor`.
///
/// Missing trailing cells become empty strings; cells beyond the column count are dropped.
/// Row order is preserved and no row is filtered or deduplicated.
pub fn materialize_rows<S: AsRef<str>>(data_rows: &[Vec<S>], names: &[String], floor: usize) -> Vec<Row> {
    let shared: Arc<[String]> = names.iter().cloned().collect();
    let mut rows: Vec<Row> = Vec::with_capacity(data_rows.len().max(floor));

    for raw in data_rows {
        let values = raw
            .iter()
            .take(names.len())
            .map(|c| c.as_ref().to_string())
            .collect();
        rows.push(Row::new(Arc::clone(&shared), values));
    }

    while rows.len() < floor {
        rows.push(Row::blank(Arc::clone(&shared)));
    }

    rows
}

/// Column descriptors for normalized names.
pub fn column_descriptors(names: &[String], width: u32) -> Vec<ColumnDescriptor> {
    names.iter().map(|n| ColumnDescriptor::new(n.as_str(), width)).collect()
}

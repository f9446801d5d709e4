//! Header normalization.

use std::collections::{HashMap, HashSet};

/// Turn a raw header row into unique, non-empty column names.
///
/// - Cells are trimmed; a blank cell at position `i` (0-based) becomes `Column{i+1}`.
/// - The first occurrence of a name is kept; the k-th repeat becomes `{name}_{k}`.
/// - If a suffixed name collides with one already produced, the counter keeps increasing.
///
/// The output always has one name per input cell.
pub fn normalize_headers<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(raw.len());
    let mut emitted: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());

    for (idx0, cell) in raw.iter().enumerate() {
        let trimmed = cell.as_ref().trim();
        let base = if trimmed.is_empty() {
            format!("Column{}", idx0 + 1)
        } else {
            trimmed.to_string()
        };

        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let mut name = if *count == 1 {
            base.clone()
        } else {
            format!("{base}_{count}")
        };
        while emitted.contains(&name) {
            *count += 1;
            name = format!("{base}_{count}");
        }

        emitted.insert(name.clone());
        out.push(name);
    }

    out
}

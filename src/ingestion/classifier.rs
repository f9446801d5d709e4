//! Graphical-tab classification.
//!
//! A tab is *graphical* when it should be preserved as a file snapshot instead of being parsed
//! into rows: dashboards, charts, cover sheets laid out with merges, blank placeholders.
//!
//! Rules, evaluated in order, first match wins:
//!
//! 1. drawings present → graphical
//! 2. charts present → graphical
//! 3. value range has no rows → graphical
//! 4. every cell blank or whitespace → graphical
//! 5. merges present and fill ratio below the threshold → graphical
//! 6. otherwise → tabular
//!
//! When the structural features cannot be fetched, classification degrades to rules 3 and 4.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{IngestionError, IngestionResult};
use crate::remote::{with_timeout, Credentials, SpreadsheetService};
use crate::types::{TabFeatures, TabMetadata};

/// Why a tab was classified graphical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphicalReason {
    Drawings,
    Charts,
    EmptyRange,
    Blank,
    SparseMerged { fill_ratio: f64 },
}

impl fmt::Display for GraphicalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drawings => f.write_str("embedded drawings"),
            Self::Charts => f.write_str("embedded charts"),
            Self::EmptyRange => f.write_str("empty value range"),
            Self::Blank => f.write_str("all cells blank"),
            Self::SparseMerged { fill_ratio } => {
                write!(f, "merged cells with fill ratio {fill_ratio:.2}")
            }
        }
    }
}

/// Classification verdict for one tab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Tabular,
    Graphical(GraphicalReason),
}

impl Verdict {
    pub fn is_graphical(&self) -> bool {
        matches!(self, Self::Graphical(_))
    }
}

/// Classify a tab from its structural features and cell values.
pub fn classify(features: &TabFeatures, values: &[Vec<String>], fill_ratio_threshold: f64) -> Verdict {
    if features.has_drawings {
        return Verdict::Graphical(GraphicalReason::Drawings);
    }
    if features.has_charts {
        return Verdict::Graphical(GraphicalReason::Charts);
    }
    if let Verdict::Graphical(reason) = classify_values_only(values) {
        return Verdict::Graphical(reason);
    }
    if features.has_merges {
        let ratio = fill_ratio(values);
        if ratio < fill_ratio_threshold {
            return Verdict::Graphical(GraphicalReason::SparseMerged { fill_ratio: ratio });
        }
    }
    Verdict::Tabular
}

/// Cheapest classification: only the empty-range and blank-sheet rules.
pub fn classify_values_only(values: &[Vec<String>]) -> Verdict {
    if values.is_empty() {
        return Verdict::Graphical(GraphicalReason::EmptyRange);
    }
    if values.iter().flatten().all(|c| is_blank(c)) {
        return Verdict::Graphical(GraphicalReason::Blank);
    }
    Verdict::Tabular
}

/// Non-blank cells divided by `rows × widest row`. Zero for an empty rectangle.
pub fn fill_ratio(values: &[Vec<String>]) -> f64 {
    let width = values.iter().map(Vec::len).max().unwrap_or(0);
    let area = values.len() * width;
    if area == 0 {
        return 0.0;
    }
    let filled = values.iter().flatten().filter(|c| !is_blank(c)).count();
    filled as f64 / area as f64
}

fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Result of inspecting one tab.
#[derive(Debug)]
pub struct Inspection {
    /// The verdict.
    pub verdict: Verdict,
    /// Cell values. Empty when the verdict came from drawings or charts alone; never empty for a
    /// tabular verdict.
    pub values: Vec<Vec<String>>,
    /// Set when the features lookup failed and classification fell back to the blank check.
    pub degraded: Option<IngestionError>,
}

/// Fetches what a tab's classification needs and applies [`classify`].
#[derive(Clone)]
pub struct TabClassifier {
    sheets: Arc<dyn SpreadsheetService>,
    fill_ratio_threshold: f64,
    timeout: Duration,
}

impl fmt::Debug for TabClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabClassifier")
            .field("fill_ratio_threshold", &self.fill_ratio_threshold)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TabClassifier {
    /// Each remote call made while classifying is bounded by `timeout`.
    pub fn new(sheets: Arc<dyn SpreadsheetService>, fill_ratio_threshold: f64, timeout: Duration) -> Self {
        Self {
            sheets,
            fill_ratio_threshold,
            timeout,
        }
    }

    async fn fetch_values(
        &self,
        document_id: &str,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<Vec<Vec<String>>> {
        with_timeout(
            "get_values",
            self.timeout,
            self.sheets.get_values(document_id, tab_name, credentials),
        )
        .await
    }

    /// Decide whether a tab is graphical.
    ///
    /// A failed features lookup is not an error: the blank-sheet check decides instead. A failed
    /// value fetch is returned as an error.
    pub async fn is_graphical(
        &self,
        document_id: &str,
        tab_id: i64,
        tab_name: &str,
        credentials: &Credentials,
    ) -> IngestionResult<bool> {
        let tab = TabMetadata::new(tab_id, tab_name);
        let inspection = self.inspect(document_id, &tab, credentials).await?;
        Ok(inspection.verdict.is_graphical())
    }

    /// Classify a tab, returning the fetched values so the tabular path can reuse them.
    ///
    /// Features carried by `tab` are used as-is; otherwise they are fetched.
    pub async fn inspect(
        &self,
        document_id: &str,
        tab: &TabMetadata,
        credentials: &Credentials,
    ) -> IngestionResult<Inspection> {
        let features = match tab.features {
            Some(f) => Ok(f),
            None => {
                with_timeout(
                    "tab_features",
                    self.timeout,
                    self.sheets.tab_features(document_id, tab.tab_id, credentials),
                )
                .await
            }
        };

        match features {
            Ok(features) => {
                if features.has_drawings || features.has_charts {
                    let verdict = classify(&features, &[], self.fill_ratio_threshold);
                    debug!(document_id, tab = %tab.tab_name, ?verdict, "classified from features");
                    return Ok(Inspection {
                        verdict,
                        values: Vec::new(),
                        degraded: None,
                    });
                }
                let values = self.fetch_values(document_id, &tab.tab_name, credentials).await?;
                let verdict = classify(&features, &values, self.fill_ratio_threshold);
                debug!(document_id, tab = %tab.tab_name, ?verdict, "classified");
                Ok(Inspection {
                    verdict,
                    values,
                    degraded: None,
                })
            }
            Err(err) => {
                warn!(
                    document_id,
                    tab = %tab.tab_name,
                    error = %err,
                    "features unavailable; falling back to blank-sheet check"
                );
                let values = self.fetch_values(document_id, &tab.tab_name, credentials).await?;
                let verdict = classify_values_only(&values);
                Ok(Inspection {
                    verdict,
                    values,
                    degraded: Some(err),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, classify_values_only, fill_ratio, GraphicalReason, Verdict};
    use crate::types::TabFeatures;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    const PLAIN: TabFeatures = TabFeatures {
        has_drawings: false,
        has_charts: false,
        has_merges: false,
    };

    #[test]
    fn charts_win_regardless_of_content() {
        let features = TabFeatures { has_charts: true, ..PLAIN };
        let values = grid(&[&["a", "b"], &["1", "2"]]);
        assert_eq!(classify(&features, &values, 0.5), Verdict::Graphical(GraphicalReason::Charts));
    }

    #[test]
    fn drawings_are_checked_before_charts() {
        let features = TabFeatures {
            has_drawings: true,
            has_charts: true,
            ..PLAIN
        };
        assert_eq!(classify(&features, &[], 0.5), Verdict::Graphical(GraphicalReason::Drawings));
    }

    #[test]
    fn empty_range_is_graphical() {
        assert_eq!(classify(&PLAIN, &[], 0.5), Verdict::Graphical(GraphicalReason::EmptyRange));
    }

    #[test]
    fn blank_sheet_is_graphical_without_merges() {
        let values = grid(&[&["", "  "], &["\t"]]);
        assert_eq!(classify(&PLAIN, &values, 0.5), Verdict::Graphical(GraphicalReason::Blank));
    }

    #[test]
    fn sparse_merged_sheet_is_graphical() {
        let features = TabFeatures { has_merges: true, ..PLAIN };
        // 2 of 8 cells filled
        let values = grid(&[&["Title", "", "", ""], &["", "", "", "x"]]);
        match classify(&features, &values, 0.5) {
            Verdict::Graphical(GraphicalReason::SparseMerged { fill_ratio }) => {
                assert!((fill_ratio - 0.25).abs() < 1e-9)
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn dense_merged_sheet_is_tabular() {
        let features = TabFeatures { has_merges: true, ..PLAIN };
        let values = grid(&[&["a", "b"], &["1", ""]]);
        assert_eq!(classify(&features, &values, 0.5), Verdict::Tabular);
    }

    #[test]
    fn sparse_sheet_without_merges_is_tabular() {
        let values = grid(&[&["a", "", "", ""], &["", "", "", ""]]);
        assert_eq!(classify(&PLAIN, &values, 0.5), Verdict::Tabular);
    }

    #[test]
    fn fill_ratio_uses_widest_row() {
        let values = grid(&[&["a", "b", "c", "d"], &["e"]]);
        assert!((fill_ratio(&values) - 5.0 / 8.0).abs() < 1e-9);
        assert_eq!(fill_ratio(&[]), 0.0);
    }

    #[test]
    fn values_only_classification() {
        assert!(classify_values_only(&[]).is_graphical());
        assert!(classify_values_only(&grid(&[&[" "]])).is_graphical());
        assert_eq!(classify_values_only(&grid(&[&["", "v"]])), Verdict::Tabular);
    }

    #[test]
    fn threshold_is_tunable() {
        let features = TabFeatures { has_merges: true, ..PLAIN };
        let values = grid(&[&["a", "b", "", ""]]);
        assert_eq!(classify(&features, &values, 0.5), Verdict::Tabular);
        assert!(classify(&features, &values, 0.6).is_graphical());
    }
}

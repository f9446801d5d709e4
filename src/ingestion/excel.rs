#![cfg(feature = "excel")]

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Reader};

use crate::error::{IngestionError, IngestionResult};

/// Excel caps sheet names at 31 characters; exporters truncate longer tab names.
const MAX_SHEET_NAME_LEN: usize = 31;

/// Check that an exported payload is a readable workbook holding exactly the target tab.
pub fn verify_single_tab_export(payload: &[u8], tab_name: &str) -> IngestionResult<()> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(payload))?;
    let sheets: Vec<String> = workbook.sheet_names().to_vec();

    match sheets.as_slice() {
        [only] if sheet_name_matches(only, tab_name) => Ok(()),
        [only] => Err(IngestionError::InvalidExport {
            message: format!("expected sheet '{tab_name}', workbook holds '{only}'"),
        }),
        _ => Err(IngestionError::InvalidExport {
            message: format!(
                "expected a single sheet '{tab_name}', workbook holds {} sheets: {:?}",
                sheets.len(),
                sheets
            ),
        }),
    }
}

fn sheet_name_matches(sheet: &str, tab_name: &str) -> bool {
    if sheet == tab_name {
        return true;
    }
    tab_name.chars().count() > MAX_SHEET_NAME_LEN && tab_name.starts_with(sheet)
}

#[cfg(test)]
mod tests {
    use super::{sheet_name_matches, verify_single_tab_export};

    #[test]
    fn truncated_long_names_match() {
        let long = "Quarterly revenue dashboard for EMEA";
        assert!(sheet_name_matches(&long[..31], long));
        assert!(!sheet_name_matches("Quarterly", "Quarterly revenue"));
        assert!(sheet_name_matches("Data", "Data"));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(verify_single_tab_export(b"not a workbook", "Sheet1").is_err());
    }
}

use crate::error::TemplateFillError;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Workbook;
use std::collections::BTreeMap;

/// Destination headers: trimmed header text to 0-based column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    columns: BTreeMap<String, usize>,
}

impl HeaderMap {
    /// Reads the headers of one row (1-based). When the same text appears
    /// twice, the right-most column wins.
    pub fn from_sheet(sheet: &Sheet, header_row: usize) -> HeaderMap {
        let mut columns = BTreeMap::new();
        for (col, value) in sheet.row(header_row.saturating_sub(1)) {
            if is_blank_header(value) {
                continue;
            }
            if let Some(text) = value.header_text() {
                let text = text.trim();
                if !text.is_empty() {
                    columns.insert(text.to_owned(), col);
                }
            }
        }
        HeaderMap { columns }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Values that label no column: `FALSE` and zero, besides blanks.
fn is_blank_header(value: &CellValue) -> bool {
    match value {
        CellValue::Boolean(flag) => !flag,
        CellValue::Number(number) => number.parse::<f64>().is_ok_and(|number| number == 0.0),
        other => other.is_empty(),
    }
}

/// Reads the header mapping of a destination sheet
pub fn resolve_headers(workbook: &mut Workbook, sheet_name: &str, header_row: usize) -> Result<HeaderMap, TemplateFillError> {
    let sheet = workbook.read_sheet(sheet_name)?;
    let headers = HeaderMap::from_sheet(&sheet, header_row);
    log::debug!("Found {} header(s) in row {} of '{}'", headers.len(), header_row, sheet_name);
    Ok(headers)
}

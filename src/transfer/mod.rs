//! # Transfer Module
//!
//! The template fill itself: read the source table, resolve the destination
//! headers, match columns by name and write the source rows below the headers.
//!
//! ```text
//! source sheet ──► SourceTable ─┐
//!                               ├─► ColumnMapping ─► CellWriter ─► patched package
//! destination ──► HeaderMap ────┘
//! ```
use crate::config::TransferConfig;
use crate::config::MAX_ROWS;
use crate::error::ResultMessage;
use crate::error::TemplateFillError;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Workbook;
use std::fmt::Display;
use thiserror::Error;

pub mod header;
pub mod matcher;
pub mod table;
pub(crate) mod writer;

pub use header::resolve_headers;
pub use header::HeaderMap;
pub use matcher::match_columns;
pub use matcher::ColumnMapping;
pub use table::SourceTable;

use writer::CellWriter;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("No source column matches a destination header ({source_columns} source column(s), {destination_headers} header(s))")]
    NoMatchingColumnsError { source_columns: usize, destination_headers: usize },

    #[error("{rows} row(s) starting at row {start_row} do not fit in a worksheet of {} rows", MAX_ROWS)]
    RowLimitError { rows: usize, start_row: usize },
}

/// What a transfer run did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Source sheet the table was read from
    pub source_sheet: String,
    /// Columns written, in source order
    pub matched_columns: Vec<String>,
    /// Source columns without a destination header
    pub ignored_columns: Vec<String>,
    /// Data rows of the source table
    pub rows_written: usize,
    /// 1-based destination row of the first data row
    pub start_row: usize,
    /// Destination cells written or cleared
    pub cells_written: usize,
    /// Formulas lost to overwritten cells
    pub formulas_removed: usize,
}

impl Display for TransferReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pasted {} rows starting at row {}", self.rows_written, self.start_row)
    }
}

/// The produced workbook
#[derive(Clone, Debug)]
pub struct TransferOutput {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: TransferReport,
}

/// Copies the matched source columns into the destination template
///
/// # Arguments
/// * `source` - Workbook holding the source table
/// * `destination` - Template workbook; only its destination sheet is rewritten
/// * `config` - Sheets, rows and missing value handling
///
/// # Errors
/// Missing sheets, no matching columns, invalid configuration and malformed packages.
pub fn transfer(
    source: &mut Workbook,
    destination: &mut Workbook,
    config: &TransferConfig,
) -> Result<TransferOutput, TemplateFillError> {
    config.validate()?;

    let source_sheet = match &config.source_sheet {
        Some(name) => name.to_owned(),
        None => source.sheet_names()
            .first()
            .map(|name| name.to_string())
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(source.name().to_owned()))?,
    };
    let sheet = source.read_sheet(&source_sheet)
        .with_prefix(&format!("Read source '{}'", source.name()))?;
    let table = SourceTable::from_sheet(&sheet, config.source_header_row);
    log::debug!("Source '{}' has {} column(s) and {} row(s)", source_sheet, table.columns().len(), table.row_count());

    let headers = resolve_headers(destination, &config.destination_sheet, config.header_row)
        .with_prefix(&format!("Read destination '{}'", destination.name()))?;
    let mapping = match_columns(&table, &headers)?;
    if !mapping.ignored.is_empty() {
        log::info!("Ignoring source column(s) without a destination header: {}", mapping.ignored.join(", "));
    }

    if config.start_row - 1 + table.row_count() > MAX_ROWS {
        return Err(TransferError::RowLimitError { rows: table.row_count(), start_row: config.start_row }.into());
    }

    let writer = CellWriter::new(config.start_row - 1, config.na_policy, destination.is_1904());
    let patches = writer.patches(&table, &mapping);
    let (bytes, summary) = destination.write_patched(&config.destination_sheet, &patches)
        .with_prefix(&format!("Write '{}'", config.output_file_name))?;
    if summary.formulas_removed > 0 {
        log::warn!("Overwrote {} formula cell(s) in '{}'", summary.formulas_removed, config.destination_sheet);
    }

    let report = TransferReport {
        source_sheet,
        matched_columns: mapping.matched.into_iter().map(|column| column.name).collect(),
        ignored_columns: mapping.ignored,
        rows_written: table.row_count(),
        start_row: config.start_row,
        cells_written: summary.cells_written,
        formulas_removed: summary.formulas_removed,
    };
    log::info!("{} of '{}'", report, config.destination_sheet);
    Ok(TransferOutput {
        file_name: config.output_file_name.to_owned(),
        bytes,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NaPolicy;
    use crate::error::ErrorKind;
    use crate::fixtures::WorkbookBuilder;
    use crate::fixtures::FixtureCell::*;
    use crate::spreadsheet::CellValue;

    fn template() -> Vec<u8> {
        WorkbookBuilder::new()
            .sheet("Workbook Consolidado", vec![
                vec![Text("A"), Text("B"), Text("C")],
                vec![Text("a2"), Empty, Text("c2")],
            ])
            .build()
    }

    fn source() -> Vec<u8> {
        WorkbookBuilder::new()
            .sheet("Base", vec![
                vec![Text("B"), Text("D")],
                vec![Number("1"), Number("10")],
                vec![Number("2"), Number("20")],
            ])
            .build()
    }

    fn run(source_bytes: Vec<u8>, template_bytes: Vec<u8>, config: &TransferConfig) -> Result<TransferOutput, TemplateFillError> {
        let mut source = Workbook::from_bytes("base.xlsx", source_bytes)?;
        let mut destination = Workbook::from_bytes("plantilla.xlsx", template_bytes)?;
        transfer(&mut source, &mut destination, config)
    }

    #[test]
    fn test_matched_column_lands_at_start_row() {
        let config = TransferConfig { start_row: 5, ..TransferConfig::default() };
        let output = run(source(), template(), &config).unwrap();
        assert_eq!(output.file_name, "wb_modificado.xlsx");
        assert_eq!(output.report.matched_columns, vec!["B"]);
        assert_eq!(output.report.ignored_columns, vec!["D"]);
        assert_eq!(output.report.to_string(), "Pasted 2 rows starting at row 5");

        let mut written = Workbook::from_bytes("wb_modificado.xlsx", output.bytes).unwrap();
        let sheet = written.read_sheet("Workbook Consolidado").unwrap();
        assert_eq!(sheet.get(4, 1), Some(&CellValue::Number("1".to_owned())));
        assert_eq!(sheet.get(5, 1), Some(&CellValue::Number("2".to_owned())));
        assert_eq!(sheet.get(1, 0), Some(&CellValue::Text("a2".to_owned())));
        assert_eq!(sheet.get(1, 2), Some(&CellValue::Text("c2".to_owned())));
        let written_columns: Vec<usize> = sheet.cells().filter(|cell| cell.row >= 2).map(|cell| cell.col).collect();
        assert_eq!(written_columns, vec![1, 1]);
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let config = TransferConfig::default();
        let first = run(source(), template(), &config).unwrap();
        let second = run(source(), template(), &config).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_missing_destination_sheet() {
        let config = TransferConfig { destination_sheet: "Hoja1".to_owned(), ..TransferConfig::default() };
        let error = run(source(), template(), &config).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingSheet);
        assert_eq!(error.to_string(), "Sheet 'Hoja1' not found in 'plantilla.xlsx'");
    }

    #[test]
    fn test_missing_source_sheet() {
        let config = TransferConfig { source_sheet: Some("Export".to_owned()), ..TransferConfig::default() };
        let error = run(source(), template(), &config).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingSheet);
    }

    #[test]
    fn test_no_matching_columns() {
        let source = WorkbookBuilder::new()
            .sheet("Base", vec![vec![Text("b"), Text(" A")], vec![Number("1"), Number("2")]])
            .build();
        let error = run(source, template(), &TransferConfig::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NoMatchingColumns);
    }

    #[test]
    fn test_one_file_with_both_sheets() {
        let bytes = WorkbookBuilder::new()
            .sheet("Base", vec![vec![Text("C")], vec![Text("x")], vec![Empty], vec![Text("z")]])
            .sheet("Workbook Consolidado", vec![vec![Text("A"), Text("B"), Text("C")], vec![Empty, Empty, Text("old")]])
            .build();
        let config = TransferConfig { na_policy: NaPolicy::Keep, ..TransferConfig::default() };
        let output = run(bytes.clone(), bytes, &config).unwrap();
        assert_eq!(output.report.rows_written, 3);

        let mut written = Workbook::from_bytes("wb_modificado.xlsx", output.bytes).unwrap();
        assert_eq!(written.sheet_names(), vec!["Base", "Workbook Consolidado"]);
        let sheet = written.read_sheet("Workbook Consolidado").unwrap();
        assert_eq!(sheet.get(1, 2), Some(&CellValue::Text("x".to_owned())));
        assert_eq!(sheet.get(2, 2), None);
        assert_eq!(sheet.get(3, 2), Some(&CellValue::Text("z".to_owned())));
        let base = written.read_sheet("Base").unwrap();
        assert_eq!(base.get(1, 0), Some(&CellValue::Text("x".to_owned())));
    }

    #[test]
    fn test_dates_are_written_with_a_date_style() {
        let source = WorkbookBuilder::new()
            .sheet("Base", vec![
                vec![Text("Fecha"), Text("Hora")],
                vec![Date(45_000.0), Date(45_000.75)],
            ])
            .build();
        let template = WorkbookBuilder::new()
            .sheet("Workbook Consolidado", vec![vec![Text("Fecha"), Text("Hora")]])
            .build();
        let output = run(source, template, &TransferConfig::default()).unwrap();

        let mut written = Workbook::from_bytes("wb_modificado.xlsx", output.bytes).unwrap();
        let sheet = written.read_sheet("Workbook Consolidado").unwrap();
        assert_eq!(sheet.get(1, 0), Some(&CellValue::Date { serial: 45_000.0, is_1904: false }));
        assert_eq!(sheet.get(1, 1), Some(&CellValue::Date { serial: 45_000.75, is_1904: false }));
    }

    #[test]
    fn test_na_error_cells_follow_na_policy() {
        let source = WorkbookBuilder::new()
            .sheet("Base", vec![vec![Text("A")], vec![Error("#N/A")], vec![Text("kept")]])
            .build();
        let config = TransferConfig { na_policy: NaPolicy::EmptyString, ..TransferConfig::default() };
        let output = run(source, template(), &config).unwrap();

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(output.bytes.clone())).unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut zip.by_name("xl/worksheets/sheet1.xml").unwrap(), &mut xml).unwrap();
        assert!(xml.contains(r#"<c r="A2" t="inlineStr"><is><t></t></is></c>"#), "{xml}");

        let mut written = Workbook::from_bytes("wb_modificado.xlsx", output.bytes).unwrap();
        let sheet = written.read_sheet("Workbook Consolidado").unwrap();
        assert_eq!(sheet.get(1, 0), None);
        assert_eq!(sheet.get(2, 0), Some(&CellValue::Text("kept".to_owned())));
    }

    #[test]
    fn test_rows_past_the_worksheet_limit() {
        let config = TransferConfig { start_row: MAX_ROWS, ..TransferConfig::default() };
        let error = run(source(), template(), &config).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Generic);
        assert_eq!(error.to_string(), "2 row(s) starting at row 1048576 do not fit in a worksheet of 1048576 rows");

        let config = TransferConfig { start_row: MAX_ROWS - 1, ..TransferConfig::default() };
        assert!(run(source(), template(), &config).is_ok());

        let config = TransferConfig { start_row: usize::MAX, ..TransferConfig::default() };
        assert_eq!(run(source(), template(), &config).unwrap_err().kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TransferConfig { header_row: 0, ..TransferConfig::default() };
        let error = run(source(), template(), &config).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Generic);
        assert!(error.to_string().contains("header_row"));
    }
}

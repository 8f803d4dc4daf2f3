//! # Spreadsheet Module
//!
//! Reading and rewriting Excel Open XML workbooks (`.xlsx`, `.xlsm`).
//! A [`Workbook`] exposes its sheets as typed cells and can serialize itself
//! with a set of cell patches applied to one worksheet, leaving every other
//! package part byte-for-byte untouched.
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod package;
pub(crate) mod patch;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod styles;
pub(crate) mod xlsx;

pub use cell::Cell;
pub use cell::CellValue;
pub use patch::PatchError;
pub use sheet::Sheet;
pub use xlsx::Workbook;

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Sheet '{sheet_name}' not found in '{file_name}'")]
    SheetNotFoundError { file_name: String, sheet_name: String },

    #[error("Spreadsheet '{0}' is empty")]
    SpreadsheetEmptyError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Required part '{0}' is missing")]
    FileError(String),

    #[error("Shared string #{index} referenced by {reference} in '{sheet_name}' does not exist")]
    SharedStringError { sheet_name: String, reference: String, index: usize },

    #[error("Style #{0} does not exist in the styles part")]
    StyleIndexError(usize),
}

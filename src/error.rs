use thiserror::Error;

/// Main error type for the template filler.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum TemplateFillError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    PatchError(#[from] crate::spreadsheet::patch::PatchError),

    // Transfer module errors
    #[error("{0}")]
    TransferError(#[from] crate::transfer::TransferError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

/// The three outcomes an operator can be told about when a run fails.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A named sheet does not exist in its workbook.
    MissingSheet,
    /// No source column matches a destination header.
    NoMatchingColumns,
    /// Anything else: malformed files, I/O, bad parameters.
    Generic,
}

impl TemplateFillError {
    /// Classifies the error for user-facing reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateFillError::SpreadsheetError(crate::spreadsheet::SpreadsheetError::SheetNotFoundError { .. }) => {
                ErrorKind::MissingSheet
            }
            TemplateFillError::TransferError(crate::transfer::TransferError::NoMatchingColumnsError { .. }) => {
                ErrorKind::NoMatchingColumns
            }
            _ => ErrorKind::Generic,
        }
    }
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, TemplateFillError> {
    /// Wraps the error message with a prefix. Errors that the operator must see
    /// by kind (missing sheet, no matching columns) pass through untouched.
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| match e.kind() {
            ErrorKind::Generic => TemplateFillError::WithContextError(format!("{}: {}", message, e)),
            _ => e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::SpreadsheetError;

    #[test]
    fn test_kind_classification() {
        let error = TemplateFillError::from(SpreadsheetError::SheetNotFoundError {
            file_name: "plantilla.xlsx".to_owned(),
            sheet_name: "Hoja1".to_owned(),
        });
        assert_eq!(error.kind(), ErrorKind::MissingSheet);

        let error = TemplateFillError::from(std::io::Error::other("disk on fire"));
        assert_eq!(error.kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_with_prefix_keeps_user_facing_errors() {
        let result: Result<(), TemplateFillError> = Err(SpreadsheetError::SheetNotFoundError {
            file_name: "a.xlsx".to_owned(),
            sheet_name: "Missing".to_owned(),
        }
        .into());
        let error = result.with_prefix("Open destination").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingSheet);

        let result: Result<(), TemplateFillError> = Err(std::io::Error::other("boom").into());
        let error = result.with_prefix("Open destination").unwrap_err();
        assert_eq!(error.to_string(), "Open destination: boom");
    }

    #[test]
    fn test_ok_none_else() {
        let result: Result<Option<u8>, ()> = Ok(None);
        assert_eq!(result.ok_none_else(|| Ok(Some(3))), Ok(Some(3)));
        let result: Result<Option<u8>, ()> = Ok(Some(1));
        assert_eq!(result.ok_none_else(|| Ok(Some(3))), Ok(Some(1)));
    }
}

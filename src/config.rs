//! Transfer configuration
//!
//! A [`TransferConfig`] can be built in code, loaded from a TOML file, or
//! assembled by the command line. Every field has a default, so a config file
//! only needs the values that differ:
//!
//! ```toml
//! destination_sheet = "Workbook Consolidado"
//! start_row = 5
//! na_policy = "empty-string"
//! ```
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Sheet written to when none is given
pub const DEFAULT_DESTINATION_SHEET: &str = "Workbook Consolidado";

/// File name of the produced workbook when none is given
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "wb_modificado.xlsx";

/// MIME type of the produced workbook
pub const OUTPUT_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Last row number of an Excel worksheet
pub const MAX_ROWS: usize = 1_048_576;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Read config '{path}' failed: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse config failed: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("'{name}' must be a row number from 1 to {}, got {value}", MAX_ROWS)]
    InvalidRowError { name: &'static str, value: usize },

    #[error("Destination sheet name must not be empty")]
    EmptySheetNameError,
}

/// What to write for a missing source value
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NaPolicy {
    /// Write the missing value as-is: the cell is blanked, its style kept
    #[default]
    Keep,
    /// Write an empty text value
    EmptyString,
    /// Leave the destination cell untouched
    Skip,
}

/// Parameters of one transfer run. Row numbers are 1-based, as shown in Excel.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// Sheet holding the source table; the first sheet when `None`
    pub source_sheet: Option<String>,
    /// Template sheet receiving the data
    pub destination_sheet: String,
    /// Row of the destination holding the column headers
    pub header_row: usize,
    /// First destination row written
    pub start_row: usize,
    /// Handling of missing source values
    pub na_policy: NaPolicy,
    /// Row of the source holding the column names
    pub source_header_row: usize,
    /// File name given to the produced workbook
    pub output_file_name: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source_sheet: None,
            destination_sheet: DEFAULT_DESTINATION_SHEET.to_owned(),
            header_row: 1,
            start_row: 2,
            na_policy: NaPolicy::Keep,
            source_header_row: 1,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_owned(),
        }
    }
}

impl TransferConfig {
    /// Parses a TOML document, filling absent fields with defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Loads a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks values that deserialization cannot rule out.
    /// The start row may sit at or above the header row.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("header_row", self.header_row),
            ("start_row", self.start_row),
            ("source_header_row", self.source_header_row),
        ] {
            if !(1..=MAX_ROWS).contains(&value) {
                return Err(ConfigError::InvalidRowError { name, value });
            }
        }
        if self.destination_sheet.trim().is_empty() {
            return Err(ConfigError::EmptySheetNameError);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.destination_sheet, "Workbook Consolidado");
        assert_eq!((config.header_row, config.start_row, config.source_header_row), (1, 2, 1));
        assert_eq!(config.na_policy, NaPolicy::Keep);
        assert_eq!(config.output_file_name, "wb_modificado.xlsx");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = TransferConfig::from_toml_str(
            r#"
            source_sheet = "Export"
            start_row = 5
            na_policy = "empty-string"
            output_file_name = "archivo_modificado.xlsx"
            "#,
        )
        .unwrap();
        assert_eq!(config.source_sheet.as_deref(), Some("Export"));
        assert_eq!(config.start_row, 5);
        assert_eq!(config.header_row, 1);
        assert_eq!(config.na_policy, NaPolicy::EmptyString);
        assert_eq!(config.output_file_name, "archivo_modificado.xlsx");
    }

    #[test]
    fn test_rejects_unknown_fields_and_policies() {
        assert!(matches!(
            TransferConfig::from_toml_str("startrow = 3"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(TransferConfig::from_toml_str(r#"na_policy = "drop""#).is_err());
        assert!(TransferConfig::from_toml_str("start_row = -1").is_err());
    }

    #[test]
    fn test_validate() {
        let config = TransferConfig { start_row: 0, ..TransferConfig::default() };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "'start_row' must be a row number from 1 to 1048576, got 0"
        );

        let config = TransferConfig { start_row: usize::MAX, ..TransferConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRowError { name: "start_row", .. })));
        let config = TransferConfig { source_header_row: MAX_ROWS + 1, ..TransferConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRowError { name: "source_header_row", .. })));
        let config = TransferConfig { header_row: MAX_ROWS, start_row: MAX_ROWS, ..TransferConfig::default() };
        assert!(config.validate().is_ok());

        let config = TransferConfig { destination_sheet: "  ".to_owned(), ..TransferConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::EmptySheetNameError)));

        let config = TransferConfig { header_row: 4, start_row: 1, ..TransferConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("template-fill.toml");
        std::fs::write(&path, "header_row = 3\nna_policy = \"skip\"\n").unwrap();
        let config = TransferConfig::load(&path).unwrap();
        assert_eq!(config.header_row, 3);
        assert_eq!(config.na_policy, NaPolicy::Skip);

        let error = TransferConfig::load(directory.path().join("missing.toml")).unwrap_err();
        assert!(error.to_string().starts_with("Read config '"), "{error}");
    }
}

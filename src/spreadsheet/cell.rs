use crate::spreadsheet::reference::index_to_reference;
use std::borrow::Cow;
use std::fmt::Display;

/// Days between the 1900 and 1904 date system epochs.
pub(crate) const DATE_SYSTEM_OFFSET: f64 = 1462.0;

/// Storage kinds of raw cell data in a worksheet part.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time serial numbers from the 1900 epoch
    NumberDate1900,
    /// Date/time serial numbers from the 1904 epoch
    NumberDate1904,
    /// ISO 8601 date/time strings (`t="d"`)
    IsoDateTime,
    /// Inline string values and cached formula strings
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    fn date(is_1904: bool) -> Self {
        if is_1904 {
            Self::NumberDate1904
        } else {
            Self::NumberDate1900
        }
    }

    pub(crate) fn is_date(self) -> bool {
        matches!(self, Self::NumberDate1900 | Self::NumberDate1904)
    }

    /// Storage kind named by a cell's `t` attribute. Unknown kinds read as numbers.
    pub(crate) fn from_type_attribute(kind: &str) -> Self {
        match kind {
            "s" => Self::SharedString,
            "inlineStr" | "str" => Self::InlineString,
            "b" => Self::Boolean,
            "e" => Self::Error,
            "d" => Self::IsoDateTime,
            _ => Self::Number,
        }
    }

    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "18" | "19" | "20" | "21" | "22" | "45" | "46" | "47" => Some(Self::date(is_1904)),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Any date or time token outside literals and bracketed sections marks a date.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => is_date = true,
                _ => (),
            }
        }

        if is_date {
            Self::date(is_1904)
        } else {
            Self::Number
        }
    }
}

/// A scalar cell value as read from, or written to, a worksheet.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// No value (blank or missing cell)
    Empty,
    /// Boolean value
    Boolean(bool),
    /// Number in its stored `xsd:double` text form, e.g. `12` or `0.25`
    Number(String),
    /// Date/time serial number in the date system of its workbook
    Date { serial: f64, is_1904: bool },
    /// Text value
    Text(String),
    /// Error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    /// Returns true for blank cells.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text used when the value names a column. `None` for blank cells.
    pub fn header_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) => Some(Cow::Borrowed(text)),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Re-expresses a date serial in another date system, leaving other values alone.
    pub fn in_date_system(&self, is_1904: bool) -> CellValue {
        match self {
            CellValue::Date { serial, is_1904: from } if *from != is_1904 => {
                let serial = if *from { serial + DATE_SYSTEM_OFFSET } else { serial - DATE_SYSTEM_OFFSET };
                CellValue::Date { serial, is_1904 }
            }
            other => other.clone(),
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(true) => write!(f, "True"),
            CellValue::Boolean(false) => write!(f, "False"),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Date { serial, .. } => write!(f, "{serial}"),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Error(error) => write!(f, "{error}"),
        }
    }
}

/// Represents a single non-empty cell in a worksheet.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    /// Cell value
    pub value: CellValue,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_number_formats() {
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("22", true), Some(CellType::NumberDate1904));
        assert_eq!(CellType::parse_builtin_number_format_id("2", false), None);
    }

    #[test]
    fn test_custom_number_formats() {
        assert_eq!(CellType::parse_custom_number_format("dd/mm/yyyy", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("[h]:mm:ss", true), CellType::NumberDate1904);
        assert_eq!(CellType::parse_custom_number_format("#,##0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("0\" days\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("0_s", false), CellType::Number);
    }

    #[test]
    fn test_header_text() {
        assert_eq!(CellValue::Empty.header_text(), None);
        assert_eq!(CellValue::Text(" Total ".to_owned()).header_text().as_deref(), Some(" Total "));
        assert_eq!(CellValue::Number("2024".to_owned()).header_text().as_deref(), Some("2024"));
        assert_eq!(CellValue::Boolean(true).header_text().as_deref(), Some("True"));
    }

    #[test]
    fn test_date_system_conversion() {
        let date = CellValue::Date { serial: 45_000.5, is_1904: true };
        assert_eq!(date.in_date_system(false), CellValue::Date { serial: 46_462.5, is_1904: false });
        assert_eq!(date.in_date_system(true), date);
        let number = CellValue::Number("7".to_owned());
        assert_eq!(number.in_date_system(true), number);
    }

    #[test]
    fn test_cell_reference() {
        let cell = Cell { row: 4, col: 1, value: CellValue::Empty };
        assert_eq!(cell.reference(), "B5");
    }
}

use crate::transfer::header::HeaderMap;
use crate::transfer::table::SourceTable;
use crate::transfer::TransferError;

/// A source column paired with the destination column receiving it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedColumn {
    pub name: String,
    /// Position in the source table
    pub source_index: usize,
    /// 0-based destination column
    pub destination_col: usize,
}

/// Matched columns in source order, plus the source columns left out
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub matched: Vec<MatchedColumn>,
    pub ignored: Vec<String>,
}

/// Pairs source columns with destination headers by exact, case-sensitive name.
/// Columns whose header cell was not text never match.
pub fn match_columns(table: &SourceTable, headers: &HeaderMap) -> Result<ColumnMapping, TransferError> {
    let mut mapping = ColumnMapping::default();
    for (source_index, column) in table.columns().iter().enumerate() {
        let name = column.name.as_str();
        match headers.get(name).filter(|_| column.has_text_name) {
            Some(destination_col) => mapping.matched.push(MatchedColumn {
                name: name.to_owned(),
                source_index,
                destination_col,
            }),
            None => mapping.ignored.push(name.to_owned()),
        }
    }
    if mapping.matched.is_empty() {
        return Err(TransferError::NoMatchingColumnsError {
            source_columns: table.columns().len(),
            destination_headers: headers.len(),
        });
    }
    Ok(mapping)
}

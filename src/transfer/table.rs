use crate::spreadsheet::CellValue;
use crate::spreadsheet::Sheet;
use std::collections::HashMap;

/// Cell texts read as missing values, besides blank cells. Error cells
/// showing one of them (`#N/A`) are missing too.
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One named column of the source table
#[derive(Clone, Debug, PartialEq)]
pub struct SourceColumn {
    pub name: String,
    /// False when the header cell held a number, boolean, date or error.
    /// Such columns keep their display name but match no destination header.
    pub has_text_name: bool,
    pub values: Vec<CellValue>,
}

/// The source sheet read as a table: a header row naming the columns,
/// followed by data rows of equal length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceTable {
    columns: Vec<SourceColumn>,
    row_count: usize,
}

impl SourceTable {
    /// Builds the table from a sheet
    ///
    /// # Arguments
    /// * `sheet` - Source sheet
    /// * `header_row` - 1-based row holding the column names; rows above it are ignored
    ///
    /// Blank header cells are named `Unnamed: <index>` and repeated names get a
    /// `.1`, `.2`, ... suffix. Trailing blank rows are not part of the table.
    /// Values listed in [`NA_VALUES`] become [`CellValue::Empty`].
    pub fn from_sheet(sheet: &Sheet, header_row: usize) -> SourceTable {
        let header = header_row.saturating_sub(1);
        let width = sheet.cells()
            .filter(|cell| cell.row >= header)
            .map(|cell| cell.col + 1)
            .max()
            .unwrap_or(0);
        let row_count = sheet.last_row()
            .filter(|last| *last > header)
            .map_or(0, |last| last - header);

        let names = (0..width)
            .map(|col| {
                sheet.get(header, col)
                    .and_then(CellValue::header_text)
                    .filter(|text| !text.is_empty())
                    .map(|text| text.into_owned())
                    .unwrap_or_else(|| format!("Unnamed: {col}"))
            })
            .collect();

        let columns = deduplicate(names)
            .into_iter()
            .enumerate()
            .map(|(col, name)| {
                let has_text_name = matches!(sheet.get(header, col), None | Some(CellValue::Text(_)));
                let values = (header + 1..=header + row_count)
                    .map(|row| match sheet.get(row, col) {
                        Some(value) if !is_missing(value) => value.clone(),
                        _ => CellValue::Empty,
                    })
                    .collect();
                SourceColumn { name, has_text_name, values }
            })
            .collect();
        SourceTable { columns, row_count }
    }

    pub fn columns(&self) -> &[SourceColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Number of data rows
    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

fn is_missing(value: &CellValue) -> bool {
    match value {
        CellValue::Empty => true,
        CellValue::Text(text) | CellValue::Error(text) => NA_VALUES.contains(&text.as_str()),
        _ => false,
    }
}

/// Renames repeated column names to `name.1`, `name.2`, ... in reading order,
/// skipping suffixes already taken by another column.
fn deduplicate(names: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let mut name = name;
            let mut count = counts.get(&name).copied().unwrap_or(0);
            while count > 0 {
                counts.insert(name.clone(), count + 1);
                name = format!("{name}.{count}");
                count = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.clone(), count + 1);
            name
        })
        .collect()
}

use crate::config::NaPolicy;
use crate::spreadsheet::patch::CellPatch;
use crate::spreadsheet::CellValue;
use crate::transfer::matcher::ColumnMapping;
use crate::transfer::table::SourceTable;

/// Turns matched source columns into destination cell patches
#[derive(Clone, Copy, Debug)]
pub(crate) struct CellWriter {
    /// 0-based destination row of the first data row
    start_row: usize,
    na_policy: NaPolicy,
    /// Date system of the destination workbook
    is_1904: bool,
}

impl CellWriter {
    pub(crate) fn new(start_row: usize, na_policy: NaPolicy, is_1904: bool) -> Self {
        Self { start_row, na_policy, is_1904 }
    }

    /// Patches for every matched column, row `i` of the table landing on `start_row + i`
    pub(crate) fn patches(&self, table: &SourceTable, mapping: &ColumnMapping) -> Vec<CellPatch> {
        let columns = table.columns();
        let mut patches = Vec::with_capacity(mapping.matched.len() * table.row_count());
        for matched in &mapping.matched {
            let Some(column) = columns.get(matched.source_index) else {
                continue;
            };
            for (offset, value) in column.values.iter().enumerate() {
                if let Some(value) = self.value(value) {
                    patches.push(CellPatch {
                        row: self.start_row + offset,
                        col: matched.destination_col,
                        value,
                    });
                }
            }
        }
        patches
    }

    /// Value to write for one source value, `None` to leave the cell alone
    fn value(&self, value: &CellValue) -> Option<CellValue> {
        match (value, self.na_policy) {
            (CellValue::Empty, NaPolicy::Keep) => Some(CellValue::Empty),
            (CellValue::Empty, NaPolicy::EmptyString) => Some(CellValue::Text(String::new())),
            (CellValue::Empty, NaPolicy::Skip) => None,
            (value, _) => Some(value.in_date_system(self.is_1904)),
        }
    }
}

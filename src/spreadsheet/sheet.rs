use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use std::collections::BTreeMap;

/// The non-empty cells of one worksheet, addressed by 0-based `(row, col)`.
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// Cells keyed in row-major order
    cells: BTreeMap<(usize, usize), CellValue>,
    /// Last row and column holding a value
    row_upper_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell, replacing any earlier value at the same position.
    /// Empty values are not stored.
    pub(crate) fn push(&mut self, cell: Cell) {
        if cell.value.is_empty() {
            return;
        }
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(cell.col, |col| col.max(cell.col)));
        self.cells.insert((cell.row, cell.col), cell.value);
    }

    /// 0-based index of the last row holding a value
    pub fn last_row(&self) -> Option<usize> {
        self.row_upper_bound
    }

    /// 0-based index of the right-most column holding a value
    pub fn last_col(&self) -> Option<usize> {
        self.col_upper_bound
    }

    /// Value at a position, `None` when the cell is blank.
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Non-empty cells of one row, in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, &CellValue)> + '_ {
        self.cells
            .range((row, 0)..=(row, usize::MAX))
            .map(|((_, col), value)| (*col, value))
    }

    /// All non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().map(|((row, col), value)| Cell {
            row: *row,
            col: *col,
            value: value.clone(),
        })
    }
}

//! A1-style cell reference conversions. Indexes are 0-based throughout.

use regex::Regex;
use std::sync::LazyLock;

static CELL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").expect("Hardcode regex pattern"));

/// Largest column Excel accepts (XFD)
const MAX_COL: usize = 16_383;

/// Converts column letters to a 0-based index: `A` is 0, `AA` is 26.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index = 0usize;
    for letter in letters.chars() {
        if !letter.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1).filter(|index| *index <= MAX_COL)
}

/// Converts a 1-based row number to a 0-based index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number.parse::<usize>().ok().and_then(|row| row.checked_sub(1))
}

/// Parses `B12` (or `$B$12`) into `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let captures = CELL_REFERENCE.captures(reference)?;
    let col = col_to_index(captures.get(1)?.as_str())?;
    let row = row_to_index(captures.get(2)?.as_str())?;
    Some((row, col))
}

/// Converts a 0-based column index to letters.
pub(crate) fn index_to_col(col: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = col + 1;
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        letters.push(char::from(b'A' + digit as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts `(row, col)` to `B12`.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

/// A rectangular block of cells, inclusive on both corners.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Area {
    pub(crate) first_row: usize,
    pub(crate) first_col: usize,
    pub(crate) last_row: usize,
    pub(crate) last_col: usize,
}

impl Area {
    /// Area covering a single cell
    pub(crate) fn cell(row: usize, col: usize) -> Self {
        Area {
            first_row: row,
            first_col: col,
            last_row: row,
            last_col: col,
        }
    }

    /// Parses `A1:C3` or a single `A1`.
    pub(crate) fn parse(reference: &str) -> Option<Self> {
        match reference.split_once(':') {
            Some((first, last)) => {
                let (first_row, first_col) = reference_to_index(first)?;
                let (last_row, last_col) = reference_to_index(last)?;
                Some(Area {
                    first_row: first_row.min(last_row),
                    first_col: first_col.min(last_col),
                    last_row: first_row.max(last_row),
                    last_col: first_col.max(last_col),
                })
            }
            None => reference_to_index(reference).map(|(row, col)| Area::cell(row, col)),
        }
    }

    /// Smallest area containing both areas
    pub(crate) fn union(self, other: Area) -> Area {
        Area {
            first_row: self.first_row.min(other.first_row),
            first_col: self.first_col.min(other.first_col),
            last_row: self.last_row.max(other.last_row),
            last_col: self.last_col.max(other.last_col),
        }
    }

    /// Extends the area to include a cell
    pub(crate) fn include(self, row: usize, col: usize) -> Area {
        self.union(Area::cell(row, col))
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let first = index_to_reference(self.first_row, self.first_col);
        if self.first_row == self.last_row && self.first_col == self.last_col {
            write!(f, "{first}")
        } else {
            write!(f, "{first}:{}", index_to_reference(self.last_row, self.last_col))
        }
    }
}

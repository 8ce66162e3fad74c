pub mod workbook;

pub use workbook::Workbook;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Read access to a worksheet. Rows and columns are 1-based.
pub trait SheetState {
    fn read_cell(&self, row: u32, column: u32) -> Option<String>;

    /// Highest row holding a non-empty value in `column`, or 0 if none.
    fn last_occupied_row(&self, column: u32) -> u32;

    /// Highest column holding any value, or 0 for an empty sheet.
    fn max_column(&self) -> u32;
}

/// A worksheet extraction results are written into.
pub trait SheetSink: SheetState {
    fn write_cell(&mut self, row: u32, column: u32, value: &str);
}

/// Cell contents kept from a template so they survive a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// An in-memory worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        MemorySheet {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_value(&mut self, row: u32, column: u32, value: CellValue) {
        if row == 0 || column == 0 {
            return;
        }
        self.cells.insert((row, column), value);
    }

    pub fn value(&self, row: u32, column: u32) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }

    /// Non-blank cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &CellValue)> {
        self.cells
            .iter()
            .filter(|(_, v)| !v.is_blank())
            .map(|(&(r, c), v)| (r, c, v))
    }

    pub fn is_empty(&self) -> bool {
        self.cells().next().is_none()
    }
}

impl SheetState for MemorySheet {
    fn read_cell(&self, row: u32, column: u32) -> Option<String> {
        self.cells
            .get(&(row, column))
            .filter(|v| !v.is_blank())
            .map(|v| v.to_string())
    }

    fn last_occupied_row(&self, column: u32) -> u32 {
        self.cells
            .iter()
            .filter(|&(&(_, c), v)| c == column && !v.is_blank())
            .map(|(&(r, _), _)| r)
            .max()
            .unwrap_or(0)
    }

    fn max_column(&self) -> u32 {
        self.cells.keys().map(|&(_, c)| c).max().unwrap_or(0)
    }
}

impl SheetSink for MemorySheet {
    fn write_cell(&mut self, row: u32, column: u32, value: &str) {
        self.set_value(row, column, CellValue::Text(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_occupied_row_ignores_blanks() {
        let mut sheet = MemorySheet::new("s");
        sheet.write_cell(1, 1, "header");
        sheet.write_cell(5, 1, "x");
        sheet.write_cell(9, 1, "   ");
        sheet.write_cell(3, 2, "y");
        assert_eq!(sheet.last_occupied_row(1), 5);
        assert_eq!(sheet.last_occupied_row(2), 3);
        assert_eq!(sheet.last_occupied_row(3), 0);
    }

    #[test]
    fn numbers_count_as_occupied() {
        let mut sheet = MemorySheet::new("s");
        sheet.set_value(4, 2, CellValue::Number(12.5));
        assert_eq!(sheet.last_occupied_row(2), 4);
        assert_eq!(sheet.read_cell(4, 2).as_deref(), Some("12.5"));
        assert_eq!(sheet.max_column(), 2);
    }

    #[test]
    fn zero_coordinates_are_ignored() {
        let mut sheet = MemorySheet::new("s");
        sheet.write_cell(0, 1, "x");
        sheet.write_cell(1, 0, "x");
        assert!(sheet.is_empty());
    }
}

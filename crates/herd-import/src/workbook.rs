//! # Workbook Model
//!
//! A decoded workbook: sheets of rows of cells, nothing format-specific.
//!
//! [`Workbook::from_bytes`] is the only place that knows about calamine.
//! Everything after it works on [`Cell`] values, which is also what the
//! tests build by hand.
//!
//! ## Shape
//! ```text
//! Workbook
//! └── Sheet "NORTH Register"   first_row = 1
//!     ├── row 1  [Tag, Name, Dam tag, ...]      ← header
//!     ├── row 2  [T-100, Morag, -, ...]
//!     └── row 3  [T-101, Flora, T-100, ...]
//! ```

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ImportError, ImportResult};

// =============================================================================
// Cell
// =============================================================================

/// One spreadsheet cell after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    /// `#N/A`, `#REF!` and friends.
    Error,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(|d| Cell::Date(d.date()))
                .unwrap_or(Cell::Error),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) => Cell::Error,
        }
    }
}

// =============================================================================
// Sheet
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,

    /// 1-based sheet row number of `rows[0]` (the header).
    pub first_row: u32,

    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// A sheet whose header is row 1.
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Sheet {
            name: name.into(),
            first_row: 1,
            rows,
        }
    }

    pub fn header(&self) -> &[Cell] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Data rows with their 1-based sheet row numbers.
    pub fn data_rows(&self) -> impl Iterator<Item = (u32, &[Cell])> + '_ {
        let first_data_row = self.first_row + 1;
        self.rows
            .iter()
            .skip(1)
            .enumerate()
            .map(move |(i, row)| (first_data_row + i as u32, row.as_slice()))
    }
}

// =============================================================================
// Workbook
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Workbook { sheets }
    }

    /// Decodes an uploaded file. The format is sniffed from the content.
    pub fn from_bytes(bytes: Vec<u8>) -> ImportResult<Self> {
        let mut reader = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let mut sheets = Vec::new();
        for name in reader.sheet_names() {
            let range = reader.worksheet_range(&name)?;
            let first_row = range.start().map(|(row, _)| row + 1).unwrap_or(1);
            let rows: Vec<Vec<Cell>> = range
                .rows()
                .map(|row| row.iter().map(Cell::from).collect())
                .collect();

            debug!(sheet = %name, rows = rows.len(), "Sheet decoded");
            sheets.push(Sheet {
                name,
                first_row,
                rows,
            });
        }

        if sheets.is_empty() {
            return Err(ImportError::EmptyWorkbook);
        }
        Ok(Workbook { sheets })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_rows_are_numbered_from_sheet_row() {
        let mut sheet = Sheet::new(
            "North",
            vec![
                vec![Cell::text("Tag")],
                vec![Cell::text("A")],
                vec![Cell::text("B")],
            ],
        );
        let numbers: Vec<u32> = sheet.data_rows().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![2, 3]);

        sheet.first_row = 4;
        let numbers: Vec<u32> = sheet.data_rows().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![5, 6]);
    }

    #[test]
    fn test_calamine_data_conversion() {
        assert_eq!(Cell::from(&Data::Int(1234)), Cell::Number(1234.0));
        assert_eq!(Cell::from(&Data::String("x".into())), Cell::text("x"));
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
        assert_eq!(
            Cell::from(&Data::Error(calamine::CellErrorType::NA)),
            Cell::Error
        );
    }

    #[test]
    fn test_garbage_upload_is_fatal() {
        let err = Workbook::from_bytes(b"definitely not a spreadsheet".to_vec()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::text("   ").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }
}

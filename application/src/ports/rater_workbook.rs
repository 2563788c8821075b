//! Rater workbook port
//!
//! Editing and reading the spreadsheet container of a rater template.

use rater_domain::{CellMapping, CellRef, CellValue};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkbookError {
    #[error("Invalid workbook container: {0}")]
    Archive(String),

    #[error("Missing workbook part: {0}")]
    MissingPart(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Malformed XML in {part}: {message}")]
    Xml { part: String, message: String },
}

pub trait RaterWorkbook: Send + Sync {
    /// Write the mapping into `sheet` as inline strings
    ///
    /// Never fails: on any error the original bytes are returned unchanged.
    /// Every container entry other than the sheet part is preserved byte for byte.
    fn populate_cells(&self, template: &[u8], mapping: &CellMapping, sheet: &str) -> Vec<u8>;

    /// Cached value of one cell
    fn read_cell(&self, workbook: &[u8], sheet: &str, cell: &CellRef)
    -> Result<CellValue, WorkbookError>;
}

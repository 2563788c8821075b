//! A1-style cell references

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest column index a worksheet can address (`XFD`)
pub const MAX_COLUMN: u32 = 16_384;
/// Largest row index a worksheet can address
pub const MAX_ROW: u32 = 1_048_576;

/// A single cell address (Value Object)
///
/// Columns and rows are 1-based. Ordering is row-major, which matches the
/// order cells must appear in inside a worksheet part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    row: u32,
    column: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Result<Self, DomainError> {
        if column == 0 || column > MAX_COLUMN || row == 0 || row > MAX_ROW {
            return Err(DomainError::InvalidCellReference(format!(
                "column {column}, row {row}"
            )));
        }
        Ok(Self { row, column })
    }

    /// Caller guarantees `1..=MAX_COLUMN` and `1..=MAX_ROW`
    pub(crate) const fn new_unchecked(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    /// Parse `B12` or `$B$12`
    pub fn parse(reference: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidCellReference(reference.to_string());
        let trimmed = reference.trim();
        let mut chars = trimmed.char_indices().peekable();

        if matches!(chars.peek(), Some((_, '$'))) {
            chars.next();
        }
        let letters_start = chars.peek().map(|(i, _)| *i).ok_or_else(invalid)?;
        let mut letters_end = letters_start;
        while let Some((i, c)) = chars.peek().copied() {
            if c.is_ascii_alphabetic() {
                letters_end = i + 1;
                chars.next();
            } else {
                break;
            }
        }
        if matches!(chars.peek(), Some((_, '$'))) {
            chars.next();
        }
        let digits_start = chars.peek().map(|(i, _)| *i).ok_or_else(invalid)?;
        let digits = &trimmed[digits_start..];

        let letters = &trimmed[letters_start..letters_end];
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let column = column_index(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(column, row).map_err(|_| invalid())
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Column letters, e.g. `AB` for column 28
    pub fn column_letters(&self) -> String {
        column_letters(self.column)
    }

    /// Shift by a row/column delta, `None` when the result leaves the grid
    pub fn offset(&self, rows: i64, columns: i64) -> Option<Self> {
        let row = u32::try_from(i64::from(self.row) + rows).ok()?;
        let column = u32::try_from(i64::from(self.column) + columns).ok()?;
        Self::new(column, row).ok()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

impl FromStr for CellRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CellRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CellRef::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// `A` -> 1, `Z` -> 26, `AA` -> 27
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (index <= MAX_COLUMN).then_some(index)
}

pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_reference() {
        let cell = CellRef::parse("B12").unwrap();
        assert_eq!(cell.column(), 2);
        assert_eq!(cell.row(), 12);
        assert_eq!(cell.to_string(), "B12");
    }

    #[test]
    fn test_parse_absolute_and_lowercase() {
        assert_eq!(CellRef::parse("$c$7").unwrap().to_string(), "C7");
        assert_eq!(CellRef::parse("AA100").unwrap().column(), 27);
        assert_eq!(CellRef::parse("XFD1").unwrap().column(), MAX_COLUMN);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "12", "B", "B0", "1B", "B1C", "XFE1", "ABCD1", "B-1"] {
            assert!(CellRef::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_ordering_is_row_major() {
        let mut cells = vec![
            CellRef::parse("B2").unwrap(),
            CellRef::parse("A3").unwrap(),
            CellRef::parse("C1").unwrap(),
            CellRef::parse("A2").unwrap(),
        ];
        cells.sort();
        let names: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["C1", "A2", "B2", "A3"]);
    }

    #[test]
    fn test_column_letters_roundtrip_boundaries() {
        for (index, letters) in [(1, "A"), (26, "Z"), (27, "AA"), (52, "AZ"), (703, "AAA")] {
            assert_eq!(column_letters(index), letters);
            assert_eq!(column_index(letters), Some(index));
        }
    }

    #[test]
    fn test_offset_stays_on_grid() {
        let cell = CellRef::parse("B2").unwrap();
        assert_eq!(cell.offset(1, 1).unwrap().to_string(), "C3");
        assert!(cell.offset(-2, 0).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let cell = CellRef::parse("D4").unwrap();
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, "\"D4\"");
        let back: CellRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cell);
    }
}

//! Submission data to rater-template cell mapping
//!
//! The canonical layout of the `submission_data` sheet:
//!
//! | Cell | Field |
//! |------|-------|
//! | B1 | insured name |
//! | B2 | DBA |
//! | B3 | first name |
//! | B4 | last name |
//! | B5 | address line 1 |
//! | B6 | city |
//! | B7 | state |
//! | B8 | zip |
//! | B9 | phone |
//! | B10 | email |
//! | B11 | FEIN |
//! | B12 | effective date |
//! | B13 | expiration date |
//! | B14 | business type |
//! | B15 | SSN |
//!
//! Custom form answers follow from row 20 as `A{row}` = key, `B{row}` = value.

use super::cell_ref::CellRef;
use crate::submission::value_objects::ApplicantData;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// First row used for custom form answers
pub const CUSTOM_DATA_START_ROW: u32 = 20;

const KEY_COLUMN: u32 = 1;
const VALUE_COLUMN: u32 = 2;

/// Sparse cell → value assignment for one sheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellMapping {
    entries: BTreeMap<CellRef, String>,
}

impl CellMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; blank values are skipped so the target cell stays untouched
    pub fn set(&mut self, cell: CellRef, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.trim().is_empty() {
            return false;
        }
        self.entries.insert(cell, value);
        true
    }

    pub fn get(&self, cell: &CellRef) -> Option<&str> {
        self.entries.get(cell).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (&CellRef, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Entries of one row, in column order
    pub fn row(&self, row: u32) -> impl Iterator<Item = (&CellRef, &str)> {
        self.iter().filter(move |(cell, _)| cell.row() == row)
    }

    /// Distinct rows touched, ascending
    pub fn rows(&self) -> Vec<u32> {
        let mut rows: Vec<u32> = self.entries.keys().map(|c| c.row()).collect();
        rows.dedup();
        rows
    }

    /// Plain `A1 -> value` view for serialization into script contexts
    pub fn to_plain_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

fn cell(column: u32, row: u32) -> CellRef {
    CellRef::new_unchecked(column, row)
}

/// Render a custom form answer as cell text
fn custom_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(custom_text).collect();
            Some(parts.join(", "))
        }
        other => Some(other.to_string()),
    }
}

/// `false` and zero answers are treated like unanswered questions
fn is_unanswered(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Build the cell mapping for a submission
///
/// Pure and deterministic; absent or blank fields simply produce no entry.
pub fn build_mapping(
    applicant: &ApplicantData,
    custom: &IndexMap<String, serde_json::Value>,
    effective: Option<NaiveDate>,
    expiration: Option<NaiveDate>,
) -> CellMapping {
    let mut mapping = CellMapping::new();
    let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());

    let fixed: [(u32, Option<String>); 15] = [
        (1, applicant.insured_name()),
        (2, applicant.dba.clone()),
        (3, applicant.first_name.clone()),
        (4, applicant.last_name.clone()),
        (5, applicant.address1.clone()),
        (6, applicant.city.clone()),
        (7, applicant.state.clone()),
        (8, applicant.zip.clone()),
        (9, applicant.phone.clone()),
        (10, applicant.email.clone()),
        (11, applicant.fein.clone()),
        (12, date(effective)),
        (13, date(expiration)),
        (14, applicant.business_type.clone()),
        (15, applicant.ssn.clone()),
    ];
    for (row, value) in fixed {
        if let Some(value) = value {
            mapping.set(cell(VALUE_COLUMN, row), value);
        }
    }

    let mut row = CUSTOM_DATA_START_ROW;
    for (key, value) in custom {
        if is_unanswered(value) {
            continue;
        }
        let Some(text) = custom_text(value).filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        if row > super::cell_ref::MAX_ROW {
            break;
        }
        mapping.set(cell(KEY_COLUMN, row), key.clone());
        mapping.set(cell(VALUE_COLUMN, row), text);
        row += 1;
    }

    mapping
}

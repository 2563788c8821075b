//! Tabular results returned by remote stored procedures

use crate::rating::premium::PREFERRED_PREMIUM_FIELDS;
use crate::sheet::value::parse_number_text;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Parameters of a stored-procedure call, in call order
pub type ProcedureParams = IndexMap<String, String>;

/// One row of named columns
pub type DataRow = IndexMap<String, String>;

/// Rows of named text columns (Value Object)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataTable {
    rows: Vec<DataRow>,
}

impl DataTable {
    pub fn new(rows: Vec<DataRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&DataRow> {
        self.rows.first()
    }

    /// Column lookup on the first row, case-insensitive
    pub fn first_value(&self, column: &str) -> Option<&str> {
        self.first().and_then(|row| column_value(row, column))
    }

    /// First positive premium-like value in any row
    ///
    /// Well-known column names are tried first, then any column whose name
    /// contains "premium".
    pub fn find_premium(&self) -> Option<(String, f64)> {
        for row in &self.rows {
            for field in PREFERRED_PREMIUM_FIELDS {
                if let Some((name, value)) = row.iter().find(|(k, _)| k.eq_ignore_ascii_case(field))
                    && let Some(amount) = positive(value)
                {
                    return Some((name.clone(), amount));
                }
            }
        }
        for row in &self.rows {
            for (name, value) in row {
                if name.to_ascii_lowercase().contains("premium")
                    && let Some(amount) = positive(value)
                {
                    return Some((name.clone(), amount));
                }
            }
        }
        None
    }
}

fn column_value<'a>(row: &'a DataRow, column: &str) -> Option<&'a str> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(column))
        .map(|(_, v)| v.as_str())
}

fn positive(value: &str) -> Option<f64> {
    parse_number_text(value).filter(|n| *n > 0.0)
}

/// Result of a stored-procedure call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureOutcome {
    Rows(DataTable),
    /// The remote procedure reported a missing required parameter
    ParameterRequired { parameter: String },
}

impl ProcedureOutcome {
    pub fn rows(&self) -> Option<&DataTable> {
        match self {
            ProcedureOutcome::Rows(table) => Some(table),
            ProcedureOutcome::ParameterRequired { .. } => None,
        }
    }
}

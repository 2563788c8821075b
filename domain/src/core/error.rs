//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),

    #[error("Invalid premium mapping: {0}")]
    InvalidPremiumMapping(String),

    #[error("Unknown calculation method: {0}")]
    UnknownCalculationMethod(String),

    #[error("Invalid submission id: {0}")]
    InvalidSubmissionId(String),

    #[error("Line of business '{0}' is missing required remote identifiers")]
    IncompleteLineOfBusiness(String),
}

impl DomainError {
    /// Check if this error was caused by malformed user input
    pub fn is_input_error(&self) -> bool {
        !matches!(self, DomainError::IncompleteLineOfBusiness(_))
    }
}

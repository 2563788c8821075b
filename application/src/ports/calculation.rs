//! Calculation backend port
//!
//! Strategy interface for recalculating the formulas of a populated rater.

use async_trait::async_trait;
use indexmap::IndexMap;
use rater_domain::{ApplicantData, CalculationMethod, CellMapping};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalculationError {
    #[error("Calculation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Calculation process failed: {0}")]
    Process(String),

    #[error("Calculation timed out after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Workbook error: {0}")]
    Workbook(String),
}

/// Submission data handed to backends that recompute from the source data
#[derive(Debug, Clone, Default)]
pub struct CalculationContext {
    pub sheet: String,
    pub mapping: CellMapping,
    pub applicant: ApplicantData,
    pub custom: IndexMap<String, serde_json::Value>,
}

/// Recalculates the formulas of a populated template
///
/// Implementations must be idempotent and must release every temporary
/// artifact and spawned process before returning.
#[async_trait]
pub trait CalculationBackend: Send + Sync {
    fn method(&self) -> CalculationMethod;

    async fn is_available(&self) -> bool;

    async fn calculate(
        &self,
        workbook: &[u8],
        context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError>;
}

/// Looks up the backend configured for a calculation method
pub trait CalculationBackends: Send + Sync {
    fn backend(&self, method: CalculationMethod) -> Arc<dyn CalculationBackend>;
}

/// Identity backend: calculation is left to the remote system
pub struct NoCalculation;

#[async_trait]
impl CalculationBackend for NoCalculation {
    fn method(&self) -> CalculationMethod {
        CalculationMethod::None
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn calculate(
        &self,
        workbook: &[u8],
        _context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError> {
        Ok(workbook.to_vec())
    }
}

//! Application layer for ims-rater
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ProcessingParams;
pub use ports::{
    audit_logger::{AuditEvent, AuditLogger, NoAuditLogger, SubmissionAudit},
    calculation::{
        CalculationBackend, CalculationBackends, CalculationContext, CalculationError,
        NoCalculation,
    },
    ims_gateway::{GatewayError, ImsGateway},
    progress::{NoProgress, ProgressNotifier, StepOutcome},
    rater_workbook::{RaterWorkbook, WorkbookError},
    submission_store::{StoreError, SubmissionStore},
};
pub use use_cases::calculate_rater::{CalculateRaterInput, CalculateRaterUseCase, PreparedRater};
pub use use_cases::process_submission::{ProcessSubmissionError, ProcessSubmissionUseCase};
pub use use_cases::resolve_premium::{ResolvePremiumInput, ResolvePremiumUseCase};

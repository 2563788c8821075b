//! Domain layer for ims-rater
//!
//! This crate contains the entities, value objects and pure logic of the
//! submission rating pipeline. It has no dependencies on infrastructure or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Submission
//!
//! An applicant's request for a quote. It moves from `draft` through
//! `processing` (one workflow step at a time) to `quoted` or `failed`.
//!
//! ## Rater
//!
//! A spreadsheet template that computes a premium from submission data:
//!
//! - **Cell Mapper**: submission fields → canonical cells on the data sheet
//! - **Formula engine**: evaluates template formulas (and calculated form fields)
//! - **Premium mappings**: prioritized cells where the premium may land

pub mod core;
pub mod formula;
pub mod rating;
pub mod remote;
pub mod sheet;
pub mod submission;

// Re-export commonly used types
pub use self::core::{error::DomainError, string::truncate};
pub use formula::{CalculatedField, FormulaError, apply_calculated_fields, evaluate_with_fields};
pub use rating::{
    line_of_business::{
        CalculationMethod, DEFAULT_TARGET_SHEET, LineOfBusinessConfig, RaterTemplate, RemoteLineIds,
    },
    premium::{
        PremiumAttempt, PremiumMapping, PremiumQuery, PremiumResolution, PremiumSource, QuoteKey,
    },
    quote_option::QuoteOption,
};
pub use remote::{
    requests::{InsuredRequest, PolicyTerm, QuoteRequest, RaterImport, RaterUpload},
    table::{DataRow, DataTable, ProcedureOutcome, ProcedureParams},
};
pub use sheet::{
    cell_mapper::{CellMapping, build_mapping},
    cell_ref::CellRef,
    value::{CellValue, ErrorValue, format_number, parse_number_text},
};
pub use submission::{
    entities::{
        ProcessingResults, RaterOutcome, RatingOutcome, RemoteIdentifiers, StepWarning,
        Submission, SubmissionStatus, WorkflowStep,
    },
    value_objects::{ApplicantData, SubmissionForm, SubmissionId},
};

//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod audit_logger;
pub mod calculation;
pub mod ims_gateway;
pub mod progress;
pub mod rater_workbook;
pub mod submission_store;

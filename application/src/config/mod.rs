//! Application-level configuration.
//!
//! - [`ProcessingParams`]: optional remote side effects and premium lookup order

pub mod processing_params;

pub use processing_params::ProcessingParams;

//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod calculate_rater;
pub mod process_submission;
pub mod resolve_premium;
#[cfg(test)]
pub(crate) mod testing;

//! Output formatter trait

use rater_domain::{CellMapping, PremiumResolution, RaterOutcome, Submission};
use std::path::Path;

/// Trait for formatting command results
pub trait OutputFormatter {
    /// A processed submission
    fn submission(&self, submission: &Submission) -> String;

    /// Cells written into a template by `populate`
    fn populated(&self, mapping: &CellMapping, out: &Path) -> String;

    /// Result of `calculate`
    fn rater(&self, outcome: &RaterOutcome, warnings: &[String], out: &Path) -> String;

    /// Result of `premium`
    fn premium(&self, resolution: &PremiumResolution) -> String;
}

//! Submission store port
//!
//! Persistence of submissions, line-of-business configuration and rater templates.

use async_trait::async_trait;
use rater_domain::{LineOfBusinessConfig, RaterTemplate, Submission, SubmissionId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn load_submission(&self, id: &SubmissionId) -> Result<Submission, StoreError>;

    /// Persist the submission, replacing any previous version
    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn load_line_of_business(&self, id: &str) -> Result<LineOfBusinessConfig, StoreError>;

    /// Raw bytes of a rater template
    async fn load_template(&self, template: &RaterTemplate) -> Result<Vec<u8>, StoreError>;
}

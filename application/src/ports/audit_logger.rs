//! Port for structured audit logging.
//!
//! Defines the [`AuditLogger`] trait for recording terminal submission events
//! (`submission_processed`, `submission_failed`) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures an audit
//! trail in a machine-readable format (JSONL).

use rater_domain::Submission;
use serde::Serialize;

/// Submission fields carried by every audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionAudit {
    pub submission_id: String,
    pub line_of_business_id: String,
    pub premium: Option<f64>,
    pub quote_id: Option<String>,
    pub control_number: Option<String>,
    pub error: Option<String>,
}

impl From<&Submission> for SubmissionAudit {
    fn from(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id.to_string(),
            line_of_business_id: submission.line_of_business_id.clone(),
            premium: submission.premium,
            quote_id: submission.remote.quote_id.clone(),
            control_number: submission.remote.control_number.clone(),
            error: submission.error.clone(),
        }
    }
}

/// A terminal submission transition; serializes with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    SubmissionProcessed(SubmissionAudit),
    SubmissionFailed(SubmissionAudit),
}

impl AuditEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::SubmissionProcessed(_) => "submission_processed",
            AuditEvent::SubmissionFailed(_) => "submission_failed",
        }
    }
}

/// Port for logging audit events.
///
/// `log` is synchronous and non-fallible: a broken audit sink must never
/// change the outcome of a submission.
pub trait AuditLogger: Send + Sync {
    fn log(&self, event: AuditEvent);
}

/// No-op implementation for tests and when auditing is disabled.
pub struct NoAuditLogger;

impl AuditLogger for NoAuditLogger {
    fn log(&self, _event: AuditEvent) {}
}

//! Submission entity and its processing state

use super::value_objects::{SubmissionForm, SubmissionId};
use crate::rating::line_of_business::CalculationMethod;
use crate::rating::premium::PremiumResolution;
use crate::rating::quote_option::QuoteOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Draft,
    Processing,
    Quoted,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Processing => "processing",
            SubmissionStatus::Quoted => "quoted",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Quoted | SubmissionStatus::Failed)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checkpoint inside the processing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Insured,
    Quote,
    QuoteDetails,
    QuoteOptions,
    Rater,
    Rating,
    Premium,
    Complete,
    Error,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &str {
        match self {
            WorkflowStep::Insured => "insured",
            WorkflowStep::Quote => "quote",
            WorkflowStep::QuoteDetails => "quote_details",
            WorkflowStep::QuoteOptions => "quote_options",
            WorkflowStep::Rater => "rater",
            WorkflowStep::Rating => "rating",
            WorkflowStep::Premium => "premium",
            WorkflowStep::Complete => "complete",
            WorkflowStep::Error => "error",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            WorkflowStep::Insured => "Create Insured",
            WorkflowStep::Quote => "Create Quote",
            WorkflowStep::QuoteDetails => "Quote Details",
            WorkflowStep::QuoteOptions => "Quote Options",
            WorkflowStep::Rater => "Rater Template",
            WorkflowStep::Rating => "Remote Rating",
            WorkflowStep::Premium => "Premium",
            WorkflowStep::Complete => "Complete",
            WorkflowStep::Error => "Error",
        }
    }

    /// Steps whose failure aborts processing
    pub fn is_fatal_on_failure(&self) -> bool {
        matches!(self, WorkflowStep::Insured | WorkflowStep::Quote)
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Identifiers assigned by the remote system while processing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteIdentifiers {
    pub insured_id: Option<String>,
    pub submission_id: Option<String>,
    pub quote_id: Option<String>,
    pub control_number: Option<String>,
}

/// A non-fatal failure recorded while processing continued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepWarning {
    pub step: WorkflowStep,
    pub message: String,
}

/// What happened to the rater template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterOutcome {
    pub populated_cells: usize,
    pub requested_method: CalculationMethod,
    pub used_method: CalculationMethod,
    pub calculated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<bool>,
    /// Premium total reported by the remote rater import
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_premium: Option<f64>,
}

/// Result of the configured remote rating procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatingOutcome {
    Completed { procedure: String, rows: usize },
    ParameterRequired { procedure: String, parameter: String },
    Failed { procedure: String, message: String },
    Skipped { reason: String },
}

/// Diagnostics blob persisted with the submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingResults {
    pub control_number: Option<String>,
    pub quote_options: Vec<QuoteOption>,
    pub rater: Option<RaterOutcome>,
    pub rating: Option<RatingOutcome>,
    pub premium: Option<PremiumResolution>,
    pub warnings: Vec<StepWarning>,
    pub error: Option<String>,
}

impl ProcessingResults {
    pub fn warn(&mut self, step: WorkflowStep, message: impl Into<String>) {
        self.warnings.push(StepWarning {
            step,
            message: message.into(),
        });
    }
}

/// One applicant's attempt to obtain a quote (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub line_of_business_id: String,
    pub form: SubmissionForm,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub workflow_step: Option<WorkflowStep>,
    #[serde(default)]
    pub remote: RemoteIdentifiers,
    #[serde(default)]
    pub premium: Option<f64>,
    #[serde(default)]
    pub results: Option<ProcessingResults>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(line_of_business_id: impl Into<String>, form: SubmissionForm) -> Self {
        let now = Utc::now();
        Self {
            id: SubmissionId::new(),
            line_of_business_id: line_of_business_id.into(),
            form,
            status: SubmissionStatus::Draft,
            workflow_step: None,
            remote: RemoteIdentifiers::default(),
            premium: None,
            results: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: SubmissionId) -> Self {
        self.id = id;
        self
    }

    /// Enter `processing` at the given step; clears any outcome of a previous run
    pub fn begin_processing(&mut self, step: WorkflowStep) {
        self.status = SubmissionStatus::Processing;
        self.workflow_step = Some(step);
        self.premium = None;
        self.error = None;
        self.touch();
    }

    pub fn advance(&mut self, step: WorkflowStep) {
        self.workflow_step = Some(step);
        self.touch();
    }

    pub fn mark_quoted(&mut self, premium: Option<f64>, results: ProcessingResults) {
        self.status = SubmissionStatus::Quoted;
        self.workflow_step = Some(WorkflowStep::Complete);
        self.premium = premium;
        self.results = Some(results);
        self.error = None;
        self.touch();
    }

    pub fn mark_failed(&mut self, message: impl Into<String>, mut results: ProcessingResults) {
        let message = message.into();
        results.error = Some(message.clone());
        self.status = SubmissionStatus::Failed;
        self.workflow_step = Some(WorkflowStep::Error);
        self.results = Some(results);
        self.error = Some(message);
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::value_objects::ApplicantData;

    fn submission() -> Submission {
        Submission::new("gl", SubmissionForm::new(ApplicantData::default()))
    }

    #[test]
    fn test_new_submission_is_draft() {
        let s = submission();
        assert_eq!(s.status, SubmissionStatus::Draft);
        assert!(s.workflow_step.is_none());
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_quoted_transition() {
        let mut s = submission();
        s.begin_processing(WorkflowStep::Insured);
        assert_eq!(s.status, SubmissionStatus::Processing);
        s.advance(WorkflowStep::Premium);
        s.mark_quoted(Some(1500.0), ProcessingResults::default());
        assert_eq!(s.status, SubmissionStatus::Quoted);
        assert_eq!(s.workflow_step, Some(WorkflowStep::Complete));
        assert_eq!(s.premium, Some(1500.0));
        assert!(s.is_terminal());
    }

    #[test]
    fn test_failed_transition_records_error() {
        let mut s = submission();
        s.begin_processing(WorkflowStep::Insured);
        s.mark_failed("insured rejected", ProcessingResults::default());
        assert_eq!(s.status, SubmissionStatus::Failed);
        assert_eq!(s.workflow_step, Some(WorkflowStep::Error));
        assert_eq!(s.error.as_deref(), Some("insured rejected"));
        assert_eq!(
            s.results.unwrap().error.as_deref(),
            Some("insured rejected")
        );
    }

    #[test]
    fn test_reprocessing_clears_previous_outcome() {
        let mut s = submission();
        s.mark_failed("boom", ProcessingResults::default());
        s.remote.insured_id = Some("ins-1".into());
        s.begin_processing(WorkflowStep::Insured);
        assert!(s.error.is_none());
        assert_eq!(s.remote.insured_id.as_deref(), Some("ins-1"));
    }

    #[test]
    fn test_fatal_steps() {
        assert!(WorkflowStep::Insured.is_fatal_on_failure());
        assert!(WorkflowStep::Quote.is_fatal_on_failure());
        assert!(!WorkflowStep::QuoteOptions.is_fatal_on_failure());
        assert!(!WorkflowStep::Rating.is_fatal_on_failure());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SubmissionStatus::Quoted).unwrap();
        assert_eq!(json, "\"quoted\"");
        let step = serde_json::to_string(&WorkflowStep::QuoteDetails).unwrap();
        assert_eq!(step, "\"quote_details\"");
    }
}

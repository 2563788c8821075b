//! Progress notification port
//!
//! Defines the interface for reporting progress while a submission is processed.

use rater_domain::{Submission, WorkflowStep};

/// How a workflow step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Failed or skipped without aborting the pipeline
    Degraded,
    Failed,
}

impl StepOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            StepOutcome::Succeeded => "succeeded",
            StepOutcome::Degraded => "degraded",
            StepOutcome::Failed => "failed",
        }
    }
}

/// Callback for progress updates during submission processing
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, web UI, etc.)
pub trait ProgressNotifier: Send + Sync {
    /// Called when a step starts
    fn on_step_start(&self, step: &WorkflowStep);

    /// Called when a step finishes
    fn on_step_complete(&self, step: &WorkflowStep, outcome: StepOutcome, detail: Option<&str>);

    /// Called once the submission reached a terminal state
    fn on_finished(&self, _submission: &Submission) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_step_start(&self, _step: &WorkflowStep) {}
    fn on_step_complete(&self, _step: &WorkflowStep, _outcome: StepOutcome, _detail: Option<&str>) {
    }
}

//! Progress reporting for submission processing

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rater_application::{ProgressNotifier, StepOutcome};
use rater_domain::{Submission, SubmissionStatus, WorkflowStep};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress with one spinner per workflow step
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bars(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Marker and color for a finished step
fn outcome_marker(outcome: StepOutcome) -> colored::ColoredString {
    match outcome {
        StepOutcome::Succeeded => "v".green(),
        StepOutcome::Degraded => "!".yellow(),
        StepOutcome::Failed => "x".red(),
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_step_start(&self, step: &WorkflowStep) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(step.display_name().to_string());
        pb.set_message("running...");
        pb.enable_steady_tick(Duration::from_millis(100));
        self.bars().insert(step.as_str().to_string(), pb);
    }

    fn on_step_complete(&self, step: &WorkflowStep, outcome: StepOutcome, detail: Option<&str>) {
        if let Some(pb) = self.bars().remove(step.as_str()) {
            let message = match detail {
                Some(detail) => format!("{} {}", outcome_marker(outcome), detail),
                None => format!("{} {}", outcome_marker(outcome), outcome.as_str()),
            };
            pb.finish_with_message(message);
        }
    }

    fn on_finished(&self, submission: &Submission) {
        // Steps that never completed (fatal failure) stop spinning
        for (_, pb) in self.bars().drain() {
            pb.abandon_with_message("not reached".dimmed().to_string());
        }
        let status = match submission.status {
            SubmissionStatus::Quoted => "quoted".green().bold(),
            SubmissionStatus::Failed => "failed".red().bold(),
            _ => submission.status.as_str().normal(),
        };
        let _ = self
            .multi
            .println(format!("{} Submission {} {}", "->".cyan(), submission.id, status));
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_step_start(&self, step: &WorkflowStep) {
        eprintln!("{} {}", "->".cyan(), step.display_name().bold());
    }

    fn on_step_complete(&self, step: &WorkflowStep, outcome: StepOutcome, detail: Option<&str>) {
        match detail {
            Some(detail) => eprintln!(
                "  {} {} ({})",
                outcome_marker(outcome),
                step.display_name(),
                detail
            ),
            None => eprintln!("  {} {}", outcome_marker(outcome), step.display_name()),
        }
    }
}

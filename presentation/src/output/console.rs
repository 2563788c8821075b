//! Console output formatter

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use rater_domain::{
    CellMapping, PremiumResolution, PremiumSource, RaterOutcome, RatingOutcome, Submission,
    SubmissionStatus,
};
use std::path::Path;

/// Formats command results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn field(label: &str, value: impl std::fmt::Display) -> String {
        format!("{} {}\n", format!("{label}:").cyan().bold(), value)
    }

    fn optional(value: Option<&str>) -> String {
        value.map(str::to_string).unwrap_or_else(|| "-".dimmed().to_string())
    }

    fn amount(premium: Option<f64>) -> String {
        match premium {
            Some(amount) => format!("{amount:.2}").green().bold().to_string(),
            None => "pending manual underwriting".yellow().to_string(),
        }
    }

    fn source(source: &PremiumSource) -> String {
        match source {
            PremiumSource::ProcedureResult { field } => format!("rating procedure field {field}"),
            PremiumSource::SupplementaryQuery { query, field } => format!("{query} field {field}"),
            PremiumSource::Template { sheet, cell } => format!("template cell {sheet}!{cell}"),
        }
    }

    fn rating(outcome: &RatingOutcome) -> String {
        match outcome {
            RatingOutcome::Completed { procedure, rows } => format!("{procedure}: {rows} row(s)"),
            RatingOutcome::ParameterRequired {
                procedure,
                parameter,
            } => format!("{procedure}: requires {parameter}").yellow().to_string(),
            RatingOutcome::Failed { procedure, message } => {
                format!("{procedure}: {message}").red().to_string()
            }
            RatingOutcome::Skipped { reason } => format!("skipped ({reason})").dimmed().to_string(),
        }
    }

    fn rater_lines(outcome: &RaterOutcome) -> String {
        let mut output = String::new();
        output.push_str(&Self::field("Cells populated", outcome.populated_cells));
        let method = if outcome.requested_method == outcome.used_method {
            outcome.used_method.display_name().to_string()
        } else {
            format!(
                "{} (requested {})",
                outcome.used_method.display_name(),
                outcome.requested_method.display_name()
            )
        };
        output.push_str(&Self::field("Calculation", method));
        output.push_str(&Self::field(
            "Calculated",
            if outcome.calculated { "yes".green() } else { "no".yellow() },
        ));
        if let Some(uploaded) = outcome.uploaded {
            output.push_str(&Self::field("Uploaded", if uploaded { "yes" } else { "no" }));
        }
        if let Some(premium) = outcome.imported_premium {
            output.push_str(&Self::field("Imported premium", format!("{premium:.2}")));
        }
        output
    }

    fn warnings(warnings: impl IntoIterator<Item = String>) -> String {
        let warnings: Vec<String> = warnings.into_iter().collect();
        if warnings.is_empty() {
            return String::new();
        }
        let mut output = format!("\n{}\n", "Warnings:".yellow().bold());
        for warning in warnings {
            output.push_str(&format!("  * {}\n", warning));
        }
        output
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn submission(&self, submission: &Submission) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Submission"));
        output.push('\n');

        let status = match submission.status {
            SubmissionStatus::Quoted => submission.status.as_str().green().bold(),
            SubmissionStatus::Failed => submission.status.as_str().red().bold(),
            _ => submission.status.as_str().normal(),
        };
        output.push_str(&Self::field("Id", &submission.id));
        output.push_str(&Self::field("Line of business", &submission.line_of_business_id));
        output.push_str(&Self::field("Status", status));
        output.push_str(&Self::field("Premium", Self::amount(submission.premium)));

        output.push_str(&Self::section_header("Remote"));
        let remote = &submission.remote;
        output.push_str(&Self::field("Insured", Self::optional(remote.insured_id.as_deref())));
        output.push_str(&Self::field("Quote", Self::optional(remote.quote_id.as_deref())));
        output.push_str(&Self::field(
            "Control number",
            Self::optional(remote.control_number.as_deref()),
        ));

        if let Some(results) = &submission.results {
            let options: Vec<&str> = results.quote_options.iter().map(|o| o.id.as_str()).collect();
            output.push_str(&Self::field(
                "Quote options",
                if options.is_empty() { "-".to_string() } else { options.join(", ") },
            ));

            if let Some(rater) = &results.rater {
                output.push_str(&Self::section_header("Rater"));
                output.push_str(&Self::rater_lines(rater));
            }
            if let Some(rating) = &results.rating {
                output.push_str(&Self::section_header("Rating"));
                output.push_str(&format!("{}\n", Self::rating(rating)));
            }
            if let Some(resolution) = &results.premium {
                output.push_str(&Self::section_header("Premium"));
                output.push_str(&self.premium(resolution));
            }
            output.push_str(&Self::warnings(
                results
                    .warnings
                    .iter()
                    .map(|w| format!("[{}] {}", w.step.as_str(), w.message)),
            ));
        }

        if let Some(error) = &submission.error {
            output.push_str(&format!("\n{} {}\n", "Error:".red().bold(), error));
        }

        output.push_str(&Self::footer());
        output
    }

    fn populated(&self, mapping: &CellMapping, out: &Path) -> String {
        let mut output = format!(
            "{} {} cell(s) written to {}\n",
            "v".green(),
            mapping.len(),
            out.display()
        );
        for (cell, value) in mapping.iter() {
            output.push_str(&format!("  {:>5}  {}\n", cell.to_string().dimmed(), value));
        }
        output
    }

    fn rater(&self, outcome: &RaterOutcome, warnings: &[String], out: &Path) -> String {
        let mut output = Self::rater_lines(outcome);
        output.push_str(&Self::field("Written to", out.display()));
        output.push_str(&Self::warnings(warnings.iter().cloned()));
        output
    }

    fn premium(&self, resolution: &PremiumResolution) -> String {
        let mut output = Self::field("Premium", Self::amount(resolution.premium));
        if let Some(source) = &resolution.source {
            output.push_str(&Self::field("Source", Self::source(source)));
        }
        if let Some(diagnostic) = &resolution.diagnostic {
            output.push_str(&format!("{}\n", diagnostic.yellow()));
        }
        for attempt in &resolution.attempts {
            output.push_str(&format!(
                "  {} {}: {}\n",
                "-".dimmed(),
                attempt.source,
                attempt.outcome
            ));
        }
        output
    }
}

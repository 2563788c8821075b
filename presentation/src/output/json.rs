//! JSON output formatter

use crate::output::formatter::OutputFormatter;
use rater_domain::{CellMapping, PremiumResolution, RaterOutcome, Submission};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

/// Pretty-printed JSON, for scripting against the CLI
pub struct JsonFormatter;

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

impl OutputFormatter for JsonFormatter {
    fn submission(&self, submission: &Submission) -> String {
        pretty(submission)
    }

    fn populated(&self, mapping: &CellMapping, out: &Path) -> String {
        pretty(&json!({
            "out": out.display().to_string(),
            "cells": mapping.to_plain_map(),
        }))
    }

    fn rater(&self, outcome: &RaterOutcome, warnings: &[String], out: &Path) -> String {
        pretty(&json!({
            "out": out.display().to_string(),
            "outcome": outcome,
            "warnings": warnings,
        }))
    }

    fn premium(&self, resolution: &PremiumResolution) -> String {
        pretty(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rater_domain::CalculationMethod;

    #[test]
    fn test_rater_json_shape() {
        let outcome = RaterOutcome {
            populated_cells: 3,
            requested_method: CalculationMethod::Script,
            used_method: CalculationMethod::None,
            calculated: false,
            uploaded: None,
            imported_premium: None,
        };
        let text = JsonFormatter.rater(&outcome, &["script missing".into()], Path::new("out.xlsx"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["out"], "out.xlsx");
        assert_eq!(value["outcome"]["populated_cells"], 3);
        assert_eq!(value["warnings"][0], "script missing");
        assert!(value["outcome"].get("uploaded").is_none());
    }
}

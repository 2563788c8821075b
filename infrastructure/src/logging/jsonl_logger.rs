//! Append-only JSONL audit trail

use chrono::{DateTime, SecondsFormat, Utc};
use rater_application::{AuditEvent, AuditLogger};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Serialize)]
struct AuditLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

/// Appends one line per terminal submission event; earlier lines are kept.
pub struct JsonlAuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlAuditLogger {
    /// Returns `None` when the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let opened = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path));

        match opened {
            Ok(file) => Some(Self {
                file: Mutex::new(file),
                path: path.to_path_buf(),
            }),
            Err(e) => {
                warn!("Audit log {} unavailable: {}", path.display(), e);
                None
            }
        }
    }

    fn line(event: &AuditEvent, at: DateTime<Utc>) -> serde_json::Result<String> {
        serde_json::to_string(&AuditLine {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        })
    }
}

impl AuditLogger for JsonlAuditLogger {
    fn log(&self, event: AuditEvent) {
        let written = Self::line(&event, Utc::now())
            .map_err(std::io::Error::other)
            .and_then(|line| match self.file.lock() {
                Ok(mut file) => writeln!(file, "{line}"),
                Err(_) => Ok(()),
            });
        if let Err(e) = written {
            warn!("Dropped {} audit record for {}: {}", event.kind(), self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rater_application::SubmissionAudit;

    fn audit(id: &str, premium: Option<f64>, error: Option<&str>) -> SubmissionAudit {
        SubmissionAudit {
            submission_id: id.to_string(),
            line_of_business_id: "allied-health".to_string(),
            premium,
            quote_id: Some("q-1".to_string()),
            control_number: None,
            error: error.map(str::to_string),
        }
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_processed_and_failed_are_one_line_each() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = JsonlAuditLogger::new(&path).unwrap();

        logger.log(AuditEvent::SubmissionProcessed(audit("sub-1", Some(1250.0), None)));
        logger.log(AuditEvent::SubmissionFailed(audit(
            "sub-2",
            None,
            Some("insured creation failed"),
        )));

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "submission_processed");
        assert_eq!(records[0]["submission_id"], "sub-1");
        assert_eq!(records[0]["premium"], 1250.0);
        assert!(records[0]["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(records[1]["type"], "submission_failed");
        assert_eq!(records[1]["error"], "insured creation failed");
    }

    #[test]
    fn test_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        for id in ["sub-1", "sub-2"] {
            let logger = JsonlAuditLogger::new(&path).unwrap();
            logger.log(AuditEvent::SubmissionProcessed(audit(id, None, None)));
        }

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["submission_id"], "sub-2");
    }

    #[test]
    fn test_line_layout() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let line = JsonlAuditLogger::line(
            &AuditEvent::SubmissionProcessed(audit("sub-1", Some(980.0), None)),
            at,
        )
        .unwrap();
        assert!(line.starts_with(r#"{"timestamp":"2026-03-01T12:00:00.000Z","type":"submission_processed","submission_id":"sub-1""#), "{line}");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_unwritable_location_is_reported_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        assert!(JsonlAuditLogger::new(blocker.join("audit.jsonl")).is_none());
    }
}

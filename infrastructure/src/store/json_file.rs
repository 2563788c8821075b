//! JSON file implementation of the SubmissionStore port.
//!
//! Layout under the store directory:
//!
//! ```text
//! submissions/<submission-id>.json
//! lines/<line-of-business-id>.json
//! lines/<template location>          (relative locations resolve here)
//! ```

use async_trait::async_trait;
use rater_application::{StoreError, SubmissionStore};
use rater_domain::{LineOfBusinessConfig, RaterTemplate, Submission, SubmissionId};
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn submissions_dir(&self) -> PathBuf {
        self.root.join("submissions")
    }

    fn lines_dir(&self) -> PathBuf {
        self.root.join("lines")
    }

    fn submission_path(&self, id: &SubmissionId) -> PathBuf {
        self.submissions_dir().join(format!("{id}.json"))
    }

    fn line_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(StoreError::NotFound(format!("line of business '{id}'")));
        }
        Ok(self.lines_dir().join(format!("{id}.json")))
    }

    /// Template locations are relative to the line-of-business files
    pub fn template_path(&self, template: &RaterTemplate) -> PathBuf {
        let location = Path::new(&template.location);
        if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.lines_dir().join(location)
        }
    }

    /// Persist a line-of-business configuration (used for seeding)
    pub async fn save_line_of_business(&self, line: &LineOfBusinessConfig) -> Result<(), StoreError> {
        let path = self.line_path(&line.id)?;
        let json = serde_json::to_vec_pretty(line)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(path, json).await
    }
}

#[async_trait]
impl SubmissionStore for JsonFileStore {
    async fn load_submission(&self, id: &SubmissionId) -> Result<Submission, StoreError> {
        read_json(&self.submission_path(id), || format!("submission {id}")).await
    }

    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(submission)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.submission_path(&submission.id);
        debug!("Saving submission {} to {}", submission.id, path.display());
        write_atomic(path, json).await
    }

    async fn load_line_of_business(&self, id: &str) -> Result<LineOfBusinessConfig, StoreError> {
        let path = self.line_path(id)?;
        read_json(&path, || format!("line of business '{id}'")).await
    }

    async fn load_template(&self, template: &RaterTemplate) -> Result<Vec<u8>, StoreError> {
        let path = self.template_path(template);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(format!("rater template {}", path.display())),
            _ => StoreError::Io(format!("{}: {e}", path.display())),
        })
    }
}

async fn read_json<T: DeserializeOwned>(
    path: &Path,
    what: impl FnOnce() -> String,
) -> Result<T, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(what())),
        Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
}

/// Write through a sibling temp file and rename it into place
async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> Result<(), StoreError> {
    tokio::task::spawn_blocking(move || {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(format!("{} has no parent", path.display())))?;
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Io(e.to_string()))?;

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::Io(e.to_string()))?;
        file.write_all(&bytes)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        file.persist(&path)
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e.error)))?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Io(e.to_string()))?
}

//! Companion-script calculation backend
//!
//! Invocation: `<interpreter> <script> <template.xlsx> <context.json>`.
//! The script prints the recalculated workbook to stdout as base64.

use super::process;
use crate::config::FileScriptConfig;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rater_application::{CalculationBackend, CalculationContext, CalculationError};
use rater_domain::CalculationMethod;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

pub struct ScriptBackend {
    interpreter: String,
    script: Option<PathBuf>,
    timeout: Duration,
}

impl ScriptBackend {
    pub fn new(interpreter: impl Into<String>, script: Option<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &FileScriptConfig) -> Self {
        Self::new(&config.interpreter, config.script.clone()).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Data handed to the script alongside the template
    fn context_json(context: &CalculationContext) -> serde_json::Value {
        serde_json::json!({
            "sheet": context.sheet,
            "cell_mappings": context.mapping.to_plain_map(),
            "applicant": context.applicant,
            "custom": context.custom,
        })
    }
}

#[async_trait]
impl CalculationBackend for ScriptBackend {
    fn method(&self) -> CalculationMethod {
        CalculationMethod::Script
    }

    async fn is_available(&self) -> bool {
        let script_exists = self.script.as_ref().is_some_and(|s| s.is_file());
        script_exists && process::resolve_program(&self.interpreter).is_some()
    }

    async fn calculate(
        &self,
        workbook: &[u8],
        context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError> {
        let script = self
            .script
            .as_ref()
            .ok_or_else(|| CalculationError::Unavailable("no calculation script configured".to_string()))?;
        let interpreter = process::resolve_program(&self.interpreter)
            .ok_or_else(|| CalculationError::Unavailable(format!("{} not found", self.interpreter)))?;

        // Removed on drop, whichever way this returns
        let dir = process::temp_dir()?;
        let template_path = dir.path().join("template.xlsx");
        let context_path = dir.path().join("context.json");
        process::write_file(&template_path, workbook).await?;
        let context_bytes = serde_json::to_vec(&Self::context_json(context))
            .map_err(|e| CalculationError::Io(e.to_string()))?;
        process::write_file(&context_path, &context_bytes).await?;

        info!("Running calculation script {}", script.display());
        let mut cmd = Command::new(interpreter);
        cmd.arg(script).arg(&template_path).arg(&context_path);
        let output = process::run(cmd, self.timeout).await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("Calculation script stderr: {}", stderr.trim());
        }
        process::check_status("calculation script", &output)?;

        let encoded: String = String::from_utf8_lossy(&output.stdout)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| CalculationError::Process(format!("script output is not base64: {e}")))?;
        if bytes.is_empty() {
            return Err(CalculationError::Process("script produced no workbook".to_string()));
        }
        Ok(bytes)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rater_domain::{CellMapping, CellRef};
    use std::io::Write;

    fn script(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    fn context() -> CalculationContext {
        let mut mapping = CellMapping::new();
        mapping.set(CellRef::parse("B3").unwrap(), "Jane");
        CalculationContext {
            sheet: "submission_data".to_string(),
            mapping,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_round_trips_workbook_through_script() {
        // Echo the template back, base64 encoded, after checking the context file
        let file = script("grep -q '\"B3\":\"Jane\"' \"$2\" || exit 9\nbase64 < \"$1\"\n");
        let backend = ScriptBackend::new("sh", Some(file.path().to_path_buf()));

        assert!(backend.is_available().await);
        let result = backend.calculate(b"PK workbook bytes", &context()).await.unwrap();
        assert_eq!(result, b"PK workbook bytes");
    }

    #[tokio::test]
    async fn test_failing_script_reports_stderr() {
        let file = script("echo 'openpyxl missing' >&2\nexit 2\n");
        let backend = ScriptBackend::new("sh", Some(file.path().to_path_buf()));

        let err = backend.calculate(b"x", &context()).await.unwrap_err();
        assert!(matches!(err, CalculationError::Process(ref m) if m.contains("openpyxl missing")), "{err}");
    }

    #[tokio::test]
    async fn test_garbage_output_is_rejected() {
        let file = script("echo 'not base64 !!'\n");
        let backend = ScriptBackend::new("sh", Some(file.path().to_path_buf()));
        assert!(matches!(
            backend.calculate(b"x", &context()).await,
            Err(CalculationError::Process(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_script_times_out() {
        let file = script("sleep 5\n");
        let backend = ScriptBackend::new("sh", Some(file.path().to_path_buf()))
            .with_timeout(Duration::from_millis(100));
        assert!(matches!(
            backend.calculate(b"x", &context()).await,
            Err(CalculationError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_without_script() {
        let backend = ScriptBackend::new("sh", None);
        assert!(!backend.is_available().await);
        assert!(!ScriptBackend::new("sh", Some(PathBuf::from("/no/such/calc.py"))).is_available().await);
        assert!(matches!(
            backend.calculate(b"x", &context()).await,
            Err(CalculationError::Unavailable(_))
        ));
    }
}

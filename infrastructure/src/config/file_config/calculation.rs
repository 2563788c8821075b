//! Calculation backend configuration from TOML (`[calculation.*]` sections)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCalculationConfig {
    pub script: FileScriptConfig,
    pub headless_office: FileHeadlessOfficeConfig,
    pub native_office: FileNativeOfficeConfig,
}

impl FileCalculationConfig {
    /// Every configured timeout with its key, for validation
    pub fn timeouts(&self) -> [(&'static str, u64); 3] {
        [
            ("calculation.script.timeout_seconds", self.script.timeout_seconds),
            (
                "calculation.headless_office.timeout_seconds",
                self.headless_office.timeout_seconds,
            ),
            (
                "calculation.native_office.timeout_seconds",
                self.native_office.timeout_seconds,
            ),
        ]
    }
}

/// `[calculation.script]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileScriptConfig {
    /// Interpreter resolved on PATH (or an absolute path)
    pub interpreter: String,
    /// Script invoked as `<interpreter> <script> <template> <context>`
    pub script: Option<PathBuf>,
    pub timeout_seconds: u64,
}

impl Default for FileScriptConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            script: None,
            timeout_seconds: 120,
        }
    }
}

impl FileScriptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// `[calculation.headless_office]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHeadlessOfficeConfig {
    /// Explicit `soffice` binary; discovered on PATH when unset
    pub binary: Option<PathBuf>,
    pub timeout_seconds: u64,
}

impl Default for FileHeadlessOfficeConfig {
    fn default() -> Self {
        Self {
            binary: None,
            timeout_seconds: 120,
        }
    }
}

impl FileHeadlessOfficeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// `[calculation.native_office]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNativeOfficeConfig {
    pub powershell: String,
    pub timeout_seconds: u64,
}

impl Default for FileNativeOfficeConfig {
    fn default() -> Self {
        Self {
            powershell: "powershell.exe".to_string(),
            timeout_seconds: 180,
        }
    }
}

impl FileNativeOfficeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

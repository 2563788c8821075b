//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod calculation;
mod ims;
mod logging;
mod premium;
mod rater;
mod store;

pub use calculation::{
    FileCalculationConfig, FileHeadlessOfficeConfig, FileNativeOfficeConfig, FileScriptConfig,
};
pub use ims::FileImsConfig;
pub use logging::FileLoggingConfig;
pub use premium::FilePremiumConfig;
pub use rater::FileRaterConfig;
pub use store::FileStoreConfig;

use rater_application::ProcessingParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("{0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("ims.token_ttl_minutes cannot be 0")]
    ZeroTokenTtl,

    #[error("rater.sheet cannot be empty")]
    EmptyTargetSheet,

    #[error("ims.url must be set to process submissions")]
    EmptyEndpoint,

    #[error("ims.username must be set to process submissions")]
    EmptyUsername,

    #[error("no IMS password configured (set ims.password or ${0})")]
    MissingPassword(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Remote endpoint and credentials
    pub ims: FileImsConfig,
    /// Template population and optional remote side effects
    pub rater: FileRaterConfig,
    /// Out-of-process calculation backends
    pub calculation: FileCalculationConfig,
    /// Supplementary premium lookups
    pub premium: FilePremiumConfig,
    pub store: FileStoreConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate values every command depends on
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.ims.timeout_seconds == 0 {
            return Err(ConfigValidationError::ZeroTimeout("ims.timeout_seconds"));
        }
        if self.ims.token_ttl_minutes == 0 {
            return Err(ConfigValidationError::ZeroTokenTtl);
        }
        if let Some((field, _)) = self
            .calculation
            .timeouts()
            .into_iter()
            .find(|(_, seconds)| *seconds == 0)
        {
            return Err(ConfigValidationError::ZeroTimeout(field));
        }
        if self.rater.sheet.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTargetSheet);
        }
        Ok(())
    }

    /// Additional checks before talking to the remote system
    pub fn validate_for_processing(&self) -> Result<(), ConfigValidationError> {
        self.validate()?;
        if !self.ims.is_configured() {
            return Err(ConfigValidationError::EmptyEndpoint);
        }
        if self.ims.username.trim().is_empty() {
            return Err(ConfigValidationError::EmptyUsername);
        }
        if self.ims.resolve_password().is_none() {
            return Err(ConfigValidationError::MissingPassword(
                self.ims.password_env.clone(),
            ));
        }
        Ok(())
    }

    /// Orchestrator switches derived from `[rater]` and `[premium]`
    pub fn processing_params(&self) -> ProcessingParams {
        ProcessingParams::default()
            .with_upload_rater(self.rater.upload)
            .with_post_premium(self.rater.post_premium)
            .with_premium_queries(self.premium.queries())
    }

    /// Copy safe to print: the password is masked
    pub fn redacted(&self) -> FileConfig {
        let mut config = self.clone();
        if config.ims.password.is_some() {
            config.ims.password = Some("********".to_string());
        }
        config
    }
}

//! Configuration file loading for ims-rater
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `IMS_RATER_<SECTION>__<KEY>` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./ims-rater.toml` or `./.ims-rater.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/ims-rater/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileCalculationConfig, FileConfig, FileHeadlessOfficeConfig,
    FileImsConfig, FileLoggingConfig, FileNativeOfficeConfig, FilePremiumConfig,
    FileRaterConfig, FileScriptConfig, FileStoreConfig,
};
pub use loader::ConfigLoader;

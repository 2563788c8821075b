//! Infrastructure layer for ims-rater
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod calculation;
pub mod config;
pub mod ims;
pub mod logging;
pub mod store;
pub mod workbook;

// Re-export commonly used types
pub use calculation::{
    CalculationRegistry, HeadlessOfficeBackend, InProcessBackend, NativeOfficeBackend,
    ScriptBackend,
};
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use ims::{
    client::{ImsClient, ImsConnection},
    error::{ImsError, Result},
    gateway::ImsSoapGateway,
    token_cache::TokenCache,
    transport::{HttpSoapTransport, SoapTransport},
};
pub use logging::JsonlAuditLogger;
pub use store::JsonFileStore;
pub use workbook::OoxmlRaterWorkbook;

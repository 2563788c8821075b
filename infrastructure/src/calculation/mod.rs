//! Calculation backends
//!
//! - [`InProcessBackend`]: embedded formula evaluator over the OOXML package
//! - [`ScriptBackend`]: companion script, workbook in and base64 workbook out
//! - [`HeadlessOfficeBackend`]: LibreOffice conversion round trip
//! - [`NativeOfficeBackend`]: Excel automation on Windows or WSL
//!
//! [`CalculationRegistry`] maps a line of business's calculation method to
//! one of them.

pub mod headless_office;
pub mod in_process;
pub mod native_office;
mod process;
pub mod script;

pub use headless_office::HeadlessOfficeBackend;
pub use in_process::InProcessBackend;
pub use native_office::NativeOfficeBackend;
pub use script::ScriptBackend;

use crate::config::FileCalculationConfig;
use rater_application::{CalculationBackend, CalculationBackends, NoCalculation};
use rater_domain::CalculationMethod;
use std::sync::Arc;
use tracing::warn;

/// Backends keyed by the method they implement
pub struct CalculationRegistry {
    backends: Vec<Arc<dyn CalculationBackend>>,
}

impl CalculationRegistry {
    /// Only the backends that need no external tooling
    pub fn new() -> Self {
        Self {
            backends: vec![Arc::new(NoCalculation), Arc::new(InProcessBackend::new())],
        }
    }

    pub fn from_config(config: &FileCalculationConfig) -> Self {
        Self::new()
            .with_backend(Arc::new(ScriptBackend::from_config(&config.script)))
            .with_backend(Arc::new(HeadlessOfficeBackend::from_config(
                &config.headless_office,
            )))
            .with_backend(Arc::new(NativeOfficeBackend::from_config(
                &config.native_office,
            )))
    }

    /// Register a backend, replacing any previous one for the same method
    pub fn with_backend(mut self, backend: Arc<dyn CalculationBackend>) -> Self {
        let method = backend.method();
        self.backends.retain(|b| b.method() != method);
        self.backends.push(backend);
        self
    }

    pub fn methods(&self) -> Vec<CalculationMethod> {
        self.backends.iter().map(|b| b.method()).collect()
    }
}

impl Default for CalculationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculationBackends for CalculationRegistry {
    fn backend(&self, method: CalculationMethod) -> Arc<dyn CalculationBackend> {
        match self.backends.iter().find(|b| b.method() == method) {
            Some(backend) => Arc::clone(backend),
            None => {
                warn!(
                    "No {} backend registered; leaving calculation to IMS",
                    method.as_str()
                );
                Arc::new(NoCalculation)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = CalculationRegistry::new();
        assert_eq!(
            registry.backend(CalculationMethod::InProcess).method(),
            CalculationMethod::InProcess
        );
        // Unregistered methods degrade to no calculation
        assert_eq!(
            registry.backend(CalculationMethod::Script).method(),
            CalculationMethod::None
        );
    }

    #[test]
    fn test_from_config_registers_every_method() {
        let registry = CalculationRegistry::from_config(&FileCalculationConfig::default());
        for method in CalculationMethod::ALL {
            assert_eq!(registry.backend(method).method(), method);
        }
        assert_eq!(registry.methods().len(), CalculationMethod::ALL.len());
    }
}

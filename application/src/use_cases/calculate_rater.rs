//! Calculate Rater use case
//!
//! Populates a rater template with mapped submission data and runs the
//! configured calculation backend. Calculation failures never fail the
//! submission: the populated but uncalculated workbook is returned instead.

use crate::ports::calculation::{
    CalculationBackend, CalculationBackends, CalculationContext, NoCalculation,
};
use crate::ports::rater_workbook::RaterWorkbook;
use rater_domain::{CalculationMethod, RaterOutcome};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for the CalculateRater use case
#[derive(Debug, Clone)]
pub struct CalculateRaterInput<'a> {
    pub template: &'a [u8],
    pub method: CalculationMethod,
    /// Target sheet and cell mapping travel inside the context
    pub context: CalculationContext,
}

/// A populated, possibly calculated, rater workbook
#[derive(Debug, Clone)]
pub struct PreparedRater {
    pub workbook: Vec<u8>,
    pub outcome: RaterOutcome,
    /// Degradations worth surfacing to the operator
    pub warnings: Vec<String>,
}

/// Use case for populating and calculating a rater
pub struct CalculateRaterUseCase {
    workbook: Arc<dyn RaterWorkbook>,
    backends: Arc<dyn CalculationBackends>,
}

impl CalculateRaterUseCase {
    pub fn new(workbook: Arc<dyn RaterWorkbook>, backends: Arc<dyn CalculationBackends>) -> Self {
        Self { workbook, backends }
    }

    pub async fn execute(&self, input: CalculateRaterInput<'_>) -> PreparedRater {
        let CalculateRaterInput {
            template,
            method,
            context,
        } = input;
        let mut warnings = Vec::new();

        let populated = self
            .workbook
            .populate_cells(template, &context.mapping, &context.sheet);
        debug!(
            "Populated {} cell(s) on sheet {}",
            context.mapping.len(),
            context.sheet
        );

        let backend = self.select_backend(method, &mut warnings).await;
        let used_method = backend.method();

        let (workbook, calculated) = if used_method == CalculationMethod::None {
            (populated, false)
        } else {
            match backend.calculate(&populated, &context).await {
                Ok(bytes) => {
                    info!("Rater calculated with {}", used_method.display_name());
                    (bytes, true)
                }
                Err(e) => {
                    let message = format!(
                        "{} calculation failed, using uncalculated workbook: {}",
                        used_method.display_name(),
                        e
                    );
                    warn!("{}", message);
                    warnings.push(message);
                    (populated, false)
                }
            }
        };

        PreparedRater {
            workbook,
            outcome: RaterOutcome {
                populated_cells: context.mapping.len(),
                requested_method: method,
                used_method,
                calculated,
                uploaded: None,
                imported_premium: None,
            },
            warnings,
        }
    }

    async fn select_backend(
        &self,
        method: CalculationMethod,
        warnings: &mut Vec<String>,
    ) -> Arc<dyn CalculationBackend> {
        let backend = self.backends.backend(method);
        if backend.is_available().await {
            return backend;
        }
        let message = format!(
            "{} backend is not available on this host; skipping calculation",
            method.display_name()
        );
        warn!("{}", message);
        warnings.push(message);
        Arc::new(NoCalculation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::testing::{FakeWorkbook, StaticBackends, StubBackend};
    use rater_domain::CellMapping;

    fn context() -> CalculationContext {
        let mut mapping = CellMapping::default();
        mapping.set("B1".parse().unwrap(), "Jane");
        mapping.set("B2".parse().unwrap(), "Doe");
        CalculationContext {
            sheet: "submission_data".into(),
            mapping,
            ..Default::default()
        }
    }

    fn use_case(backends: StaticBackends) -> (CalculateRaterUseCase, Arc<FakeWorkbook>) {
        let workbook = Arc::new(FakeWorkbook::new());
        (
            CalculateRaterUseCase::new(workbook.clone(), Arc::new(backends)),
            workbook,
        )
    }

    #[tokio::test]
    async fn test_none_method_returns_populated_workbook() {
        let (uc, workbook) = use_case(StaticBackends::new());
        let prepared = uc
            .execute(CalculateRaterInput {
                template: b"template",
                method: CalculationMethod::None,
                context: context(),
            })
            .await;

        assert_eq!(prepared.workbook, b"template+2".to_vec());
        assert!(!prepared.outcome.calculated);
        assert_eq!(prepared.outcome.populated_cells, 2);
        assert!(prepared.warnings.is_empty());
        assert_eq!(workbook.populated_sheets(), vec!["submission_data"]);
    }

    #[tokio::test]
    async fn test_backend_output_replaces_workbook() {
        let backends = StaticBackends::new().with(StubBackend::succeeding(
            CalculationMethod::InProcess,
            b"calculated",
        ));
        let (uc, _) = use_case(backends);
        let prepared = uc
            .execute(CalculateRaterInput {
                template: b"template",
                method: CalculationMethod::InProcess,
                context: context(),
            })
            .await;

        assert_eq!(prepared.workbook, b"calculated".to_vec());
        assert!(prepared.outcome.calculated);
        assert_eq!(prepared.outcome.used_method, CalculationMethod::InProcess);
    }

    #[tokio::test]
    async fn test_unavailable_backend_degrades_to_none() {
        let backends = StaticBackends::new()
            .with(StubBackend::unavailable(CalculationMethod::HeadlessOffice));
        let (uc, _) = use_case(backends);
        let prepared = uc
            .execute(CalculateRaterInput {
                template: b"template",
                method: CalculationMethod::HeadlessOffice,
                context: context(),
            })
            .await;

        assert_eq!(prepared.workbook, b"template+2".to_vec());
        assert_eq!(prepared.outcome.requested_method, CalculationMethod::HeadlessOffice);
        assert_eq!(prepared.outcome.used_method, CalculationMethod::None);
        assert!(prepared.warnings[0].contains("not available"));
    }

    #[tokio::test]
    async fn test_failing_backend_keeps_populated_workbook() {
        let backends =
            StaticBackends::new().with(StubBackend::failing(CalculationMethod::Script));
        let (uc, _) = use_case(backends);
        let prepared = uc
            .execute(CalculateRaterInput {
                template: b"template",
                method: CalculationMethod::Script,
                context: context(),
            })
            .await;

        assert_eq!(prepared.workbook, b"template+2".to_vec());
        assert!(!prepared.outcome.calculated);
        assert_eq!(prepared.outcome.used_method, CalculationMethod::Script);
        assert!(prepared.warnings[0].contains("calculation failed"));
    }
}

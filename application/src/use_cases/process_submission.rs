//! Process Submission use case
//!
//! The submission orchestrator. Drives a submission from `draft` through the
//! remote workflow to `quoted` or `failed`:
//!
//! ```text
//! insured -> quote -> quote_details -> quote_options ┐
//!                                      rater ────────┴-> rating -> premium -> quoted
//! ```
//!
//! Only insured and quote creation are fatal. Every other step degrades:
//! the failure is logged, recorded as a warning in the results blob, and
//! processing continues. Remote side effects are never rolled back.

use crate::config::ProcessingParams;
use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::calculation::{CalculationBackends, CalculationContext};
use crate::ports::ims_gateway::ImsGateway;
use crate::ports::progress::{NoProgress, ProgressNotifier, StepOutcome};
use crate::ports::rater_workbook::RaterWorkbook;
use crate::ports::submission_store::{StoreError, SubmissionStore};
use crate::use_cases::calculate_rater::{CalculateRaterInput, CalculateRaterUseCase, PreparedRater};
use crate::use_cases::resolve_premium::{ResolvePremiumInput, ResolvePremiumUseCase};
use chrono::Utc;
use rater_domain::{
    DataTable, InsuredRequest, LineOfBusinessConfig, PolicyTerm, ProcedureOutcome,
    ProcedureParams, ProcessingResults, QuoteOption, QuoteRequest, RaterTemplate, RaterUpload,
    RatingOutcome, Submission, SubmissionId, WorkflowStep, apply_calculated_fields, build_mapping,
};
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parameter name the rating and quote-option procedures are keyed by
const QUOTE_OPTION_PARAMETER: &str = "QuoteOptionGUID";
const QUOTE_PARAMETER: &str = "QuoteGUID";
/// Procedure consulted when AutoAddQuoteOptions returns nothing
const QUOTE_INFORMATION_PROCEDURE: &str = "GetQuoteInformation";

/// Errors that prevent a submission from being processed at all.
///
/// Workflow failures are not errors: they end in a `failed` submission.
#[derive(Error, Debug)]
pub enum ProcessSubmissionError {
    #[error("Submission store error: {0}")]
    Store(#[from] StoreError),
}

/// Use case for processing a submission through the remote workflow
pub struct ProcessSubmissionUseCase<G: ImsGateway + 'static> {
    gateway: Arc<G>,
    store: Arc<dyn SubmissionStore>,
    rater: CalculateRaterUseCase,
    resolver: ResolvePremiumUseCase<G>,
    audit: Arc<dyn AuditLogger>,
    params: ProcessingParams,
}

impl<G: ImsGateway + 'static> ProcessSubmissionUseCase<G> {
    pub fn new(
        gateway: Arc<G>,
        store: Arc<dyn SubmissionStore>,
        workbook: Arc<dyn RaterWorkbook>,
        backends: Arc<dyn CalculationBackends>,
    ) -> Self {
        let params = ProcessingParams::default();
        Self {
            rater: CalculateRaterUseCase::new(workbook.clone(), backends),
            resolver: ResolvePremiumUseCase::new(gateway.clone(), workbook)
                .with_queries(params.premium_queries.clone()),
            gateway,
            store,
            audit: Arc::new(NoAuditLogger),
            params,
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_params(mut self, params: ProcessingParams) -> Self {
        self.resolver = self.resolver.with_queries(params.premium_queries.clone());
        self.params = params;
        self
    }

    pub async fn execute(&self, id: &SubmissionId) -> Result<Submission, ProcessSubmissionError> {
        self.execute_with_progress(id, &NoProgress).await
    }

    /// Process a submission, reporting each workflow step.
    ///
    /// The caller must ensure at most one run per submission id at a time.
    pub async fn execute_with_progress(
        &self,
        id: &SubmissionId,
        progress: &dyn ProgressNotifier,
    ) -> Result<Submission, ProcessSubmissionError> {
        let mut submission = self.store.load_submission(id).await?;
        info!(
            "Processing submission {} (line of business {})",
            submission.id, submission.line_of_business_id
        );

        submission.begin_processing(WorkflowStep::Insured);
        self.checkpoint(&submission).await;

        let mut results = ProcessingResults::default();
        let outcome = match self.load_line(&submission.line_of_business_id).await {
            Ok(line) => self.run(&mut submission, &line, &mut results, progress).await,
            Err(message) => Err(message),
        };

        match outcome {
            Ok(premium) => {
                submission.mark_quoted(premium, results);
                match premium {
                    Some(amount) => info!("Submission {} quoted at {:.2}", submission.id, amount),
                    None => info!(
                        "Submission {} quoted, premium pending manual underwriting",
                        submission.id
                    ),
                }
                self.audit
                    .log(AuditEvent::SubmissionProcessed((&submission).into()));
            }
            Err(message) => {
                warn!("Submission {} failed: {}", submission.id, message);
                submission.mark_failed(message, results);
                self.audit
                    .log(AuditEvent::SubmissionFailed((&submission).into()));
            }
        }

        self.store.save_submission(&submission).await?;
        progress.on_finished(&submission);
        Ok(submission)
    }

    async fn load_line(&self, id: &str) -> Result<LineOfBusinessConfig, String> {
        let line = self
            .store
            .load_line_of_business(id)
            .await
            .map_err(|e| format!("Line of business {id} could not be loaded: {e}"))?;
        line.validate().map_err(|e| e.to_string())?;
        Ok(line)
    }

    /// Runs the workflow; `Err` carries the message of a fatal step failure.
    async fn run(
        &self,
        submission: &mut Submission,
        line: &LineOfBusinessConfig,
        results: &mut ProcessingResults,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<f64>, String> {
        let effective = self
            .params
            .effective_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let term = PolicyTerm::annual(effective);

        // ==================== Insured (fatal) ====================
        progress.on_step_start(&WorkflowStep::Insured);
        let insured_id = match submission.remote.insured_id.clone() {
            Some(id) => {
                info!("Reusing insured {}", id);
                id
            }
            None => {
                let request = InsuredRequest::from_applicant(&submission.form.applicant, &line.remote);
                let id = self
                    .gateway
                    .add_insured(&request)
                    .await
                    .map_err(|e| fail_step(WorkflowStep::Insured, progress, e))?;
                info!("Created insured {}", id);
                submission.remote.insured_id = Some(id.clone());
                id
            }
        };
        progress.on_step_complete(&WorkflowStep::Insured, StepOutcome::Succeeded, Some(&insured_id));

        // ==================== Quote (fatal) ====================
        submission.advance(WorkflowStep::Quote);
        self.checkpoint(submission).await;
        progress.on_step_start(&WorkflowStep::Quote);
        let quote_id = match submission.remote.quote_id.clone() {
            Some(id) => {
                info!("Reusing quote {}", id);
                id
            }
            None => {
                let request =
                    QuoteRequest::new(&insured_id, &submission.form.applicant, &line.remote, term);
                let id = self
                    .gateway
                    .add_quote_with_submission(&request)
                    .await
                    .map_err(|e| fail_step(WorkflowStep::Quote, progress, e))?;
                info!("Created submission and quote {}", id);
                submission.remote.submission_id = Some(id.clone());
                submission.remote.quote_id = Some(id.clone());
                id
            }
        };
        if submission.remote.control_number.is_none() {
            match self.gateway.get_control_number(&quote_id).await {
                Ok(number) => submission.remote.control_number = Some(number),
                Err(e) => degrade(
                    results,
                    WorkflowStep::Quote,
                    format!("Control number lookup failed: {e}"),
                ),
            }
        }
        results.control_number = submission.remote.control_number.clone();
        progress.on_step_complete(&WorkflowStep::Quote, StepOutcome::Succeeded, Some(&quote_id));

        // ==================== Quote details ====================
        submission.advance(WorkflowStep::QuoteDetails);
        self.checkpoint(submission).await;
        progress.on_step_start(&WorkflowStep::QuoteDetails);
        match self.gateway.auto_add_quote_details(&quote_id).await {
            Ok(()) => progress.on_step_complete(&WorkflowStep::QuoteDetails, StepOutcome::Succeeded, None),
            Err(e) => {
                let message = format!("Quote details failed: {e}");
                progress.on_step_complete(
                    &WorkflowStep::QuoteDetails,
                    StepOutcome::Degraded,
                    Some(&message),
                );
                degrade(results, WorkflowStep::QuoteDetails, message);
            }
        }

        // ==================== Quote options + rater ====================
        submission.advance(WorkflowStep::QuoteOptions);
        self.checkpoint(submission).await;
        progress.on_step_start(&WorkflowStep::QuoteOptions);
        progress.on_step_start(&WorkflowStep::Rater);
        let ((options, option_warnings), rater) = tokio::join!(
            self.quote_options(&quote_id),
            self.prepare_rater(submission, line, term, &quote_id),
        );

        let options_outcome = if option_warnings.is_empty() {
            StepOutcome::Succeeded
        } else {
            StepOutcome::Degraded
        };
        let options_detail = format!("{} option(s)", options.len());
        for message in option_warnings {
            degrade(results, WorkflowStep::QuoteOptions, message);
        }
        results.quote_options = options;
        progress.on_step_complete(&WorkflowStep::QuoteOptions, options_outcome, Some(&options_detail));

        let calculated = match rater {
            Ok(Some(prepared)) => {
                let outcome = if prepared.warnings.is_empty() {
                    StepOutcome::Succeeded
                } else {
                    StepOutcome::Degraded
                };
                progress.on_step_complete(
                    &WorkflowStep::Rater,
                    outcome,
                    Some(prepared.outcome.used_method.as_str()),
                );
                for message in prepared.warnings {
                    degrade(results, WorkflowStep::Rater, message);
                }
                results.rater = Some(prepared.outcome);
                Some(prepared.workbook)
            }
            Ok(None) => {
                progress.on_step_complete(
                    &WorkflowStep::Rater,
                    StepOutcome::Succeeded,
                    Some("no rater template configured"),
                );
                None
            }
            Err(message) => {
                progress.on_step_complete(&WorkflowStep::Rater, StepOutcome::Degraded, Some(&message));
                degrade(results, WorkflowStep::Rater, message);
                None
            }
        };

        // ==================== Rating ====================
        submission.advance(WorkflowStep::Rating);
        self.checkpoint(submission).await;
        progress.on_step_start(&WorkflowStep::Rating);
        let option_id = results.quote_options.first().map(|o| o.id.clone());
        let (rating, rating_rows) = self
            .rate(option_id.as_deref(), line.rating_procedure.as_deref())
            .await;
        let rating_outcome = match &rating {
            RatingOutcome::Completed { .. } | RatingOutcome::Skipped { .. } => StepOutcome::Succeeded,
            RatingOutcome::ParameterRequired {
                procedure,
                parameter,
            } => {
                degrade(
                    results,
                    WorkflowStep::Rating,
                    format!("{procedure} requires parameter {parameter}"),
                );
                StepOutcome::Degraded
            }
            RatingOutcome::Failed { procedure, message } => {
                degrade(results, WorkflowStep::Rating, format!("{procedure} failed: {message}"));
                StepOutcome::Degraded
            }
        };
        progress.on_step_complete(&WorkflowStep::Rating, rating_outcome, None);
        results.rating = Some(rating);

        // ==================== Premium ====================
        submission.advance(WorkflowStep::Premium);
        self.checkpoint(submission).await;
        progress.on_step_start(&WorkflowStep::Premium);
        let resolution = self
            .resolver
            .execute(ResolvePremiumInput {
                quote_id: Some(&quote_id),
                quote_option_id: option_id.as_deref(),
                procedure_result: rating_rows.as_ref(),
                calculated_template: calculated.as_deref(),
                premium_mappings: &line.premium_mappings,
            })
            .await;

        if self.params.post_premium
            && resolution.from_template()
            && let (Some(option_id), Some(premium)) = (option_id.as_deref(), resolution.premium)
        {
            match self.gateway.add_premium(option_id, premium).await {
                Ok(()) => info!("Posted premium {:.2} to quote option {}", premium, option_id),
                Err(e) => degrade(results, WorkflowStep::Premium, format!("AddPremium failed: {e}")),
            }
        }

        let premium = resolution.premium;
        match premium {
            Some(amount) => progress.on_step_complete(
                &WorkflowStep::Premium,
                StepOutcome::Succeeded,
                Some(&format!("{amount:.2}")),
            ),
            None => progress.on_step_complete(
                &WorkflowStep::Premium,
                StepOutcome::Degraded,
                resolution.diagnostic.as_deref(),
            ),
        }
        results.premium = Some(resolution);
        Ok(premium)
    }

    /// Options created remotely for the quote, with the quote-information
    /// procedure as fallback when none are reported.
    async fn quote_options(&self, quote_id: &str) -> (Vec<QuoteOption>, Vec<String>) {
        let mut warnings = Vec::new();
        match self.gateway.auto_add_quote_options(quote_id).await {
            Ok(options) if !options.is_empty() => {
                info!("{} quote option(s) created", options.len());
                return (options, warnings);
            }
            Ok(_) => debug!("AutoAddQuoteOptions returned no options"),
            Err(e) => warnings.push(format!("AutoAddQuoteOptions failed: {e}")),
        }

        let mut params = ProcedureParams::new();
        params.insert(QUOTE_PARAMETER.to_string(), quote_id.to_string());
        match self
            .gateway
            .execute_procedure(QUOTE_INFORMATION_PROCEDURE, &params)
            .await
        {
            Ok(ProcedureOutcome::Rows(table)) => {
                let options: Vec<QuoteOption> = table
                    .first_value(QUOTE_OPTION_PARAMETER)
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| vec![QuoteOption::new(id.trim())])
                    .unwrap_or_default();
                if options.is_empty() {
                    info!("Quote {} has no quote options", quote_id);
                }
                (options, warnings)
            }
            Ok(ProcedureOutcome::ParameterRequired { parameter }) => {
                warnings.push(format!(
                    "{QUOTE_INFORMATION_PROCEDURE} requires parameter {parameter}"
                ));
                (Vec::new(), warnings)
            }
            Err(e) => {
                warnings.push(format!("{QUOTE_INFORMATION_PROCEDURE} failed: {e}"));
                (Vec::new(), warnings)
            }
        }
    }

    /// Populate and calculate the rater; `Ok(None)` when the line has no template.
    async fn prepare_rater(
        &self,
        submission: &Submission,
        line: &LineOfBusinessConfig,
        term: PolicyTerm,
        quote_id: &str,
    ) -> Result<Option<PreparedRater>, String> {
        let Some(template) = &line.rater else {
            return Ok(None);
        };
        let bytes = self
            .store
            .load_template(template)
            .await
            .map_err(|e| format!("Rater template {} unavailable: {}", template.file_name, e))?;

        let mut custom = submission.form.custom.clone();
        let formula_warnings: Vec<String> = apply_calculated_fields(&mut custom, &line.calculated_fields)
            .into_iter()
            .map(|(field, e)| format!("Calculated field {field} skipped: {e}"))
            .collect();

        let mapping = build_mapping(
            &submission.form.applicant,
            &custom,
            Some(term.effective),
            Some(term.expiration),
        );
        let mut prepared = self
            .rater
            .execute(CalculateRaterInput {
                template: &bytes,
                method: line.calculation_method,
                context: CalculationContext {
                    sheet: line.target_sheet.clone(),
                    mapping,
                    applicant: submission.form.applicant.clone(),
                    custom,
                },
            })
            .await;
        prepared.warnings.splice(0..0, formula_warnings);

        if self.params.upload_rater {
            self.upload_rater(quote_id, template, &mut prepared).await;
        }
        Ok(Some(prepared))
    }

    async fn upload_rater(&self, quote_id: &str, template: &RaterTemplate, prepared: &mut PreparedRater) {
        let upload = RaterUpload {
            quote_id: quote_id.to_string(),
            rater_id: template.rater_id,
            file_name: template.file_name.clone(),
            bytes: prepared.workbook.clone(),
        };
        if let Err(e) = self.gateway.save_rating_sheet(&upload).await {
            prepared.warnings.push(format!("SaveRatingSheet failed: {e}"));
        }
        match self.gateway.import_excel_rater(&upload).await {
            Ok(import) if import.success => {
                prepared.outcome.uploaded = Some(true);
                prepared.outcome.imported_premium = import.premium_total;
            }
            Ok(import) => {
                prepared.outcome.uploaded = Some(false);
                prepared.warnings.push(format!(
                    "ImportExcelRater rejected the rater: {}",
                    import.error_message.as_deref().unwrap_or("no reason given")
                ));
            }
            Err(e) => {
                prepared.outcome.uploaded = Some(false);
                prepared.warnings.push(format!("ImportExcelRater failed: {e}"));
            }
        }
    }

    async fn rate(
        &self,
        option_id: Option<&str>,
        procedure: Option<&str>,
    ) -> (RatingOutcome, Option<DataTable>) {
        let Some(procedure) = procedure else {
            return (
                RatingOutcome::Skipped {
                    reason: "no rating procedure configured".into(),
                },
                None,
            );
        };
        let Some(option_id) = option_id else {
            return (
                RatingOutcome::Skipped {
                    reason: "no quote option to rate".into(),
                },
                None,
            );
        };

        let mut params = ProcedureParams::new();
        params.insert(QUOTE_OPTION_PARAMETER.to_string(), option_id.to_string());
        match self.gateway.execute_procedure(procedure, &params).await {
            Ok(ProcedureOutcome::Rows(table)) => {
                info!("{} returned {} row(s)", procedure, table.len());
                (
                    RatingOutcome::Completed {
                        procedure: procedure.to_string(),
                        rows: table.len(),
                    },
                    Some(table),
                )
            }
            Ok(ProcedureOutcome::ParameterRequired { parameter }) => (
                RatingOutcome::ParameterRequired {
                    procedure: procedure.to_string(),
                    parameter,
                },
                None,
            ),
            Err(e) => (
                RatingOutcome::Failed {
                    procedure: procedure.to_string(),
                    message: e.to_string(),
                },
                None,
            ),
        }
    }

    /// Persist intermediate progress; a failed checkpoint does not stop the run.
    async fn checkpoint(&self, submission: &Submission) {
        if let Err(e) = self.store.save_submission(submission).await {
            warn!(
                "Could not persist submission {} at step {:?}: {}",
                submission.id, submission.workflow_step, e
            );
        }
    }
}

fn fail_step(step: WorkflowStep, progress: &dyn ProgressNotifier, error: impl Display) -> String {
    let message = format!("{} failed: {}", step.display_name(), error);
    progress.on_step_complete(&step, StepOutcome::Failed, Some(&message));
    message
}

fn degrade(results: &mut ProcessingResults, step: WorkflowStep, message: String) {
    warn!("[{}] {}", step.as_str(), message);
    results.warn(step, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ims_gateway::GatewayError;
    use crate::use_cases::testing::{
        FakeWorkbook, MemoryStore, RecordingAudit, RecordingProgress, ScriptedGateway,
        StaticBackends, StubBackend,
    };
    use rater_domain::{
        ApplicantData, CalculationMethod, CellValue, PremiumMapping, RemoteLineIds,
        SubmissionForm, SubmissionStatus,
    };

    fn jane() -> SubmissionForm {
        SubmissionForm::new(ApplicantData {
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            state: Some("TX".into()),
            ..Default::default()
        })
    }

    fn line(method: CalculationMethod) -> LineOfBusinessConfig {
        LineOfBusinessConfig::new(
            "gl",
            RemoteLineIds {
                line_id: "line-1".into(),
                company_id: "company-1".into(),
                ..Default::default()
            },
        )
        .with_rater(RaterTemplate {
            location: "gl.xlsx".into(),
            file_name: "gl.xlsx".into(),
            rater_id: 7,
        })
        .with_calculation_method(method)
        .with_premium_mappings(vec![PremiumMapping::new("Summary", "B6", 1)])
    }

    struct Harness {
        gateway: ScriptedGateway,
        store: Arc<MemoryStore>,
        audit: Arc<RecordingAudit>,
        use_case: ProcessSubmissionUseCase<ScriptedGateway>,
        id: SubmissionId,
    }

    fn harness(
        gateway: ScriptedGateway,
        workbook: FakeWorkbook,
        backends: StaticBackends,
        line: LineOfBusinessConfig,
        submission: Submission,
    ) -> Harness {
        let store = Arc::new(
            MemoryStore::new()
                .with_line(line)
                .with_template("gl.xlsx", b"template".to_vec())
                .with_submission(submission.clone()),
        );
        let audit = Arc::new(RecordingAudit::default());
        let use_case = ProcessSubmissionUseCase::new(
            Arc::new(gateway.clone()),
            store.clone(),
            Arc::new(workbook),
            Arc::new(backends),
        )
        .with_audit_logger(audit.clone())
        .with_params(ProcessingParams::default().with_premium_queries(vec![]));
        Harness {
            gateway,
            store,
            audit,
            use_case,
            id: submission.id,
        }
    }

    #[tokio::test]
    async fn test_insured_failure_is_fatal() {
        let h = harness(
            ScriptedGateway::new().fail_insured(GatewayError::RemoteFault("Duplicate insured".into())),
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None),
            Submission::new("gl", jane()),
        );
        let progress = RecordingProgress::default();

        let submission = h.use_case.execute_with_progress(&h.id, &progress).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Failed);
        assert_eq!(submission.workflow_step, Some(WorkflowStep::Error));
        assert!(submission.error.as_deref().unwrap().contains("Duplicate insured"));
        assert_eq!(h.gateway.calls(), vec!["AddInsuredWithContact"]);
        assert_eq!(h.audit.events(), vec!["submission_failed"]);
        assert_eq!(
            progress.events(),
            vec!["start:insured", "complete:insured:failed", "finished:failed"]
        );
        assert_eq!(h.store.stored(&h.id).unwrap().status, SubmissionStatus::Failed);
    }

    #[tokio::test]
    async fn test_quote_failure_is_fatal_but_keeps_insured_id() {
        let h = harness(
            ScriptedGateway::new().fail_quote(GatewayError::Timeout),
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None),
            Submission::new("gl", jane()),
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Failed);
        assert_eq!(submission.remote.insured_id.as_deref(), Some("insured-1"));
        assert!(submission.remote.quote_id.is_none());
        assert!(!h.gateway.calls().iter().any(|c| c.starts_with("AutoAddQuoteDetails")));
    }

    #[tokio::test]
    async fn test_zero_quote_options_still_quoted_without_premium() {
        let h = harness(
            ScriptedGateway::new(),
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None).with_rating_procedure("RateGL"),
            Submission::new("gl", jane()),
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Quoted);
        assert_eq!(submission.premium, None);
        let results = submission.results.unwrap();
        assert!(results.quote_options.is_empty());
        assert_eq!(
            results.rating,
            Some(RatingOutcome::Skipped {
                reason: "no quote option to rate".into()
            })
        );
        let diagnostic = results.premium.unwrap().diagnostic.unwrap();
        assert!(diagnostic.contains("no quote options"));
        assert!(h
            .gateway
            .calls()
            .contains(&"GetQuoteInformation:QuoteGUID=quote-1".to_string()));
    }

    #[tokio::test]
    async fn test_unavailable_backend_degrades_and_still_quotes() {
        let workbook = FakeWorkbook::new().with_cell("Summary", "B6", CellValue::Number(750.0));
        let h = harness(
            ScriptedGateway::new().with_quote_options(vec![QuoteOption::new("opt-1")]),
            workbook,
            StaticBackends::new().with(StubBackend::unavailable(CalculationMethod::NativeOffice)),
            line(CalculationMethod::NativeOffice),
            Submission::new("gl", jane()),
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Quoted);
        assert_eq!(submission.premium, Some(750.0));
        let results = submission.results.unwrap();
        let rater = results.rater.unwrap();
        assert_eq!(rater.used_method, CalculationMethod::None);
        assert!(!rater.calculated);
        assert!(results.warnings.iter().any(|w| w.step == WorkflowStep::Rater));
    }

    #[tokio::test]
    async fn test_rating_procedure_result_provides_premium() {
        let gateway = ScriptedGateway::new()
            .with_quote_options(vec![QuoteOption::new("opt-1")])
            .with_procedure(
                "RateGL",
                Ok(ProcedureOutcome::Rows(DataTable::new(vec![
                    [("Premium".to_string(), "2500".to_string())].into_iter().collect(),
                ]))),
            );
        let h = harness(
            gateway,
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None).with_rating_procedure("RateGL"),
            Submission::new("gl", jane()),
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.premium, Some(2500.0));
        assert!(h
            .gateway
            .calls()
            .contains(&"RateGL:QuoteOptionGUID=opt-1".to_string()));
        assert_eq!(submission.remote.control_number.as_deref(), Some("CN-1001"));
    }

    #[tokio::test]
    async fn test_non_fatal_failures_are_recorded_as_warnings() {
        let gateway = ScriptedGateway::new()
            .fail_quote_details(GatewayError::RemoteFault("no details".into()))
            .with_quote_options(vec![QuoteOption::new("opt-1")])
            .with_procedure("RateGL", Err(GatewayError::Timeout));
        let h = harness(
            gateway,
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None).with_rating_procedure("RateGL"),
            Submission::new("gl", jane()),
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Quoted);
        let steps: Vec<WorkflowStep> = submission
            .results
            .unwrap()
            .warnings
            .iter()
            .map(|w| w.step)
            .collect();
        assert!(steps.contains(&WorkflowStep::QuoteDetails));
        assert!(steps.contains(&WorkflowStep::Rating));
    }

    #[tokio::test]
    async fn test_reprocessing_reuses_persisted_identifiers() {
        let mut submission = Submission::new("gl", jane());
        submission.remote.insured_id = Some("insured-9".into());
        submission.remote.quote_id = Some("quote-9".into());
        submission.remote.control_number = Some("CN-9".into());
        let h = harness(
            ScriptedGateway::new(),
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None),
            submission,
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Quoted);
        let calls = h.gateway.calls();
        assert!(!calls.iter().any(|c| c == "AddInsuredWithContact"));
        assert!(!calls.iter().any(|c| c == "AddQuoteWithSubmission"));
        assert!(calls.contains(&"AutoAddQuoteDetails:quote-9".to_string()));
    }

    #[tokio::test]
    async fn test_upload_and_post_premium() {
        let workbook = FakeWorkbook::new().with_cell("Summary", "B6", CellValue::Number(410.25));
        let h = harness(
            ScriptedGateway::new().with_quote_options(vec![QuoteOption::new("opt-1")]),
            workbook,
            StaticBackends::new()
                .with(StubBackend::succeeding(CalculationMethod::InProcess, b"calculated")),
            line(CalculationMethod::InProcess),
            Submission::new("gl", jane()),
        );
        let use_case = h.use_case.with_params(
            ProcessingParams::default()
                .with_premium_queries(vec![])
                .with_upload_rater(true)
                .with_post_premium(true),
        );

        let submission = use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.premium, Some(410.25));
        let calls = h.gateway.calls();
        assert!(calls.contains(&"SaveRatingSheet:quote-1:calculated".to_string()));
        assert!(calls.contains(&"ImportExcelRater:quote-1".to_string()));
        assert!(calls.contains(&"AddPremium:opt-1=410.25".to_string()));
        assert_eq!(submission.results.unwrap().rater.unwrap().uploaded, Some(true));
    }

    #[tokio::test]
    async fn test_missing_line_of_business_fails_submission() {
        let h = harness(
            ScriptedGateway::new(),
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None),
            Submission::new("unknown", jane()),
        );

        let submission = h.use_case.execute(&h.id).await.unwrap();

        assert_eq!(submission.status, SubmissionStatus::Failed);
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_submission_is_a_store_error() {
        let h = harness(
            ScriptedGateway::new(),
            FakeWorkbook::new(),
            StaticBackends::new(),
            line(CalculationMethod::None),
            Submission::new("gl", jane()),
        );
        let result = h.use_case.execute(&SubmissionId::new()).await;
        assert!(matches!(
            result,
            Err(ProcessSubmissionError::Store(StoreError::NotFound(_)))
        ));
    }
}

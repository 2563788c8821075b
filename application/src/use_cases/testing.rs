//! Hand-written port doubles shared by the use case tests.

use crate::ports::audit_logger::{AuditEvent, AuditLogger};
use crate::ports::calculation::{
    CalculationBackend, CalculationBackends, CalculationContext, CalculationError, NoCalculation,
};
use crate::ports::ims_gateway::{GatewayError, ImsGateway};
use crate::ports::progress::{ProgressNotifier, StepOutcome};
use crate::ports::rater_workbook::{RaterWorkbook, WorkbookError};
use crate::ports::submission_store::{StoreError, SubmissionStore};
use async_trait::async_trait;
use rater_domain::{
    CalculationMethod, CellMapping, CellRef, CellValue, DataTable, InsuredRequest,
    LineOfBusinessConfig, ProcedureOutcome, ProcedureParams, QuoteOption, QuoteRequest,
    RaterImport, RaterTemplate, RaterUpload, Submission, SubmissionId, WorkflowStep,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ==================== Gateway ====================

struct GatewayScript {
    calls: Vec<String>,
    insured: Result<String, GatewayError>,
    quote: Result<String, GatewayError>,
    control_number: Result<String, GatewayError>,
    quote_details: Result<(), GatewayError>,
    quote_options: Result<Vec<QuoteOption>, GatewayError>,
    policy_information: Result<DataTable, GatewayError>,
    import: Result<RaterImport, GatewayError>,
    procedures: HashMap<String, VecDeque<Result<ProcedureOutcome, GatewayError>>>,
}

impl Default for GatewayScript {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            insured: Ok("insured-1".into()),
            quote: Ok("quote-1".into()),
            control_number: Ok("CN-1001".into()),
            quote_details: Ok(()),
            quote_options: Ok(Vec::new()),
            policy_information: Ok(DataTable::default()),
            import: Ok(RaterImport {
                success: true,
                ..Default::default()
            }),
            procedures: HashMap::new(),
        }
    }
}

/// Gateway returning scripted responses and recording every call.
///
/// Clones share the same script, so a test can keep a handle for assertions.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<GatewayScript>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut GatewayScript)) -> Self {
        f(&mut self.script.lock().unwrap());
        self
    }

    pub fn fail_insured(self, error: GatewayError) -> Self {
        self.edit(|s| s.insured = Err(error))
    }

    pub fn fail_quote(self, error: GatewayError) -> Self {
        self.edit(|s| s.quote = Err(error))
    }

    pub fn fail_quote_details(self, error: GatewayError) -> Self {
        self.edit(|s| s.quote_details = Err(error))
    }

    pub fn with_quote_options(self, options: Vec<QuoteOption>) -> Self {
        self.edit(|s| s.quote_options = Ok(options))
    }

    pub fn fail_policy_information(self, error: GatewayError) -> Self {
        self.edit(|s| s.policy_information = Err(error))
    }

    /// Queue a response for a procedure; unscripted calls return no rows.
    pub fn with_procedure(
        self,
        name: &str,
        response: Result<ProcedureOutcome, GatewayError>,
    ) -> Self {
        self.edit(|s| {
            s.procedures
                .entry(name.to_string())
                .or_default()
                .push_back(response)
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) -> std::sync::MutexGuard<'_, GatewayScript> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call);
        script
    }
}

#[async_trait]
impl ImsGateway for ScriptedGateway {
    async fn execute_procedure(
        &self,
        procedure: &str,
        params: &ProcedureParams,
    ) -> Result<ProcedureOutcome, GatewayError> {
        let args: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut script = self.record(format!("{}:{}", procedure, args.join(",")));
        script
            .procedures
            .get_mut(procedure)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Ok(ProcedureOutcome::Rows(DataTable::default())))
    }

    async fn add_insured(&self, _request: &InsuredRequest) -> Result<String, GatewayError> {
        self.record("AddInsuredWithContact".into()).insured.clone()
    }

    async fn add_quote_with_submission(&self, _request: &QuoteRequest) -> Result<String, GatewayError> {
        self.record("AddQuoteWithSubmission".into()).quote.clone()
    }

    async fn get_control_number(&self, quote_id: &str) -> Result<String, GatewayError> {
        self.record(format!("GetControlNumber:{quote_id}"))
            .control_number
            .clone()
    }

    async fn auto_add_quote_details(&self, quote_id: &str) -> Result<(), GatewayError> {
        self.record(format!("AutoAddQuoteDetails:{quote_id}"))
            .quote_details
            .clone()
    }

    async fn auto_add_quote_options(&self, quote_id: &str) -> Result<Vec<QuoteOption>, GatewayError> {
        self.record(format!("AutoAddQuoteOptions:{quote_id}"))
            .quote_options
            .clone()
    }

    async fn save_rating_sheet(&self, upload: &RaterUpload) -> Result<(), GatewayError> {
        self.record(format!(
            "SaveRatingSheet:{}:{}",
            upload.quote_id,
            String::from_utf8_lossy(&upload.bytes)
        ));
        Ok(())
    }

    async fn import_excel_rater(&self, upload: &RaterUpload) -> Result<RaterImport, GatewayError> {
        self.record(format!("ImportExcelRater:{}", upload.quote_id))
            .import
            .clone()
    }

    async fn add_premium(&self, quote_option_id: &str, premium: f64) -> Result<(), GatewayError> {
        self.record(format!("AddPremium:{quote_option_id}={premium}"));
        Ok(())
    }

    async fn get_policy_information(&self, quote_id: &str) -> Result<DataTable, GatewayError> {
        self.record(format!("GetPolicyInformation:{quote_id}"))
            .policy_information
            .clone()
    }
}

// ==================== Workbook ====================

/// Workbook whose "populated" bytes are the template plus `+<cell count>`,
/// and whose cells are looked up in a fixed table regardless of the bytes.
#[derive(Default)]
pub struct FakeWorkbook {
    cells: HashMap<(String, CellRef), CellValue>,
    populated: Mutex<Vec<String>>,
}

impl FakeWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, sheet: &str, cell: &str, value: CellValue) -> Self {
        let cell = CellRef::parse(cell).unwrap();
        self.cells.insert((sheet.to_string(), cell), value);
        self
    }

    pub fn populated_sheets(&self) -> Vec<String> {
        self.populated.lock().unwrap().clone()
    }
}

impl RaterWorkbook for FakeWorkbook {
    fn populate_cells(&self, template: &[u8], mapping: &CellMapping, sheet: &str) -> Vec<u8> {
        self.populated.lock().unwrap().push(sheet.to_string());
        let mut bytes = template.to_vec();
        bytes.extend_from_slice(format!("+{}", mapping.len()).as_bytes());
        bytes
    }

    fn read_cell(
        &self,
        _workbook: &[u8],
        sheet: &str,
        cell: &CellRef,
    ) -> Result<CellValue, WorkbookError> {
        if !self.cells.keys().any(|(s, _)| s == sheet) {
            return Err(WorkbookError::SheetNotFound(sheet.to_string()));
        }
        Ok(self
            .cells
            .get(&(sheet.to_string(), *cell))
            .cloned()
            .unwrap_or_default())
    }
}

// ==================== Calculation ====================

pub struct StubBackend {
    method: CalculationMethod,
    available: bool,
    output: Option<Vec<u8>>,
}

impl StubBackend {
    pub fn succeeding(method: CalculationMethod, output: &[u8]) -> Self {
        Self {
            method,
            available: true,
            output: Some(output.to_vec()),
        }
    }

    pub fn failing(method: CalculationMethod) -> Self {
        Self {
            method,
            available: true,
            output: None,
        }
    }

    pub fn unavailable(method: CalculationMethod) -> Self {
        Self {
            method,
            available: false,
            output: None,
        }
    }
}

#[async_trait]
impl CalculationBackend for StubBackend {
    fn method(&self) -> CalculationMethod {
        self.method
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn calculate(
        &self,
        _workbook: &[u8],
        _context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError> {
        self.output
            .clone()
            .ok_or_else(|| CalculationError::Process("stub failure".into()))
    }
}

#[derive(Default)]
pub struct StaticBackends {
    backends: Vec<Arc<StubBackend>>,
}

impl StaticBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: StubBackend) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }
}

impl CalculationBackends for StaticBackends {
    fn backend(&self, method: CalculationMethod) -> Arc<dyn CalculationBackend> {
        match self.backends.iter().find(|b| b.method == method) {
            Some(backend) => backend.clone(),
            None => Arc::new(NoCalculation),
        }
    }
}

// ==================== Store ====================

#[derive(Default)]
pub struct MemoryStore {
    submissions: Mutex<HashMap<SubmissionId, Submission>>,
    lines: HashMap<String, LineOfBusinessConfig>,
    templates: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submission(self, submission: Submission) -> Self {
        self.submissions
            .lock()
            .unwrap()
            .insert(submission.id, submission);
        self
    }

    pub fn with_line(mut self, line: LineOfBusinessConfig) -> Self {
        self.lines.insert(line.id.clone(), line);
        self
    }

    pub fn with_template(mut self, location: &str, bytes: Vec<u8>) -> Self {
        self.templates.insert(location.to_string(), bytes);
        self
    }

    pub fn stored(&self, id: &SubmissionId) -> Option<Submission> {
        self.submissions.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn load_submission(&self, id: &SubmissionId) -> Result<Submission, StoreError> {
        self.stored(id)
            .ok_or_else(|| StoreError::NotFound(format!("submission {id}")))
    }

    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        self.submissions
            .lock()
            .unwrap()
            .insert(submission.id, submission.clone());
        Ok(())
    }

    async fn load_line_of_business(&self, id: &str) -> Result<LineOfBusinessConfig, StoreError> {
        self.lines
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("line of business {id}")))
    }

    async fn load_template(&self, template: &RaterTemplate) -> Result<Vec<u8>, StoreError> {
        self.templates
            .get(&template.location)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(template.location.clone()))
    }
}

// ==================== Observers ====================

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressNotifier for RecordingProgress {
    fn on_step_start(&self, step: &WorkflowStep) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{}", step.as_str()));
    }

    fn on_step_complete(&self, step: &WorkflowStep, outcome: StepOutcome, _detail: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete:{}:{}", step.as_str(), outcome.as_str()));
    }

    fn on_finished(&self, submission: &Submission) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finished:{}", submission.status.as_str()));
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<String>>,
}

impl RecordingAudit {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditLogger for RecordingAudit {
    fn log(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event.kind().to_string());
    }
}

//! Resolve Premium use case
//!
//! Determines the final premium of a quote from an ordered list of candidate
//! sources. The first positive amount wins; every source is individually
//! fault-tolerant and an unresolved premium is a valid outcome.

use crate::ports::ims_gateway::{GatewayError, ImsGateway};
use crate::ports::rater_workbook::{RaterWorkbook, WorkbookError};
use rater_domain::{
    DataTable, PremiumAttempt, PremiumMapping, PremiumQuery, PremiumResolution, PremiumSource,
    ProcedureOutcome, ProcedureParams, QuoteKey,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for the ResolvePremium use case
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvePremiumInput<'a> {
    pub quote_id: Option<&'a str>,
    pub quote_option_id: Option<&'a str>,
    /// Rows returned by the remote rating procedure
    pub procedure_result: Option<&'a DataTable>,
    pub calculated_template: Option<&'a [u8]>,
    pub premium_mappings: &'a [PremiumMapping],
}

/// Why the template scan came up empty
#[derive(Debug, Default)]
struct TemplateFindings {
    empty_cells: usize,
    missing_sheets: usize,
    invalid_references: usize,
    unreadable: bool,
}

/// Use case for resolving a premium
pub struct ResolvePremiumUseCase<G: ImsGateway + 'static> {
    gateway: Arc<G>,
    workbook: Arc<dyn RaterWorkbook>,
    queries: Vec<PremiumQuery>,
}

impl<G: ImsGateway + 'static> ResolvePremiumUseCase<G> {
    pub fn new(gateway: Arc<G>, workbook: Arc<dyn RaterWorkbook>) -> Self {
        Self {
            gateway,
            workbook,
            queries: PremiumQuery::defaults(),
        }
    }

    pub fn with_queries(mut self, queries: Vec<PremiumQuery>) -> Self {
        self.queries = queries;
        self
    }

    pub async fn execute(&self, input: ResolvePremiumInput<'_>) -> PremiumResolution {
        let mut attempts = Vec::new();

        // 1. Rows of the rating procedure
        match input.procedure_result {
            Some(table) => match table.find_premium() {
                Some((field, amount)) => {
                    info!("Premium {} found in rating procedure field {}", amount, field);
                    return resolved(amount, PremiumSource::ProcedureResult { field }, attempts);
                }
                None => attempts.push(PremiumAttempt::new(
                    "rating procedure",
                    format!("{} row(s), no premium-like field", table.len()),
                )),
            },
            None => attempts.push(PremiumAttempt::new("rating procedure", "no result")),
        }

        // 2. Supplementary remote lookups
        for query in &self.queries {
            let label = query.label();
            match self.run_query(query, &input).await {
                Ok(Some((field, amount))) => {
                    info!("Premium {} found via {} ({})", amount, label, field);
                    return resolved(
                        amount,
                        PremiumSource::SupplementaryQuery { query: label, field },
                        attempts,
                    );
                }
                Ok(None) => attempts.push(PremiumAttempt::new(label, "no premium-like field")),
                Err(reason) => {
                    debug!("Premium lookup {} failed: {}", label, reason);
                    attempts.push(PremiumAttempt::new(label, reason));
                }
            }
        }

        // 3. Calculated template
        let mut findings = TemplateFindings::default();
        match input.calculated_template {
            Some(bytes) => {
                if let Some((mapping, amount)) =
                    self.scan_template(bytes, input.premium_mappings, &mut attempts, &mut findings)
                {
                    info!("Premium {} found in template at {}", amount, mapping.label());
                    return resolved(
                        amount,
                        PremiumSource::Template {
                            sheet: mapping.sheet_name.clone(),
                            cell: mapping.cell_reference.clone(),
                        },
                        attempts,
                    );
                }
            }
            None => attempts.push(PremiumAttempt::new("template", "no calculated template")),
        }

        // 4. Nothing found
        let diagnostic = diagnose(&input, &findings, attempts.len());
        warn!("{}", diagnostic);
        PremiumResolution {
            premium: None,
            source: None,
            attempts,
            diagnostic: Some(diagnostic),
        }
    }

    async fn run_query(
        &self,
        query: &PremiumQuery,
        input: &ResolvePremiumInput<'_>,
    ) -> Result<Option<(String, f64)>, String> {
        match query {
            PremiumQuery::PolicyInformation => {
                let quote_id = input.quote_id.ok_or("skipped: no quote id")?;
                let table = self
                    .gateway
                    .get_policy_information(quote_id)
                    .await
                    .map_err(describe)?;
                Ok(table.find_premium())
            }
            PremiumQuery::Procedure {
                name,
                key,
                parameter,
                extra,
            } => {
                let id = match key {
                    QuoteKey::Quote => input.quote_id.ok_or("skipped: no quote id")?,
                    QuoteKey::QuoteOption => {
                        input.quote_option_id.ok_or("skipped: no quote option")?
                    }
                };
                let mut params: ProcedureParams = extra.clone();
                params.insert(parameter.clone(), id.to_string());
                match self.gateway.execute_procedure(name, &params).await {
                    Ok(ProcedureOutcome::Rows(table)) => Ok(table.find_premium()),
                    Ok(ProcedureOutcome::ParameterRequired { parameter }) => {
                        Err(format!("parameter required: {parameter}"))
                    }
                    Err(e) => Err(describe(e)),
                }
            }
        }
    }

    fn scan_template<'m>(
        &self,
        bytes: &[u8],
        mappings: &'m [PremiumMapping],
        attempts: &mut Vec<PremiumAttempt>,
        findings: &mut TemplateFindings,
    ) -> Option<(&'m PremiumMapping, f64)> {
        for mapping in PremiumMapping::in_priority_order(mappings) {
            let label = mapping.label();
            let cell = match mapping.cell() {
                Ok(cell) => cell,
                Err(e) => {
                    findings.invalid_references += 1;
                    attempts.push(PremiumAttempt::new(label, e.to_string()));
                    continue;
                }
            };
            match self.workbook.read_cell(bytes, &mapping.sheet_name, &cell) {
                Ok(value) => match value.as_positive_amount() {
                    Some(amount) => return Some((mapping, amount)),
                    None if value.is_empty() => {
                        findings.empty_cells += 1;
                        attempts.push(PremiumAttempt::new(label, "empty"));
                    }
                    None => attempts.push(PremiumAttempt::new(
                        label,
                        format!("not a positive number: {value}"),
                    )),
                },
                Err(WorkbookError::SheetNotFound(sheet)) => {
                    findings.missing_sheets += 1;
                    attempts.push(PremiumAttempt::new(label, format!("no sheet named {sheet}")));
                }
                Err(e) => {
                    // The container itself is broken; no other mapping can succeed.
                    findings.unreadable = true;
                    attempts.push(PremiumAttempt::new(label, e.to_string()));
                    return None;
                }
            }
        }
        None
    }
}

fn resolved(amount: f64, source: PremiumSource, attempts: Vec<PremiumAttempt>) -> PremiumResolution {
    PremiumResolution {
        premium: Some(amount),
        source: Some(source),
        attempts,
        diagnostic: None,
    }
}

fn describe(error: GatewayError) -> String {
    format!("error: {}", rater_domain::truncate(&error.to_string(), 200))
}

fn diagnose(input: &ResolvePremiumInput<'_>, findings: &TemplateFindings, checked: usize) -> String {
    let mut causes = Vec::new();
    if input.quote_option_id.is_none() {
        causes.push("no quote options were created remotely".to_string());
    }
    match input.calculated_template {
        None => causes.push("no calculated rater template was available".to_string()),
        Some(_) if findings.unreadable => causes.push("the rater template could not be read".to_string()),
        Some(_) => {
            if input.premium_mappings.is_empty() {
                causes.push("no premium mappings are configured".to_string());
            }
            if findings.empty_cells > 0 {
                causes.push(format!(
                    "{} mapped cell(s) were empty, formulas may be uncalculated",
                    findings.empty_cells
                ));
            }
            if findings.missing_sheets > 0 || findings.invalid_references > 0 {
                causes.push(format!(
                    "{} premium mapping(s) point at missing sheets or invalid cells",
                    findings.missing_sheets + findings.invalid_references
                ));
            }
        }
    }
    if causes.is_empty() {
        causes.push("no source held a positive amount".to_string());
    }
    format!(
        "Premium unresolved after checking {} source(s): {}; pending manual underwriting",
        checked,
        causes.join("; ")
    )
}

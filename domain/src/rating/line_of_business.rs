//! Per-product rating configuration

use super::premium::PremiumMapping;
use crate::core::error::DomainError;
use crate::formula::CalculatedField;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sheet the cell mapper writes submission data into
pub const DEFAULT_TARGET_SHEET: &str = "submission_data";

/// How formulas in a populated rater template get calculated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalculationMethod {
    /// Leave calculation to the remote system
    #[default]
    None,
    /// Embedded formula evaluator
    InProcess,
    /// Companion script run as a separate process
    Script,
    /// Headless office suite driven through a recalculation macro
    HeadlessOffice,
    /// The native office application driven through automation
    NativeOffice,
}

impl CalculationMethod {
    pub const ALL: [CalculationMethod; 5] = [
        CalculationMethod::None,
        CalculationMethod::InProcess,
        CalculationMethod::Script,
        CalculationMethod::HeadlessOffice,
        CalculationMethod::NativeOffice,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            CalculationMethod::None => "none",
            CalculationMethod::InProcess => "in-process",
            CalculationMethod::Script => "script",
            CalculationMethod::HeadlessOffice => "headless-office",
            CalculationMethod::NativeOffice => "native-office",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            CalculationMethod::None => "No calculation",
            CalculationMethod::InProcess => "In-process evaluator",
            CalculationMethod::Script => "Script automation",
            CalculationMethod::HeadlessOffice => "Headless office suite",
            CalculationMethod::NativeOffice => "Native office automation",
        }
    }
}

impl std::fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CalculationMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        CalculationMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownCalculationMethod(s.to_string()))
    }
}

/// Remote-system identifiers a product line is quoted under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteLineIds {
    pub line_id: String,
    pub company_id: String,
    pub location_id: Option<String>,
    pub underwriter_id: Option<String>,
    pub producer_contact_id: Option<String>,
    pub producer_location_id: Option<String>,
    pub state_id: Option<String>,
}

impl RemoteLineIds {
    /// Quoting / issuing location, falling back to the company
    pub fn location_or_company(&self) -> &str {
        self.location_id.as_deref().unwrap_or(&self.company_id)
    }

    pub fn underwriter_or_company(&self) -> &str {
        self.underwriter_id.as_deref().unwrap_or(&self.company_id)
    }

    pub fn producer_contact_or_company(&self) -> &str {
        self.producer_contact_id.as_deref().unwrap_or(&self.company_id)
    }

    pub fn producer_location_or_company(&self) -> &str {
        self.producer_location_id.as_deref().unwrap_or(&self.company_id)
    }
}

/// Reference to the rater spreadsheet a line rates with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaterTemplate {
    /// Storage location, resolved by the submission store
    pub location: String,
    pub file_name: String,
    /// Remote rater id used when uploading the calculated rater
    #[serde(default)]
    pub rater_id: i64,
}

/// Per-product configuration (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOfBusinessConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub remote: RemoteLineIds,
    #[serde(default)]
    pub rater: Option<RaterTemplate>,
    #[serde(default)]
    pub calculation_method: CalculationMethod,
    /// Remote procedure run against the first quote option
    #[serde(default)]
    pub rating_procedure: Option<String>,
    #[serde(default = "PremiumMapping::defaults")]
    pub premium_mappings: Vec<PremiumMapping>,
    #[serde(default = "default_target_sheet")]
    pub target_sheet: String,
    /// Custom fields derived from other answers before the rater is populated
    #[serde(default)]
    pub calculated_fields: Vec<CalculatedField>,
}

fn default_target_sheet() -> String {
    DEFAULT_TARGET_SHEET.to_string()
}

impl LineOfBusinessConfig {
    pub fn new(id: impl Into<String>, remote: RemoteLineIds) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            remote,
            rater: None,
            calculation_method: CalculationMethod::None,
            rating_procedure: None,
            premium_mappings: PremiumMapping::defaults(),
            target_sheet: default_target_sheet(),
            calculated_fields: Vec::new(),
        }
    }

    pub fn with_rater(mut self, rater: RaterTemplate) -> Self {
        self.rater = Some(rater);
        self
    }

    pub fn with_calculation_method(mut self, method: CalculationMethod) -> Self {
        self.calculation_method = method;
        self
    }

    pub fn with_rating_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.rating_procedure = Some(procedure.into());
        self
    }

    pub fn with_premium_mappings(mut self, mappings: Vec<PremiumMapping>) -> Self {
        self.premium_mappings = mappings;
        self
    }

    /// Remote ids the quote cannot be created without
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.remote.line_id.trim().is_empty() || self.remote.company_id.trim().is_empty() {
            return Err(DomainError::IncompleteLineOfBusiness(self.id.clone()));
        }
        Ok(())
    }
}

//! Submission value objects

use crate::core::error::DomainError;
use crate::core::string::non_blank;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Business type used when the applicant did not pick one (Individual)
pub const DEFAULT_BUSINESS_TYPE_ID: u32 = 4;

/// Unique identifier for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| DomainError::InvalidSubmissionId(value.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applicant / insured fields captured by the portal form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicantData {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub corporation_name: Option<String>,
    pub dba: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub fein: Option<String>,
    pub ssn: Option<String>,
    pub business_type: Option<String>,
}

impl ApplicantData {
    /// Insured name: the corporation name, else "first last"
    pub fn insured_name(&self) -> Option<String> {
        if let Some(corp) = non_blank(self.corporation_name.as_deref()) {
            return Some(corp.to_string());
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// Remote business type id; falls back to Individual for absent or non-numeric input
    pub fn business_type_id(&self) -> u32 {
        non_blank(self.business_type.as_deref())
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|id| *id > 0)
            .unwrap_or(DEFAULT_BUSINESS_TYPE_ID)
    }
}

/// Everything the applicant entered: insured fields plus line-specific custom fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionForm {
    pub applicant: ApplicantData,
    /// Line-specific answers, in form order
    pub custom: IndexMap<String, serde_json::Value>,
}

impl SubmissionForm {
    pub fn new(applicant: ApplicantData) -> Self {
        Self {
            applicant,
            custom: IndexMap::new(),
        }
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

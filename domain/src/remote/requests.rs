//! Requests sent to the remote system while processing a submission

use crate::core::string::non_blank;
use crate::rating::line_of_business::RemoteLineIds;
use crate::submission::value_objects::ApplicantData;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COUNTRY_CODE: &str = "US";
pub const LOCATION_TYPE_PRIMARY: u32 = 1;
pub const DELIVERY_METHOD_DEFAULT: u32 = 1;
pub const QUOTE_STATUS_SUBMITTED: u32 = 1;
pub const BILLING_TYPE_AGENCY: u32 = 1;
pub const POLICY_TYPE_NEW: u32 = 1;

/// Insured record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuredRecord {
    pub business_type_id: u32,
    pub first_name: String,
    pub last_name: String,
    pub corporation_name: String,
    pub name_on_policy: String,
    pub dba: String,
    pub fein: String,
    pub ssn: String,
    pub office: String,
}

/// Postal address shared by the insured location and contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub country_code: String,
}

/// Insured together with its primary location and contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuredRequest {
    pub insured: InsuredRecord,
    pub location_name: String,
    pub location_type_id: u32,
    pub delivery_method_id: u32,
    pub address: PostalAddress,
    pub contact_first_name: String,
    pub contact_last_name: String,
}

fn text(value: &Option<String>) -> String {
    non_blank(value.as_deref()).unwrap_or_default().to_string()
}

impl InsuredRequest {
    pub fn from_applicant(applicant: &ApplicantData, remote: &RemoteLineIds) -> Self {
        let name_on_policy = applicant.insured_name().unwrap_or_default();
        Self {
            insured: InsuredRecord {
                business_type_id: applicant.business_type_id(),
                first_name: text(&applicant.first_name),
                last_name: text(&applicant.last_name),
                corporation_name: text(&applicant.corporation_name),
                name_on_policy: name_on_policy.clone(),
                dba: text(&applicant.dba),
                fein: text(&applicant.fein),
                ssn: text(&applicant.ssn),
                office: remote.company_id.clone(),
            },
            location_name: name_on_policy,
            location_type_id: LOCATION_TYPE_PRIMARY,
            delivery_method_id: DELIVERY_METHOD_DEFAULT,
            address: PostalAddress {
                address1: text(&applicant.address1),
                address2: text(&applicant.address2),
                city: text(&applicant.city),
                state: text(&applicant.state),
                zip: text(&applicant.zip),
                phone: text(&applicant.phone),
                email: text(&applicant.email),
                country_code: DEFAULT_COUNTRY_CODE.to_string(),
            },
            contact_first_name: text(&applicant.first_name),
            contact_last_name: text(&applicant.last_name),
        }
    }
}

/// Policy term of a new quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTerm {
    pub effective: NaiveDate,
    pub expiration: NaiveDate,
}

impl PolicyTerm {
    /// One-year term starting on `effective`
    pub fn annual(effective: NaiveDate) -> Self {
        let expiration = effective
            .checked_add_months(Months::new(12))
            .unwrap_or(effective);
        Self {
            effective,
            expiration,
        }
    }
}

/// Submission plus quote in a single remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub insured_id: String,
    pub producer_contact_id: String,
    pub producer_location_id: String,
    pub underwriter_id: String,
    pub submission_date: NaiveDate,
    pub quoting_location_id: String,
    pub issuing_location_id: String,
    pub company_location_id: String,
    pub line_id: String,
    pub state_id: String,
    pub quote_status_id: u32,
    pub billing_type_id: u32,
    pub policy_type_id: u32,
    pub insured_business_type_id: u32,
    pub term: PolicyTerm,
    pub risk: RiskInformation,
}

/// Insured details repeated on the quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskInformation {
    pub policy_name: String,
    pub corporation_name: String,
    pub dba: String,
    pub first_name: String,
    pub last_name: String,
    pub ssn: String,
    pub fein: String,
    pub address: PostalAddress,
}

impl QuoteRequest {
    pub fn new(
        insured_id: impl Into<String>,
        applicant: &ApplicantData,
        remote: &RemoteLineIds,
        term: PolicyTerm,
    ) -> Self {
        let insured = InsuredRequest::from_applicant(applicant, remote);
        let state_id = remote
            .state_id
            .clone()
            .unwrap_or_else(|| insured.address.state.clone());
        Self {
            insured_id: insured_id.into(),
            producer_contact_id: remote.producer_contact_or_company().to_string(),
            producer_location_id: remote.producer_location_or_company().to_string(),
            underwriter_id: remote.underwriter_or_company().to_string(),
            submission_date: term.effective,
            quoting_location_id: remote.location_or_company().to_string(),
            issuing_location_id: remote.location_or_company().to_string(),
            company_location_id: remote.location_or_company().to_string(),
            line_id: remote.line_id.clone(),
            state_id,
            quote_status_id: QUOTE_STATUS_SUBMITTED,
            billing_type_id: BILLING_TYPE_AGENCY,
            policy_type_id: POLICY_TYPE_NEW,
            insured_business_type_id: insured.insured.business_type_id,
            term,
            risk: RiskInformation {
                policy_name: insured.insured.name_on_policy,
                corporation_name: insured.insured.corporation_name,
                dba: insured.insured.dba,
                first_name: insured.insured.first_name,
                last_name: insured.insured.last_name,
                ssn: insured.insured.ssn,
                fein: insured.insured.fein,
                address: insured.address,
            },
        }
    }
}

/// A calculated rater sent back to the remote system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaterUpload {
    pub quote_id: String,
    pub rater_id: i64,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Outcome of the remote rater import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaterImport {
    pub success: bool,
    pub error_message: Option<String>,
    /// Sum of the per-option premium totals reported back
    pub premium_total: Option<f64>,
}

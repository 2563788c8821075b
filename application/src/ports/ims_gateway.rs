//! IMS gateway port
//!
//! Defines the interface for driving the remote insurance-management system.

use async_trait::async_trait;
use rater_domain::{
    DataTable, InsuredRequest, ProcedureOutcome, ProcedureParams, QuoteOption, QuoteRequest,
    RaterImport, RaterUpload,
};
use thiserror::Error;

/// Errors that can occur during remote calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Remote procedure fault: {0}")]
    RemoteFault(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,
}

impl GatewayError {
    /// Whether the remote system itself rejected the call
    pub fn is_remote_fault(&self) -> bool {
        matches!(self, GatewayError::RemoteFault(_))
    }
}

/// Gateway to the remote system
///
/// Implementations own authentication and fault-driven retry; callers never
/// see tokens.
#[async_trait]
pub trait ImsGateway: Send + Sync {
    /// Run a stored procedure and return its rows
    ///
    /// A missing required parameter is reported as
    /// [`ProcedureOutcome::ParameterRequired`], not as an error.
    async fn execute_procedure(
        &self,
        procedure: &str,
        params: &ProcedureParams,
    ) -> Result<ProcedureOutcome, GatewayError>;

    /// Create an insured with its primary location and contact; returns the insured id
    async fn add_insured(&self, request: &InsuredRequest) -> Result<String, GatewayError>;

    /// Create a submission and its quote; returns the quote id
    async fn add_quote_with_submission(&self, request: &QuoteRequest)
    -> Result<String, GatewayError>;

    async fn get_control_number(&self, quote_id: &str) -> Result<String, GatewayError>;

    async fn auto_add_quote_details(&self, quote_id: &str) -> Result<(), GatewayError>;

    /// Create the default quote options; an empty list is a valid answer
    async fn auto_add_quote_options(&self, quote_id: &str)
    -> Result<Vec<QuoteOption>, GatewayError>;

    async fn save_rating_sheet(&self, upload: &RaterUpload) -> Result<(), GatewayError>;

    async fn import_excel_rater(&self, upload: &RaterUpload) -> Result<RaterImport, GatewayError>;

    async fn add_premium(&self, quote_option_id: &str, premium: f64) -> Result<(), GatewayError>;

    /// Policy information flattened into a single row of leaf fields
    async fn get_policy_information(&self, quote_id: &str) -> Result<DataTable, GatewayError>;
}

//! Error types for the IMS SOAP adapter

use rater_application::GatewayError;
use thiserror::Error;

/// Result type alias for IMS operations
pub type Result<T> = std::result::Result<T, ImsError>;

/// Errors that can occur when talking to the IMS web services
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImsError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Token is not valid")]
    TokenInvalid,

    #[error("Procedure expects parameter {0}")]
    ParameterRequired(String),

    #[error("SOAP fault: {0}")]
    Fault(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl From<ImsError> for GatewayError {
    fn from(error: ImsError) -> Self {
        match error {
            ImsError::Authentication(msg) => GatewayError::Authentication(msg),
            ImsError::TokenInvalid => {
                GatewayError::Authentication("token rejected after re-authentication".into())
            }
            ImsError::Fault(msg) => GatewayError::RemoteFault(msg),
            ImsError::ParameterRequired(parameter) => {
                GatewayError::RemoteFault(format!("procedure expects parameter {parameter}"))
            }
            ImsError::Http(msg) => GatewayError::ConnectionError(msg),
            ImsError::Status { status, body } => {
                GatewayError::ConnectionError(format!("HTTP {status}: {body}"))
            }
            ImsError::Timeout => GatewayError::Timeout,
            ImsError::Parse(msg) => GatewayError::InvalidResponse(msg),
        }
    }
}

impl From<quick_xml::Error> for ImsError {
    fn from(error: quick_xml::Error) -> Self {
        ImsError::Parse(error.to_string())
    }
}

//! HTTP transport for SOAP calls.
//!
//! The transport only moves bytes: it returns the response body for every
//! status code, because IMS reports SOAP faults with HTTP 500.

use super::error::{ImsError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Raw HTTP response of a SOAP call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    pub status: u16,
    pub body: String,
}

impl SoapResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait SoapTransport: Send + Sync {
    async fn post(&self, url: &str, soap_action: &str, envelope: String) -> Result<SoapResponse>;
}

/// `reqwest`-backed transport
pub struct HttpSoapTransport {
    client: reqwest::Client,
}

impl HttpSoapTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImsError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SoapTransport for HttpSoapTransport {
    async fn post(&self, url: &str, soap_action: &str, envelope: String) -> Result<SoapResponse> {
        debug!("POST {} ({})", url, soap_action);
        let response = self
            .client
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", soap_action)
            .body(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImsError::Timeout
                } else {
                    ImsError::Http(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ImsError::Http(e.to_string()))?;
        Ok(SoapResponse { status, body })
    }
}

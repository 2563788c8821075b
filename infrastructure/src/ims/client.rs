//! IMS web service client.
//!
//! Owns the token lifecycle for one remote installation: every call obtains a
//! token from the shared [`TokenCache`], and a `Token is not valid` fault
//! purges it and retries the call exactly once with a fresh login.

use super::error::{ImsError, Result};
use super::protocol::{
    Element, ResultNode, Service, TokenHeader, WebMethod, envelope, parse_data_set,
    parse_response,
};
use super::token_cache::{AuthToken, TokenCache};
use super::transport::SoapTransport;
use rater_domain::{ProcedureOutcome, ProcedureParams, truncate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header context used when the login did not report a user GUID
pub const DEFAULT_CONTEXT: &str = "ImsMonitoring";

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImsConnection {
    /// Base address, without the trailing `/`
    pub url: String,
    pub username: String,
    /// Password as expected by LoginIMSUser (already Triple-DES encrypted)
    pub password: String,
    pub context: String,
}

impl ImsConnection {
    pub fn new(url: &str, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            context: DEFAULT_CONTEXT.to_string(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

pub struct ImsClient {
    connection: ImsConnection,
    transport: Arc<dyn SoapTransport>,
    tokens: Arc<TokenCache>,
}

impl ImsClient {
    pub fn new(
        connection: ImsConnection,
        transport: Arc<dyn SoapTransport>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            connection,
            transport,
            tokens,
        }
    }

    pub fn address(&self) -> &str {
        &self.connection.url
    }

    /// Call a web method, re-authenticating once if the token is rejected
    pub async fn invoke(&self, call: &WebMethod) -> Result<ResultNode> {
        let token = self.token().await?;
        match self.send(call, Some(&token)).await {
            Err(ImsError::TokenInvalid) => {
                info!(
                    "{}/{}: token rejected, re-authenticating",
                    call.service, call.method
                );
                self.tokens.invalidate(self.address(), &token.token).await;
                let fresh = self.token().await?;
                self.send(call, Some(&fresh)).await
            }
            other => other,
        }
    }

    /// Run a stored procedure through `DataAccess.ExecuteDataSet`.
    ///
    /// A missing-parameter fault is an `Ok(ParameterRequired)` outcome.
    pub async fn execute_procedure(
        &self,
        procedure: &str,
        params: &ProcedureParams,
    ) -> Result<ProcedureOutcome> {
        // The service appends the suffix itself
        let name = procedure.strip_suffix("_WS").unwrap_or(procedure);
        let mut values = Vec::with_capacity(params.len() * 2);
        for (key, value) in params {
            let key = if key.starts_with('@') {
                key.clone()
            } else {
                format!("@{key}")
            };
            values.push(Element::text("string", key));
            values.push(Element::text("string", value));
        }
        let call = WebMethod::new(Service::DataAccess, "ExecuteDataSet")
            .param("procedureName", name)
            .element(Element::group("parameters", values));

        debug!("Executing {} with {} parameter(s)", name, params.len());
        match self.invoke(&call).await {
            Ok(result) => Ok(ProcedureOutcome::Rows(parse_data_set(&result)?)),
            Err(ImsError::ParameterRequired(parameter)) => {
                debug!("{} requires {}", name, parameter);
                Ok(ProcedureOutcome::ParameterRequired { parameter })
            }
            Err(e) => Err(e),
        }
    }

    async fn token(&self) -> Result<AuthToken> {
        self.tokens
            .get_or_authenticate(self.address(), || self.authenticate())
            .await
    }

    async fn authenticate(&self) -> Result<AuthToken> {
        info!("Authenticating with {}", self.address());
        let call = WebMethod::new(Service::Logon, "LoginIMSUser")
            .param("userName", &self.connection.username)
            .param("tripleDESEncryptedPassword", &self.connection.password);

        let result = self.send(&call, None).await.map_err(|e| match e {
            ImsError::Fault(msg) => ImsError::Authentication(msg),
            other => other,
        })?;

        let token = result
            .child_text("Token")
            .ok_or_else(|| ImsError::Authentication("no token in LoginIMSUserResult".into()))?;
        if token.chars().all(|c| c == '0' || c == '-') {
            warn!("IMS returned an empty token for {}", self.connection.username);
            return Err(ImsError::Authentication(
                "invalid credentials (empty token)".into(),
            ));
        }
        Ok(AuthToken {
            token: token.to_string(),
            user_guid: result.child_text("UserGuid").map(str::to_string),
        })
    }

    async fn send(&self, call: &WebMethod, token: Option<&AuthToken>) -> Result<ResultNode> {
        let header = token.map(|t| TokenHeader {
            token: &t.token,
            context: match call.service {
                Service::DataAccess => &self.connection.context,
                _ => t.user_guid.as_deref().unwrap_or(&self.connection.context),
            },
        });
        let url = format!("{}/{}", self.connection.url, call.service.endpoint());
        let response = self
            .transport
            .post(&url, &call.soap_action(), envelope(call, header))
            .await?;

        match parse_response(&response.body, &call.method) {
            Ok(result) if response.is_success() => Ok(result),
            Ok(_) | Err(ImsError::Parse(_)) if !response.is_success() => Err(ImsError::Status {
                status: response.status,
                body: truncate(&response.body, 200),
            }),
            other => other,
        }
    }
}

//! Remote system configuration from TOML (`[ims]` section)

use crate::ims::client::{DEFAULT_CONTEXT, ImsConnection};
use crate::ims::token_cache::DEFAULT_TOKEN_TTL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileImsConfig {
    /// Base address of the IMS web services, e.g. `https://ims.example.com/ImsWS`
    pub url: String,
    pub username: String,
    /// Triple-DES encrypted password as expected by `LoginIMSUser`
    pub password: Option<String>,
    /// Environment variable consulted when `password` is not set
    pub password_env: String,
    /// How long an authentication token is reused
    pub token_ttl_minutes: u64,
    /// Per-request HTTP timeout
    pub timeout_seconds: u64,
    /// Context value placed in the SOAP token header
    pub context: String,
}

impl Default for FileImsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: None,
            password_env: "IMS_RATER_PASSWORD".to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL.as_secs() / 60,
            timeout_seconds: 60,
            context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

impl FileImsConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Configured password, else the value of `password_env`
    pub fn resolve_password(&self) -> Option<String> {
        self.password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| std::env::var(&self.password_env).ok())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn to_connection(&self) -> ImsConnection {
        ImsConnection::new(
            &self.url,
            &self.username,
            self.resolve_password().unwrap_or_default(),
        )
        .with_context(&self.context)
    }
}

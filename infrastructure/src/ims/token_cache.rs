//! Process-wide authentication token cache.
//!
//! Tokens are keyed by the remote base address and expire after a fixed
//! window; expiry only ever removes an entry, it never triggers a refresh on
//! its own. Authentication is single-flight per address: concurrent callers
//! missing the cache for the same address wait on one login.

use super::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default validity window of an IMS token
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

/// A credential issued by the remote system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    /// User GUID reported at login, sent as the header context when present
    pub user_guid: Option<String>,
}

#[derive(Debug)]
struct CachedToken {
    token: AuthToken,
    issued_at: Instant,
}

type Slot = Arc<tokio::sync::Mutex<Option<CachedToken>>>;

pub struct TokenCache {
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, address: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(address.to_string()).or_default().clone()
    }

    /// Return the cached token for `address`, or run `authenticate` and cache its result.
    ///
    /// A failed authentication leaves the slot empty.
    pub async fn get_or_authenticate<F, Fut>(&self, address: &str, authenticate: F) -> Result<AuthToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthToken>>,
    {
        let slot = self.slot(address);
        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref() {
            if cached.issued_at.elapsed() < self.ttl {
                return Ok(cached.token.clone());
            }
            debug!("Token for {} expired", address);
            *entry = None;
        }

        let token = authenticate().await?;
        *entry = Some(CachedToken {
            token: token.clone(),
            issued_at: Instant::now(),
        });
        Ok(token)
    }

    /// Drop the cached token for `address` if it is still the rejected one.
    ///
    /// A token already replaced by a concurrent caller is left alone.
    pub async fn invalidate(&self, address: &str, rejected: &str) {
        let slot = self.slot(address);
        let mut entry = slot.lock().await;
        if entry.as_ref().is_some_and(|c| c.token.token == rejected) {
            debug!("Purging rejected token for {}", address);
            *entry = None;
        }
    }

    /// Currently cached, unexpired token
    pub async fn cached(&self, address: &str) -> Option<AuthToken> {
        let slot = self.slot(address);
        let entry = slot.lock().await;
        entry
            .as_ref()
            .filter(|c| c.issued_at.elapsed() < self.ttl)
            .map(|c| c.token.clone())
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

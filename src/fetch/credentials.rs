//! Per-source API token store with explicit expiry.
//!
//! Sources that require an OAuth-style token (obtained with a client id and
//! secret) store it here keyed by source name. Tokens expire; an expired
//! token is never handed out, the caller-supplied refresh runs instead.
//!
//! Refreshes are serialized per source: the per-slot mutex admits one
//! refresh at a time, and a caller that arrives while a refresh is in
//! flight blocks on the lock and then reuses the freshly stored token
//! instead of triggering a second refresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::error::FetchError;

/// A short-lived API credential for one source.
#[derive(Debug, Clone)]
pub struct ApiToken {
    value: String,
    expires_at: Instant,
}

impl ApiToken {
    /// Creates a token that expires `ttl` from now.
    #[must_use]
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    /// Returns the token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true once the token's lifetime has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

type TokenSlot = Arc<Mutex<Option<ApiToken>>>;

/// Keyed store of per-source API tokens.
///
/// Shared through [`FetchClient`](super::FetchClient); safe for concurrent
/// use from independent fetch tasks.
#[derive(Debug, Default)]
pub struct ApiTokenStore {
    slots: DashMap<String, TokenSlot>,
}

impl ApiTokenStore {
    /// Creates an empty token store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, source_key: &str) -> TokenSlot {
        self.slots
            .entry(source_key.to_string())
            .or_default()
            .clone()
    }

    /// Returns a valid token for `source_key`, refreshing if necessary.
    ///
    /// The `refresh` future is only awaited when no unexpired token exists.
    /// At most one refresh per source is in flight at a time; concurrent
    /// callers for the same source wait for it and reuse its result.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `refresh`.
    #[instrument(skip(self, refresh))]
    pub async fn get_or_refresh<F, Fut>(
        &self,
        source_key: &str,
        refresh: F,
    ) -> Result<String, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ApiToken, FetchError>>,
    {
        let slot = self.slot(source_key);
        let mut guard = slot.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.is_expired() {
                return Ok(token.value().to_string());
            }
            debug!(source = source_key, "stored token expired");
        }

        let fresh = refresh().await?;
        let value = fresh.value().to_string();
        *guard = Some(fresh);
        debug!(source = source_key, "token refreshed");
        Ok(value)
    }

    /// Drops the token for `source_key`, forcing the next caller to refresh.
    ///
    /// Used when a source rejects a token before its nominal expiry.
    pub async fn invalidate(&self, source_key: &str) {
        let slot = self.slot(source_key);
        let mut guard = slot.lock().await;
        *guard = None;
        debug!(source = source_key, "token invalidated");
    }
}

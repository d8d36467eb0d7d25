//! Error types for the fetch module.
//!
//! Rate limiting is handled inside [`FetchClient`](super::FetchClient) and
//! only surfaces here once every attempt has been consumed; the
//! [`FetchError::RateLimitExhausted`] variant is therefore distinct from a
//! hard rejection, which is returned as a
//! [`FetchOutcome::Failure`](super::FetchOutcome) rather than an error.

use thiserror::Error;

/// Errors that can occur while fetching a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Every attempt was answered with a rate-limit status.
    ///
    /// Signals exhaustion, not rejection: the server never gave a definitive
    /// answer, it only kept asking us to slow down.
    #[error("rate limited on all {attempts} attempts requesting {url}")]
    RateLimitExhausted {
        /// The URL that kept being rate limited.
        url: String,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A credential refresh for the keyed token store failed.
    #[error("credential refresh failed for source {source_key}: {reason}")]
    CredentialRefresh {
        /// The source the token belongs to.
        source_key: String,
        /// Why the refresh failed.
        reason: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a rate-limit exhaustion error.
    pub fn rate_limit_exhausted(url: impl Into<String>, attempts: u32) -> Self {
        Self::RateLimitExhausted {
            url: url.into(),
            attempts,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a credential refresh error.
    pub fn credential_refresh(source_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CredentialRefresh {
            source_key: source_key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error signals rate-limit exhaustion rather than
    /// a definitive rejection.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RateLimitExhausted { .. })
    }
}

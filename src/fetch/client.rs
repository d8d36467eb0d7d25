//! HTTP fetch client with exponential backoff on rate limiting.
//!
//! This module provides the [`FetchClient`] struct which issues requests,
//! retries rate-limited responses after `wait_base × 2^attempt`, and returns
//! every other response as a [`FetchOutcome`] for the caller to interpret.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use reqwest::ClientBuilder;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use tracing::{debug, instrument, warn};
use url::Url;

use super::credentials::ApiTokenStore;
use super::error::FetchError;
use super::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::user_agent;

/// HTTP status codes treated as "slow down, try again".
const RATE_LIMIT_STATUSES: [u16; 2] = [421, 429];

/// Result of a completed fetch.
///
/// Both variants are *answers* from the server: a `Failure` is a definitive
/// rejection (404, 500, ...), not a retryable condition. Rate-limit statuses
/// never appear here because [`FetchClient`] consumes them internally.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A 2xx response with its body.
    Success {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        body: String,
    },

    /// A non-2xx, non-rate-limit response.
    Failure {
        /// The HTTP status code.
        status: u16,
        /// Human-readable description of the rejection.
        diagnostic: String,
    },
}

impl FetchOutcome {
    /// Returns the HTTP status code of the response.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status,
        }
    }

    /// Returns true if the server answered with a success status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the response body for successful fetches.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Success { body, .. } => Some(body),
            Self::Failure { .. } => None,
        }
    }

    /// Consumes the outcome, returning the body for successful fetches.
    #[must_use]
    pub fn into_body(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            Self::Failure { .. } => None,
        }
    }
}

/// Describes a single GET request.
///
/// Some hosts require the request URL as its own `Referer` header;
/// [`RequestSpec::with_self_referer`] opts into that behavior.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    url: Url,
    self_referer: bool,
    headers: Vec<(String, String)>,
}

impl RequestSpec {
    /// Creates a GET request spec for the given URL.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            url,
            self_referer: false,
            headers: Vec::new(),
        }
    }

    /// Parses a URL string into a request spec.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if the string is not a valid URL.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        Url::parse(url)
            .map(Self::get)
            .map_err(|_| FetchError::invalid_url(url))
    }

    /// Sets the request URL as its own Referer header.
    #[must_use]
    pub fn with_self_referer(mut self) -> Self {
        self.self_referer = true;
        self
    }

    /// Adds a header to the request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends a percent-encoded query parameter to the request URL.
    #[must_use]
    pub fn with_query_param(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Computes the backoff delay for a 0-indexed rate-limited attempt.
///
/// The delay for attempt `i` is exactly `wait_base × 2^i`.
#[must_use]
pub fn backoff_delay(wait_base: Duration, attempt: u32) -> Duration {
    wait_base.saturating_mul(2_u32.saturating_pow(attempt))
}

/// Removes the query string and fragment from a URL.
///
/// Sources append cache-busting or tracking parameters that make the same
/// image look like different locations; comparisons and direct-link checks
/// work on the stripped form.
#[must_use]
pub fn strip_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}

fn is_rate_limit_status(status: u16) -> bool {
    RATE_LIMIT_STATUSES.contains(&status)
}

/// HTTP client for fetching pages and images with rate-limit backoff.
///
/// Designed to be created once and shared: concurrently issued fetches are
/// independent and only the [`ApiTokenStore`] is mutable shared state.
///
/// # Example
///
/// ```no_run
/// use imagepull_core::fetch::{FetchClient, RequestSpec, DEFAULT_MAX_ATTEMPTS, DEFAULT_WAIT_BASE};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = FetchClient::new();
/// let spec = RequestSpec::parse("https://example.com/posts?page=0")?;
/// let outcome = client
///     .fetch_text(&spec, DEFAULT_WAIT_BASE, DEFAULT_MAX_ATTEMPTS)
///     .await?;
/// println!("status: {}", outcome.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FetchClient {
    client: Client,
    tokens: ApiTokenStore,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClient {
    /// Creates a new fetch client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes
    /// - Gzip decompression and an in-memory cookie store enabled
    /// - `Accept-Language: en-US` so sources return English payloads
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        let client = ClientBuilder::new()
            .user_agent(user_agent::default_fetch_user_agent())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .cookie_store(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            tokens: ApiTokenStore::new(),
        }
    }

    /// Returns the per-source API token store.
    #[must_use]
    pub fn tokens(&self) -> &ApiTokenStore {
        &self.tokens
    }

    /// Fetches a text resource, retrying on rate-limit responses.
    ///
    /// Each rate-limited attempt `i` (0-indexed) schedules the next attempt
    /// after `wait_base × 2^i` and logs the scheduled retry time. Any other
    /// response, success or hard error, terminates the loop immediately and
    /// is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RateLimitExhausted`] when all `max_attempts`
    /// attempts were rate limited, and [`FetchError::Network`] /
    /// [`FetchError::Timeout`] for terminal transport failures.
    #[instrument(skip(self, spec), fields(url = %spec.url()))]
    pub async fn fetch_text(
        &self,
        spec: &RequestSpec,
        wait_base: Duration,
        max_attempts: u32,
    ) -> Result<FetchOutcome, FetchError> {
        let attempts = max_attempts.max(1);
        for attempt in 0..attempts {
            let response = self.send(spec).await?;
            let status = response.status().as_u16();

            if is_rate_limit_status(status) {
                let delay = backoff_delay(wait_base, attempt);
                let retry_at = Utc::now()
                    + chrono::Duration::milliseconds(
                        i64::try_from(delay.as_millis()).unwrap_or(i64::MAX),
                    );
                warn!(
                    status,
                    attempt,
                    delay_ms = delay.as_millis(),
                    retry_at = %retry_at.format("%H:%M:%S%.3f"),
                    "rate limited; retry scheduled"
                );
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            let diagnostic = response
                .status()
                .canonical_reason()
                .unwrap_or("unrecognized status")
                .to_string();
            let is_success = response.status().is_success();
            let body = response
                .text()
                .await
                .map_err(|source| FetchError::network(spec.url().as_str(), source))?;

            debug!(status, bytes = body.len(), "fetch completed");
            return Ok(if is_success {
                FetchOutcome::Success { status, body }
            } else {
                FetchOutcome::Failure { status, diagnostic }
            });
        }
        Err(FetchError::rate_limit_exhausted(
            spec.url().as_str(),
            attempts,
        ))
    }

    async fn send(&self, spec: &RequestSpec) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(spec.url().clone());
        if spec.self_referer {
            request = request.header(REFERER, spec.url().as_str());
        }
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }
        request.send().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::timeout(spec.url().as_str())
            } else {
                FetchError::network(spec.url().as_str(), source)
            }
        })
    }
}

//! Resilient HTTP fetching with rate-limit backoff.
//!
//! This module provides the [`FetchClient`], a thin wrapper over a pooled
//! HTTP client that retries rate-limited requests with exponential backoff
//! and reports every other response, success or hard error, back to the
//! caller as a [`FetchOutcome`].
//!
//! It also owns the [`ApiTokenStore`], a keyed store for short-lived API
//! credentials with explicit expiry and single-refresh-in-flight discipline.

mod client;
mod credentials;
mod error;

pub use client::{FetchClient, FetchOutcome, RequestSpec, backoff_delay, strip_query};
pub use credentials::{ApiToken, ApiTokenStore};
pub use error::FetchError;

use std::time::Duration;

/// Default base wait applied before the first rate-limit retry.
pub const DEFAULT_WAIT_BASE: Duration = Duration::from_secs(2);

/// Default maximum number of attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Connect timeout for all requests (30 seconds).
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for all requests (5 minutes, large pages and images).
pub(crate) const READ_TIMEOUT_SECS: u64 = 300;

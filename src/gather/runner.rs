//! The gather loop: pagination, filtering, and stop reporting.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::fetch::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_WAIT_BASE, FetchClient, FetchError, FetchOutcome,
};

use super::cursor::PageSource;
use super::decoder::{DecodedPage, PageDecoder};
use super::filter::{RecordDecision, evaluate};
use super::{CandidatePost, StopPolicy};

/// Why a gather run ended.
///
/// Every run ends for exactly one of these reasons; callers use it for
/// scenario-specific reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of records was accepted.
    TargetReached,
    /// A record older than the age cutoff was observed.
    CutoffReached,
    /// The remote listing ran out of pages.
    SourceExhausted,
    /// A page fetch failed after the first page; the partial result stands.
    FetchFailed,
    /// A page payload was unusable as a whole; the partial result stands.
    DecodeFailed,
    /// The run was interrupted at a page boundary.
    Cancelled,
}

/// The accumulated result of one gather run.
#[derive(Debug)]
pub struct GatherOutcome<P> {
    /// Accepted records, in acceptance order.
    pub records: Vec<P>,
    /// Why the run ended.
    pub reason: StopReason,
    /// How many pages were fetched and decoded.
    pub pages_fetched: usize,
}

/// Errors that abort a gather run with no usable result.
///
/// Failures after the first page are not errors; they end the run with the
/// partial result and a [`StopReason`] explaining why.
#[derive(Debug, Error)]
pub enum GatherError {
    /// The very first page could not be fetched at all.
    #[error("fetching the first page failed: {source}")]
    FirstPageFetch {
        /// The underlying fetch failure (terminal or exhausted).
        #[source]
        source: FetchError,
    },

    /// The very first page was answered with a hard error status.
    #[error("first page rejected with HTTP {status}: {diagnostic}")]
    FirstPageRejected {
        /// The HTTP status code.
        status: u16,
        /// Human-readable description of the rejection.
        diagnostic: String,
    },
}

/// Drives pagination for one source until the stop policy says otherwise.
///
/// The loop is sequential per source (the cursor is stateful); independent
/// loops for different sources can run in parallel without shared state.
///
/// # Example
///
/// ```no_run
/// # use imagepull_core::fetch::FetchClient;
/// # use imagepull_core::gather::{GatherLoop, PageDecoder, PageSource, StopPolicy};
/// # async fn example<S: PageSource, D: PageDecoder>(
/// #     source: S,
/// #     decoder: D,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let client = FetchClient::new();
/// let policy = StopPolicy::new(25, chrono::Utc::now() - chrono::Duration::days(30));
/// let outcome = GatherLoop::new(&client, policy)
///     .gather(&source, &decoder)
///     .await?;
/// println!("{} records ({:?})", outcome.records.len(), outcome.reason);
/// # Ok(())
/// # }
/// ```
pub struct GatherLoop<'a> {
    client: &'a FetchClient,
    policy: StopPolicy,
    wait_base: Duration,
    max_attempts: u32,
    interrupt: Arc<AtomicBool>,
}

impl<'a> GatherLoop<'a> {
    /// Creates a gather loop with default backoff settings.
    #[must_use]
    pub fn new(client: &'a FetchClient, policy: StopPolicy) -> Self {
        Self {
            client,
            policy,
            wait_base: DEFAULT_WAIT_BASE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the rate-limit backoff applied to page fetches.
    #[must_use]
    pub fn with_backoff(mut self, wait_base: Duration, max_attempts: u32) -> Self {
        self.wait_base = wait_base;
        self.max_attempts = max_attempts;
        self
    }

    /// Installs a shared interrupt flag, checked at each page boundary.
    ///
    /// An interrupted run returns the partial result with
    /// [`StopReason::Cancelled`] instead of discarding it.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Gathers records from the source until the policy stops the run.
    ///
    /// Per page: fetch through the client (with rate-limit backoff), decode
    /// through the supplied decoder, then evaluate every record in listing
    /// order against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`GatherError`] only when the *first* page fails; later
    /// failures end the run with the partial result and a [`StopReason`].
    #[instrument(skip_all, fields(target = self.policy.target_count))]
    pub async fn gather<S, D>(
        &self,
        source: &S,
        decoder: &D,
    ) -> Result<GatherOutcome<D::Post>, GatherError>
    where
        S: PageSource,
        D: PageDecoder,
    {
        let mut records: Vec<D::Post> = Vec::new();
        let mut pages_fetched = 0_usize;

        if self.policy.target_count == 0 {
            return Ok(finish(records, StopReason::TargetReached, pages_fetched));
        }

        let mut cursor = source.initial_cursor();
        loop {
            if self.interrupted() {
                return Ok(finish(records, StopReason::Cancelled, pages_fetched));
            }

            let spec = source.request(&cursor);
            let body = match self
                .client
                .fetch_text(&spec, self.wait_base, self.max_attempts)
                .await
            {
                Ok(FetchOutcome::Success { body, .. }) => body,
                Ok(FetchOutcome::Failure { status, diagnostic }) => {
                    if pages_fetched == 0 {
                        return Err(GatherError::FirstPageRejected { status, diagnostic });
                    }
                    warn!(status, diagnostic = %diagnostic, "page rejected; keeping partial result");
                    return Ok(finish(records, StopReason::FetchFailed, pages_fetched));
                }
                Err(error) => {
                    if pages_fetched == 0 {
                        return Err(GatherError::FirstPageFetch { source: error });
                    }
                    warn!(error = %error, "page fetch failed; keeping partial result");
                    return Ok(finish(records, StopReason::FetchFailed, pages_fetched));
                }
            };
            pages_fetched += 1;

            let DecodedPage {
                posts,
                has_more,
                next_cursor,
            } = match decoder.decode_page(&body) {
                Ok(page) => page,
                Err(error) => {
                    warn!(error = %error, page = pages_fetched, "page undecodable; keeping partial result");
                    return Ok(finish(records, StopReason::DecodeFailed, pages_fetched));
                }
            };
            let page_len = posts.len();
            debug!(page = pages_fetched, records = page_len, "page decoded");

            for post in posts {
                match evaluate(&post, &self.policy) {
                    RecordDecision::Stop => {
                        return Ok(finish(records, StopReason::CutoffReached, pages_fetched));
                    }
                    RecordDecision::Skip(reason) => {
                        debug!(url = %post.source_url(), ?reason, "skipping record");
                    }
                    RecordDecision::Keep => {
                        records.push(post);
                        if records.len() >= self.policy.target_count {
                            return Ok(finish(records, StopReason::TargetReached, pages_fetched));
                        }
                    }
                }
            }

            if !has_more {
                return Ok(finish(records, StopReason::SourceExhausted, pages_fetched));
            }
            if let Some(fill) = self.policy.min_page_fill {
                if page_len < fill {
                    debug!(page_len, fill, "short page signals end of listing");
                    return Ok(finish(records, StopReason::SourceExhausted, pages_fetched));
                }
            }

            cursor = match next_cursor {
                Some(next) => next,
                None => source.advance(cursor, page_len),
            };
        }
    }
}

fn finish<P>(records: Vec<P>, reason: StopReason, pages_fetched: usize) -> GatherOutcome<P> {
    info!(
        ?reason,
        records = records.len(),
        pages = pages_fetched,
        "gather stopped"
    );
    GatherOutcome {
        records,
        reason,
        pages_fetched,
    }
}

/// Finishing pass: drop same-source duplicates and rank by score.
///
/// Keeps the highest-scored instance of each source URL and sorts the
/// survivors by descending score, unknown scores last. Sources whose
/// listings never repeat a post can skip this pass entirely.
#[must_use]
pub fn dedupe_and_rank<P: CandidatePost>(mut records: Vec<P>) -> Vec<P> {
    records.sort_by_key(|post| std::cmp::Reverse(post.score().unwrap_or(i64::MIN)));
    let mut seen = HashSet::new();
    records.retain(|post| seen.insert(post.source_url().as_str().to_owned()));
    records
}

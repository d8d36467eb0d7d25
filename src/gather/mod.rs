//! Bounded, cursor-driven gathering of candidate posts.
//!
//! This module turns a paginated remote listing into a finite, filtered,
//! ordered result set. The listing itself is abstracted behind two
//! caller-supplied seams:
//!
//! - [`PageSource`] - maps an opaque [`PageCursor`] to a request and
//!   advances it between pages
//! - [`PageDecoder`] - decodes one raw page payload into ordered
//!   [`CandidatePost`]s
//!
//! The [`GatherLoop`] drives pagination through a
//! [`FetchClient`](crate::fetch::FetchClient), applies the [`StopPolicy`]
//! to every record, and reports why it stopped as a [`StopReason`].
//!
//! Remote listings are assumed newest-first: the first record older than
//! the policy's cutoff ends the entire run.

mod cursor;
mod decoder;
mod filter;
mod runner;

pub use cursor::{PageCursor, PageSource};
pub use decoder::{DecodeError, DecodedPage, PageDecoder};
pub use filter::{RecordDecision, SkipReason, evaluate};
pub use runner::{GatherError, GatherLoop, GatherOutcome, StopReason, dedupe_and_rank};

use chrono::{DateTime, Utc};
use url::Url;

/// A source-agnostic view over one remote post.
///
/// Produced by a site-specific [`PageDecoder`]; immutable once constructed.
/// A post whose popularity is unknown to its source reports `None` from
/// [`score`](CandidatePost::score).
pub trait CandidatePost: Send + Sync {
    /// When the post was created at its source.
    fn created_at(&self) -> DateTime<Utc>;

    /// The post's popularity score, if the source exposes one.
    fn score(&self) -> Option<i64>;

    /// Intrinsic pixel width of the post's image.
    fn width(&self) -> u32;

    /// Intrinsic pixel height of the post's image.
    fn height(&self) -> u32;

    /// The resolvable location of the post.
    fn source_url(&self) -> &Url;
}

/// Acceptance criteria and stopping conditions for one gather run.
#[derive(Debug, Clone)]
pub struct StopPolicy {
    /// Stop once this many records have been accepted.
    pub target_count: usize,

    /// Inclusive lower bound on post age; the first older record ends the
    /// run (listings are newest-first).
    pub oldest_allowed: DateTime<Utc>,

    /// Minimum score; `None` means no minimum. Posts with an unknown score
    /// are not filtered by this criterion.
    pub min_score: Option<i64>,

    /// Minimum acceptable width in pixels.
    pub min_width: u32,

    /// Minimum acceptable height in pixels.
    pub min_height: u32,

    /// A page with fewer records than this signals the end of the remote
    /// listing. `None` relies solely on the decoder's has-more flag.
    pub min_page_fill: Option<usize>,
}

impl StopPolicy {
    /// Creates a policy with a target count and age cutoff, and no size,
    /// score or page-fill constraints.
    #[must_use]
    pub fn new(target_count: usize, oldest_allowed: DateTime<Utc>) -> Self {
        Self {
            target_count,
            oldest_allowed,
            min_score: None,
            min_width: 0,
            min_height: 0,
            min_page_fill: None,
        }
    }

    /// Sets the minimum score.
    #[must_use]
    pub fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Sets the minimum width and height.
    #[must_use]
    pub fn with_min_dimensions(mut self, min_width: u32, min_height: u32) -> Self {
        self.min_width = min_width;
        self.min_height = min_height;
        self
    }

    /// Sets the page-fill floor below which the listing counts as exhausted.
    #[must_use]
    pub fn with_min_page_fill(mut self, min_page_fill: usize) -> Self {
        self.min_page_fill = Some(min_page_fill);
        self
    }
}

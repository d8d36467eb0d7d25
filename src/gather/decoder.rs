//! The page-decoder seam between the gather loop and site adapters.

use thiserror::Error;

use super::CandidatePost;
use super::cursor::PageCursor;

/// One decoded page of a remote listing.
#[derive(Debug)]
pub struct DecodedPage<P> {
    /// The records on the page, in listing order.
    pub posts: Vec<P>,

    /// Whether the source says more pages exist.
    pub has_more: bool,

    /// Continuation cursor extracted from the payload, for sources that
    /// hand out tokens. `None` lets the [`PageSource`](super::PageSource)
    /// advance the cursor arithmetically.
    pub next_cursor: Option<PageCursor>,
}

impl<P> DecodedPage<P> {
    /// Creates a page with no continuation cursor.
    #[must_use]
    pub fn new(posts: Vec<P>, has_more: bool) -> Self {
        Self {
            posts,
            has_more,
            next_cursor: None,
        }
    }

    /// Attaches a decoder-supplied continuation cursor.
    #[must_use]
    pub fn with_next_cursor(mut self, cursor: PageCursor) -> Self {
        self.next_cursor = Some(cursor);
        self
    }
}

/// Errors decoding a page payload.
///
/// A whole-page decode failure stops the gather loop; individual malformed
/// records are the decoder's to skip.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("page payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed but does not have the expected shape.
    #[error("malformed page payload: {reason}")]
    MalformedPayload {
        /// What was wrong with the payload.
        reason: String,
    },
}

impl DecodeError {
    /// Creates a malformed payload error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

/// Decodes raw page payloads into candidate posts.
///
/// Implementations must be deterministic and side-effect-free: the same
/// payload always decodes to the same page, and nothing outside the return
/// value changes.
pub trait PageDecoder: Send + Sync {
    /// The post type this decoder produces.
    type Post: CandidatePost;

    /// Decodes one raw page payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the payload as a whole is unusable.
    fn decode_page(&self, payload: &str) -> Result<DecodedPage<Self::Post>, DecodeError>;
}

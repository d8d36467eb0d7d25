//! Opaque pagination cursors and the page-source seam.

use crate::fetch::RequestSpec;

/// An opaque pagination position.
///
/// Which variant a source uses is its own business; the gather loop only
/// threads the cursor between [`PageSource`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// A record offset into the listing.
    Offset(u64),
    /// A page number.
    Page(u64),
    /// A continuation token handed out by the source.
    Token(String),
}

impl PageCursor {
    /// Advances the cursor past a page of `page_len` records.
    ///
    /// Offsets move by the number of records actually decoded (short pages
    /// advance less), page numbers increment, and tokens are left alone
    /// since only the decoder can produce the next one.
    #[must_use]
    pub fn advance_by(self, page_len: usize) -> Self {
        match self {
            Self::Offset(offset) => Self::Offset(offset + page_len as u64),
            Self::Page(page) => Self::Page(page + 1),
            Self::Token(token) => Self::Token(token),
        }
    }
}

/// Maps cursors to page requests for one source.
///
/// Implementations are plain request builders; all I/O stays in the gather
/// loop.
pub trait PageSource: Send + Sync {
    /// The cursor the first page is fetched with.
    fn initial_cursor(&self) -> PageCursor;

    /// Builds the request for the page at `cursor`.
    fn request(&self, cursor: &PageCursor) -> RequestSpec;

    /// Advances the cursor past a decoded page of `page_len` records.
    ///
    /// Only consulted when the decoder did not supply a continuation
    /// cursor of its own.
    fn advance(&self, cursor: PageCursor, page_len: usize) -> PageCursor {
        cursor.advance_by(page_len)
    }
}

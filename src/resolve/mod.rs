//! Resolution of arbitrary source URLs into direct image locations.
//!
//! This module provides an extensible resolver system: each source site is
//! represented by one [`ImageResolver`] that claims ownership of that site's
//! URLs and knows how to turn a post URL into the post's direct image URLs,
//! possibly by issuing further fetches (e.g. looking a post up by id).
//!
//! # Architecture
//!
//! - [`ImageResolver`] - Async capability trait individual resolvers implement
//! - [`ResolverRegistry`] - First-match-wins collection of resolvers
//! - [`Resolution`] - Result enum from an individual resolver
//! - [`ResolveOutcome`] - Registry-level result, adding "unknown source"
//! - [`DirectLinkResolver`] - Reference implementation for URLs that already
//!   point at an image
//!
//! # Example
//!
//! ```no_run
//! use imagepull_core::fetch::FetchClient;
//! use imagepull_core::resolve::{DirectLinkResolver, ResolverRegistry};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ResolverRegistry::new();
//! registry.register(Box::new(DirectLinkResolver::new()));
//!
//! let client = FetchClient::new();
//! let url = Url::parse("https://cdn.example.com/full/123.png")?;
//! let outcome = registry.resolve(&client, &url).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod direct;
mod registry;

pub use direct::DirectLinkResolver;
pub use registry::{ResolveOutcome, ResolverRegistry};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::fetch::{FetchClient, FetchError};

/// The direct image locations extracted from one post.
#[derive(Debug, Clone)]
pub struct ImageSet {
    post_url: Url,
    image_urls: Vec<Url>,
}

impl ImageSet {
    /// Creates an image set for a post with the given image locations.
    #[must_use]
    pub fn new(post_url: Url, image_urls: Vec<Url>) -> Self {
        Self {
            post_url,
            image_urls,
        }
    }

    /// Creates an image set for a URL that is itself the image.
    #[must_use]
    pub fn single(url: Url) -> Self {
        Self {
            post_url: url.clone(),
            image_urls: vec![url],
        }
    }

    /// Returns the URL of the post the images came from.
    #[must_use]
    pub fn post_url(&self) -> &Url {
        &self.post_url
    }

    /// Returns the direct image locations.
    #[must_use]
    pub fn image_urls(&self) -> &[Url] {
        &self.image_urls
    }
}

/// Result of a single resolver's attempt on a URL it owns.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The post's direct image locations.
    Images(ImageSet),
    /// The resolver owns this URL but nothing is behind it (deleted post,
    /// journal entry without images, ...).
    NotFound,
}

/// Errors a resolver can hit while extracting image locations.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A fetch issued during resolution failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The source answered, but not in the shape the resolver expects.
    #[error("malformed response resolving {url}: {reason}")]
    MalformedResponse {
        /// The URL being resolved.
        url: String,
        /// What was wrong with the response.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a malformed response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Trait that all site resolvers must implement.
///
/// A resolver claims ownership of URLs from one source via [`owns_url`] and
/// extracts direct image locations from them via [`resolve`], which may
/// issue further fetches through the supplied client. A resolver that
/// recognizes its URL as already pointing at an image returns it verbatim
/// without a network round-trip.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Box<dyn ImageResolver>`. Rust 2024 native async traits are not
/// object-safe, so `async_trait` is required for the registry pattern.
///
/// [`owns_url`]: ImageResolver::owns_url
/// [`resolve`]: ImageResolver::resolve
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Returns the resolver's name (e.g. "direct", "safebooru").
    fn name(&self) -> &str;

    /// Returns true if the URL belongs to this resolver's source.
    fn owns_url(&self, url: &Url) -> bool;

    /// Attempts to extract direct image locations from the URL.
    async fn resolve(&self, client: &FetchClient, url: &Url) -> Result<Resolution, ResolveError>;
}

//! Direct image link resolver.
//!
//! The [`DirectLinkResolver`] handles URLs that already point at an image
//! file. It claims any URL whose path (query stripped) ends in a known
//! image extension and returns the URL verbatim, without a network
//! round-trip. Registered last, it serves as the fallback for sources that
//! hand out bare CDN links.

use async_trait::async_trait;
use url::Url;

use crate::fetch::{FetchClient, strip_query};
use crate::image_ext::has_image_extension;

use super::{ImageResolver, ImageSet, Resolution, ResolveError};

/// A resolver for URLs that are themselves images.
#[derive(Debug)]
pub struct DirectLinkResolver;

impl DirectLinkResolver {
    /// Creates a new `DirectLinkResolver`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirectLinkResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageResolver for DirectLinkResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn owns_url(&self, url: &Url) -> bool {
        has_image_extension(strip_query(url).path())
    }

    #[tracing::instrument(skip(self, _client), fields(resolver = "direct"))]
    async fn resolve(&self, _client: &FetchClient, url: &Url) -> Result<Resolution, ResolveError> {
        Ok(Resolution::Images(ImageSet::single(url.clone())))
    }
}

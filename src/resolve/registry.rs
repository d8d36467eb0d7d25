//! First-match-wins resolver registry.
//!
//! The [`ResolverRegistry`] holds the registered [`ImageResolver`]s and
//! picks the first one whose `owns_url` claims the URL being resolved.
//! Registration order is the documented tie-break when two resolvers claim
//! the same origin.

use tracing::{debug, info};
use url::Url;

use crate::fetch::FetchClient;

use super::{ImageResolver, ImageSet, Resolution, ResolveError};

/// Registry-level resolution result.
///
/// `UnknownSource` (no registered resolver claims the URL) is deliberately
/// distinct from `NotFound` (the owning resolver looked and found nothing).
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// The owning resolver extracted image locations.
    Images(ImageSet),
    /// The owning resolver found nothing behind the URL.
    NotFound {
        /// The URL that resolved to nothing.
        url: Url,
    },
    /// No registered resolver claims the URL's source.
    UnknownSource {
        /// The unclaimed URL.
        url: Url,
    },
}

/// A collection of resolvers with first-match ownership dispatch.
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn ImageResolver>>,
}

impl ResolverRegistry {
    /// Creates an empty resolver registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Registers a resolver.
    ///
    /// Resolvers are consulted in registration order; the first whose
    /// `owns_url` returns true handles the URL.
    #[tracing::instrument(skip(self, resolver), fields(resolver_name))]
    pub fn register(&mut self, resolver: Box<dyn ImageResolver>) {
        tracing::Span::current().record("resolver_name", resolver.name());
        debug!(name = resolver.name(), "registering resolver");
        self.resolvers.push(resolver);
    }

    /// Removes every resolver with the given name.
    ///
    /// Returns true if anything was removed.
    pub fn deregister(&mut self, name: &str) -> bool {
        let before = self.resolvers.len();
        self.resolvers.retain(|r| r.name() != name);
        let removed = self.resolvers.len() != before;
        if removed {
            debug!(name, "deregistered resolver");
        }
        removed
    }

    /// Returns the number of registered resolvers.
    #[must_use]
    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Returns the first resolver claiming ownership of the URL, if any.
    #[must_use]
    pub fn find_owner(&self, url: &Url) -> Option<&dyn ImageResolver> {
        self.resolvers
            .iter()
            .find(|r| r.owns_url(url))
            .map(AsRef::as_ref)
    }

    /// Resolves a URL to its direct image locations.
    ///
    /// Picks the first registered resolver whose `owns_url` returns true
    /// and delegates to it. A URL no resolver claims is reported as
    /// [`ResolveOutcome::UnknownSource`], not an error.
    ///
    /// # Errors
    ///
    /// Propagates [`ResolveError`] from the owning resolver (fetch failures,
    /// malformed source responses).
    #[tracing::instrument(skip(self, client), fields(url = %url))]
    pub async fn resolve(
        &self,
        client: &FetchClient,
        url: &Url,
    ) -> Result<ResolveOutcome, ResolveError> {
        let Some(owner) = self.find_owner(url) else {
            info!(url = %url, "no resolver claims this source");
            return Ok(ResolveOutcome::UnknownSource { url: url.clone() });
        };

        debug!(resolver = owner.name(), "resolving through owner");
        match owner.resolve(client, url).await? {
            Resolution::Images(set) => {
                info!(
                    resolver = owner.name(),
                    images = set.image_urls().len(),
                    "resolution successful"
                );
                Ok(ResolveOutcome::Images(set))
            }
            Resolution::NotFound => {
                info!(resolver = owner.name(), "nothing behind url");
                Ok(ResolveOutcome::NotFound { url: url.clone() })
            }
        }
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ResolverRegistry")
            .field("resolver_count", &self.resolvers.len())
            .field("resolvers", &names)
            .finish()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

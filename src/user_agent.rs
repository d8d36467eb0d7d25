//! Shared User-Agent string for fetch traffic.
//!
//! Single source for project URL and UA format so page and image traffic
//! stay consistent and easy to update (good citizenship; RFC 9308).

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fiercely/imagepull";

/// Default User-Agent for fetch requests (identifies the tool).
#[must_use]
pub(crate) fn default_fetch_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("imagepull/{version} (image-gathering-tool; +{PROJECT_UA_URL})")
}

//! Imagepull Core Library
//!
//! This library provides the core functionality for the imagepull tool,
//! which gathers images from paginated remote sources, filters them against
//! acceptance criteria, and keeps near-duplicates out of the saved
//! collection.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP fetch client with rate-limit backoff and a per-source
//!   API token store
//! - [`resolve`] - Registry of per-site resolvers that turn post URLs into
//!   direct image locations
//! - [`gather`] - Cursor-driven pagination loop that accumulates accepted
//!   candidate posts
//! - [`dedup`] - Perceptual fingerprinting and the duplicate cache
//!
//! Site-specific page decoders and post models are supplied by callers
//! through the traits in [`gather`]; this crate stays source-agnostic.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dedup;
pub mod fetch;
pub mod gather;
pub mod resolve;

mod image_ext;
mod user_agent;

// Re-export commonly used types
pub use dedup::{
    CompareError, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_THUMBNAIL_SIZE, DedupError,
    DuplicateCache, FingerprintError, ImageFingerprint, RejectReason, StoreOutcome,
    fingerprint_bits,
};
pub use fetch::{
    ApiToken, ApiTokenStore, DEFAULT_MAX_ATTEMPTS, DEFAULT_WAIT_BASE, FetchClient, FetchError,
    FetchOutcome, RequestSpec, backoff_delay,
};
pub use gather::{
    CandidatePost, DecodeError, DecodedPage, GatherError, GatherLoop, GatherOutcome, PageCursor,
    PageDecoder, PageSource, RecordDecision, SkipReason, StopPolicy, StopReason, dedupe_and_rank,
};
pub use resolve::{
    DirectLinkResolver, ImageResolver, ImageSet, Resolution, ResolveError, ResolveOutcome,
    ResolverRegistry,
};

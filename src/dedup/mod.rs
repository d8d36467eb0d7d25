//! Perceptual near-duplicate detection for downloaded images.
//!
//! Every stored image is summarized by an [`ImageFingerprint`]: a square
//! grid of light/dark bits produced by downsampling the image and
//! thresholding each cell against the image's own mean brightness. Two
//! fingerprints of the same grid size are compared bit-by-bit, behind a
//! cheap aspect-ratio gate that rules out images that cannot plausibly be
//! the same subject.
//!
//! The [`DuplicateCache`] holds the fingerprints of everything stored so
//! far, answers "would this image duplicate something already stored"
//! inline during downloads, and offers an offline pairwise sweep that
//! deletes duplicates stored before a too-similar counterpart existed.

mod cache;
mod fingerprint;

pub use cache::{DedupError, DuplicateCache, RejectReason, StoreOutcome};
pub use fingerprint::{CompareError, FingerprintError, ImageFingerprint, fingerprint_bits};

/// Default fingerprint grid size. Bigger is more accurate; comparison cost
/// grows with the square.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 32;

/// Default fraction of bits that must agree for two images to count as
/// duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;

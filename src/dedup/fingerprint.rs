//! Image fingerprints and their similarity comparison.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;
use thiserror::Error;
use url::Url;

/// Errors computing a fingerprint.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The thumbnail size must be at least 1.
    #[error("thumbnail size must be at least 1")]
    InvalidThumbnailSize,

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors comparing two fingerprints.
///
/// A size mismatch is a configuration error, not a non-match: bit grids of
/// different sizes describe incomparable samplings and pretending otherwise
/// would silently degrade detection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompareError {
    /// The two fingerprints were built with different grid sizes.
    #[error("thumbnails must be the same size when checking similarity: {this} vs {other}")]
    ThumbnailSizeMismatch {
        /// Grid size of the left-hand fingerprint.
        this: u32,
        /// Grid size of the right-hand fingerprint.
        other: u32,
    },
}

/// Computes the light/dark bit grid for an image.
///
/// The image is downsampled to `thumbnail_size × thumbnail_size` and each
/// cell compared against the downsampled image's mean brightness
/// (true = light, false = dark). Deterministic for identical bytes and
/// size; the result always has exactly `thumbnail_size²` bits.
///
/// # Errors
///
/// Returns [`FingerprintError`] when the size is zero or the bytes are not
/// a decodable image.
pub fn fingerprint_bits(bytes: &[u8], thumbnail_size: u32) -> Result<Vec<bool>, FingerprintError> {
    let image = image::load_from_memory(bytes)?;
    fingerprint_image(&image, thumbnail_size)
}

/// Fingerprints an already-decoded image.
pub(crate) fn fingerprint_image(
    image: &DynamicImage,
    thumbnail_size: u32,
) -> Result<Vec<bool>, FingerprintError> {
    if thumbnail_size == 0 {
        return Err(FingerprintError::InvalidThumbnailSize);
    }

    let thumb = image
        .resize_exact(thumbnail_size, thumbnail_size, FilterType::Triangle)
        .into_luma8();
    let sum: u64 = thumb.pixels().map(|px| u64::from(px.0[0])).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / f64::from(thumbnail_size * thumbnail_size);

    Ok(thumb
        .pixels()
        .map(|px| f64::from(px.0[0]) >= mean)
        .collect())
}

/// The perceptual summary of one stored image.
///
/// Created once per successfully downloaded and verified image; immutable
/// afterwards. The grid size is derived from the bit count so a fingerprint
/// can be rebuilt from stored bits alone.
#[derive(Debug, Clone)]
pub struct ImageFingerprint {
    source: Url,
    file: PathBuf,
    width: u32,
    height: u32,
    bits: Vec<bool>,
    thumbnail_size: u32,
}

impl ImageFingerprint {
    /// Creates a fingerprint from its parts.
    ///
    /// The thumbnail size is `ceil(sqrt(bits.len()))`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(source: Url, file: PathBuf, width: u32, height: u32, bits: Vec<bool>) -> Self {
        let thumbnail_size = (bits.len() as f64).sqrt().ceil() as u32;
        Self {
            source,
            file,
            width,
            height,
            bits,
            thumbnail_size,
        }
    }

    /// The location the image came from.
    #[must_use]
    pub fn source(&self) -> &Url {
        &self.source
    }

    /// The location the image is saved to.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The image's intrinsic width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The image's intrinsic height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The light/dark bit grid.
    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// The side length of the (square) bit grid.
    #[must_use]
    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
    }

    #[allow(clippy::cast_precision_loss)]
    fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Returns true if the fraction of agreeing bits meets the threshold.
    ///
    /// An aspect-ratio gate runs first: with `margin = 1 - threshold`, each
    /// image's ratio must fall within the other's margin band, otherwise
    /// the images cannot be the same subject and the bit comparison is
    /// skipped. The gate is symmetric, so `a.is_match(b, t)` and
    /// `b.is_match(a, t)` always agree.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError::ThumbnailSizeMismatch`] when the grids have
    /// different sizes.
    #[allow(clippy::cast_precision_loss)]
    pub fn is_match(
        &self,
        other: &Self,
        similarity_threshold: f32,
    ) -> Result<bool, CompareError> {
        if self.thumbnail_size != other.thumbnail_size {
            return Err(CompareError::ThumbnailSizeMismatch {
                this: self.thumbnail_size,
                other: other.thumbnail_size,
            });
        }

        let margin = 1.0 - similarity_threshold;
        let this_ratio = self.aspect_ratio();
        let other_ratio = other.aspect_ratio();
        if !within_margin(this_ratio, other_ratio, margin)
            || !within_margin(other_ratio, this_ratio, margin)
        {
            return Ok(false);
        }

        let total = (self.thumbnail_size * self.thumbnail_size) as usize;
        let agree = self
            .bits
            .iter()
            .zip(&other.bits)
            .filter(|(a, b)| a == b)
            .count();
        Ok(agree as f32 / total as f32 >= similarity_threshold)
    }
}

fn within_margin(ratio: f32, reference: f32, margin: f32) -> bool {
    ratio >= reference * (1.0 - margin) && ratio <= reference * (1.0 + margin)
}

//! The duplicate cache: fingerprints of everything stored so far.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::StreamExt;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;
use walkdir::WalkDir;

use crate::image_ext::is_image_extension;

use super::fingerprint::{
    CompareError, FingerprintError, ImageFingerprint, fingerprint_image,
};

/// Errors from duplicate-cache operations.
///
/// Expected outcomes of [`DuplicateCache::try_store`] (duplicate, too
/// small, already saved) are not errors; they are [`StoreOutcome`]
/// rejections.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The image bytes could not be fingerprinted.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Two fingerprints of different grid sizes were compared.
    #[error(transparent)]
    Compare(#[from] CompareError),

    /// A filesystem operation failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Why [`DuplicateCache::try_store`] declined an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The image is smaller than the caller's minimums.
    BelowMinimumSize {
        /// The image's width.
        width: u32,
        /// The image's height.
        height: u32,
        /// The required minimum width.
        min_width: u32,
        /// The required minimum height.
        min_height: u32,
    },

    /// The target file is already saved or already cached.
    FileExists {
        /// The conflicting path.
        path: PathBuf,
    },

    /// The image is a near-duplicate of a cached entry.
    Duplicate {
        /// The stored file it duplicates.
        of: PathBuf,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimumSize {
                width,
                height,
                min_width,
                min_height,
            } => write!(
                f,
                "image is {width}x{height}, below the {min_width}x{min_height} minimum"
            ),
            Self::FileExists { path } => write!(f, "file already exists: {}", path.display()),
            Self::Duplicate { of } => write!(f, "near-duplicate of {}", of.display()),
        }
    }
}

/// Result of a [`DuplicateCache::try_store`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The fingerprint was inserted; the image is worth saving.
    Stored,
    /// The image was declined for a normal, expected reason.
    Rejected(RejectReason),
}

impl StoreOutcome {
    /// Returns true if the image was accepted.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

#[derive(Debug)]
struct CacheEntry {
    fingerprint: ImageFingerprint,
    seq: u64,
}

/// Fingerprint cache keyed by stored-file path.
///
/// Every entry's grid size equals the cache-wide configured thumbnail size
/// by construction, so comparisons inside the cache can never mismatch.
///
/// `try_store` may run concurrently for different target paths; the entry
/// discipline guarantees at most one insert per path. The offline sweep
/// [`scan_and_remove_duplicates`](Self::scan_and_remove_duplicates) takes
/// `&mut self` and therefore excludes all concurrent use while it mutates
/// the entry set.
#[derive(Debug)]
pub struct DuplicateCache {
    thumbnail_size: u32,
    similarity_threshold: f32,
    entries: DashMap<PathBuf, CacheEntry>,
    next_seq: AtomicU64,
    images_checked: AtomicUsize,
    interrupt: Arc<AtomicBool>,
}

impl DuplicateCache {
    /// Creates an empty cache.
    ///
    /// `thumbnail_size` fixes the fingerprint grid for the cache's
    /// lifetime; `similarity_threshold` is the bit-agreement fraction
    /// [`try_store`](Self::try_store) uses for inline rejection.
    #[must_use]
    pub fn new(thumbnail_size: u32, similarity_threshold: f32) -> Self {
        Self {
            thumbnail_size: thumbnail_size.max(1),
            similarity_threshold,
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            images_checked: AtomicUsize::new(0),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Installs a shared interrupt flag, observed between fingerprint
    /// computations in batch operations.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// The cache-wide fingerprint grid size.
    #[must_use]
    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
    }

    /// The bit-agreement fraction used for inline duplicate rejection.
    #[must_use]
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// How many fingerprints are currently stored.
    #[must_use]
    pub fn stored_images(&self) -> usize {
        self.entries.len()
    }

    /// How many images have been checked for duplicates so far.
    #[must_use]
    pub fn images_checked(&self) -> usize {
        self.images_checked.load(Ordering::SeqCst)
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a fingerprint is cached for the path.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Drops the entry for a path whose backing file was deleted.
    ///
    /// Returns true if an entry was removed.
    pub fn evict(&self, path: &Path) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            debug!(path = %path.display(), "fingerprint evicted");
        }
        removed
    }

    /// Decides whether an image should be saved, and caches it if so.
    ///
    /// Rejections, in check order: the image is smaller than the minimums,
    /// the target file already exists (on disk or as a cache key), or the
    /// image near-duplicates a cached entry under the configured
    /// similarity threshold. On acceptance the fingerprint is inserted
    /// keyed by `target_file`.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Fingerprint`] when the bytes are not a
    /// decodable image.
    #[instrument(skip(self, source, bytes), fields(file = %target_file.display()))]
    pub fn try_store(
        &self,
        source: &Url,
        target_file: &Path,
        bytes: &[u8],
        min_width: u32,
        min_height: u32,
    ) -> Result<StoreOutcome, DedupError> {
        self.images_checked.fetch_add(1, Ordering::SeqCst);

        let image = image::load_from_memory(bytes).map_err(FingerprintError::Decode)?;
        let (width, height) = (image.width(), image.height());
        if width < min_width || height < min_height {
            info!(width, height, min_width, min_height, "rejected undersized image");
            return Ok(StoreOutcome::Rejected(RejectReason::BelowMinimumSize {
                width,
                height,
                min_width,
                min_height,
            }));
        }

        if target_file.exists() {
            info!("rejected image: file already saved");
            return Ok(StoreOutcome::Rejected(RejectReason::FileExists {
                path: target_file.to_path_buf(),
            }));
        }

        let bits = fingerprint_image(&image, self.thumbnail_size)?;
        let fingerprint = ImageFingerprint::new(
            source.clone(),
            target_file.to_path_buf(),
            width,
            height,
            bits,
        );

        if let Some(existing) = self.find_match(&fingerprint, self.similarity_threshold)? {
            info!(of = %existing.display(), "rejected near-duplicate");
            return Ok(StoreOutcome::Rejected(RejectReason::Duplicate {
                of: existing,
            }));
        }

        match self.entries.entry(target_file.to_path_buf()) {
            Entry::Occupied(_) => Ok(StoreOutcome::Rejected(RejectReason::FileExists {
                path: target_file.to_path_buf(),
            })),
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    fingerprint,
                    seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                });
                debug!("fingerprint stored");
                Ok(StoreOutcome::Stored)
            }
        }
    }

    /// Returns the stored file a fingerprint duplicates, if any, under the
    /// configured similarity threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Compare`] when the fingerprint's grid size
    /// differs from the cache's.
    pub fn is_duplicate(
        &self,
        fingerprint: &ImageFingerprint,
    ) -> Result<Option<PathBuf>, DedupError> {
        self.find_match(fingerprint, self.similarity_threshold)
    }

    fn find_match(
        &self,
        fingerprint: &ImageFingerprint,
        threshold: f32,
    ) -> Result<Option<PathBuf>, DedupError> {
        for entry in &self.entries {
            if entry.value().fingerprint.is_match(fingerprint, threshold)? {
                return Ok(Some(entry.key().clone()));
            }
        }
        Ok(None)
    }

    /// Pairwise-compares every cached fingerprint and removes duplicates.
    ///
    /// Of each matching pair, the later-inserted entry is dropped from the
    /// cache and its backing file deleted. Intended as an offline sweep to
    /// catch duplicates stored before a too-similar counterpart existed or
    /// under a different threshold; running it twice with the same
    /// threshold removes nothing the second time.
    ///
    /// Takes `&mut self`: the sweep mutates the entry set while iterating
    /// and must not race concurrent stores.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Compare`] if mismatched grid sizes are found,
    /// which would indicate entries created outside this cache.
    #[instrument(skip(self))]
    pub fn scan_and_remove_duplicates(
        &mut self,
        similarity_threshold: f32,
    ) -> Result<Vec<PathBuf>, DedupError> {
        let mut snapshot: Vec<(u64, PathBuf, ImageFingerprint)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.value().seq,
                    entry.key().clone(),
                    entry.value().fingerprint.clone(),
                )
            })
            .collect();
        snapshot.sort_by_key(|(seq, _, _)| *seq);

        let mut dead = vec![false; snapshot.len()];
        for i in 0..snapshot.len() {
            if dead[i] {
                continue;
            }
            if self.interrupt.load(Ordering::SeqCst) {
                warn!("duplicate sweep interrupted; removals so far are kept");
                break;
            }
            for j in (i + 1)..snapshot.len() {
                if dead[j] {
                    continue;
                }
                if snapshot[i].2.is_match(&snapshot[j].2, similarity_threshold)? {
                    dead[j] = true;
                }
            }
        }

        let mut removed = Vec::new();
        for (index, (_, path, _)) in snapshot.iter().enumerate() {
            if !dead[index] {
                continue;
            }
            self.entries.remove(path);
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "could not delete duplicate file");
                }
            }
            info!(path = %path.display(), "removed duplicate");
            removed.push(path.clone());
        }
        Ok(removed)
    }

    /// Walks already-saved images under `directory` and caches their
    /// fingerprints without network traffic, so duplicate detection spans
    /// prior runs.
    ///
    /// Fingerprinting is CPU-bound and runs on a bounded pool of blocking
    /// workers sized by `concurrency_hint`. Unreadable or undecodable
    /// files are skipped with a warning. An interrupt leaves the cache
    /// partially populated rather than empty.
    ///
    /// Returns how many files were newly cached.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Io`] when the directory itself cannot be
    /// resolved.
    #[instrument(skip(self), fields(dir = %directory.display()))]
    pub async fn cache_existing_files(
        &self,
        directory: &Path,
        concurrency_hint: usize,
    ) -> Result<usize, DedupError> {
        let root = directory.canonicalize().map_err(|source| DedupError::Io {
            path: directory.to_path_buf(),
            source,
        })?;

        let files: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(is_image_extension)
            })
            .map(walkdir::DirEntry::into_path)
            .collect();
        info!(files = files.len(), "caching saved files");

        let thumbnail_size = self.thumbnail_size;
        let mut results = futures_util::stream::iter(files.into_iter().map(|path| {
            let interrupt = Arc::clone(&self.interrupt);
            async move {
                if interrupt.load(Ordering::SeqCst) {
                    return None;
                }
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        warn!(path = %path.display(), error = %error, "could not read saved file");
                        return None;
                    }
                };
                let task = tokio::task::spawn_blocking(
                    move || -> Result<(u32, u32, Vec<bool>), FingerprintError> {
                        let image = image::load_from_memory(&bytes)?;
                        let bits = fingerprint_image(&image, thumbnail_size)?;
                        Ok((image.width(), image.height(), bits))
                    },
                );
                match task.await {
                    Ok(Ok((width, height, bits))) => Some((path, width, height, bits)),
                    Ok(Err(error)) => {
                        warn!(path = %path.display(), error = %error, "could not fingerprint saved file");
                        None
                    }
                    Err(error) => {
                        warn!(path = %path.display(), error = %error, "fingerprint task failed");
                        None
                    }
                }
            }
        }))
        .buffer_unordered(concurrency_hint.max(1));

        let mut cached = 0_usize;
        while let Some(item) = results.next().await {
            if self.interrupt.load(Ordering::SeqCst) {
                warn!(cached, "caching interrupted; keeping partial cache");
                break;
            }
            let Some((path, width, height, bits)) = item else {
                continue;
            };
            let Ok(source) = Url::from_file_path(&path) else {
                warn!(path = %path.display(), "path has no file URL form; skipping");
                continue;
            };
            let fingerprint = ImageFingerprint::new(source, path.clone(), width, height, bits);
            if let Entry::Vacant(slot) = self.entries.entry(path) {
                slot.insert(CacheEntry {
                    fingerprint,
                    seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                });
                cached += 1;
            }
        }
        info!(cached, "saved files cached");
        Ok(cached)
    }
}

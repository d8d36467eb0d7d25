//! Integration tests for the duplicate cache against real files.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use imagepull_core::dedup::{DuplicateCache, RejectReason, StoreOutcome};
use tempfile::TempDir;
use url::Url;

fn png_bytes(width: u32, height: u32, shade: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let img = image::GrayImage::from_fn(width, height, |x, y| image::Luma([shade(x, y)]));
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn half_and_half(width: u32, height: u32) -> Vec<u8> {
    png_bytes(width, height, |x, _| if x < width / 2 { 0 } else { 255 })
}

/// Like [`half_and_half`] but with a white band on top; differs in a few
/// fingerprint cells, enough to pass a 1.0 threshold and fail a 0.9 one.
fn banded(width: u32, height: u32) -> Vec<u8> {
    png_bytes(width, height, |x, y| {
        if y < height / 8 {
            255
        } else if x < width / 2 {
            0
        } else {
            255
        }
    })
}

fn source(id: &str) -> Url {
    Url::parse(&format!("https://posts.example/{id}")).unwrap()
}

#[tokio::test]
async fn test_cache_existing_files_spans_prior_runs() {
    let dir = TempDir::new().unwrap();
    let saved = dir.path().join("saved.png");
    std::fs::write(&saved, half_and_half(400, 300)).unwrap();

    // A fresh cache, as at process start, learns the saved corpus from disk.
    let cache = DuplicateCache::new(16, 0.95);
    let cached = cache.cache_existing_files(dir.path(), 4).await.unwrap();
    assert_eq!(cached, 1);
    assert_eq!(cache.stored_images(), 1);

    // The same image arriving again from the network is now rejected.
    let outcome = cache
        .try_store(
            &source("1"),
            &dir.path().join("incoming.png"),
            &half_and_half(400, 300),
            0,
            0,
        )
        .unwrap();
    assert!(
        matches!(
            outcome,
            StoreOutcome::Rejected(RejectReason::Duplicate { .. })
        ),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn test_cache_existing_files_skips_non_images_and_garbage() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
    std::fs::write(dir.path().join("broken.png"), b"truncated junk").unwrap();
    std::fs::write(dir.path().join("good.png"), half_and_half(200, 200)).unwrap();

    let cache = DuplicateCache::new(16, 0.95);
    let cached = cache.cache_existing_files(dir.path(), 2).await.unwrap();
    assert_eq!(cached, 1, "only the decodable image is cached");
}

#[tokio::test]
async fn test_cache_existing_files_walks_subdirectories() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("2026").join("08");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("a.png"), half_and_half(200, 200)).unwrap();
    std::fs::write(dir.path().join("b.jpg"), banded(200, 200)).unwrap();

    let cache = DuplicateCache::new(16, 1.0);
    let cached = cache.cache_existing_files(dir.path(), 8).await.unwrap();
    assert_eq!(cached, 2);
}

#[tokio::test]
async fn test_missing_directory_is_an_io_error() {
    let cache = DuplicateCache::new(16, 0.95);
    let result = cache
        .cache_existing_files(Path::new("/definitely/not/here"), 2)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_preset_interrupt_leaves_cache_unpopulated_but_ok() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.png"), half_and_half(200, 200)).unwrap();

    let interrupt = Arc::new(AtomicBool::new(true));
    let cache = DuplicateCache::new(16, 0.95).with_interrupt(interrupt);
    let cached = cache.cache_existing_files(dir.path(), 2).await.unwrap();
    assert_eq!(cached, 0, "interrupted run keeps whatever it got so far");
}

#[tokio::test]
async fn test_sweep_deletes_the_duplicate_file_from_disk() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.png");
    let second = dir.path().join("second.png");
    std::fs::write(&first, half_and_half(320, 240)).unwrap();
    std::fs::write(&second, banded(320, 240)).unwrap();

    // Threshold 1.0 lets both near-identical images into the cache.
    let mut cache = DuplicateCache::new(8, 1.0);
    cache.cache_existing_files(dir.path(), 2).await.unwrap();
    assert_eq!(cache.stored_images(), 2);

    let removed = cache.scan_and_remove_duplicates(0.9).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(cache.stored_images(), 1);

    let survivors: Vec<bool> = vec![first.exists(), second.exists()];
    assert_eq!(
        survivors.iter().filter(|kept| **kept).count(),
        1,
        "exactly one backing file must remain"
    );
}

#[tokio::test]
async fn test_sweep_twice_removes_nothing_more() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("first.png"), half_and_half(320, 240)).unwrap();
    std::fs::write(dir.path().join("second.png"), banded(320, 240)).unwrap();

    let mut cache = DuplicateCache::new(8, 1.0);
    cache.cache_existing_files(dir.path(), 2).await.unwrap();

    let first_pass = cache.scan_and_remove_duplicates(0.9).unwrap();
    assert_eq!(first_pass.len(), 1);
    let second_pass = cache.scan_and_remove_duplicates(0.9).unwrap();
    assert!(second_pass.is_empty());
}

#[tokio::test]
async fn test_store_then_evict_then_store_again() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("kept.png");

    let cache = DuplicateCache::new(16, 0.95);
    let outcome = cache
        .try_store(&source("1"), &target, &half_and_half(400, 300), 0, 0)
        .unwrap();
    assert_eq!(outcome, StoreOutcome::Stored);

    // Simulate the user deleting the file out from under us.
    assert!(cache.evict(&target));
    let outcome = cache
        .try_store(&source("1"), &target, &half_and_half(400, 300), 0, 0)
        .unwrap();
    assert_eq!(outcome, StoreOutcome::Stored);
}

#[tokio::test]
async fn test_try_store_rejects_when_target_file_is_on_disk() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("already-there.png");
    std::fs::write(&target, half_and_half(400, 300)).unwrap();

    let cache = DuplicateCache::new(16, 0.95);
    let outcome = cache
        .try_store(&source("1"), &target, &banded(400, 300), 0, 0)
        .unwrap();
    assert!(
        matches!(
            outcome,
            StoreOutcome::Rejected(RejectReason::FileExists { .. })
        ),
        "{outcome:?}"
    );
}

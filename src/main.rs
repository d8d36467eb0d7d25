//! CLI entry point for the imagepull tool.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use imagepull_core::{
    DirectLinkResolver, DuplicateCache, FetchClient, ResolveOutcome, ResolverRegistry,
};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};
use url::Url;

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    match args.command {
        Command::Dedupe {
            directory,
            threshold,
            thumbnail_size,
            concurrency,
        } => run_dedupe(&directory, threshold, thumbnail_size, usize::from(concurrency)).await,
        Command::Resolve { url } => run_resolve(&url).await,
    }
}

/// Fingerprints every saved image under `directory`, then sweeps the cache
/// for near-duplicates and deletes them from disk.
async fn run_dedupe(
    directory: &Path,
    threshold: f32,
    thumbnail_size: u32,
    concurrency: usize,
) -> Result<()> {
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing current work");
                interrupt.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut cache =
        DuplicateCache::new(thumbnail_size, threshold).with_interrupt(Arc::clone(&interrupt));

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("fingerprinting saved images...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let cached = cache
        .cache_existing_files(directory, concurrency)
        .await
        .with_context(|| format!("could not cache images under {}", directory.display()))?;
    spinner.finish_with_message(format!("fingerprinted {cached} images"));

    if interrupt.load(Ordering::SeqCst) {
        info!("skipping duplicate sweep after interrupt");
        return Ok(());
    }

    let removed = cache
        .scan_and_remove_duplicates(threshold)
        .context("duplicate sweep failed")?;
    if removed.is_empty() {
        println!(
            "No duplicates among {} fingerprinted images.",
            cache.stored_images()
        );
    } else {
        println!("Removed {} duplicate(s):", removed.len());
        for path in &removed {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

/// Resolves one URL through the registry and prints the image locations.
async fn run_resolve(url: &str) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;

    let mut registry = ResolverRegistry::new();
    registry.register(Box::new(DirectLinkResolver::new()));

    let client = FetchClient::new();
    match registry.resolve(&client, &url).await? {
        ResolveOutcome::Images(set) => {
            for image in set.image_urls() {
                println!("{image}");
            }
        }
        ResolveOutcome::NotFound { url } => println!("Nothing found behind {url}"),
        ResolveOutcome::UnknownSource { url } => println!("No registered resolver claims {url}"),
    }
    Ok(())
}

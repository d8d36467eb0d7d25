//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use imagepull_core::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_THUMBNAIL_SIZE};

/// Gather, filter and deduplicate images from paginated remote sources.
///
/// Imagepull keeps collections of downloaded images free of exact and
/// near-duplicate copies, and resolves source URLs to direct image
/// locations through its resolver registry.
#[derive(Parser, Debug)]
#[command(name = "imagepull")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fingerprint saved images in a directory and delete near-duplicates
    Dedupe {
        /// Directory holding previously saved images
        directory: PathBuf,

        /// Fraction of fingerprint bits that must agree for a duplicate (0.0-1.0)
        #[arg(short = 't', long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f32,

        /// Fingerprint grid side length; bigger is more accurate but slower
        #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE)]
        thumbnail_size: u32,

        /// Concurrent fingerprint workers (1-64)
        #[arg(short = 'c', long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=64))]
        concurrency: u8,
    },

    /// Resolve a source URL to its direct image locations
    Resolve {
        /// The URL to resolve
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_dedupe_defaults_parse() {
        let args = Args::try_parse_from(["imagepull", "dedupe", "./images"]).unwrap();
        match args.command {
            Command::Dedupe {
                directory,
                threshold,
                thumbnail_size,
                concurrency,
            } => {
                assert_eq!(directory, PathBuf::from("./images"));
                assert!((threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < f32::EPSILON);
                assert_eq!(thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
                assert_eq!(concurrency, 4);
            }
            Command::Resolve { .. } => panic!("expected dedupe"),
        }
    }

    #[test]
    fn test_cli_dedupe_custom_threshold() {
        let args =
            Args::try_parse_from(["imagepull", "dedupe", "./images", "--threshold", "0.9"])
                .unwrap();
        match args.command {
            Command::Dedupe { threshold, .. } => {
                assert!((threshold - 0.9).abs() < f32::EPSILON);
            }
            Command::Resolve { .. } => panic!("expected dedupe"),
        }
    }

    #[test]
    fn test_cli_concurrency_range_is_enforced() {
        let result =
            Args::try_parse_from(["imagepull", "dedupe", "./images", "--concurrency", "65"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_resolve_takes_a_url() {
        let args =
            Args::try_parse_from(["imagepull", "resolve", "https://cdn.example.com/a.png"])
                .unwrap();
        match args.command {
            Command::Resolve { url } => assert_eq!(url, "https://cdn.example.com/a.png"),
            Command::Dedupe { .. } => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["imagepull", "-vv", "resolve", "x"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_requires_a_subcommand() {
        let result = Args::try_parse_from(["imagepull"]);
        assert!(result.is_err());
    }
}

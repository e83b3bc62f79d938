//! Vector library build binary.
//!
//! Streams a fastText-style `.vec` corpus (local path or URL, optionally
//! gzipped) into a sharded, quantized vector library.
//!
//! Usage:
//! ```bash
//! cargo run --release --bin build-vector-library -- \
//!   https://dl.fbaipublicfiles.com/fasttext/vectors-crawl/cc.en.300.vec.gz ./en-library
//! ```

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use veclib::{BuildConfig, LibraryBuilder, NormalizeMode};

#[derive(Debug, Parser)]
#[command(name = "build-vector-library", version, about)]
struct Args {
    /// Corpus path or http(s) URL; `.gz` sources are decompressed on the fly.
    source: String,

    /// Output directory for shard files and info.json.
    output: PathBuf,

    /// Number of hash bits used to pick a shard.
    #[arg(long, env = "VECLIB_SHARD_BITS", default_value_t = veclib::config::DEFAULT_SHARD_BITS)]
    shard_bits: u32,

    /// Maximum number of distinct words to store.
    #[arg(long, env = "VECLIB_MAX_ENTRIES", default_value_t = veclib::config::DEFAULT_MAX_ENTRIES)]
    max_entries: u64,

    /// Bits per quantized component (1-16).
    #[arg(long, env = "VECLIB_RESOLUTION_BITS", default_value_t = veclib::quantize::DEFAULT_RESOLUTION_BITS)]
    resolution_bits: u8,

    /// Keep single uppercase letters and digits as-is instead of lowercasing them.
    #[arg(long, env = "VECLIB_PRESERVE_SINGLE_UPPER")]
    preserve_single_upper: bool,

    /// Shard files written concurrently.
    #[arg(long, env = "VECLIB_FLUSH_CONCURRENCY", default_value_t = veclib::config::DEFAULT_FLUSH_CONCURRENCY)]
    flush_concurrency: usize,

    /// Hide the progress bar.
    #[arg(long)]
    quiet: bool,
}

impl Args {
    fn build_config(&self) -> BuildConfig {
        let normalization = if self.preserve_single_upper {
            NormalizeMode::PreserveSingleUpper
        } else {
            NormalizeMode::LowercaseAll
        };
        BuildConfig::default()
            .with_shard_bits(self.shard_bits)
            .with_max_entries(self.max_entries)
            .with_resolution_bits(self.resolution_bits)
            .with_normalization(normalization)
            .with_flush_concurrency(self.flush_concurrency)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.build_config();
    config.validate()?;

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, {eta} left) {msg}",
            )?
            .progress_chars("#>-"),
        );
        pb
    };

    let store = veclib::local(&args.output)?;
    let report = LibraryBuilder::new(config)
        .with_progress(pb)
        .build_from(&args.source, &store, "")
        .await?;

    println!("Vector library build complete!");
    println!("  entries:       {}", report.metadata.entry_count);
    println!("  vector size:   {}", report.metadata.vector_size);
    println!("  shard files:   {}", report.shard_files);
    println!("  skipped lines: {}", report.skipped_lines);
    println!("  duplicates:    {}", report.duplicates);
    if report.cap_reached {
        println!("  stopped at the entry cap");
    }
    if report.truncated {
        println!("  input ended early; partial corpus ingested");
    }
    println!("  location:      {}", args.output.display());

    Ok(())
}

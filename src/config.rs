//! Build configuration.

use crate::error::IndexError;
use crate::quantize::{Quantizer, DEFAULT_RESOLUTION_BITS};
use crate::shard::MAX_SHARD_BITS;
use crate::types::NormalizeMode;

/// Default number of bucket bits (8192 shards).
pub const DEFAULT_SHARD_BITS: u32 = 13;

/// Default cap on distinct words per library.
pub const DEFAULT_MAX_ENTRIES: u64 = 500_000;

/// Default number of shard files written concurrently.
pub const DEFAULT_FLUSH_CONCURRENCY: usize = 16;

/// Parameters for one library build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Number of leading hash bits used to pick a shard.
    pub shard_bits: u32,
    /// Maximum number of distinct words to ingest.
    pub max_entries: u64,
    /// Bits per quantized component.
    pub resolution_bits: u8,
    /// Word normalization rule.
    pub normalization: NormalizeMode,
    /// Shard files written in parallel during publish.
    pub flush_concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            shard_bits: DEFAULT_SHARD_BITS,
            max_entries: DEFAULT_MAX_ENTRIES,
            resolution_bits: DEFAULT_RESOLUTION_BITS,
            normalization: NormalizeMode::default(),
            flush_concurrency: DEFAULT_FLUSH_CONCURRENCY,
        }
    }
}

impl BuildConfig {
    pub fn with_shard_bits(mut self, shard_bits: u32) -> Self {
        self.shard_bits = shard_bits;
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_resolution_bits(mut self, bits: u8) -> Self {
        self.resolution_bits = bits;
        self
    }

    pub fn with_normalization(mut self, mode: NormalizeMode) -> Self {
        self.normalization = mode;
        self
    }

    pub fn with_flush_concurrency(mut self, n: usize) -> Self {
        self.flush_concurrency = n;
        self
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.shard_bits > MAX_SHARD_BITS {
            return Err(IndexError::InvalidConfig(format!(
                "shard bits must be at most {}, got {}",
                MAX_SHARD_BITS, self.shard_bits
            )));
        }
        if self.flush_concurrency == 0 {
            return Err(IndexError::InvalidConfig(
                "flush concurrency must be at least 1".to_string(),
            ));
        }
        Quantizer::new(self.resolution_bits)?;
        Ok(())
    }
}

//! Core types shared by the builder and the reader.

use serde::{Deserialize, Serialize};

/// Current on-disk format version.
///
/// Version 5: SHA-256 of the normalized word, leading `shardBits` bits select
/// the bucket, entries are three LEB128 length-prefixed frames.
pub const FORMAT_VERSION: u32 = 5;

/// Name of the metadata object at the library root.
pub const METADATA_FILE: &str = "info.json";

/// Extension used for shard files.
pub const SHARD_EXTENSION: &str = "lps";

/// How raw word tokens are canonicalized into lookup keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizeMode {
    /// Trim and lowercase every token.
    ///
    /// Matches version 5 libraries written before the mode was recorded.
    #[default]
    LowercaseAll,
    /// Trim, keep a single `A-Z` / `0-9` token verbatim, lowercase the rest.
    PreserveSingleUpper,
}

/// One word's persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Normalized word.
    pub word: String,
    /// Largest absolute component of the source vector.
    pub scale: f32,
    /// Quantized components, each below `2^resolution_bits`.
    pub codes: Vec<u16>,
}

/// Library metadata, stored as `info.json`.
///
/// Aliases accept the shorter key names written by older builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(alias = "version")]
    pub format_version: u32,
    pub shard_bits: u32,
    #[serde(alias = "entries")]
    pub entry_count: u64,
    pub vector_size: usize,
    #[serde(alias = "source")]
    pub source_descriptor: String,
    #[serde(alias = "built")]
    pub build_timestamp: String,
    #[serde(default = "default_resolution_bits")]
    pub resolution_bits: u8,
    #[serde(default)]
    pub normalization: NormalizeMode,
}

fn default_resolution_bits() -> u8 {
    8
}

impl Metadata {
    /// Number of buckets in this library.
    pub fn shard_count(&self) -> u64 {
        crate::shard::shard_count(self.shard_bits)
    }
}

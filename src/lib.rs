//! veclib - Build and query compact, sharded word-embedding libraries.
//!
//! A text corpus of word vectors (`word c1 c2 ... cN` per line) is turned
//! into a directory of small shard files:
//! - **Normalization**: each word is trimmed and lowercased into a lookup key
//! - **Sharding**: the leading bits of the key's SHA-256 pick one of
//!   `2^shard_bits` shard files
//! - **Quantization**: each vector is stored as a scale plus low-bit codes
//! - **Framing**: entries are three LEB128 length-prefixed frames
//!
//! Lookups recompute the shard for a word, scan that one file, and
//! reconstruct an approximate vector. There is no similarity search.

pub mod builder;
pub mod config;
pub mod corpus;
pub mod error;
pub mod frame;
pub mod normalize;
pub mod object_store;
pub mod quantize;
pub mod reader;
pub mod shard;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use builder::{build, BuildReport, IngestOutcome, LibraryBuilder, ShardBuilder};
pub use config::BuildConfig;
pub use corpus::LineSource;
pub use error::{CorpusError, Error, IndexError, Result, ShardError};
pub use normalize::normalize;
pub use quantize::{Quantized, Quantizer};
pub use reader::{lookup, LibraryReader};
pub use shard::bucket_of;
pub use storage::{BlobStore, StorageError, StorageResult};
pub use types::{Entry, Metadata, NormalizeMode, FORMAT_VERSION};

// Re-export convenience functions
pub use crate::object_store::local;

//! Library reader: single-word lookups against a built library.

use crate::error::{Result, ShardError};
use crate::frame::{EntryFrames, FrameError};
use crate::normalize::normalize;
use crate::object_store::local;
use crate::quantize::Quantizer;
use crate::shard::{bucket_of, shard_file_name, MAX_SHARD_BITS};
use crate::storage::{object_path, BlobStore, StorageError};
use crate::types::{Entry, Metadata, FORMAT_VERSION, METADATA_FILE};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Read-only handle on a library.
///
/// Loads `info.json` once; every lookup then reads a single shard. Shards are
/// immutable, so any number of lookups may run concurrently.
pub struct LibraryReader {
    /// Storage backend.
    store: Arc<dyn BlobStore>,
    /// Library prefix in storage.
    prefix: String,
    metadata: Metadata,
    quantizer: Quantizer,
}

impl LibraryReader {
    /// Open a library from storage.
    pub async fn open(store: Arc<dyn BlobStore>, prefix: &str) -> Result<Self> {
        let info = store.get(&object_path(prefix, METADATA_FILE)).await?;
        let metadata: Metadata = serde_json::from_slice(&info)?;

        if metadata.format_version != FORMAT_VERSION {
            return Err(ShardError::UnsupportedVersion(metadata.format_version).into());
        }
        if metadata.shard_bits > MAX_SHARD_BITS {
            return Err(ShardError::corrupt(
                METADATA_FILE,
                format!("shard bits {} out of range", metadata.shard_bits),
            )
            .into());
        }
        let quantizer = Quantizer::new(metadata.resolution_bits)
            .map_err(|e| ShardError::corrupt(METADATA_FILE, e.to_string()))?;

        Ok(Self {
            store,
            prefix: prefix.to_string(),
            metadata,
            quantizer,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of words in the library.
    pub fn entry_count(&self) -> u64 {
        self.metadata.entry_count
    }

    /// Bucket a (raw, unnormalized) word belongs to.
    pub fn bucket_for(&self, word: &str) -> u32 {
        bucket_of(
            &normalize(word, self.metadata.normalization),
            self.metadata.shard_bits,
        )
    }

    /// Fetch the stored entry for `word`.
    ///
    /// Returns `Ok(None)` when the word, or its whole shard, is absent, and
    /// [`ShardError::Corrupt`] when the shard cannot be decoded up to the match.
    pub async fn get(&self, word: &str) -> Result<Option<Entry>> {
        let key = normalize(word, self.metadata.normalization);
        let bucket = bucket_of(&key, self.metadata.shard_bits);
        let path = object_path(&self.prefix, &shard_file_name(bucket));

        let data = match self.store.get(&path).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => {
                debug!(bucket, "no shard for bucket");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        find_entry(&data, &key, &self.quantizer, self.metadata.vector_size)
            .map_err(|e| ShardError::corrupt(path, e.to_string()).into())
    }

    /// Look up `word` and reconstruct its vector.
    pub async fn lookup(&self, word: &str) -> Result<Option<Vec<f64>>> {
        Ok(self.get(word).await?.map(|entry| self.reconstruct(&entry)))
    }

    /// Dequantize an entry read from this library.
    pub fn reconstruct(&self, entry: &Entry) -> Vec<f64> {
        self.quantizer.dequantize(&entry.codes, entry.scale)
    }
}

/// Scan a shard for `key`, stopping at the first match.
pub fn find_entry(
    shard: &[u8],
    key: &str,
    quantizer: &Quantizer,
    vector_size: usize,
) -> std::result::Result<Option<Entry>, FrameError> {
    for raw in EntryFrames::new(shard) {
        let raw = raw?;
        if raw.word == key.as_bytes() {
            return raw.decode(quantizer, vector_size).map(Some);
        }
    }
    Ok(None)
}

/// Look up one word in the library stored in the local directory `dir`.
pub async fn lookup(dir: impl Into<PathBuf>, word: &str) -> Result<Option<Vec<f64>>> {
    let dir = dir.into();
    if !dir.is_dir() {
        return Err(StorageError::NotFound(dir.display().to_string()).into());
    }
    let reader = LibraryReader::open(Arc::new(local(dir)?), "").await?;
    reader.lookup(word).await
}

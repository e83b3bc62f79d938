//! Library builder: turns a corpus into shard files plus `info.json`.
//!
//! [`ShardBuilder`] holds the in-memory state of one build (per-bucket
//! buffers and the global seen-set). [`LibraryBuilder`] drives it from a
//! [`LineSource`] and publishes the result to a [`BlobStore`]. Nothing is
//! written until ingestion has finished, and `info.json` goes last, so a
//! library is never visible half-built.

use crate::config::BuildConfig;
use crate::corpus::{self, LineSource};
use crate::error::{CorpusError, IndexError, Result};
use crate::frame::encode_entry;
use crate::normalize::normalize;
use crate::object_store::local;
use crate::quantize::Quantizer;
use crate::shard::{bucket_of, shard_file_name};
use crate::storage::{object_path, BlobStore};
use crate::types::{Entry, Metadata, NormalizeMode, FORMAT_VERSION, METADATA_FILE};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What happened to one ingested word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored in the given bucket.
    Added { bucket: u32 },
    /// The normalized word was already stored; the line was dropped.
    Duplicate,
    /// The entry cap is reached; the caller should stop reading input.
    CapReached,
}

/// Output of [`ShardBuilder::finish`].
#[derive(Debug)]
pub struct FinishedShards {
    /// Metadata with the final `entry_count`.
    pub metadata: Metadata,
    /// Encoded bytes of every non-empty bucket.
    pub shards: BTreeMap<u32, Vec<u8>>,
}

/// In-memory accumulator for one build: `new -> ingest* -> finish`.
pub struct ShardBuilder {
    metadata: Metadata,
    max_entries: u64,
    normalization: NormalizeMode,
    quantizer: Quantizer,
    seen: HashSet<String>,
    buffers: HashMap<u32, Vec<u8>>,
    entry_count: u64,
}

impl ShardBuilder {
    /// Start a build for vectors of `vector_size` components.
    pub fn new(
        config: &BuildConfig,
        vector_size: usize,
        source_descriptor: impl Into<String>,
    ) -> std::result::Result<Self, IndexError> {
        config.validate()?;
        let quantizer = Quantizer::new(config.resolution_bits)?;

        let metadata = Metadata {
            format_version: FORMAT_VERSION,
            shard_bits: config.shard_bits,
            entry_count: 0,
            vector_size,
            source_descriptor: source_descriptor.into(),
            build_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            resolution_bits: config.resolution_bits,
            normalization: config.normalization,
        };

        Ok(Self {
            metadata,
            max_entries: config.max_entries,
            normalization: config.normalization,
            quantizer,
            seen: HashSet::new(),
            buffers: HashMap::new(),
            entry_count: 0,
        })
    }

    /// Add one word's vector.
    ///
    /// Vectors of the wrong length or with non-finite components are
    /// rejected without touching the seen-set, so a later valid line for the
    /// same word can still be stored.
    pub fn ingest(
        &mut self,
        word: &str,
        components: &[f64],
    ) -> std::result::Result<IngestOutcome, IndexError> {
        if self.is_full() {
            return Ok(IngestOutcome::CapReached);
        }
        if components.len() != self.metadata.vector_size {
            return Err(IndexError::DimensionMismatch {
                expected: self.metadata.vector_size,
                got: components.len(),
            });
        }

        let word = normalize(word, self.normalization);
        if self.seen.contains(&word) {
            return Ok(IngestOutcome::Duplicate);
        }

        let quantized = self.quantizer.quantize(components);
        if !quantized.scale.is_finite() || components.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::NonFinite(word));
        }

        let bucket = bucket_of(&word, self.metadata.shard_bits);
        let entry = Entry {
            word,
            scale: quantized.scale,
            codes: quantized.codes,
        };
        encode_entry(
            &entry,
            &self.quantizer,
            self.buffers.entry(bucket).or_default(),
        );
        self.seen.insert(entry.word);
        self.entry_count += 1;

        Ok(IngestOutcome::Added { bucket })
    }

    /// Whether the entry cap has been reached.
    pub fn is_full(&self) -> bool {
        self.entry_count >= self.max_entries
    }

    /// Number of distinct words stored so far.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Consume the builder, recording the entry count in the metadata.
    pub fn finish(mut self) -> FinishedShards {
        self.metadata.entry_count = self.entry_count;
        FinishedShards {
            metadata: self.metadata,
            shards: self.buffers.into_iter().collect(),
        }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Metadata as written to `info.json`.
    pub metadata: Metadata,
    /// Lines pulled from the source, header included.
    pub lines_read: u64,
    /// Malformed lines that were skipped.
    pub skipped_lines: u64,
    /// Lines dropped because their word was already stored.
    pub duplicates: u64,
    /// Input ended early (dropped connection, truncated gzip).
    pub truncated: bool,
    /// Ingestion stopped at `max_entries`.
    pub cap_reached: bool,
    /// Number of shard files written.
    pub shard_files: usize,
}

/// Streaming build driver.
pub struct LibraryBuilder {
    config: BuildConfig,
    progress: ProgressBar,
}

impl LibraryBuilder {
    /// Create a builder with the given configuration.
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report ingestion and publish progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Open `locator` and build a library from it.
    pub async fn build_from(
        &self,
        locator: &str,
        store: &dyn BlobStore,
        prefix: &str,
    ) -> Result<BuildReport> {
        let mut source = corpus::open(locator).await?;
        self.build(source.as_mut(), locator, store, prefix).await
    }

    /// Build a library from `source` and write it under `prefix` in `store`.
    ///
    /// `prefix` must be empty: shards left by an earlier build would stay
    /// reachable through the new `info.json`.
    pub async fn build(
        &self,
        source: &mut dyn LineSource,
        source_descriptor: &str,
        store: &dyn BlobStore,
        prefix: &str,
    ) -> Result<BuildReport> {
        self.config.validate()?;
        if let Some(existing) = store.list(prefix).await?.into_iter().next() {
            return Err(IndexError::OutputNotEmpty(existing).into());
        }

        let (header, mut lines_read) = corpus::read_header(source).await?;
        info!(
            total_words = header.total_words,
            vector_size = header.vector_size,
            source = source_descriptor,
            "starting build"
        );

        let mut shards = ShardBuilder::new(&self.config, header.vector_size, source_descriptor)?;
        self.progress
            .set_length(header.total_words.min(self.config.max_entries));

        let mut skipped_lines = 0;
        let mut duplicates = 0;
        let mut truncated = false;

        while !shards.is_full() {
            let line = match source.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) if corpus::is_truncation(&e) => {
                    warn!(error = %e, entries = shards.entry_count(), "input ended early");
                    truncated = true;
                    break;
                }
                Err(e) => return Err(CorpusError::Io(e).into()),
            };
            lines_read += 1;

            if corpus::is_blank(&line) {
                continue;
            }

            let record = match corpus::parse_record(&line, header.vector_size, lines_read) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "skipping line");
                    skipped_lines += 1;
                    continue;
                }
            };

            match shards.ingest(&record.word, &record.components) {
                Ok(IngestOutcome::Added { .. }) => {
                    self.progress.inc(1);
                    self.progress.set_message(record.word);
                }
                Ok(IngestOutcome::Duplicate) => duplicates += 1,
                // The loop condition stops at the cap before this arm can fire.
                Ok(IngestOutcome::CapReached) => break,
                Err(e) => {
                    warn!(line = lines_read, error = %e, "skipping line");
                    skipped_lines += 1;
                }
            }
        }

        let cap_reached = shards.is_full();
        if cap_reached {
            info!(max_entries = self.config.max_entries, "entry cap reached");
            source.cancel();
        }

        let FinishedShards { metadata, shards } = shards.finish();
        let shard_files = shards.len();
        info!(
            entries = metadata.entry_count,
            shard_files, skipped_lines, duplicates, "ingestion complete"
        );

        self.publish(&metadata, shards, store, prefix).await?;

        Ok(BuildReport {
            metadata,
            lines_read,
            skipped_lines,
            duplicates,
            truncated,
            cap_reached,
            shard_files,
        })
    }

    /// Write every shard, then the metadata.
    async fn publish(
        &self,
        metadata: &Metadata,
        shards: BTreeMap<u32, Vec<u8>>,
        store: &dyn BlobStore,
        prefix: &str,
    ) -> Result<()> {
        self.progress.set_position(0);
        self.progress.set_length(shards.len() as u64);
        self.progress.set_message("writing shards");

        stream::iter(shards)
            .map(|(bucket, data)| {
                let progress = self.progress.clone();
                async move {
                    let path = object_path(prefix, &shard_file_name(bucket));
                    debug!(bucket, bytes = data.len(), "writing shard");
                    store.put(&path, Bytes::from(data)).await?;
                    progress.inc(1);
                    Ok::<_, crate::storage::StorageError>(())
                }
            })
            .buffer_unordered(self.config.flush_concurrency)
            .try_collect::<Vec<_>>()
            .await?;
        self.progress.finish_and_clear();

        let json = serde_json::to_vec_pretty(metadata)?;
        store
            .put(&object_path(prefix, METADATA_FILE), Bytes::from(json))
            .await?;
        info!(entries = metadata.entry_count, "library published");

        Ok(())
    }
}

/// Build a library from `source_locator` into the local directory `output`.
pub async fn build(
    source_locator: &str,
    output: impl Into<PathBuf>,
    config: BuildConfig,
) -> Result<BuildReport> {
    let store = local(output)?;
    LibraryBuilder::new(config)
        .build_from(source_locator, &store, "")
        .await
}

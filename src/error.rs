//! Error types for the veclib library.

use thiserror::Error;

/// Top-level error type for veclib operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors.
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Corpus input errors.
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Errors while building a library.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Errors while decoding a shard file.
    #[error("shard error: {0}")]
    Shard(#[from] ShardError),

    /// Metadata (de)serialization errors.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading the embedding corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The first non-blank line was not `totalWordCount vectorSize`. Fatal.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The corpus ended before a header was read.
    #[error("corpus is empty")]
    Empty,

    /// A data line could not be parsed. The build skips these.
    #[error("malformed line {line}: {reason}")]
    MalformedLine { line: u64, reason: String },

    /// The corpus could not be fetched.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// I/O failure while consuming input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur during library building.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Invalid build configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Vector has the wrong number of components.
    #[error("invalid vector dimension: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The build target already holds objects, e.g. an earlier library.
    #[error("output is not empty: found {0}")]
    OutputNotEmpty(String),

    /// Vector contains NaN or infinity.
    #[error("vector for {0:?} has non-finite components")]
    NonFinite(String),
}

/// Errors raised while decoding a shard.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShardError {
    /// The shard bytes do not form a valid sequence of entries.
    #[error("corrupt shard {shard}: {reason}")]
    Corrupt { shard: String, reason: String },

    /// The library was written with a format this reader does not understand.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
}

impl ShardError {
    pub(crate) fn corrupt(shard: impl Into<String>, reason: impl Into<String>) -> Self {
        ShardError::Corrupt {
            shard: shard.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for veclib operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(ShardError::corrupt("12.lps", "truncated length prefix"));
        assert!(err.to_string().contains("12.lps"));
        assert!(err.to_string().contains("truncated length prefix"));

        let err = CorpusError::MalformedLine {
            line: 7,
            reason: "expected 4 fields, got 3".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }
}

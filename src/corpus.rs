//! Corpus input: pull-based line sources and the `.vec` text format.
//!
//! The corpus is one header line, `totalWordCount vectorSize`, followed by
//! one `word c1 c2 ... cN` line per word. Sources may be local files or
//! HTTP(S) URLs, and are gunzipped on the fly when the locator ends in `.gz`.

use crate::error::CorpusError;
use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::io::StreamReader;

/// A finite, non-restartable sequence of raw lines.
#[async_trait]
pub trait LineSource: Send {
    /// Pull the next line without its terminator. `Ok(None)` at end of input.
    async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Stop consuming input and release the underlying transfer.
    ///
    /// Every later `next_line` returns `Ok(None)`.
    fn cancel(&mut self);
}

/// Line source over any buffered async reader.
pub struct ReaderSource<R> {
    reader: Option<R>,
}

impl<R> ReaderSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

#[async_trait]
impl<R> LineSource for ReaderSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            self.reader = None;
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    fn cancel(&mut self) {
        self.reader = None;
    }
}

/// In-memory source, mostly useful for tests.
pub fn from_text(text: impl Into<String>) -> ReaderSource<io::Cursor<Vec<u8>>> {
    ReaderSource::new(io::Cursor::new(text.into().into_bytes()))
}

/// Open a corpus from a local path or an `http(s)://` URL.
pub async fn open(locator: &str) -> Result<Box<dyn LineSource>, CorpusError> {
    let raw: Box<dyn AsyncRead + Unpin + Send> = if is_remote(locator) {
        let response = reqwest::get(locator)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CorpusError::Fetch(e.to_string()))?;
        let body = response.bytes_stream().map_err(body_error);
        Box::new(StreamReader::new(Box::pin(body)))
    } else {
        Box::new(tokio::fs::File::open(locator).await?)
    };

    let reader: Box<dyn AsyncRead + Unpin + Send> = if is_gzip(locator) {
        let mut decoder = GzipDecoder::new(BufReader::new(raw));
        decoder.multiple_members(true);
        Box::new(decoder)
    } else {
        raw
    };

    Ok(Box::new(ReaderSource::new(BufReader::new(reader))))
}

fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

fn is_gzip(locator: &str) -> bool {
    locator
        .split(['?', '#'])
        .next()
        .is_some_and(|path| path.ends_with(".gz"))
}

fn body_error(e: reqwest::Error) -> io::Error {
    // A dropped connection surfaces as a body error part way through.
    let kind = if e.is_body() || e.is_decode() {
        io::ErrorKind::UnexpectedEof
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, e)
}

/// Whether an input error means the upstream transfer ended early.
///
/// Such errors end the build gracefully; everything ingested so far is kept.
pub fn is_truncation(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

/// The corpus header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub total_words: u64,
    pub vector_size: usize,
}

/// Parse `totalWordCount vectorSize`.
pub fn parse_header(line: &str) -> Result<Header, CorpusError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [total, size] = fields.as_slice() else {
        return Err(CorpusError::MalformedHeader(format!(
            "expected 2 fields, got {}",
            fields.len()
        )));
    };

    let total_words: u64 = total
        .parse()
        .map_err(|_| CorpusError::MalformedHeader(format!("invalid word count {:?}", total)))?;
    let vector_size: usize = size
        .parse()
        .map_err(|_| CorpusError::MalformedHeader(format!("invalid vector size {:?}", size)))?;
    if vector_size == 0 {
        return Err(CorpusError::MalformedHeader(
            "vector size must be positive".to_string(),
        ));
    }

    Ok(Header {
        total_words,
        vector_size,
    })
}

/// Pull lines until the first non-blank one and parse it as the header.
///
/// Returns the header and the number of lines consumed.
pub async fn read_header(source: &mut dyn LineSource) -> Result<(Header, u64), CorpusError> {
    let mut consumed = 0;
    loop {
        let Some(line) = source.next_line().await? else {
            return Err(CorpusError::Empty);
        };
        consumed += 1;

        let text = std::str::from_utf8(&line)
            .map_err(|_| CorpusError::MalformedHeader("not valid UTF-8".to_string()))?;
        if text.trim().is_empty() {
            continue;
        }
        return Ok((parse_header(text)?, consumed));
    }
}

/// One parsed data line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub word: String,
    pub components: Vec<f64>,
}

/// Parse `word c1 ... cN`, requiring exactly `vector_size` finite components.
pub fn parse_record(line: &[u8], vector_size: usize, line_no: u64) -> Result<Record, CorpusError> {
    let malformed = |reason: String| CorpusError::MalformedLine {
        line: line_no,
        reason,
    };

    let text = std::str::from_utf8(line).map_err(|_| malformed("not valid UTF-8".to_string()))?;
    let mut fields = text.split_whitespace();
    let word = fields
        .next()
        .ok_or_else(|| malformed("empty line".to_string()))?;

    let components = fields
        .map(|f| match f.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(malformed(format!("invalid component {:?}", f))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if components.len() != vector_size {
        return Err(malformed(format!(
            "expected {} fields, got {}",
            vector_size + 1,
            components.len() + 1
        )));
    }

    Ok(Record {
        word: word.to_string(),
        components,
    })
}

/// Whether a raw line holds only whitespace.
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

//! Length-prefixed frame codec.
//!
//! A frame is `[LEB128 length][payload]`. An entry is exactly three frames:
//! the word's UTF-8 bytes, the scale as a big-endian `f32`, and the packed
//! quantized codes. A shard file is a plain concatenation of entries.

use crate::quantize::Quantizer;
use crate::types::Entry;
use thiserror::Error;

/// Largest accepted frame payload (4 MiB).
pub const MAX_FRAME_LEN: u64 = 4 * 1024 * 1024;

/// Number of frames that make up one entry.
pub const FRAMES_PER_ENTRY: usize = 3;

/// Frame decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("truncated length prefix at byte {0}")]
    TruncatedPrefix(usize),

    #[error("varint overflow at byte {0}")]
    VarintOverflow(usize),

    #[error("frame at byte {offset} declares {len} bytes, only {available} remain")]
    TruncatedPayload {
        offset: usize,
        len: u64,
        available: usize,
    },

    #[error("frame at byte {offset} exceeds maximum length ({len} bytes)")]
    TooLarge { offset: usize, len: u64 },

    #[error("stream ended after {0} of 3 frames of an entry")]
    TruncatedEntry(usize),

    #[error("word frame is not valid UTF-8")]
    InvalidWord,

    #[error("scale frame must be 4 bytes, got {0}")]
    InvalidScale(usize),

    #[error("vector frame must be {expected} bytes, got {got}")]
    InvalidVector { expected: usize, got: usize },
}

/// Encode an unsigned integer as LEB128 into `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a LEB128 unsigned integer from `buf` starting at `*pos`.
/// Advances `*pos` past the consumed bytes.
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64, FrameError> {
    let start = *pos;
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let Some(&byte) = buf.get(*pos) else {
            return Err(FrameError::TruncatedPrefix(start));
        };
        *pos += 1;

        let payload = u64::from(byte & 0x7F);
        if shift >= 64 || (shift == 63 && payload > 1) {
            return Err(FrameError::VarintOverflow(start));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Append one frame to `out`.
pub fn encode_frame(payload: &[u8], out: &mut Vec<u8>) {
    encode_varint(payload.len() as u64, out);
    out.extend_from_slice(payload);
}

/// Lazy iterator over the frames of a byte buffer.
///
/// Stops after the first error. Create a new reader to start over.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }

    /// Byte offset of the next frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_frame(&mut self) -> Result<&'a [u8], FrameError> {
        let offset = self.pos;
        let len = decode_varint(self.buf, &mut self.pos)?;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge { offset, len });
        }
        let available = self.buf.len() - self.pos;
        if len as usize > available {
            return Err(FrameError::TruncatedPayload {
                offset,
                len,
                available,
            });
        }
        let payload = &self.buf[self.pos..self.pos + len as usize];
        self.pos += len as usize;
        Ok(payload)
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<&'a [u8], FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let frame = self.read_frame();
        self.failed = frame.is_err();
        Some(frame)
    }
}

/// Append the three frames of an entry to `out`.
pub fn encode_entry(entry: &Entry, quantizer: &Quantizer, out: &mut Vec<u8>) {
    encode_frame(entry.word.as_bytes(), out);
    encode_frame(&entry.scale.to_be_bytes(), out);
    encode_frame(&quantizer.pack(&entry.codes), out);
}

/// The three undecoded frames of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry<'a> {
    pub word: &'a [u8],
    pub scale: &'a [u8],
    pub codes: &'a [u8],
}

impl RawEntry<'_> {
    /// Decode into an owned [`Entry`], validating every frame.
    pub fn decode(&self, quantizer: &Quantizer, vector_size: usize) -> Result<Entry, FrameError> {
        let word = std::str::from_utf8(self.word).map_err(|_| FrameError::InvalidWord)?;
        let scale_bytes: [u8; 4] = self
            .scale
            .try_into()
            .map_err(|_| FrameError::InvalidScale(self.scale.len()))?;
        let codes = quantizer
            .unpack(self.codes, vector_size)
            .ok_or(FrameError::InvalidVector {
                expected: quantizer.packed_len(vector_size),
                got: self.codes.len(),
            })?;

        Ok(Entry {
            word: word.to_string(),
            scale: f32::from_be_bytes(scale_bytes),
            codes,
        })
    }
}

/// Lazy iterator grouping frames into entries, three at a time.
pub struct EntryFrames<'a> {
    frames: FrameReader<'a>,
}

impl<'a> EntryFrames<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            frames: FrameReader::new(buf),
        }
    }
}

impl<'a> Iterator for EntryFrames<'a> {
    type Item = Result<RawEntry<'a>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        let word = match self.frames.next()? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };
        let scale = match self.frames.next() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Some(Err(e)),
            None => return Some(Err(FrameError::TruncatedEntry(1))),
        };
        let codes = match self.frames.next() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Some(Err(e)),
            None => return Some(Err(FrameError::TruncatedEntry(2))),
        };
        Some(Ok(RawEntry { word, scale, codes }))
    }
}

/// Decode every entry in a buffer.
pub fn decode_entries<'a>(
    buf: &'a [u8],
    quantizer: &'a Quantizer,
    vector_size: usize,
) -> impl Iterator<Item = Result<Entry, FrameError>> + 'a {
    EntryFrames::new(buf).map(move |raw| raw?.decode(quantizer, vector_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip_varint(val: u64) {
        let mut buf = Vec::new();
        encode_varint(val, &mut buf);
        let mut pos = 0;
        assert_eq!(decode_varint(&buf, &mut pos).unwrap(), val);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_varint_boundaries() {
        let mut buf = Vec::new();
        encode_varint(127, &mut buf);
        assert_eq!(buf, vec![0x7F]);

        buf.clear();
        encode_varint(300, &mut buf);
        assert_eq!(buf, vec![0xAC, 0x02]);

        for val in [0, 1, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            round_trip_varint(val);
        }
    }

    #[test]
    fn test_varint_truncated() {
        let mut pos = 0;
        assert_eq!(
            decode_varint(&[0x80, 0x80], &mut pos),
            Err(FrameError::TruncatedPrefix(0))
        );
    }

    #[test]
    fn test_varint_overflow() {
        let buf = [0xFF; 11];
        let mut pos = 0;
        assert_eq!(
            decode_varint(&buf, &mut pos),
            Err(FrameError::VarintOverflow(0))
        );

        // Zero-payload continuation bytes past bit 63.
        let mut buf = vec![0x80; 11];
        buf.push(0x00);
        let mut pos = 0;
        assert_eq!(
            decode_varint(&buf, &mut pos),
            Err(FrameError::VarintOverflow(0))
        );

        let frames: Vec<_> = FrameReader::new(&buf).collect();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Err(FrameError::VarintOverflow(0))));

        // The widest valid encoding still decodes.
        let mut buf = Vec::new();
        encode_varint(u64::MAX, &mut buf);
        let mut pos = 0;
        assert_eq!(decode_varint(&buf, &mut pos), Ok(u64::MAX));
    }

    #[test]
    fn test_frame_layout() {
        let mut out = Vec::new();
        encode_frame(b"cat", &mut out);
        encode_frame(b"", &mut out);
        assert_eq!(out, vec![3, b'c', b'a', b't', 0]);

        let frames: Vec<_> = FrameReader::new(&out).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames, vec![&b"cat"[..], &b""[..]]);
    }

    #[test]
    fn test_frame_truncated_payload() {
        let buf = [5, b'a', b'b'];
        let mut reader = FrameReader::new(&buf);
        assert!(matches!(
            reader.next(),
            Some(Err(FrameError::TruncatedPayload { len: 5, .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = Vec::new();
        encode_varint(MAX_FRAME_LEN + 1, &mut buf);
        let mut reader = FrameReader::new(&buf);
        assert!(matches!(reader.next(), Some(Err(FrameError::TooLarge { .. }))));
    }

    #[test]
    fn test_entry_wire_format() {
        let q = Quantizer::default();
        let entry = Entry {
            word: "cat".to_string(),
            scale: 0.2,
            codes: vec![191, 0, 159],
        };
        let mut out = Vec::new();
        encode_entry(&entry, &q, &mut out);

        let mut expected = vec![3, b'c', b'a', b't', 4];
        expected.extend_from_slice(&0.2f32.to_be_bytes());
        expected.extend_from_slice(&[3, 191, 0, 159]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_incomplete_entry_is_error() {
        let mut out = Vec::new();
        encode_frame(b"cat", &mut out);
        encode_frame(&1.0f32.to_be_bytes(), &mut out);

        let mut entries = EntryFrames::new(&out);
        assert_eq!(entries.next(), Some(Err(FrameError::TruncatedEntry(2))));
    }

    #[test]
    fn test_bad_scale_and_vector() {
        let q = Quantizer::default();
        let raw = RawEntry {
            word: b"cat",
            scale: &[0, 0],
            codes: &[1, 2, 3],
        };
        assert_eq!(raw.decode(&q, 3), Err(FrameError::InvalidScale(2)));

        let raw = RawEntry {
            word: b"cat",
            scale: &[0, 0, 0, 0],
            codes: &[1, 2],
        };
        assert_eq!(
            raw.decode(&q, 3),
            Err(FrameError::InvalidVector {
                expected: 3,
                got: 2
            })
        );

        let raw = RawEntry {
            word: &[0xFF, 0xFE],
            scale: &[0, 0, 0, 0],
            codes: &[],
        };
        assert_eq!(raw.decode(&q, 0), Err(FrameError::InvalidWord));
    }

    proptest! {
        #[test]
        fn prop_entries_survive_encoding(
            words in prop::collection::vec("\\PC{0,20}", 1..8),
            scale in 0.0f32..1000.0,
            bits in 1u8..=16,
            raw_codes in prop::collection::vec(any::<u16>(), 0..32),
        ) {
            let q = Quantizer::new(bits).unwrap();
            let codes: Vec<u16> = raw_codes.iter().map(|c| c & q.max_code()).collect();
            let entries: Vec<Entry> = words
                .iter()
                .map(|w| Entry { word: w.clone(), scale, codes: codes.clone() })
                .collect();

            let mut buf = Vec::new();
            for entry in &entries {
                encode_entry(entry, &q, &mut buf);
            }

            let decoded: Vec<Entry> = decode_entries(&buf, &q, codes.len())
                .collect::<Result<_, _>>()
                .unwrap();
            prop_assert_eq!(decoded, entries);
        }
    }
}

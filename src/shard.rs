//! Bucket assignment: maps a normalized word to one of `2^shard_bits` shards.

use crate::types::SHARD_EXTENSION;
use sha2::{Digest, Sha256};

/// Largest supported `shard_bits`.
pub const MAX_SHARD_BITS: u32 = 32;

/// Compute the bucket for a normalized word.
///
/// The bucket is the leading `shard_bits` bits of the SHA-256 digest of the
/// word's UTF-8 bytes, read big-endian. `shard_bits` is clamped to
/// [`MAX_SHARD_BITS`].
pub fn bucket_of(word: &str, shard_bits: u32) -> u32 {
    let shard_bits = shard_bits.min(MAX_SHARD_BITS);
    if shard_bits == 0 {
        return 0;
    }

    let digest = Sha256::digest(word.as_bytes());
    let byte_count = shard_bits.div_ceil(8) as usize;
    let prefix = digest[..byte_count]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

    (prefix >> (byte_count as u32 * 8 - shard_bits)) as u32
}

/// Number of buckets for a given `shard_bits`.
pub fn shard_count(shard_bits: u32) -> u64 {
    1u64 << shard_bits.min(MAX_SHARD_BITS)
}

/// File name of a bucket's shard, e.g. `3829.lps`.
pub fn shard_file_name(bucket: u32) -> String {
    format!("{}.{}", bucket, SHARD_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::NormalizeMode;
    use proptest::prelude::*;

    #[test]
    fn test_known_buckets() {
        // sha256("cat") = 77af778b..., sha256("dog") = cd6357ef...
        assert_eq!(bucket_of("cat", 13), 3829);
        assert_eq!(bucket_of("dog", 13), 6572);
        assert_eq!(bucket_of("hello", 13), 1438);
        assert_eq!(bucket_of("cat", 8), 0x77);
        assert_eq!(bucket_of("cat", 32), 0x77af778b);
    }

    #[test]
    fn test_zero_bits_single_bucket() {
        assert_eq!(bucket_of("anything", 0), 0);
        assert_eq!(shard_count(0), 1);
    }

    #[test]
    fn test_shard_file_name() {
        assert_eq!(shard_file_name(0), "0.lps");
        assert_eq!(shard_file_name(8191), "8191.lps");
    }

    proptest! {
        #[test]
        fn prop_bucket_in_range(word in "\\PC{0,24}", bits in 0u32..=32) {
            prop_assert!(u64::from(bucket_of(&word, bits)) < shard_count(bits));
        }

        #[test]
        fn prop_equal_keys_share_bucket(word in "[a-zA-Z]{1,12}", pad in " {0,3}") {
            let padded = format!("{pad}{}{pad}", word.to_uppercase());
            let a = normalize(&word, NormalizeMode::LowercaseAll);
            let b = normalize(&padded, NormalizeMode::LowercaseAll);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(bucket_of(&a, 13), bucket_of(&b, 13));
        }

        #[test]
        fn prop_fewer_bits_is_prefix(word in "[a-z]{1,16}", bits in 1u32..=32) {
            let wide = bucket_of(&word, 32);
            prop_assert_eq!(bucket_of(&word, bits), wide >> (32 - bits));
        }
    }
}

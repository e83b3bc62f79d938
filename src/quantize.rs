//! Scalar quantization of embedding vectors.
//!
//! A vector is stored as its largest absolute component (`scale`) plus one
//! `bits`-wide unsigned code per component. Component `v` maps to
//! `round((v / scale + 1) / 2 * (2^bits - 1))`, and code `q` maps back to
//! `(q / (2^bits - 1) * 2 - 1) * scale`. The reconstruction error per
//! component is at most `scale / (2^bits - 1)`.

use crate::error::IndexError;

/// Bit depth used when none is configured.
pub const DEFAULT_RESOLUTION_BITS: u8 = 8;

/// A quantized vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
    pub scale: f32,
    pub codes: Vec<u16>,
}

/// Quantizer for a fixed bit depth in `1..=16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    bits: u8,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self {
            bits: DEFAULT_RESOLUTION_BITS,
        }
    }
}

impl Quantizer {
    /// Create a quantizer with the given bit depth.
    pub fn new(bits: u8) -> Result<Self, IndexError> {
        if !(1..=16).contains(&bits) {
            return Err(IndexError::InvalidConfig(format!(
                "resolution bits must be in 1..=16, got {}",
                bits
            )));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Largest representable code, `2^bits - 1`.
    pub fn max_code(&self) -> u16 {
        ((1u32 << self.bits) - 1) as u16
    }

    /// Quantize a vector.
    ///
    /// Codes are computed against the stored `f32` scale. A vector whose
    /// largest magnitude is zero once narrowed to `f32` has `scale == 0` and
    /// every code set to the midpoint, which dequantizes back to exactly zero.
    pub fn quantize(&self, vector: &[f64]) -> Quantized {
        let max_code = f64::from(self.max_code());
        let scale = vector.iter().fold(0.0f64, |acc, v| acc.max(v.abs())) as f32;

        if scale == 0.0 {
            let midpoint = (max_code / 2.0).round() as u16;
            return Quantized {
                scale: 0.0,
                codes: vec![midpoint; vector.len()],
            };
        }

        let wide = f64::from(scale);
        let codes = vector
            .iter()
            .map(|&v| {
                let unit = v / wide;
                let code = ((unit + 1.0) / 2.0 * max_code).round();
                code.clamp(0.0, max_code) as u16
            })
            .collect();

        Quantized { scale, codes }
    }

    /// Reconstruct one component.
    pub fn dequantize_one(&self, code: u16, scale: f32) -> f64 {
        let max_code = f64::from(self.max_code());
        ((f64::from(code) / max_code) * 2.0 - 1.0) * f64::from(scale)
    }

    /// Reconstruct a whole vector.
    pub fn dequantize(&self, codes: &[u16], scale: f32) -> Vec<f64> {
        codes
            .iter()
            .map(|&code| self.dequantize_one(code, scale))
            .collect()
    }

    /// Number of bytes needed to store `components` codes.
    pub fn packed_len(&self, components: usize) -> usize {
        (components * self.bits as usize).div_ceil(8)
    }

    /// Pack codes MSB-first, `bits` bits each. At 8 bits this is one byte per code.
    pub fn pack(&self, codes: &[u16]) -> Vec<u8> {
        if self.bits == 8 {
            return codes.iter().map(|&c| c as u8).collect();
        }

        let bits = self.bits as usize;
        let mut out = vec![0u8; self.packed_len(codes.len())];
        let mut pos = 0usize;
        for &code in codes {
            for shift in (0..bits).rev() {
                if (code >> shift) & 1 == 1 {
                    out[pos / 8] |= 0x80 >> (pos % 8);
                }
                pos += 1;
            }
        }
        out
    }

    /// Unpack `components` codes. Returns `None` if `bytes` has the wrong length.
    pub fn unpack(&self, bytes: &[u8], components: usize) -> Option<Vec<u16>> {
        if bytes.len() != self.packed_len(components) {
            return None;
        }
        if self.bits == 8 {
            return Some(bytes.iter().map(|&b| u16::from(b)).collect());
        }

        let bits = self.bits as usize;
        let mut codes = Vec::with_capacity(components);
        let mut pos = 0usize;
        for _ in 0..components {
            let mut code = 0u16;
            for _ in 0..bits {
                let bit = (bytes[pos / 8] >> (7 - pos % 8)) & 1;
                code = (code << 1) | u16::from(bit);
                pos += 1;
            }
            codes.push(code);
        }
        Some(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quantize_example() {
        let q = Quantizer::default();
        let out = q.quantize(&[0.1, -0.2, 0.05]);
        assert_eq!(out.scale, 0.2f32);
        assert_eq!(out.codes, vec![191, 0, 159]);

        let value = q.dequantize_one(191, out.scale);
        assert!((value - 0.0996).abs() < 1e-4, "got {}", value);
    }

    #[test]
    fn test_zero_vector_is_midpoint() {
        let q = Quantizer::default();
        let out = q.quantize(&[0.0, 0.0, -0.0]);
        assert_eq!(out.scale, 0.0);
        assert_eq!(out.codes, vec![128, 128, 128]);
        assert!(q.dequantize(&out.codes, out.scale).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_underflowing_scale_is_midpoint() {
        let q = Quantizer::default();
        let out = q.quantize(&[1e-46, -1e-46, 5e-47]);
        assert_eq!(out.scale, 0.0);
        assert_eq!(out.codes, vec![128, 128, 128]);
        assert!(q.dequantize(&out.codes, out.scale).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_extremes_hit_code_bounds() {
        let q = Quantizer::new(4).unwrap();
        let out = q.quantize(&[-3.0, 3.0, 0.0]);
        assert_eq!(out.codes[0], 0);
        assert_eq!(out.codes[1], 15);
        assert_eq!(out.codes[2], 8);
    }

    #[test]
    fn test_invalid_bits() {
        assert!(Quantizer::new(0).is_err());
        assert!(Quantizer::new(17).is_err());
        assert!(Quantizer::new(16).is_ok());
    }

    #[test]
    fn test_pack_12_bits() {
        let q = Quantizer::new(12).unwrap();
        let packed = q.pack(&[0xABC, 0x123]);
        assert_eq!(packed, vec![0xAB, 0xC1, 0x23]);
        assert_eq!(q.unpack(&packed, 2), Some(vec![0xABC, 0x123]));
    }

    #[test]
    fn test_unpack_wrong_length() {
        let q = Quantizer::default();
        assert_eq!(q.unpack(&[1, 2, 3], 4), None);
        let q = Quantizer::new(3).unwrap();
        assert_eq!(q.packed_len(3), 2);
        assert_eq!(q.unpack(&[0, 0, 0], 3), None);
    }

    proptest! {
        #[test]
        fn prop_reconstruction_error_bounded(
            values in prop::collection::vec(-100.0f64..100.0, 1..64),
            bits in 1u8..=16,
        ) {
            let q = Quantizer::new(bits).unwrap();
            let out = q.quantize(&values);
            let bound = f64::from(out.scale) / f64::from(q.max_code());
            for (&code, &orig) in out.codes.iter().zip(values.iter()) {
                prop_assert!(code <= q.max_code());
                let error = (q.dequantize_one(code, out.scale) - orig).abs();
                prop_assert!(error <= bound + 1e-9, "error {} > bound {}", error, bound);
            }
        }

        #[test]
        fn prop_pack_unpack(bits in 1u8..=16, raw in prop::collection::vec(any::<u16>(), 0..40)) {
            let q = Quantizer::new(bits).unwrap();
            let codes: Vec<u16> = raw.iter().map(|c| c & q.max_code()).collect();
            let packed = q.pack(&codes);
            prop_assert_eq!(packed.len(), q.packed_len(codes.len()));
            prop_assert_eq!(q.unpack(&packed, codes.len()), Some(codes));
        }
    }
}

//! Word normalization.

use crate::types::NormalizeMode;

/// Canonicalize a raw token into a lookup key.
pub fn normalize(raw: &str, mode: NormalizeMode) -> String {
    let trimmed = raw.trim();
    match mode {
        NormalizeMode::PreserveSingleUpper if is_single_upper_alnum(trimmed) => trimmed.to_string(),
        _ => trimmed.to_lowercase(),
    }
}

fn is_single_upper_alnum(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if c.is_ascii_uppercase() || c.is_ascii_digit()
    )
}

//! Content hashing and byte-accurate string clamping.
//!
//! Grounded on `metrics/dedupe_fs.rs::key_hash` (sha2 over UTF-8 bytes, hex
//! output) and generalized to the compound-field hashing the cache keys need
//! (spec §3, §4.3).

use sha2::{Digest, Sha256};

/// `sha256` over UTF-8 bytes, hex-encoded.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a sequence of fields by colon-joining them first, then `sha256`-ing
/// the joined string. Used for compound keys (CacheKey, FileSummaryKey, ...)
/// where every field must independently affect the digest (spec §8 property
/// 4: cache-key sensitivity).
pub fn sha256_fields(fields: &[&str]) -> String {
    sha256_hex(&fields.join(":"))
}

/// Clamp `s` to at most `max` bytes, always returning valid UTF-8.
///
/// If `s` already fits, it is returned unchanged (spec §8 property 2). When
/// it doesn't, the string is shrunk by truncating to 85% of its current
/// *character* length repeatedly until the byte length fits — truncating on
/// char boundaries guarantees the result can never split a multi-byte code
/// point.
pub fn clamp_by_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    let mut chars: Vec<char> = s.chars().collect();
    loop {
        let next_len = ((chars.len() as f64) * 0.85).floor() as usize;
        // Guarantee forward progress even when 85% rounds down to the same
        // length for very short strings made of wide characters.
        let next_len = next_len.min(chars.len().saturating_sub(1));
        chars.truncate(next_len);

        let candidate: String = chars.iter().collect();
        if candidate.len() <= max || chars.is_empty() {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex("hello"), sha256_hex("hello"));
        assert_ne!(sha256_hex("hello"), sha256_hex("Hello"));
    }

    #[test]
    fn sha256_fields_sensitive_to_each_component() {
        let a = sha256_fields(&["one", "two", "three"]);
        let b = sha256_fields(&["one", "two", "threee"]);
        assert_ne!(a, b);
    }

    #[test]
    fn clamp_by_bytes_returns_unchanged_when_within_bound() {
        assert_eq!(clamp_by_bytes("hello", 10), "hello");
        assert_eq!(clamp_by_bytes("hello", 5), "hello");
    }

    #[test]
    fn clamp_by_bytes_shrinks_to_fit() {
        let s = "a".repeat(1000);
        let clamped = clamp_by_bytes(&s, 100);
        assert!(clamped.len() <= 100);
    }

    #[test]
    fn clamp_by_bytes_never_splits_multibyte_chars() {
        let s = "日".repeat(200); // each char is 3 bytes in UTF-8
        let clamped = clamp_by_bytes(&s, 100);
        assert!(clamped.len() <= 100);
        // Must still be valid UTF-8 (String guarantees this already, but
        // assert non-empty and round-trippable through chars()).
        assert!(clamped.chars().count() > 0);
    }

    #[test]
    fn clamp_by_bytes_handles_empty_string() {
        assert_eq!(clamp_by_bytes("", 10), "");
    }

    #[test]
    fn clamp_by_bytes_converges_on_extreme_ratio() {
        // max=0 should converge to an empty string rather than loop forever.
        let s = "x".repeat(50);
        let clamped = clamp_by_bytes(&s, 0);
        assert_eq!(clamped, "");
    }
}

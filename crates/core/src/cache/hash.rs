//! Content-addressed cache directory names.

use sha2::{Digest, Sha256};

/// Directory name of the cache entry for a canonical binary location.
///
/// Keyed by `real_url` only, so identifiers that resolve to the same
/// binary share one entry.
pub fn compute_cache_key(real_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(real_url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("https://repo/api/504945");
        let hash2 = compute_cache_key("https://repo/api/504945");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_differs_per_location() {
        assert_ne!(compute_cache_key("https://repo/api/1"), compute_cache_key("https://repo/api/2"));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("https://repo/api/504945");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

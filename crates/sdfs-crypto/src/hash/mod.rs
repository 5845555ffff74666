//! Content hashing: SHA-256 of decompressed payload bytes.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`. Used as the SDFS content hash and as the
/// tmp-blob key: a file is accepted for publish only once its hash has been
/// computed, and the tmp blob is named by that hash.
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_64_hex_chars() {
        let h = sha256_hash(b"");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256_hash(b"hello"), sha256_hash(b"hello"));
        assert_ne!(sha256_hash(b"hello"), sha256_hash(b"world"));
    }
}

//! Chord-style consistent-hashing ring id.

use sha2::{Digest, Sha256};

/// Truncated SHA-256 of `s`, taking the trailing `ring_size_bits / 8` bytes
/// of the 32-byte digest and interpreting them as a big-endian integer.
///
/// Grounded in `schema.GetRingId`: `sha256(s)`, keep the last N bytes (N =
/// RING_SIZE/8), hex-encode, parse back as an unsigned integer. Byte order
/// is preserved through the hex round-trip, so this is equivalent to
/// reading the trailing bytes as big-endian.
pub fn ring_id(s: &str, ring_size_bits: u32) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    let n_bytes = (ring_size_bits / 8) as usize;
    let tail = &digest[digest.len() - n_bytes..];
    let mut buf = [0u8; 8];
    buf[8 - n_bytes..].copy_from_slice(tail);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        assert_eq!(ring_id("node-1", 32), ring_id("node-1", 32));
    }

    #[test]
    fn differs_for_different_input() {
        assert_ne!(ring_id("node-1", 32), ring_id("node-2", 32));
    }

    #[test]
    fn fits_within_bit_width() {
        let id = ring_id("some-file.txt", 32);
        assert!(id <= u32::MAX as u64);
    }
}

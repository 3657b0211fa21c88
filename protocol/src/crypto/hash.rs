//! # Hashing Utilities
//!
//! BLAKE3 is the only hash dCent uses. Peer ids are `BLAKE3(public_key)`;
//! key wrapping derives its AES keys with BLAKE3's `derive_key` mode.

use crate::config::HASH_OUTPUT_LENGTH;

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use dcent_protocol::crypto::blake3_hash;
///
/// assert_eq!(blake3_hash(b"dcent").len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// Outputs for different contexts never collide, even over identical data.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash multiple byte slices together without concatenating them first.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_known_vector() {
        // BLAKE3 of the empty input.
        let expected = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";
        assert_eq!(hex::encode(blake3_hash(b"")), expected);
    }

    #[test]
    fn test_domain_separation() {
        let a = domain_separated_hash("context-a", b"same data");
        let b = domain_separated_hash("context-b", b"same data");
        assert_ne!(a, b);
    }

    #[test]
    fn test_multi_matches_concatenation() {
        let joined = blake3_hash(b"helloworld");
        let multi = blake3_hash_multi(&[b"hello".as_slice(), b"world".as_slice()]);
        assert_eq!(joined, multi);
    }
}

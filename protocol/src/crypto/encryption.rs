//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for contract content and wrapped content keys.
//!
//! Every encryption draws a fresh random 96-bit nonce from `OsRng`. Each
//! contract gets its own content key, so one key never sees more than a
//! handful of messages and the birthday bound is irrelevant.
//!
//! Contract records keep the nonce in its own field (`iv`), so this module
//! returns `(nonce, ciphertext)` pairs instead of a packed buffer.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Errors that can occur during encryption/decryption.
///
/// Kept vague: "wrong key" and "corrupted ciphertext" look the same.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,
}

/// Generate a fresh random AES-256 key.
pub fn generate_key() -> [u8; AES_KEY_LENGTH] {
    let mut key = [0u8; AES_KEY_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Encrypt plaintext with a random nonce. Returns `(nonce, ciphertext)`;
/// the ciphertext includes the 16-byte tag.
///
/// # Example
///
/// ```
/// use dcent_protocol::crypto::encryption::{decrypt, encrypt, generate_key};
///
/// let key = generate_key();
/// let (nonce, sealed) = encrypt(&key, b"deliver 3 crates").unwrap();
/// assert_eq!(decrypt(&key, &nonce, &sealed).unwrap(), b"deliver 3 crates");
/// ```
pub fn encrypt(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
) -> Result<([u8; AES_NONCE_LENGTH], Vec<u8>), EncryptionError> {
    encrypt_with_aad(key, plaintext, &[])
}

/// Decrypt data produced by [`encrypt`].
pub fn decrypt(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    ciphertext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    decrypt_with_aad(key, nonce, ciphertext, &[])
}

/// Encrypt with Additional Authenticated Data.
///
/// The AAD is authenticated but not encrypted, and must be supplied again
/// at decryption time.
pub fn encrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; AES_NONCE_LENGTH], Vec<u8>), EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt ciphertext that was encrypted with AAD.
pub fn decrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AES_TAG_LENGTH;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"the quick brown fox jumps over the lazy dog";

        let (nonce, sealed) = encrypt(&key, plaintext).unwrap();
        assert_eq!(decrypt(&key, &nonce, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_ciphertext_length() {
        let key = test_key();
        let plaintext = b"exactly 26 bytes of input!";
        let (_, sealed) = encrypt(&key, plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + AES_TAG_LENGTH);
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let key = test_key();
        let (nonce, sealed) = encrypt(&key, b"secret").unwrap();

        let mut wrong_key = test_key();
        wrong_key[0] ^= 0xFF;

        assert!(decrypt(&wrong_key, &nonce, &sealed).is_err());
    }

    #[test]
    fn test_modified_ciphertext_fails_decryption() {
        let key = test_key();
        let (nonce, mut sealed) = encrypt(&key, b"secret").unwrap();
        sealed[0] ^= 0xFF;

        assert!(decrypt(&key, &nonce, &sealed).is_err());
    }

    #[test]
    fn test_unique_nonces() {
        let key = test_key();
        let (n1, _) = encrypt(&key, b"message").unwrap();
        let (n2, _) = encrypt(&key, b"message").unwrap();
        assert_ne!(n1, n2);
    }

    #[test]
    fn test_wrong_aad_fails_decryption() {
        let key = test_key();
        let (nonce, ciphertext) = encrypt_with_aad(&key, b"secret", b"correct-aad").unwrap();
        assert!(decrypt_with_aad(&key, &nonce, &ciphertext, b"wrong-aad").is_err());
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }
}

//! # Content-Key Wrapping
//!
//! Each bilateral contract is encrypted under a fresh AES-256 content key.
//! That key is then wrapped once per party so each can decrypt on its own,
//! without the other being online and without the content ever sitting in
//! the store in cleartext.
//!
//! ## Construction
//!
//! For recipient public key `R` (X25519):
//!
//! 1. Generate an ephemeral X25519 secret `e`, public `E`.
//! 2. `shared = X25519(e, R)`.
//! 3. `kek = BLAKE3-derive-key(KEY_WRAP_CONTEXT, shared || E || R)`.
//! 4. `wrapped = AES-256-GCM(kek, content_key, aad = E || R)`.
//!
//! The ephemeral secret is dropped right after step 2. Binding `E` and `R`
//! into both the KDF input and the AAD stops a wrapped key from being
//! replayed under a different recipient.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey};

use super::encryption::{decrypt_with_aad, encrypt_with_aad, EncryptionError};
use super::hash::{blake3_hash_multi, domain_separated_hash};
use super::keys::ExchangeSecret;
use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, EXCHANGE_KEY_LENGTH, KEY_WRAP_CONTEXT};

/// A content key sealed to one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Sender's ephemeral X25519 public key.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub ephemeral_public: [u8; EXCHANGE_KEY_LENGTH],
    /// GCM nonce for the wrapping encryption.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub nonce: [u8; AES_NONCE_LENGTH],
    /// Encrypted content key plus tag.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Wrap `content_key` so only the holder of `recipient_public`'s secret can
/// recover it.
pub fn wrap_key(
    recipient_public: &[u8; EXCHANGE_KEY_LENGTH],
    content_key: &[u8; AES_KEY_LENGTH],
) -> Result<WrappedKey, EncryptionError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient_public));

    let kek = derive_wrapping_key(shared.as_bytes(), &ephemeral_public, recipient_public);
    let aad = binding(&ephemeral_public, recipient_public);
    let (nonce, ciphertext) = encrypt_with_aad(&kek, content_key, &aad)?;

    Ok(WrappedKey {
        ephemeral_public,
        nonce,
        ciphertext,
    })
}

/// Recover a content key with the recipient's exchange secret.
pub fn unwrap_key(
    secret: &ExchangeSecret,
    wrapped: &WrappedKey,
) -> Result<[u8; AES_KEY_LENGTH], EncryptionError> {
    let recipient_public = secret.public_key();
    let shared = secret.diffie_hellman(&wrapped.ephemeral_public);

    let kek = derive_wrapping_key(&shared, &wrapped.ephemeral_public, &recipient_public);
    let aad = binding(&wrapped.ephemeral_public, &recipient_public);
    let plain = decrypt_with_aad(&kek, &wrapped.nonce, &wrapped.ciphertext, &aad)?;

    plain
        .as_slice()
        .try_into()
        .map_err(|_| EncryptionError::DecryptFailed)
}

fn derive_wrapping_key(
    shared: &[u8; 32],
    ephemeral_public: &[u8; EXCHANGE_KEY_LENGTH],
    recipient_public: &[u8; EXCHANGE_KEY_LENGTH],
) -> [u8; AES_KEY_LENGTH] {
    let material = blake3_hash_multi(&[
        shared.as_slice(),
        ephemeral_public.as_slice(),
        recipient_public.as_slice(),
    ]);
    domain_separated_hash(KEY_WRAP_CONTEXT, &material)
}

fn binding(
    ephemeral_public: &[u8; EXCHANGE_KEY_LENGTH],
    recipient_public: &[u8; EXCHANGE_KEY_LENGTH],
) -> Vec<u8> {
    let mut aad = Vec::with_capacity(EXCHANGE_KEY_LENGTH * 2);
    aad.extend_from_slice(ephemeral_public);
    aad.extend_from_slice(recipient_public);
    aad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encryption::generate_key;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let bob = ExchangeSecret::generate();
        let key = generate_key();

        let wrapped = wrap_key(&bob.public_key(), &key).unwrap();
        assert_eq!(unwrap_key(&bob, &wrapped).unwrap(), key);
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() {
        let bob = ExchangeSecret::generate();
        let mallory = ExchangeSecret::generate();
        let wrapped = wrap_key(&bob.public_key(), &generate_key()).unwrap();

        assert!(unwrap_key(&mallory, &wrapped).is_err());
    }

    #[test]
    fn each_wrap_uses_a_fresh_ephemeral_key() {
        let bob = ExchangeSecret::generate();
        let key = generate_key();
        let w1 = wrap_key(&bob.public_key(), &key).unwrap();
        let w2 = wrap_key(&bob.public_key(), &key).unwrap();
        assert_ne!(w1.ephemeral_public, w2.ephemeral_public);
    }

    #[test]
    fn swapped_ephemeral_key_fails() {
        let bob = ExchangeSecret::generate();
        let key = generate_key();
        let mut w1 = wrap_key(&bob.public_key(), &key).unwrap();
        let w2 = wrap_key(&bob.public_key(), &key).unwrap();
        w1.ephemeral_public = w2.ephemeral_public;

        assert!(unwrap_key(&bob, &w1).is_err());
    }
}

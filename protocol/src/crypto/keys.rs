//! # Key Management
//!
//! Ed25519 signing keypairs and X25519 exchange secrets for dCent peers.
//!
//! Every peer holds two pieces of long-term key material:
//!
//! - a [`PeerKeypair`] (Ed25519) that signs contracts, and
//! - an [`ExchangeSecret`] (X25519) that unwraps per-contract content keys.
//!
//! They are kept separate instead of converting one curve form into the
//! other. A leaked exchange secret exposes contract content but cannot forge
//! signatures, and vice versa.
//!
//! Key bytes are never logged. `Debug` impls print public halves only.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::config::{EXCHANGE_KEY_LENGTH, SIGNATURE_LENGTH, VERIFYING_KEY_LENGTH};

// ---------------------------------------------------------------------------
// PeerKeypair
// ---------------------------------------------------------------------------

/// An Ed25519 signing keypair.
///
/// Does NOT implement `Serialize`. Persisting a private key must be an
/// explicit call to [`secret_key_bytes`](Self::secret_key_bytes), never a
/// side effect of serializing some larger struct.
///
/// # Examples
///
/// ```
/// use dcent_protocol::crypto::keys::PeerKeypair;
///
/// let kp = PeerKeypair::generate();
/// let sig = kp.sign(b"alice agrees to deliver 3 crates");
/// assert!(kp.public_key().verify(b"alice agrees to deliver 3 crates", &sig));
/// ```
pub struct PeerKeypair {
    signing_key: SigningKey,
}

impl PeerKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// In Ed25519 the 32-byte secret key *is* the seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> PeerPublicKey {
        PeerPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> PeerSignature {
        let sig = self.signing_key.sign(message);
        PeerSignature {
            bytes: sig.to_bytes().to_vec(),
        }
    }

    /// Exports the raw 32-byte secret key material.
    ///
    /// **Handle with care.** The only caller in this workspace is the
    /// keystore, which persists it next to the exchange secret.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }
}

impl Clone for PeerKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for PeerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// PeerPublicKey
// ---------------------------------------------------------------------------

/// The public half of a peer's signing identity.
///
/// Its BLAKE3 hash is the peer's [`PeerId`](crate::identity::PeerId).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerPublicKey {
    #[serde(with = "crate::encoding::hex_bytes")]
    bytes: [u8; VERIFYING_KEY_LENGTH],
}

impl PeerPublicKey {
    /// Create a `PeerPublicKey` from raw bytes without curve validation.
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_LENGTH] {
        &self.bytes
    }

    /// Verify a signature against this public key.
    ///
    /// Returns `false` for every failure mode: malformed key, malformed
    /// signature, or a signature that simply does not match.
    pub fn verify(&self, message: &[u8], signature: &PeerSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(dalek_sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Hash for PeerPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// PeerSignature
// ---------------------------------------------------------------------------

/// An Ed25519 signature over a message.
///
/// Stored as `Vec<u8>` for serde compatibility. A value that is not exactly
/// 64 bytes never panics; it just fails verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerSignature {
    #[serde(with = "crate::encoding::hex_bytes")]
    bytes: Vec<u8>,
}

impl PeerSignature {
    /// Create a signature from its raw 64-byte representation.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; SIGNATURE_LENGTH] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    /// Returns the hex-encoded signature string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for PeerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PeerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "PeerSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "PeerSignature({})", hex_str)
        }
    }
}

// ---------------------------------------------------------------------------
// ExchangeSecret
// ---------------------------------------------------------------------------

/// A long-term X25519 secret used to unwrap content keys addressed to a peer.
pub struct ExchangeSecret {
    secret: StaticSecret,
}

impl ExchangeSecret {
    /// Generate a fresh exchange secret from the OS RNG.
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// Rebuild an exchange secret from its persisted bytes.
    pub fn from_bytes(bytes: [u8; EXCHANGE_KEY_LENGTH]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// Raw secret bytes, for the keystore only.
    pub fn to_bytes(&self) -> [u8; EXCHANGE_KEY_LENGTH] {
        self.secret.to_bytes()
    }

    /// The matching public key that senders wrap content keys to.
    pub fn public_key(&self) -> [u8; EXCHANGE_KEY_LENGTH] {
        X25519PublicKey::from(&self.secret).to_bytes()
    }

    /// Raw Diffie-Hellman with a peer's public key. Callers must run the
    /// output through a KDF before using it as a key.
    pub(crate) fn diffie_hellman(&self, peer_public: &[u8; EXCHANGE_KEY_LENGTH]) -> [u8; 32] {
        let peer = X25519PublicKey::from(*peer_public);
        *self.secret.diffie_hellman(&peer).as_bytes()
    }
}

impl Clone for ExchangeSecret {
    fn clone(&self) -> Self {
        Self::from_bytes(self.to_bytes())
    }
}

impl fmt::Debug for ExchangeSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExchangeSecret(pub={})", hex::encode(self.public_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_sign_verify_roundtrip() {
        let kp = PeerKeypair::generate();
        let msg = b"deliver 3 crates by friday";
        let sig = kp.sign(msg);
        assert!(kp.public_key().verify(msg, &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = PeerKeypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!kp.public_key().verify(b"wrong message", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = PeerKeypair::generate();
        let kp2 = PeerKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.public_key().verify(b"message", &sig));
    }

    #[test]
    fn truncated_signature_is_rejected_not_panicking() {
        let kp = PeerKeypair::generate();
        let sig = kp.sign(b"message");
        let truncated = PeerSignature {
            bytes: sig.as_bytes()[..32].to_vec(),
        };
        assert!(!kp.public_key().verify(b"message", &truncated));
    }

    #[test]
    fn deterministic_from_seed() {
        let seed = [42u8; 32];
        assert_eq!(
            PeerKeypair::from_seed(&seed).public_key(),
            PeerKeypair::from_seed(&seed).public_key()
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = PeerKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("PeerKeypair(pub="));
        assert!(!debug_str.contains(&hex::encode(kp.secret_key_bytes())));
    }

    #[test]
    fn exchange_secret_agrees_on_shared_secret() {
        let alice = ExchangeSecret::generate();
        let bob = ExchangeSecret::generate();
        assert_eq!(
            alice.diffie_hellman(&bob.public_key()),
            bob.diffie_hellman(&alice.public_key())
        );
    }

    #[test]
    fn exchange_secret_bytes_roundtrip() {
        let secret = ExchangeSecret::generate();
        let restored = ExchangeSecret::from_bytes(secret.to_bytes());
        assert_eq!(secret.public_key(), restored.public_key());
    }
}

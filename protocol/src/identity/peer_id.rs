//! # Peer IDs
//!
//! A peer id is the stable handle for a participant. It is derived from the
//! peer's Ed25519 public key via BLAKE3 and rendered as a Bech32 address:
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> Bech32("dcent", hash) -> dcent1qw508d6qe...
//! ```
//!
//! The checksum catches typos when ids are pasted into the CLI. Contract
//! records, collateral rows and trust scores are all keyed by the address
//! string.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{HASH_OUTPUT_LENGTH, PEER_ID_HRP, SHORT_ID_LENGTH};
use crate::crypto::hash::blake3_hash;
use crate::crypto::keys::PeerPublicKey;

/// Errors from parsing a peer address.
#[derive(Debug, Error)]
pub enum PeerIdError {
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid address data length: expected {expected} bytes, got {got}")]
    InvalidDataLength { expected: usize, got: usize },
}

/// A peer identity: the BLAKE3 hash of the peer's signing key.
///
/// Cheap to copy, totally ordered, hashable. Ordering follows the raw hash
/// bytes, not the address string.
///
/// # Examples
///
/// ```
/// use dcent_protocol::crypto::PeerKeypair;
/// use dcent_protocol::identity::PeerId;
///
/// let kp = PeerKeypair::generate();
/// let id = PeerId::from_public_key(&kp.public_key());
/// let address = id.to_address();
/// assert!(address.starts_with("dcent1"));
/// assert_eq!(PeerId::from_address(&address).unwrap(), id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId {
    key_hash: [u8; HASH_OUTPUT_LENGTH],
}

impl PeerId {
    pub fn from_public_key(pk: &PeerPublicKey) -> Self {
        Self {
            key_hash: blake3_hash(pk.as_bytes()),
        }
    }

    /// Whether `pk` is the key this id was derived from.
    pub fn matches(&self, pk: &PeerPublicKey) -> bool {
        blake3_hash(pk.as_bytes()) == self.key_hash
    }

    /// Encode as a Bech32 address string.
    pub fn to_address(&self) -> String {
        bech32::encode::<Bech32>(hrp(), &self.key_hash)
            .expect("encoding a 32-byte payload should never fail")
    }

    /// Parse a Bech32 address. Validates HRP, checksum and length.
    pub fn from_address(addr: &str) -> Result<Self, PeerIdError> {
        let (got, data) =
            bech32::decode(addr).map_err(|e| PeerIdError::Bech32Decode(e.to_string()))?;

        if got != hrp() {
            return Err(PeerIdError::InvalidHrp {
                expected: PEER_ID_HRP.to_string(),
                got: got.to_string(),
            });
        }

        let key_hash: [u8; HASH_OUTPUT_LENGTH] =
            data.as_slice()
                .try_into()
                .map_err(|_| PeerIdError::InvalidDataLength {
                    expected: HASH_OUTPUT_LENGTH,
                    got: data.len(),
                })?;

        Ok(Self { key_hash })
    }

    /// The first few characters of the address, for log lines and tables.
    pub fn short(&self) -> String {
        self.to_address().chars().take(SHORT_ID_LENGTH).collect()
    }

    pub fn key_hash(&self) -> &[u8; HASH_OUTPUT_LENGTH] {
        &self.key_hash
    }
}

fn hrp() -> Hrp {
    Hrp::parse_unchecked(PEER_ID_HRP)
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_address(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_address())
    }
}

impl Serialize for PeerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_address())
        } else {
            serializer.serialize_bytes(&self.key_hash)
        }
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            PeerId::from_address(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let key_hash: [u8; HASH_OUTPUT_LENGTH] =
                bytes.as_slice().try_into().map_err(|_| {
                    serde::de::Error::custom(format!(
                        "expected 32-byte key hash, got {}",
                        bytes.len()
                    ))
                })?;
            Ok(PeerId { key_hash })
        }
    }
}

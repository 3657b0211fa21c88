//! # Identity Module
//!
//! Who a peer is, and how the contract core gets at its keys.
//!
//! 1. **PeerId**: Bech32-encoded BLAKE3 hash of the peer's Ed25519 key.
//! 2. **Key material**: an Ed25519 keypair for signing plus an X25519
//!    secret for unwrapping contract content keys.
//! 3. **IdentityProvider**: the lookup the contract core calls. The
//!    [`Keystore`] implements it over a [`Store`](crate::storage::Store).
//!
//! The contract core never sees where keys come from. A peer whose material
//! cannot be found is an *unknown signer* to it.

pub mod keystore;
pub mod peer_id;

pub use keystore::{KeyRecord, Keystore};
pub use peer_id::{PeerId, PeerIdError};

use thiserror::Error;

use crate::config::EXCHANGE_KEY_LENGTH;
use crate::crypto::keys::{ExchangeSecret, PeerKeypair, PeerPublicKey};
use crate::storage::StoreError;

/// Errors from looking up key material.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Everything needed to act as a peer: sign contracts and open content
/// addressed to it.
#[derive(Clone, Debug)]
pub struct SigningMaterial {
    pub keypair: PeerKeypair,
    pub exchange: ExchangeSecret,
}

impl SigningMaterial {
    pub fn generate() -> Self {
        Self {
            keypair: PeerKeypair::generate(),
            exchange: ExchangeSecret::generate(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.keypair.public_key())
    }

    pub fn public(&self) -> PublicMaterial {
        PublicMaterial {
            verifying_key: self.keypair.public_key(),
            exchange_public: self.exchange.public_key(),
        }
    }
}

/// The public halves: enough to verify a peer's signatures and wrap keys
/// to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicMaterial {
    pub verifying_key: PeerPublicKey,
    pub exchange_public: [u8; EXCHANGE_KEY_LENGTH],
}

/// Resolves a [`PeerId`] to key material.
///
/// `Ok(None)` means the peer is unknown. Errors are reserved for the lookup
/// itself failing.
pub trait IdentityProvider: Send + Sync {
    fn signing_material(&self, peer: &PeerId) -> Result<Option<SigningMaterial>, IdentityError>;

    fn public_material(&self, peer: &PeerId) -> Result<Option<PublicMaterial>, IdentityError> {
        Ok(self.signing_material(peer)?.map(|m| m.public()))
    }
}

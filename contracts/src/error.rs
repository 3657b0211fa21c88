//! Error taxonomy for contract operations.
//!
//! A failed signature check is not an error: verification returns `false`.

use dcent_protocol::crypto::EncryptionError;
use dcent_protocol::identity::{IdentityError, PeerId};
use dcent_protocol::storage::StoreError;
use thiserror::Error;

use crate::collateral::CollateralError;

/// Errors that can occur during contract operations.
#[derive(Debug, Error)]
pub enum ContractError {
    /// No key material for a peer that has to sign, decrypt, or receive a
    /// wrapped key.
    #[error("no key material for signer {0}")]
    UnknownSigner(PeerId),

    #[error("contract not found: {0}")]
    NotFound(String),

    /// The peer is neither `from` nor `to` of a bilateral contract.
    #[error("{peer} is not a party to contract {contract_id}")]
    NotAParty { contract_id: String, peer: PeerId },

    /// The peer is not in a multisig contract's participant set.
    #[error("{peer} is not a participant in contract {contract_id}")]
    NotAParticipant { contract_id: String, peer: PeerId },

    #[error("insufficient collateral: {peer} has {available}, needs {requested}")]
    InsufficientCollateral {
        peer: PeerId,
        available: u64,
        requested: u64,
    },

    /// Fewer than two distinct participants.
    #[error("a multisig contract needs at least 2 distinct participants, got {0}")]
    InvalidParticipants(usize),

    #[error("threshold {threshold} outside [1, {participants}]")]
    InvalidThreshold { threshold: usize, participants: usize },

    #[error("decrypted content is not valid UTF-8")]
    MalformedContent,

    #[error("amount overflow: balance would exceed u64::MAX")]
    AmountOverflow,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),
}

impl From<CollateralError> for ContractError {
    fn from(err: CollateralError) -> Self {
        match err {
            CollateralError::InsufficientCollateral {
                peer,
                available,
                requested,
            } => ContractError::InsufficientCollateral {
                peer,
                available,
                requested,
            },
            CollateralError::AmountOverflow => ContractError::AmountOverflow,
            CollateralError::Storage(e) => ContractError::Storage(e),
        }
    }
}

pub type ContractResult<T> = Result<T, ContractError>;

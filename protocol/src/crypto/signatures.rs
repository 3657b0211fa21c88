//! # Digital Signatures
//!
//! Ed25519 signing and verification for contract payloads.
//!
//! Bilateral contracts carry one signature from their author; multisig
//! contracts accumulate one per participant. Both go through the functions
//! here so there is a single place to audit what gets signed.

use thiserror::Error;

use super::keys::{PeerKeypair, PeerPublicKey, PeerSignature};

/// Errors during signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Sign a message with a peer keypair.
///
/// # Example
///
/// ```
/// use dcent_protocol::crypto::{PeerKeypair, sign, verify};
///
/// let keypair = PeerKeypair::generate();
/// let signature = sign(&keypair, b"terms v1");
/// assert!(verify(&keypair.public_key(), b"terms v1", &signature));
/// ```
pub fn sign(keypair: &PeerKeypair, message: &[u8]) -> PeerSignature {
    keypair.sign(message)
}

/// Verify an Ed25519 signature. `false` covers every failure mode.
pub fn verify(public_key: &PeerPublicKey, message: &[u8], signature: &PeerSignature) -> bool {
    public_key.verify(message, signature)
}

/// Verify several signatures over possibly different messages.
///
/// All must be valid. The error does not say which one failed; verify
/// individually if you need that.
pub fn batch_verify(items: &[(PeerPublicKey, &[u8], PeerSignature)]) -> Result<(), SignatureError> {
    for (pubkey, message, signature) in items {
        if !verify(pubkey, message, signature) {
            return Err(SignatureError::VerificationFailed);
        }
    }
    Ok(())
}

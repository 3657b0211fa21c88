//! # Cryptographic Primitives for dCent
//!
//! Thin, typed wrappers around audited implementations:
//!
//! - **Ed25519** signs contract terms (`ed25519-dalek`).
//! - **X25519** wraps per-contract content keys to each party (`x25519-dalek`).
//! - **AES-256-GCM** encrypts contract content (`aes-gcm`).
//! - **BLAKE3** derives peer ids and wrapping keys (`blake3`).
//!
//! The contract core treats everything here as a black box: sign/verify,
//! encrypt/decrypt with a random nonce, wrap/unwrap, hash.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod keywrap;
pub mod signatures;

pub use encryption::{decrypt, encrypt, generate_key, EncryptionError};
pub use hash::{blake3_hash, domain_separated_hash};
pub use keys::{ExchangeSecret, PeerKeypair, PeerPublicKey, PeerSignature};
pub use keywrap::{unwrap_key, wrap_key, WrappedKey};
pub use signatures::{batch_verify, sign, verify};

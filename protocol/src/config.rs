//! # Protocol Configuration & Constants
//!
//! Every magic number in dCent lives here. Collection names, key sizes,
//! address prefixes and KDF context strings are shared between the
//! protocol crate, the contract core and the CLI, so they belong in one
//! place rather than scattered as string literals.

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Bech32 human-readable prefix for peer addresses.
pub const PEER_ID_HRP: &str = "dcent";

/// Number of address characters shown by [`crate::identity::PeerId::short`].
pub const SHORT_ID_LENGTH: usize = 10;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 signing key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// X25519 public and secret key length in bytes. Content keys are wrapped
/// to each party over X25519.
pub const EXCHANGE_KEY_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes. Contract content is sealed with it.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits, the only length GCM is
/// specified for without extra hashing.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// BLAKE3 `derive_key` context for turning an X25519 shared secret into a
/// key-wrapping key. Changing this string invalidates every wrapped key.
pub const KEY_WRAP_CONTEXT: &str = "dcent 2026-01 contract content-key wrap v1";

/// Hash output length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Collection holding both bilateral and multisig contracts.
pub const COLLECTION_CONTRACTS: &str = "contracts";

/// Collection holding one collateral balance row per peer.
pub const COLLECTION_COLLATERAL: &str = "collateral";

/// Collection holding locally custodied key material.
pub const COLLECTION_KEYS: &str = "keys";

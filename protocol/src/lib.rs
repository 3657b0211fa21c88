// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # dCent Protocol: Collaborators for the Contract Core
//!
//! Everything the contract core leans on but does not own:
//!
//! - **crypto**: Ed25519 signatures, AES-256-GCM, X25519 key wrapping, BLAKE3.
//! - **identity**: Peer ids and the keystore that resolves them to keys.
//! - **storage**: Collection-oriented record store (in-memory and sled).
//! - **encoding**: Hex-in-JSON, bytes-in-bincode serde helpers.
//! - **config**: Constants shared across the workspace.
//!
//! The contract logic itself lives in `dcent-contracts`.

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod identity;
pub mod storage;

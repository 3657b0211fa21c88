// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # dCent Contracts
//!
//! The contract core: agreements between mutually distrusting peers, the
//! stake backing them, and the reputation they earn.
//!
//! - **Collateral**: per-peer balances; stake locked, released or burned in
//!   step with contract status.
//! - **Bilateral**: two-party contracts with encrypted content, a single
//!   author signature, and a both-must-agree status rule.
//! - **Multisig**: N-party contracts with threshold activation and
//!   majority breakage.
//! - **Trust**: a bounded score derived from each peer's history.
//!
//! ## Design Principles
//!
//! 1. Balance arithmetic is checked. Overflow is an error, never a wrap.
//! 2. Status is recomputed from the full vote map on every vote.
//! 3. `active` and `broken` are final.
//! 4. A contract write and the balance changes it implies commit as one
//!    batch.

pub mod bilateral;
pub mod collateral;
pub mod error;
pub mod multisig;
pub mod record;
pub mod trust;

pub use bilateral::{
    BilateralContract, BilateralManager, CollateralOutcome, CreatedBilateral, DecryptedContract,
};
pub use collateral::{
    BilateralLock, CollateralBalance, CollateralError, CollateralLedger, CollateralStatus,
    PooledLock,
};
pub use error::{ContractError, ContractResult};
pub use multisig::{MultisigContract, MultisigManager, MultisigSignature, MultisigTerms};
pub use record::{ContractRepository, ContractStatus, StoredContract, Vote};
pub use trust::{TrustEngine, TrustParams, TrustRecord, TrustService};

//! # Collateral Ledger
//!
//! Per-peer stake balances, plus the lock records contracts embed.
//!
//! A balance is a plain non-negative integer per peer, persisted as one
//! [`CollateralBalance`] row in the `collateral` collection. A peer with no
//! row has a balance of 0. Locking stake is just a debit: the locked amount
//! lives inside the contract's [`BilateralLock`] or [`PooledLock`] until the
//! contract activates (credited onward) or breaks (burned, credited to no
//! one).
//!
//! ## Staged writes
//!
//! Contract managers never call [`credit`](CollateralLedger::credit) or
//! [`debit`](CollateralLedger::debit) directly. They stage the balance change
//! into the same [`WriteBatch`] as the contract record and commit both at
//! once, so a crash cannot leave stake debited but unlocked.

use chrono::{DateTime, Utc};
use dcent_protocol::config::COLLECTION_COLLATERAL;
use dcent_protocol::identity::PeerId;
use dcent_protocol::storage::{RecordExt, Store, StoreError, WriteBatch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CollateralError {
    /// A debit larger than the balance. The balance is left unchanged.
    #[error("insufficient collateral: {peer} has {available}, needs {requested}")]
    InsufficientCollateral {
        peer: PeerId,
        available: u64,
        requested: u64,
    },

    #[error("amount overflow: balance would exceed u64::MAX")]
    AmountOverflow,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One peer's balance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralBalance {
    pub peer: PeerId,
    pub amount: u64,
    pub updated_at: DateTime<Utc>,
}

/// Where a contract's locked stake stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollateralStatus {
    /// Debited from the payer, held by the contract.
    #[default]
    Locked,
    /// Paid out to the recipient(s) when the contract activated.
    Released,
    /// Forfeited when the contract broke.
    Burned,
}

impl std::fmt::Display for CollateralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollateralStatus::Locked => write!(f, "locked"),
            CollateralStatus::Released => write!(f, "released"),
            CollateralStatus::Burned => write!(f, "burned"),
        }
    }
}

/// Stake held by a bilateral contract.
///
/// While locked, `from` is the debited amount and `to` is 0. On release the
/// amount moves to `to` and `from` drops to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilateralLock {
    pub from: u64,
    pub to: u64,
    pub status: CollateralStatus,
}

impl BilateralLock {
    pub fn locked(amount: u64) -> Self {
        Self {
            from: amount,
            to: 0,
            status: CollateralStatus::Locked,
        }
    }
}

/// Stake pooled by a multisig contract: per-payer locked amounts and
/// per-recipient released amounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PooledLock {
    pub from: BTreeMap<PeerId, u64>,
    pub to: BTreeMap<PeerId, u64>,
    pub status: CollateralStatus,
}

impl PooledLock {
    /// Sum of everything still held for payers.
    pub fn total_locked(&self) -> u64 {
        self.from.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

// ---------------------------------------------------------------------------
// CollateralLedger
// ---------------------------------------------------------------------------

/// Balance bookkeeping over a [`Store`].
#[derive(Clone)]
pub struct CollateralLedger {
    store: Arc<dyn Store>,
}

impl CollateralLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current balance. Unknown peers read as 0.
    pub fn get(&self, peer: &PeerId) -> Result<u64, CollateralError> {
        Ok(self
            .store
            .get_record::<CollateralBalance>(COLLECTION_COLLATERAL, &peer.to_address())?
            .map(|row| row.amount)
            .unwrap_or(0))
    }

    /// Add `amount` to a balance and return the new balance. Zero is a no-op.
    pub fn credit(&self, peer: &PeerId, amount: u64) -> Result<u64, CollateralError> {
        let mut batch = WriteBatch::new();
        let balance = self.stage_credit(&mut batch, peer, amount)?;
        self.store.commit(batch)?;
        Ok(balance)
    }

    /// Subtract `amount` from a balance and return the new balance. Zero is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`CollateralError::InsufficientCollateral`] if the balance is smaller
    /// than `amount`. Nothing is written in that case.
    pub fn debit(&self, peer: &PeerId, amount: u64) -> Result<u64, CollateralError> {
        let mut batch = WriteBatch::new();
        let balance = self.stage_debit(&mut batch, peer, amount)?;
        self.store.commit(batch)?;
        Ok(balance)
    }

    /// Overwrite a balance. Used for onboarding and tests.
    pub fn set(&self, peer: &PeerId, amount: u64) -> Result<(), CollateralError> {
        let mut batch = WriteBatch::new();
        stage_row(&mut batch, peer, amount)?;
        self.store.commit(batch)?;
        debug!(peer = %peer.short(), amount, "balance set");
        Ok(())
    }

    /// Every balance row, ordered by peer address.
    pub fn balances(&self) -> Result<Vec<CollateralBalance>, CollateralError> {
        Ok(self.store.all_records(COLLECTION_COLLATERAL)?)
    }

    /// Stage a credit into `batch`, reading through earlier staged writes.
    pub fn stage_credit(
        &self,
        batch: &mut WriteBatch,
        peer: &PeerId,
        amount: u64,
    ) -> Result<u64, CollateralError> {
        let current = self.get_through(batch, peer)?;
        if amount == 0 {
            return Ok(current);
        }
        let updated = current
            .checked_add(amount)
            .ok_or(CollateralError::AmountOverflow)?;
        stage_row(batch, peer, updated)?;
        debug!(peer = %peer.short(), amount, balance = updated, "collateral credited");
        Ok(updated)
    }

    /// Stage a debit into `batch`, reading through earlier staged writes.
    pub fn stage_debit(
        &self,
        batch: &mut WriteBatch,
        peer: &PeerId,
        amount: u64,
    ) -> Result<u64, CollateralError> {
        let current = self.get_through(batch, peer)?;
        if amount == 0 {
            return Ok(current);
        }
        let updated =
            current
                .checked_sub(amount)
                .ok_or(CollateralError::InsufficientCollateral {
                    peer: *peer,
                    available: current,
                    requested: amount,
                })?;
        stage_row(batch, peer, updated)?;
        debug!(peer = %peer.short(), amount, balance = updated, "collateral debited");
        Ok(updated)
    }

    fn get_through(&self, batch: &WriteBatch, peer: &PeerId) -> Result<u64, CollateralError> {
        Ok(self
            .store
            .get_record_through::<CollateralBalance>(
                batch,
                COLLECTION_COLLATERAL,
                &peer.to_address(),
            )?
            .map(|row| row.amount)
            .unwrap_or(0))
    }
}

fn stage_row(batch: &mut WriteBatch, peer: &PeerId, amount: u64) -> Result<(), CollateralError> {
    let row = CollateralBalance {
        peer: *peer,
        amount,
        updated_at: Utc::now(),
    };
    batch.put_record(COLLECTION_COLLATERAL, &peer.to_address(), &row)?;
    Ok(())
}

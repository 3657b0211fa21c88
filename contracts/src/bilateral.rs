//! # Bilateral Contracts
//!
//! A two-party agreement between `from` and `to`. The lifecycle:
//!
//! 1. **Create**: `from` encrypts the content, wraps the content key for
//!    both parties, optionally locks collateral, and signs the terms.
//! 2. **Vote**: each party records `active` (fulfilled) or `broken`.
//! 3. **Resolve**: when both votes agree the contract becomes `active`
//!    (collateral released to `to`) or `broken` (collateral burned).
//!    Disagreement leaves it `pending`.
//!
//! Status is recomputed from the full approval map on every vote, so the
//! order votes arrive in never matters. Once terminal, later votes are still
//! recorded but the status never moves again.
//!
//! ## What the signature covers
//!
//! The immutable terms: id, parties, amount, creation time, the ciphertext,
//! its nonce and the wrapped keys. Approvals, status and collateral are
//! runtime state and are deliberately left out, so a contract that has gone
//! through its normal lifecycle still verifies while any edit to its terms
//! does not. The flip side: editing the collateral lock after the fact,
//! amounts included, leaves the signature valid.

use chrono::{DateTime, Utc};
use dcent_protocol::config::{AES_NONCE_LENGTH, SIGNATURE_LENGTH};
use dcent_protocol::crypto::{self, PeerSignature, WrappedKey};
use dcent_protocol::identity::{IdentityProvider, PeerId};
use dcent_protocol::storage::{Store, WriteBatch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collateral::{BilateralLock, CollateralError, CollateralLedger, CollateralStatus};
use crate::error::{ContractError, ContractResult};
use crate::record::{ContractRepository, ContractStatus, StoredContract, Vote};

/// Domain tag prepended to the signed bytes.
const SIGNING_DOMAIN: &[u8] = b"dcent/bilateral/v1";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A signed, encrypted agreement between two peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilateralContract {
    pub id: String,
    pub from: PeerId,
    pub to: PeerId,
    /// Nominal value of the agreement. Not moved by the ledger.
    pub amount: u64,
    pub created: DateTime<Utc>,
    /// AES-256-GCM ciphertext of the content, tag included.
    #[serde(with = "dcent_protocol::encoding::hex_bytes")]
    pub encrypted_content: Vec<u8>,
    #[serde(with = "dcent_protocol::encoding::hex_bytes")]
    pub iv: [u8; AES_NONCE_LENGTH],
    /// The content key, wrapped once for each party.
    pub encrypted_keys: BTreeMap<PeerId, WrappedKey>,
    /// `None` when no stake was requested or the payer could not cover it.
    pub collateral: Option<BilateralLock>,
    pub status: ContractStatus,
    pub approvals: BTreeMap<PeerId, Vote>,
    pub signature: PeerSignature,
    /// Always equal to `from`.
    pub signer: PeerId,
}

impl BilateralContract {
    pub fn is_party(&self, peer: &PeerId) -> bool {
        *peer == self.from || *peer == self.to
    }

    /// Canonical bytes that `from` signs.
    ///
    /// Built by hand with NUL separators and little-endian integers; serde
    /// output is not used because its layout is format-dependent.
    ///
    /// Excluded fields: `collateral`, `status`, `approvals`, `signature`,
    /// `signer`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.encrypted_content.len());

        buf.extend_from_slice(SIGNING_DOMAIN);
        buf.push(0x00);

        buf.extend_from_slice(self.id.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(self.from.key_hash());
        buf.extend_from_slice(self.to.key_hash());

        buf.extend_from_slice(&self.amount.to_le_bytes());

        // Creation time: seconds then sub-second nanos, both LE.
        buf.extend_from_slice(&self.created.timestamp().to_le_bytes());
        buf.extend_from_slice(&self.created.timestamp_subsec_nanos().to_le_bytes());

        buf.extend_from_slice(&self.iv);
        buf.extend_from_slice(&(self.encrypted_content.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.encrypted_content);

        // BTreeMap iteration is ordered, so this is deterministic.
        buf.extend_from_slice(&(self.encrypted_keys.len() as u32).to_le_bytes());
        for (peer, wrapped) in &self.encrypted_keys {
            buf.extend_from_slice(peer.key_hash());
            buf.extend_from_slice(&wrapped.ephemeral_public);
            buf.extend_from_slice(&wrapped.nonce);
            buf.extend_from_slice(&(wrapped.ciphertext.len() as u32).to_le_bytes());
            buf.extend_from_slice(&wrapped.ciphertext);
        }

        buf
    }

    /// The status the current approvals call for.
    ///
    /// Both parties active → `Active`; both broken → `Broken`; anything
    /// else, including a single vote, → `Pending`.
    pub fn resolved_status(&self) -> ContractStatus {
        match (self.approvals.get(&self.from), self.approvals.get(&self.to)) {
            (Some(Vote::Active), Some(Vote::Active)) => ContractStatus::Active,
            (Some(Vote::Broken), Some(Vote::Broken)) => ContractStatus::Broken,
            _ => ContractStatus::Pending,
        }
    }
}

/// What happened to the collateral requested at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CollateralOutcome {
    /// `collateral_amount` was 0.
    NotRequested,
    Locked { amount: u64 },
    /// The payer could not cover it. The contract was created without stake.
    Skipped { requested: u64, available: u64 },
}

/// Result of [`BilateralManager::create`].
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBilateral {
    pub contract: BilateralContract,
    pub collateral: CollateralOutcome,
}

/// A contract together with its decrypted content. The stored record is
/// not modified.
#[derive(Debug, Clone, Serialize)]
pub struct DecryptedContract {
    pub contract: BilateralContract,
    pub content: String,
}

// ---------------------------------------------------------------------------
// BilateralManager
// ---------------------------------------------------------------------------

/// Creates bilateral contracts and drives them through their lifecycle.
#[derive(Clone)]
pub struct BilateralManager {
    contracts: ContractRepository,
    ledger: CollateralLedger,
    identities: Arc<dyn IdentityProvider>,
}

impl BilateralManager {
    pub fn new(store: Arc<dyn Store>, identities: Arc<dyn IdentityProvider>) -> Self {
        Self {
            contracts: ContractRepository::new(store.clone()),
            ledger: CollateralLedger::new(store),
            identities,
        }
    }

    /// Create, sign and persist a contract.
    ///
    /// Collateral is best-effort: if `from` cannot cover `collateral_amount`
    /// the contract is still created, with `collateral = None`, and the
    /// returned [`CollateralOutcome`] says so.
    ///
    /// # Errors
    ///
    /// [`ContractError::UnknownSigner`] if `from` has no signing material or
    /// `to` has no public material. Nothing is persisted on error.
    pub fn create(
        &self,
        from: &PeerId,
        to: &PeerId,
        content: &str,
        amount: u64,
        collateral_amount: u64,
    ) -> ContractResult<CreatedBilateral> {
        let signer = self
            .identities
            .signing_material(from)?
            .ok_or(ContractError::UnknownSigner(*from))?;
        let recipient = self
            .identities
            .public_material(to)?
            .ok_or(ContractError::UnknownSigner(*to))?;

        let content_key = crypto::generate_key();
        let (iv, encrypted_content) = crypto::encrypt(&content_key, content.as_bytes())?;

        let mut encrypted_keys = BTreeMap::new();
        encrypted_keys.insert(
            *from,
            crypto::wrap_key(&signer.exchange.public_key(), &content_key)?,
        );
        encrypted_keys.insert(*to, crypto::wrap_key(&recipient.exchange_public, &content_key)?);

        let id = format!("ctr_{}", Uuid::new_v4().simple());
        let mut batch = WriteBatch::new();

        let (collateral, outcome) = if collateral_amount == 0 {
            (None, CollateralOutcome::NotRequested)
        } else {
            match self.ledger.stage_debit(&mut batch, from, collateral_amount) {
                Ok(_) => (
                    Some(BilateralLock::locked(collateral_amount)),
                    CollateralOutcome::Locked {
                        amount: collateral_amount,
                    },
                ),
                Err(CollateralError::InsufficientCollateral {
                    available,
                    requested,
                    ..
                }) => {
                    warn!(
                        contract = %id,
                        payer = %from.short(),
                        available,
                        requested,
                        "insufficient collateral, creating contract without stake"
                    );
                    (None, CollateralOutcome::Skipped { requested, available })
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mut contract = BilateralContract {
            id,
            from: *from,
            to: *to,
            amount,
            created: Utc::now(),
            encrypted_content,
            iv,
            encrypted_keys,
            collateral,
            status: ContractStatus::Pending,
            approvals: BTreeMap::new(),
            signature: PeerSignature::from_bytes([0u8; SIGNATURE_LENGTH]),
            signer: *from,
        };
        contract.signature = signer.keypair.sign(&contract.signable_bytes());

        self.contracts
            .stage(&mut batch, &StoredContract::Bilateral(contract.clone()))?;
        self.contracts.commit(batch)?;

        info!(
            contract = %contract.id,
            from = %from.short(),
            to = %to.short(),
            amount,
            collateral = collateral_amount,
            "bilateral contract created"
        );

        Ok(CreatedBilateral {
            contract,
            collateral: outcome,
        })
    }

    /// Decrypt a contract's content as `peer`.
    ///
    /// # Errors
    ///
    /// [`ContractError::NotAParty`] if no key was wrapped for `peer`;
    /// [`ContractError::UnknownSigner`] if `peer`'s secrets are not available.
    pub fn decrypt(
        &self,
        contract: &BilateralContract,
        peer: &PeerId,
    ) -> ContractResult<DecryptedContract> {
        let wrapped = contract
            .encrypted_keys
            .get(peer)
            .ok_or_else(|| ContractError::NotAParty {
                contract_id: contract.id.clone(),
                peer: *peer,
            })?;
        let material = self
            .identities
            .signing_material(peer)?
            .ok_or(ContractError::UnknownSigner(*peer))?;

        let content_key = crypto::unwrap_key(&material.exchange, wrapped)?;
        let plain = crypto::decrypt(&content_key, &contract.iv, &contract.encrypted_content)?;
        let content = String::from_utf8(plain).map_err(|_| ContractError::MalformedContent)?;

        Ok(DecryptedContract {
            contract: contract.clone(),
            content,
        })
    }

    /// Check the author's signature over the contract terms.
    ///
    /// A bad signature is `Ok(false)`. Only a missing signer key is an error.
    pub fn verify_signature(&self, contract: &BilateralContract) -> ContractResult<bool> {
        let public = self
            .identities
            .public_material(&contract.signer)?
            .ok_or(ContractError::UnknownSigner(contract.signer))?;

        if contract.signer != contract.from || !contract.signer.matches(&public.verifying_key) {
            return Ok(false);
        }
        Ok(public
            .verifying_key
            .verify(&contract.signable_bytes(), &contract.signature))
    }

    /// Record `peer`'s vote and recompute the contract's status.
    ///
    /// Activation releases locked collateral to `to`; breakage burns it.
    /// On a contract that is already active or broken the vote is recorded
    /// but status and collateral stay as they are.
    pub fn set_status(
        &self,
        contract_id: &str,
        peer: &PeerId,
        vote: Vote,
    ) -> ContractResult<BilateralContract> {
        let mut contract = self
            .contracts
            .bilateral(contract_id)?
            .ok_or_else(|| ContractError::NotFound(contract_id.to_string()))?;

        if !contract.is_party(peer) {
            return Err(ContractError::NotAParty {
                contract_id: contract_id.to_string(),
                peer: *peer,
            });
        }

        contract.approvals.insert(*peer, vote);

        let mut batch = WriteBatch::new();
        if contract.status.is_terminal() {
            debug!(
                contract = %contract.id,
                peer = %peer.short(),
                %vote,
                status = %contract.status,
                "vote on settled contract recorded, status unchanged"
            );
        } else {
            contract.status = contract.resolved_status();
            match contract.status {
                ContractStatus::Active => self.release(&mut batch, &mut contract)?,
                ContractStatus::Broken => burn(&mut contract),
                ContractStatus::Pending => {
                    debug!(contract = %contract.id, peer = %peer.short(), %vote, "vote recorded");
                }
            }
        }

        self.contracts
            .stage(&mut batch, &StoredContract::Bilateral(contract.clone()))?;
        self.contracts.commit(batch)?;
        Ok(contract)
    }

    pub fn get(&self, id: &str) -> ContractResult<Option<BilateralContract>> {
        self.contracts.bilateral(id)
    }

    pub fn list(&self) -> ContractResult<Vec<BilateralContract>> {
        self.contracts.list_bilateral()
    }

    fn release(&self, batch: &mut WriteBatch, contract: &mut BilateralContract) -> ContractResult<()> {
        info!(contract = %contract.id, "bilateral contract active");

        let Some(lock) = contract.collateral.as_mut() else {
            return Ok(());
        };
        if lock.status != CollateralStatus::Locked {
            return Ok(());
        }

        let amount = lock.from;
        self.ledger.stage_credit(batch, &contract.to, amount)?;
        lock.to = amount;
        lock.from = 0;
        lock.status = CollateralStatus::Released;

        info!(
            contract = %contract.id,
            recipient = %contract.to.short(),
            amount,
            "collateral released"
        );
        Ok(())
    }
}

fn burn(contract: &mut BilateralContract) {
    info!(contract = %contract.id, "bilateral contract broken");

    if let Some(lock) = contract.collateral.as_mut() {
        if lock.status == CollateralStatus::Locked {
            lock.status = CollateralStatus::Burned;
            info!(contract = %contract.id, amount = lock.from, "collateral burned");
        }
    }
}

//! # Multisig Contracts
//!
//! Group agreements between two or more participants, activated by a
//! threshold of `active` votes.
//!
//! - **Sign** attests to the terms with an Ed25519 signature and counts as an
//!   `active` vote.
//! - **Break** counts as a `broken` vote. No key is needed.
//!
//! After every vote the status is recomputed from the whole approval map:
//!
//! | Condition                                  | Status    |
//! |--------------------------------------------|-----------|
//! | `active votes >= threshold`                | `active`  |
//! | `broken votes > participants / 2`          | `broken`  |
//! | otherwise                                  | `pending` |
//!
//! The two gates differ on purpose: activation needs the threshold,
//! breakage needs a strict majority of everyone.
//!
//! `active` and `broken` are terminal. Later signatures and votes are still
//! recorded, but the status and the collateral never move again.
//!
//! ## Collateral
//!
//! Each peer in `from_peers` stakes `collateral_amount` at creation, best
//! effort. On activation every payer's full stake is credited to *every*
//! peer in `to_peers`. The pool is not divided, so total credits exceed
//! total stake whenever there is more than one recipient. This is the
//! historical payout rule and is kept as is until it is settled whether
//! payouts should be pro-rata.

use chrono::{DateTime, Utc};
use dcent_protocol::crypto::{self, PeerSignature};
use dcent_protocol::identity::{IdentityProvider, PeerId};
use dcent_protocol::storage::{Store, WriteBatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collateral::{CollateralError, CollateralLedger, CollateralStatus, PooledLock};
use crate::error::{ContractError, ContractResult};
use crate::record::{ContractRepository, ContractStatus, StoredContract, Vote};

const SIGNING_DOMAIN: &[u8] = b"dcent/multisig/v1";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigSignature {
    pub signer: PeerId,
    pub signature: PeerSignature,
}

/// An N-party agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigContract {
    pub id: String,
    /// Distinct, in the order given at creation.
    pub participants: Vec<PeerId>,
    pub threshold: usize,
    pub from_peers: Vec<PeerId>,
    pub to_peers: Vec<PeerId>,
    /// Stored in the clear; every participant can read it.
    pub content: String,
    pub amount: u64,
    pub created: DateTime<Utc>,
    pub collateral: PooledLock,
    /// At most one entry per signer.
    pub signatures: Vec<MultisigSignature>,
    pub approvals: BTreeMap<PeerId, Vote>,
    pub status: ContractStatus,
}

impl MultisigContract {
    pub fn is_participant(&self, peer: &PeerId) -> bool {
        self.participants.contains(peer)
    }

    pub fn has_signed(&self, peer: &PeerId) -> bool {
        self.signatures.iter().any(|s| s.signer == *peer)
    }

    /// Canonical bytes each participant signs: id, participants, threshold,
    /// content, amount and creation time. Collateral, approvals, signatures
    /// and status are not covered.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.content.len() + 32 * self.participants.len());

        buf.extend_from_slice(SIGNING_DOMAIN);
        buf.push(0x00);

        buf.extend_from_slice(self.id.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&(self.participants.len() as u32).to_le_bytes());
        for peer in &self.participants {
            buf.extend_from_slice(peer.key_hash());
        }

        buf.extend_from_slice(&(self.threshold as u64).to_le_bytes());

        buf.extend_from_slice(&(self.content.len() as u64).to_le_bytes());
        buf.extend_from_slice(self.content.as_bytes());

        buf.extend_from_slice(&self.amount.to_le_bytes());

        buf.extend_from_slice(&self.created.timestamp().to_le_bytes());
        buf.extend_from_slice(&self.created.timestamp_subsec_nanos().to_le_bytes());

        buf
    }

    pub fn active_votes(&self) -> usize {
        self.approvals.values().filter(|v| **v == Vote::Active).count()
    }

    pub fn broken_votes(&self) -> usize {
        self.approvals.values().filter(|v| **v == Vote::Broken).count()
    }

    /// The status the current approvals call for.
    pub fn resolved_status(&self) -> ContractStatus {
        if self.active_votes() >= self.threshold {
            ContractStatus::Active
        } else if self.broken_votes() as f64 > self.participants.len() as f64 / 2.0 {
            ContractStatus::Broken
        } else {
            ContractStatus::Pending
        }
    }
}

/// Parameters for [`MultisigManager::create`].
#[derive(Debug, Clone, Default)]
pub struct MultisigTerms {
    pub participants: Vec<PeerId>,
    pub threshold: usize,
    pub content: String,
    pub amount: u64,
    pub from_peers: Vec<PeerId>,
    pub to_peers: Vec<PeerId>,
    /// Staked by each payer in `from_peers`.
    pub collateral_amount: u64,
}

fn dedup_preserving_order(peers: Vec<PeerId>) -> Vec<PeerId> {
    let mut seen = BTreeSet::new();
    peers.into_iter().filter(|p| seen.insert(*p)).collect()
}

// ---------------------------------------------------------------------------
// MultisigManager
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MultisigManager {
    contracts: ContractRepository,
    ledger: CollateralLedger,
    identities: Arc<dyn IdentityProvider>,
}

impl MultisigManager {
    pub fn new(store: Arc<dyn Store>, identities: Arc<dyn IdentityProvider>) -> Self {
        Self {
            contracts: ContractRepository::new(store.clone()),
            ledger: CollateralLedger::new(store),
            identities,
        }
    }

    /// Validate, stake and persist a new multisig contract.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidParticipants`] with fewer than 2 distinct
    /// participants, [`ContractError::InvalidThreshold`] if the threshold is
    /// outside `[1, participants]`. Nothing is persisted on error. A payer
    /// short on collateral is skipped, not an error.
    pub fn create(&self, terms: MultisigTerms) -> ContractResult<MultisigContract> {
        let participants = dedup_preserving_order(terms.participants);
        if participants.len() < 2 {
            return Err(ContractError::InvalidParticipants(participants.len()));
        }
        if terms.threshold < 1 || terms.threshold > participants.len() {
            return Err(ContractError::InvalidThreshold {
                threshold: terms.threshold,
                participants: participants.len(),
            });
        }

        let from_peers = dedup_preserving_order(terms.from_peers);
        let to_peers = dedup_preserving_order(terms.to_peers);
        let id = format!("ctr_multi_{}", Uuid::new_v4().simple());

        let mut batch = WriteBatch::new();
        let mut collateral = PooledLock::default();
        if terms.collateral_amount > 0 {
            for payer in &from_peers {
                match self
                    .ledger
                    .stage_debit(&mut batch, payer, terms.collateral_amount)
                {
                    Ok(_) => {
                        collateral.from.insert(*payer, terms.collateral_amount);
                    }
                    Err(CollateralError::InsufficientCollateral {
                        available,
                        requested,
                        ..
                    }) => {
                        warn!(
                            contract = %id,
                            payer = %payer.short(),
                            available,
                            requested,
                            "insufficient collateral, payer skipped"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let contract = MultisigContract {
            id,
            participants,
            threshold: terms.threshold,
            from_peers,
            to_peers,
            content: terms.content,
            amount: terms.amount,
            created: Utc::now(),
            collateral,
            signatures: Vec::new(),
            approvals: BTreeMap::new(),
            status: ContractStatus::Pending,
        };

        self.contracts
            .stage(&mut batch, &StoredContract::Multisig(contract.clone()))?;
        self.contracts.commit(batch)?;

        info!(
            contract = %contract.id,
            participants = contract.participants.len(),
            threshold = contract.threshold,
            staked = contract.collateral.total_locked(),
            "multisig contract created"
        );
        Ok(contract)
    }

    /// Sign the terms as `signer` and count it as an `active` vote.
    ///
    /// Signing twice does not add a second signature. On a contract that is
    /// already settled the signature and vote are still recorded, but status
    /// and collateral are left alone.
    ///
    /// # Errors
    ///
    /// Besides the guards, [`ContractError::AmountOverflow`] if the payout
    /// on activation would overflow a recipient's balance. Nothing is
    /// written in that case.
    pub fn sign(&self, contract_id: &str, signer: &PeerId) -> ContractResult<MultisigContract> {
        let mut contract = self.load_for(contract_id, signer)?;
        let material = self
            .identities
            .signing_material(signer)?
            .ok_or(ContractError::UnknownSigner(*signer))?;

        if !contract.has_signed(signer) {
            let signature = material.keypair.sign(&contract.signable_bytes());
            contract.signatures.push(MultisigSignature {
                signer: *signer,
                signature,
            });
        }

        self.record_vote(contract, signer, Vote::Active)
    }

    /// Record a `broken` vote for `signer`. No key material is needed.
    pub fn break_contract(
        &self,
        contract_id: &str,
        signer: &PeerId,
    ) -> ContractResult<MultisigContract> {
        let contract = self.load_for(contract_id, signer)?;
        self.record_vote(contract, signer, Vote::Broken)
    }

    /// `true` only if every recorded signature verifies against its
    /// signer's key. A signer whose key cannot be found makes it `false`.
    pub fn verify_multisig(&self, contract: &MultisigContract) -> ContractResult<bool> {
        let message = contract.signable_bytes();
        let mut items = Vec::with_capacity(contract.signatures.len());
        for entry in &contract.signatures {
            if !contract.is_participant(&entry.signer) {
                return Ok(false);
            }
            let Some(public) = self.identities.public_material(&entry.signer)? else {
                return Ok(false);
            };
            if !entry.signer.matches(&public.verifying_key) {
                return Ok(false);
            }
            items.push((public.verifying_key, message.as_slice(), entry.signature.clone()));
        }
        Ok(crypto::batch_verify(&items).is_ok())
    }

    pub fn get(&self, id: &str) -> ContractResult<Option<MultisigContract>> {
        self.contracts.multisig(id)
    }

    pub fn list(&self) -> ContractResult<Vec<MultisigContract>> {
        self.contracts.list_multisig()
    }

    /// Write `vote` into the approvals and persist. Status is recomputed
    /// only while the contract is pending.
    fn record_vote(
        &self,
        mut contract: MultisigContract,
        signer: &PeerId,
        vote: Vote,
    ) -> ContractResult<MultisigContract> {
        contract.approvals.insert(*signer, vote);

        let mut batch = WriteBatch::new();
        if contract.status.is_terminal() {
            debug!(
                contract = %contract.id,
                signer = %signer.short(),
                %vote,
                status = %contract.status,
                "vote on settled contract recorded, status unchanged"
            );
        } else {
            self.recompute(&mut batch, &mut contract)?;
        }

        self.contracts
            .stage(&mut batch, &StoredContract::Multisig(contract.clone()))?;
        self.contracts.commit(batch)?;
        Ok(contract)
    }

    fn load_for(&self, contract_id: &str, peer: &PeerId) -> ContractResult<MultisigContract> {
        let contract = self
            .contracts
            .multisig(contract_id)?
            .ok_or_else(|| ContractError::NotFound(contract_id.to_string()))?;
        if !contract.is_participant(peer) {
            return Err(ContractError::NotAParticipant {
                contract_id: contract_id.to_string(),
                peer: *peer,
            });
        }
        Ok(contract)
    }

    /// Recompute status and stage the collateral effects of a transition.
    ///
    /// The only failure is a ledger overflow while crediting recipients.
    fn recompute(
        &self,
        batch: &mut WriteBatch,
        contract: &mut MultisigContract,
    ) -> ContractResult<()> {
        contract.status = contract.resolved_status();
        match contract.status {
            ContractStatus::Active => {
                info!(
                    contract = %contract.id,
                    active = contract.active_votes(),
                    threshold = contract.threshold,
                    "multisig contract active"
                );
                self.release(batch, contract)
            }
            ContractStatus::Broken => {
                info!(
                    contract = %contract.id,
                    broken = contract.broken_votes(),
                    participants = contract.participants.len(),
                    "multisig contract broken"
                );
                if contract.collateral.status == CollateralStatus::Locked {
                    contract.collateral.status = CollateralStatus::Burned;
                    info!(
                        contract = %contract.id,
                        amount = contract.collateral.total_locked(),
                        "collateral burned"
                    );
                }
                Ok(())
            }
            ContractStatus::Pending => Ok(()),
        }
    }

    // NOTE: fan-out payout. Each recipient gets each payer's full stake.
    fn release(&self, batch: &mut WriteBatch, contract: &mut MultisigContract) -> ContractResult<()> {
        if contract.collateral.status != CollateralStatus::Locked {
            return Ok(());
        }
        if contract.to_peers.is_empty() && contract.collateral.total_locked() > 0 {
            warn!(contract = %contract.id, "no recipients, released collateral goes to no one");
        }

        let pool = &mut contract.collateral;
        for locked in pool.from.values_mut() {
            if *locked == 0 {
                continue;
            }
            for recipient in &contract.to_peers {
                self.ledger.stage_credit(batch, recipient, *locked)?;
                let received = pool.to.entry(*recipient).or_insert(0);
                *received = received
                    .checked_add(*locked)
                    .ok_or(ContractError::AmountOverflow)?;
            }
            *locked = 0;
        }
        pool.status = CollateralStatus::Released;

        info!(
            contract = %contract.id,
            recipients = contract.to_peers.len(),
            "collateral released"
        );
        Ok(())
    }
}

//! # Trust Scoring
//!
//! Turns a peer's contract history into a bounded reputation score.
//!
//! Scores are never stored. Every query rescans the full contract set, so
//! a score can never drift from the history it summarizes.
//!
//! ## Formula
//!
//! For peer `p` with `f` fulfilled (active) contracts, `b` broken ones,
//! `d` distinct counterparties across fulfilled contracts and `c` collateral
//! received as a recipient of fulfilled contracts:
//!
//! ```text
//! base   = max_trust · (1 − e^(−k·f))
//! score  = base · (1 + α·ln(1 + c)) · (1 + β·d / max(1, f))
//! score *= 1 + δ·(threshold / participants)   for each active multisig with p
//! score *= 1 − γ·b                            if b > 0
//! score  = round(clamp(score, 0, max_trust))
//! ```
//!
//! A peer with nothing fulfilled scores 0 however much collateral or how
//! many partners it has.

use dcent_protocol::identity::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ContractResult;
use crate::record::{ContractRepository, ContractStatus, StoredContract};

/// Scoring constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustParams {
    /// Upper bound of the score.
    pub max_trust: u32,
    /// Growth rate of the base score per fulfilled contract.
    pub k: f64,
    /// Weight of received collateral.
    pub alpha: f64,
    /// Weight of counterparty diversity.
    pub beta: f64,
    /// Penalty fraction per broken contract.
    pub gamma: f64,
    /// Weight of the multisig threshold bonus.
    pub delta: f64,
}

impl Default for TrustParams {
    fn default() -> Self {
        Self {
            max_trust: 100,
            k: 0.15,
            alpha: 0.05,
            beta: 0.2,
            gamma: 0.2,
            delta: 0.3,
        }
    }
}

/// A peer's score and the inputs it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub peer: PeerId,
    pub score: u32,
    pub fulfilled: usize,
    pub broken: usize,
    pub diversity: usize,
    pub total_collateral: u64,
}

/// Stateless scorer over a contract set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustEngine {
    params: TrustParams,
}

impl TrustEngine {
    pub fn new(params: TrustParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrustParams {
        &self.params
    }

    /// Score one peer.
    pub fn trust_record(&self, peer: &PeerId, contracts: &[StoredContract]) -> TrustRecord {
        let mut fulfilled = 0usize;
        let mut broken = 0usize;
        let mut partners = BTreeSet::new();
        let mut total_collateral = 0u64;
        let mut bonus_ratios = Vec::new();

        for contract in contracts {
            match contract {
                StoredContract::Bilateral(c) => {
                    if !c.is_party(peer) {
                        continue;
                    }
                    match c.status {
                        ContractStatus::Active => {
                            fulfilled += 1;
                            partners.insert(if c.from == *peer { c.to } else { c.from });
                            if c.to == *peer {
                                if let Some(lock) = &c.collateral {
                                    total_collateral = total_collateral.saturating_add(lock.to);
                                }
                            }
                        }
                        ContractStatus::Broken => broken += 1,
                        ContractStatus::Pending => {}
                    }
                }
                StoredContract::Multisig(c) => {
                    if c.status == ContractStatus::Active {
                        if let Some(received) = c.collateral.to.get(peer) {
                            total_collateral = total_collateral.saturating_add(*received);
                        }
                    }
                    if !c.is_participant(peer) {
                        continue;
                    }
                    match c.status {
                        ContractStatus::Active => {
                            fulfilled += 1;
                            partners.extend(c.participants.iter().copied());
                            bonus_ratios.push(c.threshold as f64 / c.participants.len() as f64);
                        }
                        ContractStatus::Broken => broken += 1,
                        ContractStatus::Pending => {}
                    }
                }
            }
        }
        partners.remove(peer);

        let diversity = partners.len();
        let score = self.compute(fulfilled, broken, diversity, total_collateral, &bonus_ratios);

        TrustRecord {
            peer: *peer,
            score,
            fulfilled,
            broken,
            diversity,
            total_collateral,
        }
    }

    /// Score only. 0 for a peer with no contracts.
    pub fn get_trust_score(&self, peer: &PeerId, contracts: &[StoredContract]) -> u32 {
        self.trust_record(peer, contracts).score
    }

    /// Score every peer that appears anywhere in `contracts`.
    pub fn score_all(&self, contracts: &[StoredContract]) -> BTreeMap<PeerId, TrustRecord> {
        let mut peers = BTreeSet::new();
        for contract in contracts {
            match contract {
                StoredContract::Bilateral(c) => {
                    peers.insert(c.from);
                    peers.insert(c.to);
                }
                StoredContract::Multisig(c) => {
                    peers.extend(c.participants.iter().copied());
                    peers.extend(c.from_peers.iter().copied());
                    peers.extend(c.to_peers.iter().copied());
                }
            }
        }

        peers
            .into_iter()
            .map(|peer| (peer, self.trust_record(&peer, contracts)))
            .collect()
    }

    fn compute(
        &self,
        fulfilled: usize,
        broken: usize,
        diversity: usize,
        total_collateral: u64,
        bonus_ratios: &[f64],
    ) -> u32 {
        let p = &self.params;
        let max_trust = f64::from(p.max_trust);
        let f = fulfilled as f64;

        let base = max_trust * (1.0 - (-p.k * f).exp());
        let collateral_factor = 1.0 + p.alpha * (total_collateral as f64).ln_1p();
        let diversity_factor = 1.0 + p.beta * diversity as f64 / f.max(1.0);

        let mut score = base * collateral_factor * diversity_factor;
        for ratio in bonus_ratios {
            score *= 1.0 + p.delta * ratio;
        }
        if broken > 0 {
            score *= 1.0 - p.gamma * broken as f64;
        }

        score.clamp(0.0, max_trust).round() as u32
    }
}

/// A [`TrustEngine`] reading contracts from a [`ContractRepository`].
#[derive(Clone)]
pub struct TrustService {
    contracts: ContractRepository,
    engine: TrustEngine,
}

impl TrustService {
    pub fn new(contracts: ContractRepository, engine: TrustEngine) -> Self {
        Self { contracts, engine }
    }

    pub fn score_all(&self) -> ContractResult<BTreeMap<PeerId, TrustRecord>> {
        Ok(self.engine.score_all(&self.contracts.all()?))
    }

    pub fn trust_record(&self, peer: &PeerId) -> ContractResult<TrustRecord> {
        Ok(self.engine.trust_record(peer, &self.contracts.all()?))
    }

    pub fn get_trust_score(&self, peer: &PeerId) -> ContractResult<u32> {
        Ok(self.trust_record(peer)?.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TrustEngine {
        TrustEngine::default()
    }

    #[test]
    fn nothing_fulfilled_scores_zero() {
        let e = engine();
        assert_eq!(e.compute(0, 0, 0, 0, &[]), 0);
        assert_eq!(e.compute(0, 0, 50, 1_000_000, &[1.0, 1.0]), 0);
    }

    #[test]
    fn single_fulfilled_contract_with_one_partner() {
        // 100 · (1 − e^−0.15) · 1.2 = 16.71
        assert_eq!(engine().compute(1, 0, 1, 0, &[]), 17);
    }

    #[test]
    fn received_collateral_raises_score() {
        // 13.929 · (1 + 0.05·ln 31) · 1.2 = 19.58
        assert_eq!(engine().compute(1, 0, 1, 30, &[]), 20);
    }

    #[test]
    fn multisig_bonus_compounds() {
        let e = engine();
        let one = e.compute(2, 0, 2, 0, &[2.0 / 3.0]);
        let two = e.compute(2, 0, 2, 0, &[2.0 / 3.0, 2.0 / 3.0]);
        assert!(two > one);
    }

    #[test]
    fn penalty_scales_with_broken_count() {
        let e = engine();
        let clean = e.compute(10, 0, 5, 0, &[]);
        let once = e.compute(10, 1, 5, 0, &[]);
        let twice = e.compute(10, 2, 5, 0, &[]);
        assert!(clean > once && once > twice);
    }

    #[test]
    fn score_stays_bounded() {
        let e = engine();
        assert_eq!(e.compute(10, 500, 10, 0, &[]), 0);
        assert_eq!(e.compute(1_000, 0, 1_000, u64::MAX, &[1.0; 50]), 100);
    }

    #[test]
    fn custom_max_trust_is_respected() {
        let e = TrustEngine::new(TrustParams {
            max_trust: 10,
            ..TrustParams::default()
        });
        assert!(e.compute(1_000, 0, 1_000, 1_000, &[]) <= 10);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: TrustParams = serde_json::from_str(r#"{"gamma": 0.5}"#).unwrap();
        assert_eq!(params.gamma, 0.5);
        assert_eq!(params.max_trust, 100);
        assert_eq!(params.k, 0.15);
    }
}

//! # Contract Records
//!
//! Both contract kinds share the `contracts` collection. Each record is a
//! [`StoredContract`], an externally tagged enum, so a read always knows
//! which kind it got back. The tag is part of the bincode encoding.
//!
//! Also home to the lifecycle vocabulary both kinds use: [`ContractStatus`]
//! and [`Vote`].

use dcent_protocol::config::COLLECTION_CONTRACTS;
use dcent_protocol::storage::{RecordExt, Store, StoreResult, WriteBatch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::bilateral::BilateralContract;
use crate::error::ContractResult;
use crate::multisig::MultisigContract;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Where a contract is in its lifecycle.
///
/// `Active` and `Broken` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Pending,
    /// Fulfilled.
    Active,
    /// Breached.
    Broken,
}

impl ContractStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContractStatus::Active | ContractStatus::Broken)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractStatus::Pending => write!(f, "pending"),
            ContractStatus::Active => write!(f, "active"),
            ContractStatus::Broken => write!(f, "broken"),
        }
    }
}

/// A party's verdict on a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Active,
    Broken,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Active => write!(f, "active"),
            Vote::Broken => write!(f, "broken"),
        }
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Vote::Active),
            "broken" => Ok(Vote::Broken),
            other => Err(format!("unknown vote '{other}', expected 'active' or 'broken'")),
        }
    }
}

// ---------------------------------------------------------------------------
// StoredContract
// ---------------------------------------------------------------------------

/// A contract as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredContract {
    Bilateral(BilateralContract),
    Multisig(MultisigContract),
}

impl StoredContract {
    pub fn id(&self) -> &str {
        match self {
            StoredContract::Bilateral(c) => &c.id,
            StoredContract::Multisig(c) => &c.id,
        }
    }

    pub fn status(&self) -> ContractStatus {
        match self {
            StoredContract::Bilateral(c) => c.status,
            StoredContract::Multisig(c) => c.status,
        }
    }
}

impl From<BilateralContract> for StoredContract {
    fn from(c: BilateralContract) -> Self {
        StoredContract::Bilateral(c)
    }
}

impl From<MultisigContract> for StoredContract {
    fn from(c: MultisigContract) -> Self {
        StoredContract::Multisig(c)
    }
}

// ---------------------------------------------------------------------------
// ContractRepository
// ---------------------------------------------------------------------------

/// Typed access to the `contracts` collection.
#[derive(Clone)]
pub struct ContractRepository {
    store: Arc<dyn Store>,
}

impl ContractRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &str) -> ContractResult<Option<StoredContract>> {
        Ok(self.store.get_record(COLLECTION_CONTRACTS, id)?)
    }

    /// Every contract of both kinds, ordered by id.
    pub fn all(&self) -> ContractResult<Vec<StoredContract>> {
        Ok(self.store.all_records(COLLECTION_CONTRACTS)?)
    }

    /// A bilateral contract by id. A multisig record under that id reads as
    /// absent.
    pub fn bilateral(&self, id: &str) -> ContractResult<Option<BilateralContract>> {
        Ok(match self.get(id)? {
            Some(StoredContract::Bilateral(c)) => Some(c),
            _ => None,
        })
    }

    pub fn multisig(&self, id: &str) -> ContractResult<Option<MultisigContract>> {
        Ok(match self.get(id)? {
            Some(StoredContract::Multisig(c)) => Some(c),
            _ => None,
        })
    }

    pub fn list_bilateral(&self) -> ContractResult<Vec<BilateralContract>> {
        Ok(self
            .all()?
            .into_iter()
            .filter_map(|c| match c {
                StoredContract::Bilateral(c) => Some(c),
                StoredContract::Multisig(_) => None,
            })
            .collect())
    }

    pub fn list_multisig(&self) -> ContractResult<Vec<MultisigContract>> {
        Ok(self
            .all()?
            .into_iter()
            .filter_map(|c| match c {
                StoredContract::Multisig(c) => Some(c),
                StoredContract::Bilateral(_) => None,
            })
            .collect())
    }

    /// Stage a contract write into `batch`.
    pub fn stage(&self, batch: &mut WriteBatch, contract: &StoredContract) -> StoreResult<()> {
        batch.put_record(COLLECTION_CONTRACTS, contract.id(), contract)
    }

    pub fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.store.commit(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!ContractStatus::Pending.is_terminal());
        assert!(ContractStatus::Active.is_terminal());
        assert!(ContractStatus::Broken.is_terminal());
    }

    #[test]
    fn vote_parses_case_insensitively() {
        assert_eq!("Active".parse::<Vote>().unwrap(), Vote::Active);
        assert_eq!("broken".parse::<Vote>().unwrap(), Vote::Broken);
        assert!("maybe".parse::<Vote>().is_err());
    }

    #[test]
    fn stored_kind_survives_bincode() {
        use crate::collateral::PooledLock;
        use dcent_protocol::crypto::PeerKeypair;
        use dcent_protocol::identity::PeerId;
        use std::collections::BTreeMap;

        let peer = || PeerId::from_public_key(&PeerKeypair::generate().public_key());
        let contract = MultisigContract {
            id: "ctr_multi_1".into(),
            participants: vec![peer(), peer()],
            threshold: 2,
            from_peers: Vec::new(),
            to_peers: Vec::new(),
            content: "terms".into(),
            amount: 5,
            created: chrono::Utc::now(),
            collateral: PooledLock::default(),
            signatures: Vec::new(),
            approvals: BTreeMap::new(),
            status: ContractStatus::Pending,
        };

        let bytes = bincode::serialize(&StoredContract::from(contract.clone())).unwrap();
        match bincode::deserialize::<StoredContract>(&bytes).unwrap() {
            StoredContract::Multisig(read) => assert_eq!(read, contract),
            StoredContract::Bilateral(_) => panic!("kind changed"),
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ContractStatus::Active).unwrap(),
            "\"active\""
        );
    }
}

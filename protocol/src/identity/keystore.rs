//! # Local Keystore
//!
//! Custodies peer key material in the `keys` collection of a [`Store`].
//!
//! One [`KeyRecord`] per peer, keyed by the peer's address. A record holds
//! the Ed25519 signing secret and the X25519 exchange secret side by side.
//! They are stored in the clear: the keystore is a local development
//! convenience, and whoever can read the data directory can already read
//! every contract's wrapped keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::peer_id::PeerId;
use super::{IdentityError, IdentityProvider, SigningMaterial};
use crate::config::{COLLECTION_KEYS, EXCHANGE_KEY_LENGTH, SIGNING_KEY_LENGTH};
use crate::crypto::keys::{ExchangeSecret, PeerKeypair, PeerPublicKey};
use crate::storage::{RecordExt, Store};

/// What the keystore persists for one peer.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub peer_id: PeerId,
    /// Optional human label, e.g. "alice".
    pub label: Option<String>,
    signing_secret: [u8; SIGNING_KEY_LENGTH],
    exchange_secret: [u8; EXCHANGE_KEY_LENGTH],
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    fn from_material(material: &SigningMaterial, label: Option<String>) -> Self {
        Self {
            peer_id: material.peer_id(),
            label,
            signing_secret: material.keypair.secret_key_bytes(),
            exchange_secret: material.exchange.to_bytes(),
            created_at: Utc::now(),
        }
    }

    pub fn material(&self) -> SigningMaterial {
        SigningMaterial {
            keypair: PeerKeypair::from_seed(&self.signing_secret),
            exchange: ExchangeSecret::from_bytes(self.exchange_secret),
        }
    }

    pub fn public_key(&self) -> PeerPublicKey {
        PeerKeypair::from_seed(&self.signing_secret).public_key()
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("peer_id", &self.peer_id)
            .field("label", &self.label)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Store-backed [`IdentityProvider`].
#[derive(Clone)]
pub struct Keystore {
    store: Arc<dyn Store>,
}

impl Keystore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Generate fresh signing and exchange keys and persist them.
    pub fn generate(&self, label: Option<String>) -> Result<KeyRecord, IdentityError> {
        let material = SigningMaterial::generate();
        self.import(&material, label)
    }

    /// Persist existing material. Overwrites any record for the same peer.
    pub fn import(
        &self,
        material: &SigningMaterial,
        label: Option<String>,
    ) -> Result<KeyRecord, IdentityError> {
        let record = KeyRecord::from_material(material, label);
        self.store
            .put_record(COLLECTION_KEYS, &record.peer_id.to_address(), &record)?;
        info!(peer = %record.peer_id.short(), label = ?record.label, "stored key material");
        Ok(record)
    }

    pub fn record(&self, peer: &PeerId) -> Result<Option<KeyRecord>, IdentityError> {
        Ok(self.store.get_record(COLLECTION_KEYS, &peer.to_address())?)
    }

    /// Every record, ordered by address.
    pub fn list(&self) -> Result<Vec<KeyRecord>, IdentityError> {
        Ok(self.store.all_records(COLLECTION_KEYS)?)
    }

    /// Find a peer by its label. First match wins.
    pub fn find_by_label(&self, label: &str) -> Result<Option<KeyRecord>, IdentityError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|r| r.label.as_deref() == Some(label)))
    }
}

impl IdentityProvider for Keystore {
    fn signing_material(&self, peer: &PeerId) -> Result<Option<SigningMaterial>, IdentityError> {
        Ok(self.record(peer)?.map(|r| r.material()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn keystore() -> Keystore {
        Keystore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn generated_keys_are_retrievable() {
        let ks = keystore();
        let record = ks.generate(Some("alice".into())).unwrap();

        let material = ks.signing_material(&record.peer_id).unwrap().unwrap();
        assert_eq!(material.peer_id(), record.peer_id);
        assert_eq!(material.keypair.public_key(), record.public_key());
    }

    #[test]
    fn public_material_matches_signing_material() {
        let ks = keystore();
        let record = ks.generate(None).unwrap();

        let public = ks.public_material(&record.peer_id).unwrap().unwrap();
        let secret = record.material();
        assert_eq!(public.verifying_key, secret.keypair.public_key());
        assert_eq!(public.exchange_public, secret.exchange.public_key());
    }

    #[test]
    fn unknown_peer_has_no_material() {
        let ks = keystore();
        let stranger = PeerId::from_public_key(&PeerKeypair::generate().public_key());
        assert!(ks.signing_material(&stranger).unwrap().is_none());
        assert!(ks.public_material(&stranger).unwrap().is_none());
    }

    #[test]
    fn list_and_find_by_label() {
        let ks = keystore();
        let alice = ks.generate(Some("alice".into())).unwrap();
        ks.generate(Some("bob".into())).unwrap();

        assert_eq!(ks.list().unwrap().len(), 2);
        let found = ks.find_by_label("alice").unwrap().unwrap();
        assert_eq!(found.peer_id, alice.peer_id);
        assert!(ks.find_by_label("carol").unwrap().is_none());
    }

    #[test]
    fn debug_hides_secrets() {
        let record = keystore().generate(None).unwrap();
        let dbg = format!("{:?}", record);
        assert!(!dbg.contains(&hex::encode(record.material().keypair.secret_key_bytes())));
    }
}

//! End-to-end tests for the protocol collaborators.
//!
//! These compose the pieces the contract core relies on: key custody in a
//! sled-backed keystore, peer-id addressing, content encryption with keys
//! wrapped per recipient, and atomic multi-collection batches.
//!
//! Each test stands alone with its own temporary directory.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dcent_protocol::config::{COLLECTION_COLLATERAL, COLLECTION_CONTRACTS, PEER_ID_HRP};
use dcent_protocol::crypto::{decrypt, encrypt, generate_key, unwrap_key, wrap_key};
use dcent_protocol::identity::{IdentityProvider, Keystore, PeerId};
use dcent_protocol::storage::{RecordExt, SledStore, Store, WriteBatch};

/// Open the sled store in `dir`. A handle dropped just before may still hold
/// the file lock from its background flusher, so opening retries briefly.
fn open_sled(dir: &tempfile::TempDir) -> SledStore {
    let mut attempt = 0;
    loop {
        match SledStore::open(dir.path()) {
            Ok(store) => return store,
            Err(_) if attempt < 50 => {
                attempt += 1;
                thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("should open db: {err}"),
        }
    }
}

fn open(dir: &tempfile::TempDir) -> Arc<dyn Store> {
    Arc::new(open_sled(dir))
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn keys_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let alice = {
        let store = Arc::new(open_sled(&dir));
        let keystore = Keystore::new(store.clone());
        let alice = keystore.generate(Some("alice".into())).unwrap();
        store.flush().unwrap();
        alice
    };

    let keystore = Keystore::new(open(&dir));
    let found = keystore.find_by_label("alice").unwrap().unwrap();
    assert_eq!(found.peer_id, alice.peer_id);

    let material = keystore.signing_material(&alice.peer_id).unwrap().unwrap();
    assert_eq!(material.peer_id(), alice.peer_id);
}

#[test]
fn addresses_round_trip_through_text() {
    let keystore = Keystore::new(Arc::new(SledStore::open_temporary().unwrap()));
    let record = keystore.generate(None).unwrap();

    let address = record.peer_id.to_address();
    assert!(address.starts_with(&format!("{PEER_ID_HRP}1")));
    assert_eq!(address.parse::<PeerId>().unwrap(), record.peer_id);
    assert!(record.peer_id.matches(&record.public_key()));
}

// ---------------------------------------------------------------------------
// Content sharing
// ---------------------------------------------------------------------------

#[test]
fn content_shared_between_two_peers() {
    let keystore = Keystore::new(Arc::new(SledStore::open_temporary().unwrap()));
    let alice = keystore.generate(Some("alice".into())).unwrap().peer_id;
    let bob = keystore.generate(Some("bob".into())).unwrap().peer_id;
    let carol = keystore.generate(Some("carol".into())).unwrap().peer_id;

    // Alice seals the content and wraps the key to Bob's public material.
    let content_key = generate_key();
    let (nonce, sealed) = encrypt(&content_key, b"deliver 3 crates").unwrap();
    let bob_public = keystore.public_material(&bob).unwrap().unwrap();
    let wrapped = wrap_key(&bob_public.exchange_public, &content_key).unwrap();

    // Bob unwraps and reads.
    let bob_secret = keystore.signing_material(&bob).unwrap().unwrap();
    let recovered = unwrap_key(&bob_secret.exchange, &wrapped).unwrap();
    assert_eq!(decrypt(&recovered, &nonce, &sealed).unwrap(), b"deliver 3 crates");

    // Carol cannot.
    let carol_secret = keystore.signing_material(&carol).unwrap().unwrap();
    assert!(unwrap_key(&carol_secret.exchange, &wrapped).is_err());

    // Alice's signature over the sealed bytes verifies against her public key only.
    let alice_secret = keystore.signing_material(&alice).unwrap().unwrap();
    let signature = alice_secret.keypair.sign(&sealed);
    assert!(keystore
        .public_material(&alice)
        .unwrap()
        .unwrap()
        .verifying_key
        .verify(&sealed, &signature));
    assert!(!bob_public.verifying_key.verify(&sealed, &signature));
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[test]
fn batch_spanning_collections_is_visible_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_sled(&dir);
        let mut batch = WriteBatch::new();
        batch
            .put_record(COLLECTION_CONTRACTS, "ctr_1", &"terms".to_string())
            .unwrap();
        batch
            .put_record(COLLECTION_COLLATERAL, "dcent1alice", &70u64)
            .unwrap();
        store.commit(batch).unwrap();
        store.flush().unwrap();
    }

    let store = open(&dir);
    assert_eq!(
        store
            .get_record::<String>(COLLECTION_CONTRACTS, "ctr_1")
            .unwrap()
            .as_deref(),
        Some("terms")
    );
    assert_eq!(
        store
            .get_record::<u64>(COLLECTION_COLLATERAL, "dcent1alice")
            .unwrap(),
        Some(70)
    );
    assert_eq!(store.get_all(COLLECTION_CONTRACTS).unwrap().len(), 1);
}

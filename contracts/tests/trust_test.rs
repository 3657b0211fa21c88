//! Trust scores computed from real contract histories.

use std::sync::Arc;

use dcent_contracts::{
    BilateralManager, CollateralLedger, ContractRepository, MultisigManager, MultisigTerms,
    TrustEngine, TrustParams, TrustService, Vote,
};
use dcent_protocol::identity::{Keystore, PeerId};
use dcent_protocol::storage::{MemoryStore, Store};

struct Fixture {
    store: Arc<dyn Store>,
    keystore: Keystore,
    ledger: CollateralLedger,
    bilateral: BilateralManager,
    multisig: MultisigManager,
    trust: TrustService,
}

fn fixture() -> Fixture {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let keystore = Keystore::new(store.clone());
    let identities = Arc::new(keystore.clone());
    Fixture {
        ledger: CollateralLedger::new(store.clone()),
        bilateral: BilateralManager::new(store.clone(), identities.clone()),
        multisig: MultisigManager::new(store.clone(), identities),
        trust: TrustService::new(
            ContractRepository::new(store.clone()),
            TrustEngine::default(),
        ),
        keystore,
        store,
    }
}

impl Fixture {
    fn peer(&self, label: &str) -> PeerId {
        self.keystore.generate(Some(label.into())).unwrap().peer_id
    }

    fn settle(&self, from: &PeerId, to: &PeerId, collateral: u64, vote: Vote) {
        let id = self
            .bilateral
            .create(from, to, "terms", 1, collateral)
            .unwrap()
            .contract
            .id;
        self.bilateral.set_status(&id, from, vote).unwrap();
        self.bilateral.set_status(&id, to, vote).unwrap();
    }
}

#[test]
fn peer_without_contracts_scores_zero() {
    let f = fixture();
    let alice = f.peer("alice");

    assert_eq!(f.trust.get_trust_score(&alice).unwrap(), 0);
    assert!(f.trust.score_all().unwrap().is_empty());
}

#[test]
fn pending_contracts_do_not_count() {
    let f = fixture();
    let (alice, bob) = (f.peer("alice"), f.peer("bob"));
    f.bilateral.create(&alice, &bob, "terms", 1, 0).unwrap();

    let record = f.trust.trust_record(&alice).unwrap();
    assert_eq!(record.score, 0);
    assert_eq!(record.fulfilled, 0);
    assert_eq!(record.broken, 0);
}

#[test]
fn fulfilled_contract_rewards_both_parties() {
    let f = fixture();
    let (alice, bob) = (f.peer("alice"), f.peer("bob"));
    f.ledger.set(&alice, 100).unwrap();
    f.settle(&alice, &bob, 30, Vote::Active);

    let all = f.trust.score_all().unwrap();
    assert_eq!(all.len(), 2);

    let a = &all[&alice];
    assert_eq!((a.fulfilled, a.diversity, a.total_collateral), (1, 1, 0));
    assert_eq!(a.score, 17);

    // The recipient also gets credit for the collateral it received.
    let b = &all[&bob];
    assert_eq!((b.fulfilled, b.diversity, b.total_collateral), (1, 1, 30));
    assert_eq!(b.score, 20);
}

#[test]
fn breach_penalizes_score() {
    let f = fixture();
    let (alice, bob, carol) = (f.peer("alice"), f.peer("bob"), f.peer("carol"));
    f.settle(&alice, &bob, 0, Vote::Active);
    f.settle(&alice, &carol, 0, Vote::Broken);

    let a = f.trust.trust_record(&alice).unwrap();
    assert_eq!((a.fulfilled, a.broken, a.diversity), (1, 1, 1));
    assert_eq!(a.score, 13);

    let c = f.trust.trust_record(&carol).unwrap();
    assert_eq!((c.fulfilled, c.broken), (0, 1));
    assert_eq!(c.score, 0);
}

#[test]
fn active_multisig_counts_every_participant() {
    let f = fixture();
    let (a, b, c) = (f.peer("alice"), f.peer("bob"), f.peer("carol"));
    let id = f
        .multisig
        .create(MultisigTerms {
            participants: vec![a, b, c],
            threshold: 2,
            content: "shared".into(),
            amount: 3,
            ..MultisigTerms::default()
        })
        .unwrap()
        .id;
    f.multisig.sign(&id, &a).unwrap();
    f.multisig.sign(&id, &b).unwrap();

    for peer in [a, b, c] {
        let record = f.trust.trust_record(&peer).unwrap();
        assert_eq!(record.fulfilled, 1);
        assert_eq!(record.diversity, 2);
        // 13.93 · (1 + 0.2·2) · (1 + 0.3·2/3) = 23.40
        assert_eq!(record.score, 23);
    }
}

#[test]
fn multisig_recipients_count_received_collateral() {
    let f = fixture();
    let (a, b, c) = (f.peer("alice"), f.peer("bob"), f.peer("carol"));
    let payee = f.peer("dave");
    f.ledger.set(&a, 50).unwrap();

    let id = f
        .multisig
        .create(MultisigTerms {
            participants: vec![a, b, c],
            threshold: 1,
            content: "shared".into(),
            from_peers: vec![a],
            to_peers: vec![payee],
            collateral_amount: 20,
            ..MultisigTerms::default()
        })
        .unwrap()
        .id;
    f.multisig.sign(&id, &a).unwrap();

    let record = f.trust.trust_record(&payee).unwrap();
    assert_eq!(record.total_collateral, 20);
    // Not a participant, so nothing fulfilled.
    assert_eq!(record.fulfilled, 0);
    assert_eq!(record.score, 0);
    assert!(f.trust.score_all().unwrap().contains_key(&payee));
}

#[test]
fn many_breaches_clamp_to_zero() {
    let f = fixture();
    let (alice, bob) = (f.peer("alice"), f.peer("bob"));
    f.settle(&alice, &bob, 0, Vote::Active);
    for _ in 0..6 {
        f.settle(&alice, &bob, 0, Vote::Broken);
    }

    let record = f.trust.trust_record(&alice).unwrap();
    assert_eq!(record.broken, 6);
    assert_eq!(record.score, 0);
}

#[test]
fn scores_respect_custom_params() {
    let f = fixture();
    let (alice, bob) = (f.peer("alice"), f.peer("bob"));
    for _ in 0..20 {
        f.settle(&alice, &bob, 0, Vote::Active);
    }

    let capped = TrustService::new(
        ContractRepository::new(f.store.clone()),
        TrustEngine::new(TrustParams {
            max_trust: 10,
            ..TrustParams::default()
        }),
    );
    let score = capped.get_trust_score(&alice).unwrap();
    assert!(score > 0 && score <= 10);

    // 100 · (1 − e^−3) · 1.01 = 95.99
    assert_eq!(f.trust.get_trust_score(&alice).unwrap(), 96);
}

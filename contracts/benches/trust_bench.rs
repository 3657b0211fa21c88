// Contract and trust benchmarks.
//
// Covers bilateral contract creation and verification, and full trust
// rescoring over contract histories of increasing size.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dcent_contracts::{
    BilateralManager, ContractRepository, StoredContract, TrustEngine, Vote,
};
use dcent_protocol::identity::{Keystore, PeerId};
use dcent_protocol::storage::{MemoryStore, Store};

fn setup(peers: usize) -> (BilateralManager, ContractRepository, Vec<PeerId>) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let keystore = Keystore::new(store.clone());
    let ids = (0..peers)
        .map(|i| keystore.generate(Some(format!("peer-{i}"))).unwrap().peer_id)
        .collect();
    let manager = BilateralManager::new(store.clone(), Arc::new(keystore));
    (manager, ContractRepository::new(store), ids)
}

/// `count` settled contracts between a rotating set of 20 peers, every
/// fifth one broken.
fn history(count: usize) -> Vec<StoredContract> {
    let (manager, repo, peers) = setup(20);
    for i in 0..count {
        let from = &peers[i % peers.len()];
        let to = &peers[(i * 7 + 1) % peers.len()];
        let id = manager
            .create(from, to, "deliver goods", 100, 0)
            .unwrap()
            .contract
            .id;
        let vote = if i % 5 == 0 { Vote::Broken } else { Vote::Active };
        manager.set_status(&id, from, vote).unwrap();
        manager.set_status(&id, to, vote).unwrap();
    }
    repo.all().unwrap()
}

fn bench_create_bilateral(c: &mut Criterion) {
    let (manager, _, peers) = setup(2);

    c.bench_function("bilateral/create", |b| {
        b.iter(|| {
            manager
                .create(&peers[0], &peers[1], "deliver 3 crates of apples", 250, 0)
                .unwrap()
        });
    });
}

fn bench_verify_bilateral(c: &mut Criterion) {
    let (manager, _, peers) = setup(2);
    let contract = manager
        .create(&peers[0], &peers[1], "deliver 3 crates of apples", 250, 0)
        .unwrap()
        .contract;

    c.bench_function("bilateral/verify_signature", |b| {
        b.iter(|| manager.verify_signature(&contract).unwrap());
    });
}

fn bench_score_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("trust/score_all");
    let engine = TrustEngine::default();

    for size in [100, 500, 1000] {
        let contracts = history(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &contracts, |b, contracts| {
            b.iter(|| engine.score_all(contracts));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_bilateral,
    bench_verify_bilateral,
    bench_score_all,
);
criterion_main!(benches);

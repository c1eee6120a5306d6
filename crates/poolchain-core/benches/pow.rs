use criterion::{criterion_group, criterion_main, Criterion};
use poolchain_core::{
    constants::ZERO_HASH, Block, BlockTemplate, MerkleTree, MiningLimits, MiningPool, MixHash,
    Sha256Hex, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;

fn transactions(rng: &mut StdRng, n: usize) -> Vec<Transaction> {
    (0..n)
        .map(|i| {
            Transaction::new(
                format!("{:032x}", rng.gen::<u128>()),
                format!("alice-{i}"),
                "bob",
                rng.gen_range(1..10),
                1_600_000_000 + i as u64,
                &MixHash,
            )
        })
        .collect()
}

fn bench_pow(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let txs = transactions(&mut rng, 50);

    c.bench_function("mine_block_target_00", |b| {
        let block = Block::build(1, ZERO_HASH, 1, txs.clone(), "00", Some(1), &Sha256Hex);
        b.iter(|| {
            let mut candidate = block.clone();
            candidate.mine(&Sha256Hex)
        });
    });

    c.bench_function("merkle_tree_500", |b| {
        let ids: Vec<String> = transactions(&mut rng, 500)
            .into_iter()
            .map(|t| t.id)
            .collect();
        b.iter(|| MerkleTree::build(ids.clone(), &MixHash));
    });

    c.bench_function("competitive_round_5x", |b| {
        let pool = MiningPool::new(5, Sha256Hex);
        let template = BlockTemplate {
            index: 1,
            prev_hash: ZERO_HASH.to_string(),
            version: 1,
            difficulty_target: "000".to_string(),
            timestamp: Some(1),
        };
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            let candidates = pool.create_candidates(&txs, &template, 10, &mut rng);
            pool.mine_competitively(candidates, MiningLimits::new(Duration::from_secs(5), 50_000))
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);

use std::fs;

use poolchain_core::{Account, Accounts, Chain, ChainConfig, Sha256Hex, Transaction};
use poolchain_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// A chain with an easy target, `users` funded accounts and `txs` pending transfers.
pub fn funded_chain(users: usize, txs: usize) -> Chain<Accounts, Sha256Hex> {
    let mut accounts = Accounts::new();
    for i in 0..users {
        accounts.insert(Account {
            name: format!("user-{i}"),
            public_key: format!("key-{i}"),
            balance: 1_000,
        });
    }
    let config = ChainConfig {
        difficulty_target: "0".to_string(),
        num_candidates: 3,
        max_attempts_per_round: 3_000,
        seed: Some(1),
        ..ChainConfig::default()
    };
    let mut chain = Chain::new(config, accounts, Sha256Hex);
    for i in 0..txs {
        let tx = Transaction::new(
            format!("tx-{i}"),
            format!("key-{}", i % users),
            format!("key-{}", (i + 1) % users),
            (i % 50) as u64 + 1,
            1_600_000_000 + i as u64,
            &Sha256Hex,
        );
        chain.submit_transaction(tx).expect("transaction is valid");
    }
    chain
}

use crate::hash::{meets_target, HashPrimitive};
use crate::merkle::MerkleTree;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub index: u64,
    pub prev_hash: String,
    pub merkle_root: String,
    pub timestamp: u64,
    pub difficulty_target: String,
    pub nonce: u64,
}

impl BlockHeader {
    /// Canonical hash preimage: all seven fields in order, no separators.
    pub fn hash_input(&self) -> String {
        format!(
            "{}{}{}{}{}{}{}",
            self.version,
            self.index,
            self.prev_hash,
            self.merkle_root,
            self.timestamp,
            self.difficulty_target,
            self.nonce
        )
    }
}

/// Result of a nonce search on a single block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MineOutcome {
    pub hash: String,
    pub nonce: u64,
    pub attempts: u64,
    pub met_target: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    merkle_tree: MerkleTree,
}

impl Block {
    /// Commits `transactions` to a Merkle root and assembles a header with nonce 0.
    /// `timestamp` defaults to the current wall-clock second.
    pub fn build<H: HashPrimitive>(
        index: u64,
        prev_hash: impl Into<String>,
        version: u32,
        transactions: Vec<Transaction>,
        difficulty_target: impl Into<String>,
        timestamp: Option<u64>,
        hasher: &H,
    ) -> Self {
        let ids = transactions.iter().map(|tx| tx.id.clone()).collect();
        let merkle_tree = MerkleTree::build(ids, hasher);
        let header = BlockHeader {
            version,
            index,
            prev_hash: prev_hash.into(),
            merkle_root: merkle_tree.root().to_string(),
            timestamp: timestamp.unwrap_or_else(now_secs),
            difficulty_target: difficulty_target.into(),
            nonce: 0,
        };
        Self {
            header,
            transactions,
            merkle_tree,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn index(&self) -> u64 {
        self.header.index
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.merkle_tree
    }

    pub fn merkle_root(&self) -> &str {
        &self.header.merkle_root
    }

    /// Always recomputed from the current header; mining changes the nonce in place.
    pub fn hash<H: HashPrimitive>(&self, hasher: &H) -> String {
        hasher.digest(&self.header.hash_input())
    }

    pub fn meets_difficulty<H: HashPrimitive>(&self, hasher: &H) -> bool {
        meets_target(&self.hash(hasher), &self.header.difficulty_target)
    }

    pub(crate) fn increment_nonce(&mut self) {
        self.header.nonce = self.header.nonce.wrapping_add(1);
    }

    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.header.nonce = nonce;
    }

    /// Recomputes the Merkle root from the stored transactions.
    pub fn commits_to_transactions<H: HashPrimitive>(&self, hasher: &H) -> bool {
        let ids = self.transactions.iter().map(|tx| tx.id.clone()).collect();
        MerkleTree::build(ids, hasher).root() == self.header.merkle_root
    }

    /// Single-candidate reference search. Runs until the hash carries the target prefix.
    pub fn mine<H: HashPrimitive>(&mut self, hasher: &H) -> MineOutcome {
        self.mine_bounded(u64::MAX, hasher)
    }

    /// Like [`Block::mine`] but gives up after `max_attempts` nonce increments and
    /// returns the last computed hash with `met_target == false`.
    pub fn mine_bounded<H: HashPrimitive>(&mut self, max_attempts: u64, hasher: &H) -> MineOutcome {
        debug!(
            index = self.header.index,
            target = %self.header.difficulty_target,
            "mining block"
        );
        let mut attempts = 0u64;
        loop {
            let hash = self.hash(hasher);
            let met_target = meets_target(&hash, &self.header.difficulty_target);
            if met_target || attempts >= max_attempts {
                info!(
                    index = self.header.index,
                    nonce = self.header.nonce,
                    attempts,
                    met_target,
                    "block mining finished"
                );
                return MineOutcome {
                    hash,
                    nonce: self.header.nonce,
                    attempts,
                    met_target,
                };
            }
            self.increment_nonce();
            attempts += 1;
        }
    }
}

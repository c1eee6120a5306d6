use crate::block::Block;
use crate::config::ChainConfig;
use crate::constants::ZERO_HASH;
use crate::error::{ChainError, LedgerError, TransactionError};
use crate::hash::{HashPrimitive, MixHash};
use crate::ledger::{Accounts, Ledger};
use crate::mining::{BlockTemplate, CandidateBlock, MiningPool};
use crate::transaction::Transaction;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Trait the storage backends should implement to persist mined blocks.
/// This lives in the core crate to avoid a circular dependency.
pub trait ChainStore: Send + Sync {
    fn put_block(&self, block: &Block, hash: &str) -> Result<()>;
    fn get_block(&self, index: u64) -> Result<Option<Block>>;
    fn tip_height(&self) -> Result<u64>;
    fn tip_hash(&self) -> Result<Option<String>>;
}

/// Reads blocks `0..` until the first gap.
pub fn load_blocks<S: ChainStore + ?Sized>(store: &S) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let tip = store.tip_height()?;
    for index in 0..=tip {
        match store.get_block(index)? {
            Some(block) => blocks.push(block),
            None => break,
        }
    }
    Ok(blocks)
}

/// Structural checks over a block sequence: genesis shape, contiguous indices,
/// hash linkage and Merkle commitments. Difficulty is not checked because
/// best-effort blocks are valid members of the chain.
pub fn verify_blocks<H: HashPrimitive>(blocks: &[Block], hasher: &H) -> Result<(), ChainError> {
    let genesis = blocks.first().ok_or(ChainError::Empty)?;
    if genesis.index() != 0 || genesis.header().prev_hash != ZERO_HASH {
        return Err(ChainError::InvalidGenesis);
    }

    for (position, block) in blocks.iter().enumerate() {
        let expected = position as u64;
        if block.index() != expected {
            return Err(ChainError::IndexMismatch {
                expected,
                got: block.index(),
            });
        }
        if position > 0 && block.header().prev_hash != blocks[position - 1].hash(hasher) {
            return Err(ChainError::BrokenLink { index: expected });
        }
        if !block.commits_to_transactions(hasher) {
            return Err(ChainError::MerkleMismatch { index: expected });
        }
    }
    Ok(())
}

/// Per-block outcome of applying a mined block to the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MiningReport {
    pub blocks_mined: usize,
    pub applied: usize,
    pub skipped: usize,
    pub best_effort_blocks: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainSummary {
    pub length: usize,
    pub pending: usize,
    pub tip_hash: String,
    pub tip_merkle_root: String,
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chain length:      {} blocks", self.length)?;
        writeln!(f, "pending txs:       {}", self.pending)?;
        writeln!(f, "tip hash:          {}", self.tip_hash)?;
        write!(f, "tip merkle root:   {}", self.tip_merkle_root)
    }
}

/// The authoritative block sequence, its pending pool and the ledger it mutates.
pub struct Chain<L: Ledger = Accounts, H: HashPrimitive = MixHash> {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    ledger: L,
    pool: MiningPool<H>,
    config: ChainConfig,
    rng: StdRng,
}

impl<L: Ledger, H: HashPrimitive> Chain<L, H> {
    /// Creates the chain with its genesis block already mined.
    pub fn new(config: ChainConfig, ledger: L, hasher: H) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pool = MiningPool::new(config.num_candidates, hasher);
        let mut chain = Self {
            blocks: Vec::new(),
            pending: Vec::new(),
            ledger,
            pool,
            config,
            rng,
        };
        let genesis = chain.create_genesis_block();
        chain.blocks.push(genesis);
        chain
    }

    /// Genesis never fails: when the attempt cap runs out the last hash is kept.
    fn create_genesis_block(&self) -> Block {
        let mut genesis = Block::build(
            0,
            ZERO_HASH,
            self.config.version,
            Vec::new(),
            self.config.difficulty_target.clone(),
            None,
            self.hasher(),
        );
        let outcome = genesis.mine_bounded(self.config.genesis_max_attempts, self.hasher());
        if !outcome.met_target {
            warn!(
                attempts = outcome.attempts,
                "genesis attempt cap reached, accepting last hash"
            );
        }
        info!(
            hash = %outcome.hash,
            nonce = outcome.nonce,
            merkle_root = %genesis.merkle_root(),
            "genesis block ready"
        );
        genesis
    }

    pub fn hasher(&self) -> &H {
        self.pool.hasher()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false once constructed; genesis is created eagerly.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> &Block {
        // Genesis is pushed in `new` and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn tip_hash(&self) -> String {
        self.tip().hash(self.hasher())
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Integrity, key resolution and balance checks against the current ledger.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<(), TransactionError> {
        let computed = tx.compute_hash(self.hasher());
        if computed != tx.hash {
            return Err(TransactionError::Integrity {
                id: tx.id.clone(),
                stored: tx.hash.clone(),
                computed,
            });
        }
        let balance =
            self.ledger
                .balance_of(&tx.sender_key)
                .ok_or_else(|| TransactionError::UnknownSender {
                    id: tx.id.clone(),
                    key: tx.sender_key.clone(),
                })?;
        if !self.ledger.contains(&tx.receiver_key) {
            return Err(TransactionError::UnknownReceiver {
                id: tx.id.clone(),
                key: tx.receiver_key.clone(),
            });
        }
        if balance < tx.amount {
            return Err(TransactionError::InsufficientBalance {
                id: tx.id.clone(),
                balance,
                amount: tx.amount,
            });
        }
        Ok(())
    }

    /// Validates `tx` and appends it to the pending pool.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), TransactionError> {
        if let Err(err) = self.validate_transaction(&tx) {
            debug!(%err, "transaction rejected");
            return Err(err);
        }
        self.pending.push(tx);
        Ok(())
    }

    /// Builds candidates from the pending pool and runs competitive mining over them.
    /// Returns `None` when there is nothing to mine.
    pub fn mine_block_competitively(&mut self, tx_count: usize) -> Option<CandidateBlock> {
        let tx_count = tx_count.min(self.pending.len());
        if tx_count == 0 {
            return None;
        }

        let template = BlockTemplate {
            index: self.blocks.len() as u64,
            prev_hash: self.tip_hash(),
            version: self.config.version,
            difficulty_target: self.config.difficulty_target.clone(),
            timestamp: None,
        };
        let candidates =
            self.pool
                .create_candidates(&self.pending, &template, tx_count, &mut self.rng);
        let limits = self.config.mining_limits();

        if self.config.parallel {
            self.pool.mine_parallel(candidates, limits)
        } else {
            self.pool.mine_competitively(candidates, limits)
        }
    }

    /// Re-checks each sender's balance against the ledger as it stands now, applies
    /// what still fits and skips the rest. Every transaction in `block` leaves the
    /// pending pool either way; skipped ones are not retried.
    pub fn apply_block_state_changes(&mut self, block: &Block) -> ApplyReport {
        let mut report = ApplyReport::default();

        for tx in block.transactions() {
            match self.apply_transaction(tx) {
                Ok(()) => report.applied.push(tx.id.clone()),
                Err(reason) => {
                    warn!(tx = %tx.id, %reason, "skipping transaction at application");
                    report.skipped.push(tx.id.clone());
                }
            }
        }

        let used: HashSet<&str> = block.transactions().iter().map(|t| t.id.as_str()).collect();
        self.pending.retain(|t| !used.contains(t.id.as_str()));

        debug!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            pending = self.pending.len(),
            "block state applied"
        );
        report
    }

    fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let balance = self
            .ledger
            .balance_of(&tx.sender_key)
            .ok_or_else(|| LedgerError::UnknownAccount(tx.sender_key.clone()))?;
        if balance < tx.amount {
            return Err(LedgerError::InsufficientBalance {
                key: tx.sender_key.clone(),
                balance,
                amount: tx.amount,
            });
        }
        if !self.ledger.contains(&tx.receiver_key) {
            return Err(LedgerError::UnknownAccount(tx.receiver_key.clone()));
        }

        self.ledger.debit(&tx.sender_key, tx.amount)?;
        if let Err(err) = self.ledger.credit(&tx.receiver_key, tx.amount) {
            if let Err(refund) = self.ledger.credit(&tx.sender_key, tx.amount) {
                error!(tx = %tx.id, %refund, "failed to refund sender");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Append-only. The block must extend the current tip.
    pub fn add_block_to_chain(&mut self, block: Block) -> Result<(), ChainError> {
        self.check_extends_tip(&block)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Applies `block` to the ledger and appends it. Nothing is touched when the
    /// block does not extend the tip.
    pub fn commit_block(&mut self, block: Block) -> Result<ApplyReport, ChainError> {
        self.check_extends_tip(&block)?;
        let report = self.apply_block_state_changes(&block);
        self.blocks.push(block);
        Ok(report)
    }

    fn check_extends_tip(&self, block: &Block) -> Result<(), ChainError> {
        let expected = self.blocks.len() as u64;
        if block.index() != expected {
            return Err(ChainError::IndexMismatch {
                expected,
                got: block.index(),
            });
        }
        if block.header().prev_hash != self.tip_hash() {
            return Err(ChainError::BrokenLink {
                index: block.index(),
            });
        }
        Ok(())
    }

    /// Mines, applies and appends blocks until the pending pool is drained.
    pub fn mine_until_done(&mut self, block_tx_count: usize) -> Result<MiningReport, ChainError> {
        let mut report = MiningReport::default();

        while !self.pending.is_empty() {
            info!(
                length = self.blocks.len(),
                pending = self.pending.len(),
                "mining next block"
            );

            let Some(winner) = self.mine_block_competitively(block_tx_count) else {
                error!(pending = self.pending.len(), "mining failed, stopping");
                return Err(ChainError::NoBlockProduced {
                    pending: self.pending.len(),
                });
            };

            if winner.is_best_effort() {
                report.best_effort_blocks += 1;
            }
            let index = winner.block.index();
            let applied = self.commit_block(winner.block)?;
            report.applied += applied.applied.len();
            report.skipped += applied.skipped.len();
            report.blocks_mined += 1;

            info!(
                index,
                miner_id = winner.miner_id,
                hash = %self.tip_hash(),
                remaining = self.pending.len(),
                "block appended"
            );
        }

        info!(
            blocks = report.blocks_mined,
            applied = report.applied,
            skipped = report.skipped,
            best_effort = report.best_effort_blocks,
            "pending pool drained"
        );
        Ok(report)
    }

    pub fn verify(&self) -> Result<(), ChainError> {
        verify_blocks(&self.blocks, self.hasher())
    }

    pub fn summary(&self) -> ChainSummary {
        ChainSummary {
            length: self.blocks.len(),
            pending: self.pending.len(),
            tip_hash: self.tip_hash(),
            tip_merkle_root: self.tip().merkle_root().to_string(),
        }
    }

    /// Writes every block, in order, through `store`.
    pub fn persist<S: ChainStore + ?Sized>(&self, store: &S) -> Result<()> {
        for block in &self.blocks {
            store.put_block(block, &block.hash(self.hasher()))?;
        }
        info!(blocks = self.blocks.len(), "chain persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha256Hex;
    use crate::ledger::Account;

    fn accounts(balances: &[(&str, u64)]) -> Accounts {
        let mut accounts = Accounts::new();
        for (key, balance) in balances {
            accounts.insert(Account {
                name: key.to_uppercase(),
                public_key: key.to_string(),
                balance: *balance,
            });
        }
        accounts
    }

    fn config(difficulty: &str) -> ChainConfig {
        ChainConfig {
            difficulty_target: difficulty.to_string(),
            num_candidates: 3,
            max_attempts_per_round: 3_000,
            genesis_max_attempts: 500,
            seed: Some(9),
            ..ChainConfig::default()
        }
    }

    fn chain(balances: &[(&str, u64)]) -> Chain<Accounts, Sha256Hex> {
        Chain::new(config("0"), accounts(balances), Sha256Hex)
    }

    fn tx(id: &str, from: &str, to: &str, amount: u64) -> Transaction {
        Transaction::new(id, from, to, amount, 1_600_000_000, &Sha256Hex)
    }

    #[test]
    fn genesis_shape() {
        let chain = chain(&[]);
        assert_eq!(chain.len(), 1);
        let genesis = chain.tip();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.header().prev_hash, ZERO_HASH);
        assert_eq!(genesis.merkle_root(), ZERO_HASH);
        assert!(genesis.transactions().is_empty());
        assert!(chain.tip_hash().starts_with('0'));
        chain.verify().unwrap();
    }

    #[test]
    fn genesis_accepts_capped_search() {
        let mut cfg = config("0000000000000000");
        cfg.genesis_max_attempts = 10;
        let chain = Chain::new(cfg, Accounts::new(), MixHash);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.tip().nonce(), 10);
    }

    #[test]
    fn validation_rejects_each_failure_kind() {
        let chain = chain(&[("alice", 50), ("bob", 0)]);
        chain.validate_transaction(&tx("ok", "alice", "bob", 50)).unwrap();

        let mut tampered = tx("t", "alice", "bob", 10);
        tampered.amount = 11;
        assert!(matches!(
            chain.validate_transaction(&tampered),
            Err(TransactionError::Integrity { .. })
        ));
        assert!(matches!(
            chain.validate_transaction(&tx("s", "mallory", "bob", 1)),
            Err(TransactionError::UnknownSender { .. })
        ));
        assert!(matches!(
            chain.validate_transaction(&tx("r", "alice", "mallory", 1)),
            Err(TransactionError::UnknownReceiver { .. })
        ));
        assert_eq!(
            chain.validate_transaction(&tx("b", "alice", "bob", 51)),
            Err(TransactionError::InsufficientBalance {
                id: "b".into(),
                balance: 50,
                amount: 51
            })
        );
    }

    #[test]
    fn submit_only_keeps_valid_transactions() {
        let mut chain = chain(&[("alice", 50), ("bob", 0)]);
        chain.submit_transaction(tx("1", "alice", "bob", 20)).unwrap();
        assert!(chain.submit_transaction(tx("2", "bob", "alice", 1)).is_err());
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn nothing_to_mine() {
        let mut chain = chain(&[("alice", 50)]);
        assert!(chain.mine_block_competitively(10).is_none());
        let report = chain.mine_until_done(10).unwrap();
        assert_eq!(report, MiningReport::default());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn zero_block_size_reports_failure() {
        let mut chain = chain(&[("alice", 50), ("bob", 0)]);
        chain.submit_transaction(tx("1", "alice", "bob", 20)).unwrap();
        assert_eq!(
            chain.mine_until_done(0),
            Err(ChainError::NoBlockProduced { pending: 1 })
        );
    }

    #[test]
    fn mined_block_extends_tip() {
        let mut chain = chain(&[("alice", 50), ("bob", 0)]);
        for i in 0..4 {
            chain
                .submit_transaction(tx(&format!("t{i}"), "alice", "bob", 1))
                .unwrap();
        }
        let winner = chain.mine_block_competitively(10).unwrap();
        assert_eq!(winner.block.index(), 1);
        assert_eq!(winner.block.header().prev_hash, chain.tip_hash());
        // Clamped to the pool size.
        assert_eq!(winner.block.transactions().len(), 4);
    }

    #[test]
    fn application_rechecks_balances_and_drops_failures() {
        let mut chain = chain(&[("alice", 50), ("bob", 0), ("carol", 0)]);
        // Both pass validation against the same starting balance.
        chain.submit_transaction(tx("a", "alice", "bob", 40)).unwrap();
        chain.submit_transaction(tx("b", "alice", "carol", 40)).unwrap();
        chain.submit_transaction(tx("c", "bob", "carol", 0)).unwrap();

        let block = Block::build(
            1,
            chain.tip_hash(),
            1,
            chain.pending()[..2].to_vec(),
            "0",
            None,
            &Sha256Hex,
        );
        let report = chain.apply_block_state_changes(&block);
        assert_eq!(report.applied, vec!["a".to_string()]);
        assert_eq!(report.skipped, vec!["b".to_string()]);
        assert_eq!(chain.ledger().balance_of("alice"), Some(10));
        assert_eq!(chain.ledger().balance_of("bob"), Some(40));
        assert_eq!(chain.ledger().balance_of("carol"), Some(0));
        // Skipped transactions are dropped, not requeued.
        let pending: Vec<&str> = chain.pending().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(pending, vec!["c"]);
    }

    #[test]
    fn add_block_rejects_wrong_index_and_link() {
        let mut chain = chain(&[]);
        let wrong_index = Block::build(2, chain.tip_hash(), 1, vec![], "0", None, &Sha256Hex);
        assert_eq!(
            chain.add_block_to_chain(wrong_index),
            Err(ChainError::IndexMismatch {
                expected: 1,
                got: 2
            })
        );
        let wrong_link = Block::build(1, ZERO_HASH, 1, vec![], "0", None, &Sha256Hex);
        assert_eq!(
            chain.add_block_to_chain(wrong_link),
            Err(ChainError::BrokenLink { index: 1 })
        );
        let good = Block::build(1, chain.tip_hash(), 1, vec![], "0", None, &Sha256Hex);
        chain.add_block_to_chain(good).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn rejected_commit_leaves_state_untouched() {
        let mut chain = chain(&[("alice", 50), ("bob", 0)]);
        chain.submit_transaction(tx("a", "alice", "bob", 30)).unwrap();
        let txs = chain.pending().to_vec();
        let stale = Block::build(1, ZERO_HASH, 1, txs.clone(), "0", None, &Sha256Hex);

        assert_eq!(chain.commit_block(stale), Err(ChainError::BrokenLink { index: 1 }));
        assert_eq!(chain.ledger().balance_of("alice"), Some(50));
        assert_eq!(chain.ledger().balance_of("bob"), Some(0));
        assert_eq!(chain.pending().len(), 1);
        assert_eq!(chain.len(), 1);

        let next = Block::build(1, chain.tip_hash(), 1, txs, "0", None, &Sha256Hex);
        let report = chain.commit_block(next).unwrap();
        assert_eq!(report.applied, vec!["a".to_string()]);
        assert_eq!(chain.ledger().balance_of("bob"), Some(30));
        assert!(chain.pending().is_empty());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn starved_rounds_with_huge_time_limit_still_produce_a_block() {
        let cfg = ChainConfig {
            time_limit_secs: 1.0e19,
            max_attempts_per_round: 2,
            num_candidates: 5,
            ..config("0")
        };
        cfg.validate().unwrap();
        let mut chain = Chain::new(cfg, accounts(&[("alice", 50), ("bob", 0)]), Sha256Hex);
        chain.submit_transaction(tx("a", "alice", "bob", 5)).unwrap();

        let report = chain.mine_until_done(1).unwrap();
        assert_eq!(report.blocks_mined, 1);
        assert_eq!(report.best_effort_blocks, 1);
        chain.verify().unwrap();
    }

    #[test]
    fn verify_detects_broken_links() {
        let chain = chain(&[]);
        let mut blocks = chain.blocks().to_vec();
        blocks.push(Block::build(1, ZERO_HASH, 1, vec![], "0", None, &Sha256Hex));
        assert_eq!(
            verify_blocks(&blocks, &Sha256Hex),
            Err(ChainError::BrokenLink { index: 1 })
        );
        assert_eq!(verify_blocks(&[], &Sha256Hex), Err(ChainError::Empty));
        assert_eq!(
            verify_blocks(&blocks[1..], &Sha256Hex),
            Err(ChainError::InvalidGenesis)
        );
    }

    #[test]
    fn summary_reports_tip() {
        let chain = chain(&[]);
        let summary = chain.summary();
        assert_eq!(summary.length, 1);
        assert_eq!(summary.tip_hash, chain.tip_hash());
        assert!(summary.to_string().contains("chain length:      1 blocks"));
    }
}

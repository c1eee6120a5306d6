//! Mining and consensus core of a single-process proof-of-work ledger.
//!
//! Pending transfers are packed into competing candidate blocks, each committing its
//! transactions through a [`MerkleTree`]. A [`MiningPool`] searches the candidates
//! under time and attempt budgets and always yields a winner for a non-empty set,
//! falling back to the smallest observed hash when the target prefix is not found.
//! The [`Chain`] applies winners to a [`Ledger`] and appends them.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod merkle;
pub mod mining;
pub mod transaction;

pub use block::{Block, BlockHeader, MineOutcome};
pub use chain::{
    load_blocks, verify_blocks, ApplyReport, Chain, ChainStore, ChainSummary, MiningReport,
};
pub use config::ChainConfig;
pub use error::{ChainError, ConfigError, LedgerError, TransactionError};
pub use hash::{meets_target, HashPrimitive, MixHash, Sha256Hex};
pub use ledger::{Account, Accounts, Ledger};
pub use merkle::{MerkleProof, MerkleTree, ProofStep};
pub use mining::{BlockTemplate, CandidateBlock, MiningLimits, MiningPool, Resolution};
pub use transaction::Transaction;

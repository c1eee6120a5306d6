use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown account {0}")]
    UnknownAccount(String),
    #[error("insufficient balance for {key}: has {balance}, needs {amount}")]
    InsufficientBalance {
        key: String,
        balance: u64,
        amount: u64,
    },
}

/// Reasons a transaction is rejected before it reaches the pending pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction {id} hash mismatch: stored {stored}, computed {computed}")]
    Integrity {
        id: String,
        stored: String,
        computed: String,
    },
    #[error("transaction {id}: sender {key} not found")]
    UnknownSender { id: String, key: String },
    #[error("transaction {id}: receiver {key} not found")]
    UnknownReceiver { id: String, key: String },
    #[error("transaction {id}: insufficient balance, has {balance}, needs {amount}")]
    InsufficientBalance { id: String, balance: u64, amount: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block index {got} does not match chain length {expected}")]
    IndexMismatch { expected: u64, got: u64 },
    #[error("block {index} prev_hash does not match the hash of block {}", index.saturating_sub(1))]
    BrokenLink { index: u64 },
    #[error("block {index} merkle root does not commit to its transactions")]
    MerkleMismatch { index: u64 },
    #[error("genesis block is malformed")]
    InvalidGenesis,
    #[error("chain is empty")]
    Empty,
    #[error("mining produced no block with {pending} transactions pending")]
    NoBlockProduced { pending: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

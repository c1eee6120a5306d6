pub const HASH_HEX_SIZE: usize = 64;
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const CHAIN_VERSION: u32 = 1;
pub const DEFAULT_DIFFICULTY_TARGET: &str = "0";
pub const DEFAULT_NUM_CANDIDATES: usize = 5;
pub const DEFAULT_TIME_LIMIT_SECS: f64 = 5.0;
pub const DEFAULT_MAX_ATTEMPTS_PER_ROUND: u64 = 100_000;
pub const GENESIS_MAX_ATTEMPTS: u64 = 1_000_000;

/// Rounds before the pool force-accepts the smallest current hash.
pub const MAX_MINING_ROUNDS: u32 = 3;
/// Applied to both the time limit and the attempt budget after an empty round.
pub const ESCALATION_FACTOR: f64 = 1.5;
/// Wall-clock checks inside a candidate's search happen every this many attempts.
pub const TIMEOUT_CHECK_INTERVAL: u64 = 10_000;

//! Chain and mining configuration, loadable from TOML.

use crate::constants::{
    CHAIN_VERSION, DEFAULT_DIFFICULTY_TARGET, DEFAULT_MAX_ATTEMPTS_PER_ROUND,
    DEFAULT_NUM_CANDIDATES, DEFAULT_TIME_LIMIT_SECS, GENESIS_MAX_ATTEMPTS, MAX_MINING_ROUNDS,
};
use crate::error::ConfigError;
use crate::mining::MiningLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub version: u32,
    /// Hex prefix every mined block hash should start with.
    pub difficulty_target: String,
    pub num_candidates: usize,
    pub time_limit_secs: f64,
    pub max_attempts_per_round: u64,
    pub max_rounds: u32,
    pub genesis_max_attempts: u64,
    /// Search each round's candidates on rayon workers.
    pub parallel: bool,
    /// Seed for candidate shuffling; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            version: CHAIN_VERSION,
            difficulty_target: DEFAULT_DIFFICULTY_TARGET.to_string(),
            num_candidates: DEFAULT_NUM_CANDIDATES,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            max_attempts_per_round: DEFAULT_MAX_ATTEMPTS_PER_ROUND,
            max_rounds: MAX_MINING_ROUNDS,
            genesis_max_attempts: GENESIS_MAX_ATTEMPTS,
            parallel: false,
            seed: None,
        }
    }
}

impl ChainConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self
            .difficulty_target
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(ConfigError::Invalid(format!(
                "difficulty_target {:?} is not lowercase hex",
                self.difficulty_target
            )));
        }
        if self.num_candidates == 0 {
            return Err(ConfigError::Invalid("num_candidates must be at least 1".into()));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid("max_rounds must be at least 1".into()));
        }
        if Duration::try_from_secs_f64(self.time_limit_secs).is_err() {
            return Err(ConfigError::Invalid(format!(
                "time_limit_secs {} must be a non-negative number of representable seconds",
                self.time_limit_secs
            )));
        }
        Ok(())
    }

    pub fn mining_limits(&self) -> MiningLimits {
        let time_limit = Duration::try_from_secs_f64(self.time_limit_secs).unwrap_or(
            if self.time_limit_secs > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            },
        );
        MiningLimits {
            max_rounds: self.max_rounds,
            ..MiningLimits::new(time_limit, self.max_attempts_per_round)
        }
    }
}

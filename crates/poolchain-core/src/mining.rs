//! Competitive mining across several candidate blocks.
//!
//! Each round splits an attempt budget evenly over the candidates and scans them in
//! registration order under a wall-clock limit. The first hash carrying the target
//! prefix wins. A round that observed hashes but found no match accepts the
//! lexicographically smallest one instead. Rounds that observe nothing escalate both
//! budgets by [`ESCALATION_FACTOR`] until `max_rounds` is exceeded, after which the
//! candidate with the smallest current hash is forced through.

use crate::block::{now_secs, Block};
use crate::constants::{
    DEFAULT_MAX_ATTEMPTS_PER_ROUND, DEFAULT_TIME_LIMIT_SECS, ESCALATION_FACTOR, MAX_MINING_ROUNDS,
    TIMEOUT_CHECK_INTERVAL,
};
use crate::hash::{meets_target, HashPrimitive};
use crate::transaction::Transaction;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Header fields shared by every candidate of one mining round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplate {
    pub index: u64,
    pub prev_hash: String,
    pub version: u32,
    pub difficulty_target: String,
    /// Base timestamp; candidate `i` uses `timestamp + i`. Defaults to now.
    pub timestamp: Option<u64>,
}

/// How a winning candidate was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The hash carries the difficulty prefix.
    Solved,
    /// Smallest hash observed in a round that found no match.
    RoundFallback,
    /// Smallest current hash after the round cap was exceeded.
    ForcedFallback,
}

#[derive(Clone, Debug)]
pub struct CandidateBlock {
    pub block: Block,
    pub miner_id: usize,
    pub attempts: u64,
    pub found: bool,
    pub found_hash: Option<String>,
    pub mining_time: Duration,
    pub resolution: Option<Resolution>,
}

impl CandidateBlock {
    pub fn new(block: Block, miner_id: usize) -> Self {
        Self {
            block,
            miner_id,
            attempts: 0,
            found: false,
            found_hash: None,
            mining_time: Duration::ZERO,
            resolution: None,
        }
    }

    /// True when the block was accepted without meeting its difficulty target.
    pub fn is_best_effort(&self) -> bool {
        matches!(
            self.resolution,
            Some(Resolution::RoundFallback | Resolution::ForcedFallback)
        )
    }

    fn accept(&mut self, hash: String, resolution: Resolution, elapsed: Duration) {
        self.found = true;
        self.found_hash = Some(hash);
        self.mining_time = elapsed;
        self.resolution = Some(resolution);
    }

    /// One nonce step. Returns the new hash.
    fn step<H: HashPrimitive>(&mut self, hasher: &H) -> String {
        self.attempts += 1;
        self.block.increment_nonce();
        self.block.hash(hasher)
    }

    fn timed_out(&self, started: Instant, limit: Duration) -> bool {
        self.attempts % TIMEOUT_CHECK_INTERVAL == 0 && started.elapsed() > limit
    }
}

/// Budgets for one call to [`MiningPool::mine_competitively`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MiningLimits {
    pub time_limit: Duration,
    pub max_attempts_per_round: u64,
    pub max_rounds: u32,
}

impl MiningLimits {
    pub fn new(time_limit: Duration, max_attempts_per_round: u64) -> Self {
        Self {
            time_limit,
            max_attempts_per_round,
            max_rounds: MAX_MINING_ROUNDS,
        }
    }

    /// Scales both budgets by the escalation factor. The time limit saturates at
    /// `Duration::MAX`.
    fn escalate(&mut self) {
        self.time_limit =
            Duration::try_from_secs_f64(self.time_limit.as_secs_f64() * ESCALATION_FACTOR)
                .unwrap_or(Duration::MAX);
        self.max_attempts_per_round =
            (self.max_attempts_per_round as f64 * ESCALATION_FACTOR) as u64;
    }
}

impl Default for MiningLimits {
    fn default() -> Self {
        Self::new(
            Duration::from_secs_f64(DEFAULT_TIME_LIMIT_SECS),
            DEFAULT_MAX_ATTEMPTS_PER_ROUND,
        )
    }
}

/// Smallest hash seen in a round, with the nonce that produced it.
#[derive(Clone, Debug)]
struct Best {
    index: usize,
    hash: String,
    nonce: u64,
}

impl Best {
    fn improves_on(&self, other: &Option<Best>) -> bool {
        match other {
            None => true,
            Some(current) => (&self.hash, self.index) < (&current.hash, current.index),
        }
    }
}

enum RoundOutcome {
    Solved(usize),
    Fallback(Best),
    Empty,
}

#[derive(Clone, Debug)]
pub struct MiningPool<H> {
    num_candidates: usize,
    hasher: H,
}

impl<H: HashPrimitive> MiningPool<H> {
    pub fn new(num_candidates: usize, hasher: H) -> Self {
        Self {
            num_candidates,
            hasher,
        }
    }

    pub fn num_candidates(&self) -> usize {
        self.num_candidates
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Shuffles a copy of `pool` and gives each miner a window of `tx_per_block`
    /// transactions starting at `(i * tx_per_block) % pool.len()`, wrapping to the
    /// front when the tail runs short. Every candidate builds its own Merkle root.
    pub fn create_candidates<R: Rng + ?Sized>(
        &self,
        pool: &[Transaction],
        template: &BlockTemplate,
        tx_per_block: usize,
        rng: &mut R,
    ) -> Vec<CandidateBlock> {
        if pool.is_empty() {
            return Vec::new();
        }

        let mut shuffled = pool.to_vec();
        shuffled.shuffle(rng);
        let base_timestamp = template.timestamp.unwrap_or_else(now_secs);

        info!(
            candidates = self.num_candidates,
            available = shuffled.len(),
            tx_per_block,
            "creating candidate blocks"
        );

        (0..self.num_candidates)
            .map(|miner_id| {
                let start = (miner_id * tx_per_block) % shuffled.len();
                let end = (start + tx_per_block).min(shuffled.len());
                let mut batch = shuffled[start..end].to_vec();
                if batch.len() < tx_per_block && shuffled.len() > tx_per_block {
                    let needed = tx_per_block - batch.len();
                    batch.extend_from_slice(&shuffled[..needed]);
                }

                let block = Block::build(
                    template.index,
                    template.prev_hash.clone(),
                    template.version,
                    batch,
                    template.difficulty_target.clone(),
                    Some(base_timestamp + miner_id as u64),
                    &self.hasher,
                );
                debug!(
                    miner_id,
                    txs = block.transactions().len(),
                    merkle_root = %block.merkle_root(),
                    "candidate created"
                );
                CandidateBlock::new(block, miner_id)
            })
            .collect()
    }

    /// Runs the round/escalation protocol over `candidates` one at a time.
    ///
    /// Returns `None` only for an empty candidate set. Losing candidates are dropped.
    pub fn mine_competitively(
        &self,
        candidates: Vec<CandidateBlock>,
        limits: MiningLimits,
    ) -> Option<CandidateBlock> {
        self.run_rounds(candidates, limits, Self::scan_round)
    }

    /// Same protocol with each round's candidates searched on rayon workers.
    ///
    /// A shared flag stops every worker once any of them solves. Results are read
    /// only after all workers join, and ties resolve by smallest hash then lowest
    /// miner id, so fallback selection does not depend on scheduling.
    pub fn mine_parallel(
        &self,
        candidates: Vec<CandidateBlock>,
        limits: MiningLimits,
    ) -> Option<CandidateBlock> {
        self.run_rounds(candidates, limits, Self::parallel_round)
    }

    fn run_rounds<F>(
        &self,
        mut candidates: Vec<CandidateBlock>,
        mut limits: MiningLimits,
        round_fn: F,
    ) -> Option<CandidateBlock>
    where
        F: Fn(&Self, &mut [CandidateBlock], &MiningLimits, Instant) -> RoundOutcome,
    {
        if candidates.is_empty() {
            warn!("no candidate blocks to mine");
            return None;
        }

        let mut round = 1u32;
        loop {
            info!(
                round,
                time_limit = ?limits.time_limit,
                max_attempts = limits.max_attempts_per_round,
                "mining round started"
            );
            let started = Instant::now();

            match round_fn(self, &mut candidates, &limits, started) {
                RoundOutcome::Solved(index) => {
                    let winner = candidates.swap_remove(index);
                    info!(
                        miner_id = winner.miner_id,
                        nonce = winner.block.nonce(),
                        attempts = winner.attempts,
                        hash = winner.found_hash.as_deref().unwrap_or_default(),
                        "candidate solved block"
                    );
                    return Some(winner);
                }
                RoundOutcome::Fallback(best) => {
                    let candidate = &mut candidates[best.index];
                    candidate.block.set_nonce(best.nonce);
                    candidate.accept(best.hash, Resolution::RoundFallback, started.elapsed());
                    let winner = candidates.swap_remove(best.index);
                    warn!(
                        miner_id = winner.miner_id,
                        hash = winner.found_hash.as_deref().unwrap_or_default(),
                        "no hash met the target, accepting best observed"
                    );
                    return Some(winner);
                }
                RoundOutcome::Empty => {
                    debug!(round, elapsed = ?started.elapsed(), "round observed no hashes");
                }
            }

            limits.escalate();
            round += 1;

            if round > limits.max_rounds {
                let index = self.smallest_current_hash(&candidates)?;
                let hash = candidates[index].block.hash(&self.hasher);
                candidates[index].accept(hash, Resolution::ForcedFallback, started.elapsed());
                let winner = candidates.swap_remove(index);
                warn!(
                    miner_id = winner.miner_id,
                    rounds = limits.max_rounds,
                    "round cap reached, forcing best candidate"
                );
                return Some(winner);
            }
        }
    }

    fn smallest_current_hash(&self, candidates: &[CandidateBlock]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .map(|(index, c)| (c.block.hash(&self.hasher), c.miner_id, index))
            .min()
            .map(|(_, _, index)| index)
    }

    fn attempts_per_candidate(limits: &MiningLimits, candidates: usize) -> u64 {
        limits.max_attempts_per_round / candidates as u64
    }

    fn scan_round(
        &self,
        candidates: &mut [CandidateBlock],
        limits: &MiningLimits,
        started: Instant,
    ) -> RoundOutcome {
        let per_candidate = Self::attempts_per_candidate(limits, candidates.len());
        let mut best: Option<Best> = None;

        for (index, candidate) in candidates.iter_mut().enumerate() {
            if started.elapsed() > limits.time_limit {
                warn!(
                    miner_id = candidate.miner_id,
                    "time limit reached while scanning candidates"
                );
                break;
            }

            let candidate_started = Instant::now();
            for _ in 0..per_candidate {
                let hash = candidate.step(&self.hasher);
                let seen = Best {
                    index,
                    hash,
                    nonce: candidate.block.nonce(),
                };
                let solved = meets_target(&seen.hash, &candidate.block.header().difficulty_target);
                if solved {
                    candidate.accept(seen.hash, Resolution::Solved, started.elapsed());
                    return RoundOutcome::Solved(index);
                }
                if seen.improves_on(&best) {
                    best = Some(seen);
                }
                if candidate.timed_out(started, limits.time_limit) {
                    warn!(miner_id = candidate.miner_id, "time limit reached mid-candidate");
                    break;
                }
            }
            debug!(
                miner_id = candidate.miner_id,
                attempts = per_candidate,
                elapsed = ?candidate_started.elapsed(),
                "candidate found nothing"
            );
        }

        best.map_or(RoundOutcome::Empty, RoundOutcome::Fallback)
    }

    fn parallel_round(
        &self,
        candidates: &mut [CandidateBlock],
        limits: &MiningLimits,
        started: Instant,
    ) -> RoundOutcome {
        let per_candidate = Self::attempts_per_candidate(limits, candidates.len());
        let stop = AtomicBool::new(false);
        let hasher = &self.hasher;

        let reports: Vec<(Option<Best>, bool)> = candidates
            .par_iter_mut()
            .enumerate()
            .map(|(index, candidate)| {
                let mut best: Option<Best> = None;
                if started.elapsed() > limits.time_limit {
                    return (best, false);
                }
                for _ in 0..per_candidate {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let hash = candidate.step(hasher);
                    let seen = Best {
                        index,
                        hash,
                        nonce: candidate.block.nonce(),
                    };
                    if meets_target(&seen.hash, &candidate.block.header().difficulty_target) {
                        stop.store(true, Ordering::Relaxed);
                        return (Some(seen), true);
                    }
                    if seen.improves_on(&best) {
                        best = Some(seen);
                    }
                    if candidate.timed_out(started, limits.time_limit) {
                        break;
                    }
                }
                (best, false)
            })
            .collect();

        let mut solved: Option<Best> = None;
        let mut best: Option<Best> = None;
        for (seen, is_solution) in reports {
            let Some(seen) = seen else { continue };
            let slot = if is_solution { &mut solved } else { &mut best };
            if seen.improves_on(slot) {
                *slot = Some(seen);
            }
        }

        if let Some(winner) = solved {
            let candidate = &mut candidates[winner.index];
            candidate.block.set_nonce(winner.nonce);
            candidate.accept(winner.hash, Resolution::Solved, started.elapsed());
            return RoundOutcome::Solved(winner.index);
        }
        best.map_or(RoundOutcome::Empty, RoundOutcome::Fallback)
    }
}

//! Binary Merkle tree over transaction identifiers.
//!
//! Leaves are `H(id)`. Each parent is `H(left + right)` over the hex strings; on an odd
//! level the last node is paired with itself. Duplicate ids produce identical leaves,
//! so a proof always describes the first occurrence.

use crate::constants::ZERO_HASH;
use crate::hash::HashPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One step of an inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: String,
    /// The sibling sits to the left of the running hash.
    pub is_left: bool,
}

pub type MerkleProof = Vec<ProofStep>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    transaction_ids: Vec<String>,
    /// Level 0 holds the leaf hashes, the last level holds only the root.
    levels: Vec<Vec<String>>,
    root: String,
}

impl MerkleTree {
    pub fn build<H: HashPrimitive>(transaction_ids: Vec<String>, hasher: &H) -> Self {
        if transaction_ids.is_empty() {
            return Self {
                transaction_ids,
                levels: Vec::new(),
                root: ZERO_HASH.to_string(),
            };
        }

        let mut level: Vec<String> = transaction_ids.iter().map(|id| hasher.digest(id)).collect();
        let mut levels = vec![level.clone()];

        while level.len() > 1 {
            let next: Vec<String> = level
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    hasher.digest(&format!("{left}{right}"))
                })
                .collect();
            debug!(level = levels.len(), nodes = next.len(), "merkle level built");
            levels.push(next.clone());
            level = next;
        }

        let root = level.swap_remove(0);
        Self {
            transaction_ids,
            levels,
            root,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn transaction_ids(&self) -> &[String] {
        &self.transaction_ids
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_ids.is_empty()
    }

    /// Inclusion proof for `id`, or `None` when it is not a leaf of this tree.
    ///
    /// A node without a right neighbour was hashed with itself, so its own hash is
    /// recorded as the sibling for that level.
    pub fn proof(&self, id: &str) -> Option<MerkleProof> {
        let mut index = self.transaction_ids.iter().position(|t| t == id)?;
        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));

        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let (sibling_index, is_left) = if index % 2 == 0 {
                (index + 1, false)
            } else {
                (index - 1, true)
            };
            let sibling = level.get(sibling_index).unwrap_or(&level[index]);
            proof.push(ProofStep {
                sibling: sibling.clone(),
                is_left,
            });
            index /= 2;
        }

        Some(proof)
    }

    pub fn verify<H: HashPrimitive>(&self, id: &str, proof: &[ProofStep], hasher: &H) -> bool {
        if self.is_empty() {
            return false;
        }
        let computed = proof.iter().fold(hasher.digest(id), |current, step| {
            if step.is_left {
                hasher.digest(&format!("{}{current}", step.sibling))
            } else {
                hasher.digest(&format!("{current}{}", step.sibling))
            }
        });
        computed == self.root
    }
}

use crate::hash::HashPrimitive;
use serde::{Deserialize, Serialize};

/// A transfer between two ledger keys. `hash` is fixed at construction and only
/// detects corruption of the other fields; it is not a signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sender_key: String,
    pub receiver_key: String,
    pub amount: u64,
    pub timestamp: u64,
    pub hash: String,
}

impl Transaction {
    pub fn new<H: HashPrimitive>(
        id: impl Into<String>,
        sender_key: impl Into<String>,
        receiver_key: impl Into<String>,
        amount: u64,
        timestamp: u64,
        hasher: &H,
    ) -> Self {
        let mut tx = Self {
            id: id.into(),
            sender_key: sender_key.into(),
            receiver_key: receiver_key.into(),
            amount,
            timestamp,
            hash: String::new(),
        };
        tx.hash = tx.compute_hash(hasher);
        tx
    }

    pub fn hash_input(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.id, self.sender_key, self.receiver_key, self.amount, self.timestamp
        )
    }

    pub fn compute_hash<H: HashPrimitive>(&self, hasher: &H) -> String {
        hasher.digest(&self.hash_input())
    }

    pub fn verify_hash<H: HashPrimitive>(&self, hasher: &H) -> bool {
        self.compute_hash(hasher) == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::MixHash;

    #[test]
    fn stored_hash_matches_fields() {
        let tx = Transaction::new("id-1", "alice", "bob", 10, 1_600_000_000, &MixHash);
        assert_eq!(tx.hash, MixHash.digest("id-1alicebob101600000000"));
        assert!(tx.verify_hash(&MixHash));
    }

    #[test]
    fn tampering_is_detected() {
        let mut tx = Transaction::new("id-1", "alice", "bob", 10, 1_600_000_000, &MixHash);
        tx.amount = 1_000;
        assert!(!tx.verify_hash(&MixHash));
    }

    #[test]
    fn serde_round_trip_keeps_hash() {
        let tx = Transaction::new("id-2", "alice", "bob", 3, 1_600_000_100, &MixHash);
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
        assert!(back.verify_hash(&MixHash));
    }
}

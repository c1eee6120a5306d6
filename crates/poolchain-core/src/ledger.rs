//! Balance ledger contract consumed by the chain, plus the in-memory accounts table.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key to balance mapping mutated when blocks are applied.
///
/// Amounts are unsigned, so a negative debit or credit cannot be expressed.
pub trait Ledger {
    fn contains(&self, key: &str) -> bool;
    fn balance_of(&self, key: &str) -> Option<u64>;
    fn debit(&mut self, key: &str, amount: u64) -> Result<(), LedgerError>;
    fn credit(&mut self, key: &str, amount: u64) -> Result<(), LedgerError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub public_key: String,
    pub balance: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Accounts {
    accounts: HashMap<String, Account>,
}

impl Accounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the account stored under its public key.
    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.public_key.clone(), account);
    }

    pub fn get(&self, key: &str) -> Option<&Account> {
        self.accounts.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.accounts.keys()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn total_supply(&self) -> u128 {
        self.accounts.values().map(|a| u128::from(a.balance)).sum()
    }
}

impl Ledger for Accounts {
    fn contains(&self, key: &str) -> bool {
        self.accounts.contains_key(key)
    }

    fn balance_of(&self, key: &str) -> Option<u64> {
        self.accounts.get(key).map(|a| a.balance)
    }

    fn debit(&mut self, key: &str, amount: u64) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(key)
            .ok_or_else(|| LedgerError::UnknownAccount(key.to_string()))?;
        if amount > account.balance {
            return Err(LedgerError::InsufficientBalance {
                key: key.to_string(),
                balance: account.balance,
                amount,
            });
        }
        account.balance -= amount;
        Ok(())
    }

    fn credit(&mut self, key: &str, amount: u64) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(key)
            .ok_or_else(|| LedgerError::UnknownAccount(key.to_string()))?;
        account.balance = account.balance.saturating_add(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> Accounts {
        let mut accounts = Accounts::new();
        for (name, balance) in [("alice", 100), ("bob", 5)] {
            accounts.insert(Account {
                name: name.to_string(),
                public_key: format!("{name}-key"),
                balance,
            });
        }
        accounts
    }

    #[test]
    fn debit_and_credit() {
        let mut ledger = accounts();
        ledger.debit("alice-key", 40).unwrap();
        ledger.credit("bob-key", 40).unwrap();
        assert_eq!(ledger.balance_of("alice-key"), Some(60));
        assert_eq!(ledger.balance_of("bob-key"), Some(45));
        assert_eq!(ledger.total_supply(), 105);
    }

    #[test]
    fn overdraft_is_rejected_without_change() {
        let mut ledger = accounts();
        let err = ledger.debit("bob-key", 6).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                key: "bob-key".into(),
                balance: 5,
                amount: 6
            }
        );
        assert_eq!(ledger.balance_of("bob-key"), Some(5));
    }

    #[test]
    fn unknown_accounts() {
        let mut ledger = accounts();
        assert!(!ledger.contains("carol-key"));
        assert_eq!(ledger.balance_of("carol-key"), None);
        assert!(matches!(
            ledger.credit("carol-key", 1),
            Err(LedgerError::UnknownAccount(_))
        ));
        assert!(matches!(
            ledger.debit("carol-key", 1),
            Err(LedgerError::UnknownAccount(_))
        ));
    }
}

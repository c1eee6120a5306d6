//! Random users and transfers that feed the simulation.

use poolchain_core::{Account, Accounts, Chain, HashPrimitive, Ledger, Transaction};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Share of generated transfers that stay within the sender's balance.
const VALID_SHARE: f64 = 0.95;
const MAX_TRANSFER: u64 = 5_000;

pub fn generate_users<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Accounts {
    let mut accounts = Accounts::new();
    while accounts.len() < n {
        let public_key = format!("{:032x}", rng.gen::<u128>());
        accounts.insert(Account {
            name: format!("User_{}", &public_key[..6]),
            public_key,
            balance: rng.gen_range(100..=1_000_000),
        });
    }
    info!(users = accounts.len(), "users generated");
    accounts
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerationReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Creates `m` transfers between distinct random users and submits each to `chain`.
/// Roughly one in twenty deliberately overdraws the sender and is rejected.
pub fn generate_transactions<L, H, R>(
    chain: &mut Chain<L, H>,
    keys: &[String],
    m: usize,
    rng: &mut R,
) -> GenerationReport
where
    L: Ledger,
    H: HashPrimitive,
    R: Rng + ?Sized,
{
    let mut report = GenerationReport::default();
    if keys.len() < 2 {
        return report;
    }
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    for _ in 0..m {
        let pair: Vec<&String> = keys.choose_multiple(rng, 2).collect();
        let (sender, receiver) = (pair[0], pair[1]);
        let balance = chain.ledger().balance_of(sender).unwrap_or_default();

        let amount = if rng.gen_bool(VALID_SHARE) && balance > 0 {
            rng.gen_range(1..=balance.min(MAX_TRANSFER))
        } else {
            balance + rng.gen_range(1..=1_000)
        };

        let tx = Transaction::new(
            format!("{:032x}", rng.gen::<u128>()),
            sender.as_str(),
            receiver.as_str(),
            amount,
            timestamp,
            chain.hasher(),
        );
        match chain.submit_transaction(tx) {
            Ok(()) => report.accepted += 1,
            Err(_) => report.rejected += 1,
        }
    }

    info!(
        accepted = report.accepted,
        rejected = report.rejected,
        pending = chain.pending().len(),
        "transactions generated"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolchain_core::{ChainConfig, Sha256Hex};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn users_have_unique_keys_and_funds() {
        let mut rng = StdRng::seed_from_u64(5);
        let users = generate_users(50, &mut rng);
        assert_eq!(users.len(), 50);
        for key in users.keys() {
            let account = users.get(key).unwrap();
            assert!((100..=1_000_000).contains(&account.balance));
            assert!(account.name.starts_with("User_"));
        }
    }

    #[test]
    fn every_transaction_is_accounted_for() {
        let mut rng = StdRng::seed_from_u64(6);
        let users = generate_users(20, &mut rng);
        let mut keys: Vec<String> = users.keys().cloned().collect();
        keys.sort();
        let config = ChainConfig {
            difficulty_target: String::new(),
            seed: Some(6),
            ..ChainConfig::default()
        };
        let mut chain = Chain::new(config, users, Sha256Hex);
        let report = generate_transactions(&mut chain, &keys, 400, &mut rng);
        assert_eq!(report.accepted + report.rejected, 400);
        assert_eq!(chain.pending().len(), report.accepted);
        assert!(report.rejected > 0);
        assert!(report.accepted > report.rejected);
    }
}

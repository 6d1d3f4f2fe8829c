//! Thread-safe wallet storage
//!
//! `InMemoryWalletStore` keeps one [`Wallet`] per user in a `DashMap`. The
//! read-check-write of a debit or credit runs while holding that user's entry
//! guard, which serializes writers to the same wallet. Entries of different
//! users live behind independent shard locks, so unrelated users do not wait
//! on each other and there is no store-wide lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::traits::WalletStore;
use crate::types::{DebitOutcome, UserId, Wallet, WalletError};

/// Thread-safe wallet store backed by `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryWalletStore {
    wallets: DashMap<UserId, Wallet>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
        }
    }

    /// Number of open wallets
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

impl WalletStore for InMemoryWalletStore {
    fn open(&self, user: &str, now: DateTime<Utc>) -> Result<Wallet, WalletError> {
        let mut created = false;
        let wallet = self
            .wallets
            .entry(user.to_string())
            .or_insert_with(|| {
                created = true;
                Wallet::open(user, now)
            })
            .clone();

        if !created {
            return Err(WalletError::WalletExists(user.to_string()));
        }
        Ok(wallet)
    }

    fn get(&self, user: &str) -> Result<Wallet, WalletError> {
        self.wallets
            .get(user)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WalletError::wallet_not_found(user))
    }

    fn debit_if_sufficient(
        &self,
        user: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, WalletError> {
        match self.wallets.get_mut(user) {
            Some(mut entry) => entry.value_mut().debit_if_sufficient(amount, now),
            None => Err(WalletError::wallet_not_found(user)),
        }
    }

    fn credit(&self, user: &str, amount: Decimal, now: DateTime<Utc>) -> Result<Decimal, WalletError> {
        match self.wallets.get_mut(user) {
            Some(mut entry) => entry.value_mut().credit(amount, now),
            None => Err(WalletError::wallet_not_found(user)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;
    use std::sync::Arc;
    use std::thread;

    fn store_with(user: &str, balance: Decimal) -> InMemoryWalletStore {
        let store = InMemoryWalletStore::new();
        store.open(user, Utc::now()).unwrap();
        if balance > Decimal::ZERO {
            store.credit(user, balance, Utc::now()).unwrap();
        }
        store
    }

    #[test]
    fn test_open_creates_empty_wallet() {
        let store = InMemoryWalletStore::new();

        let wallet = store.open("alice", Utc::now()).unwrap();

        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let store = store_with("alice", dec!(50));

        let result = store.open("alice", Utc::now());

        assert_eq!(result, Err(WalletError::WalletExists("alice".to_string())));
        // the existing balance survives the second open
        assert_eq!(store.get("alice").unwrap().balance, dec!(50));
    }

    #[test]
    fn test_unknown_wallet_is_reported() {
        let store = InMemoryWalletStore::new();

        assert_eq!(store.get("ghost"), Err(WalletError::wallet_not_found("ghost")));
        assert_eq!(
            store.credit("ghost", dec!(1), Utc::now()),
            Err(WalletError::wallet_not_found("ghost"))
        );
        assert_eq!(
            store.debit_if_sufficient("ghost", dec!(1), Utc::now()),
            Err(WalletError::wallet_not_found("ghost"))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_debit_and_credit() {
        let store = store_with("alice", dec!(500));

        let outcome = store.debit_if_sufficient("alice", dec!(120), Utc::now()).unwrap();
        assert_eq!(outcome, DebitOutcome::Debited(dec!(380)));

        let balance = store.credit("alice", dec!(20), Utc::now()).unwrap();
        assert_eq!(balance, dec!(400));
    }

    #[test]
    fn test_insufficient_debit_reports_current_balance() {
        let store = store_with("alice", dec!(10));

        let outcome = store.debit_if_sufficient("alice", dec!(11), Utc::now()).unwrap();

        assert_eq!(outcome, DebitOutcome::Insufficient(dec!(10)));
        assert_eq!(store.get("alice").unwrap().balance, dec!(10));
    }

    #[test]
    fn test_concurrent_debits_same_wallet_never_overdraw() {
        let store = Arc::new(store_with("alice", dec!(100)));

        let mut handles = vec![];

        // 40 threads each try to take 5; only 20 can succeed
        for _ in 0..40 {
            let store_clone = Arc::clone(&store);
            let handle = thread::spawn(move || {
                store_clone
                    .debit_if_sufficient("alice", dec!(5), Utc::now())
                    .unwrap()
            });
            handles.push(handle);
        }

        let mut debited = 0;
        for handle in handles {
            match handle.join().unwrap() {
                DebitOutcome::Debited(balance) => {
                    assert!(balance >= Decimal::ZERO);
                    debited += 1;
                }
                DebitOutcome::Insufficient(balance) => assert!(balance < dec!(5)),
            }
        }

        assert_eq!(debited, 20);
        assert_eq!(store.get("alice").unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn test_concurrent_credits_same_wallet_are_all_applied() {
        let store = Arc::new(store_with("alice", Decimal::ZERO));

        let mut handles = vec![];
        for _ in 0..50 {
            let store_clone = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store_clone.credit("alice", dec!(2), Utc::now()).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("alice").unwrap().balance, dec!(100));
    }

    #[test]
    fn test_concurrent_mixed_operations_different_wallets() {
        let store = Arc::new(InMemoryWalletStore::new());
        for i in 0..10 {
            store.open(&format!("user-{i}"), Utc::now()).unwrap();
        }

        let mut handles = vec![];
        for i in 0..10 {
            let store_clone = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let user = format!("user-{i}");
                store_clone.credit(&user, dec!(30), Utc::now()).unwrap();
                store_clone
                    .debit_if_sufficient(&user, dec!(10), Utc::now())
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..10 {
            assert_eq!(store.get(&format!("user-{i}")).unwrap().balance, dec!(20));
        }
    }
}

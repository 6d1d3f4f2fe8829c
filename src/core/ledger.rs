//! Thread-safe transaction ledger
//!
//! `InMemoryLedger` is the source of truth for transaction history. Rows are
//! appended in `pending` and leave that status exactly once, through
//! [`TransactionLedger::finalize`]. The conditional transition runs under the
//! row's `DashMap` entry guard, which makes it a compare-and-swap on status:
//! of any number of concurrent finalizers for one id, one applies its effect
//! and the rest observe the terminal row.
//!
//! Lock order: a transaction entry may be held while a wallet entry or a
//! revision entry is taken, never the other way round.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::traits::{Finalized, SettleEffect, TransactionLedger};
use crate::types::{Transaction, TransactionId, TransactionStatus, UserId, WalletError};

/// Thread-safe ledger backed by `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    transactions: DashMap<TransactionId, Transaction>,
    /// Per-user transaction ids in insertion order
    by_user: DashMap<UserId, Vec<TransactionId>>,
    /// Per-user count of terminal transitions
    revisions: DashMap<UserId, u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionLedger for InMemoryLedger {
    fn insert(&self, tx: Transaction) -> Result<(), WalletError> {
        let id = tx.id;
        let user = tx.user.clone();

        let mut inserted = false;
        self.transactions.entry(id).or_insert_with(|| {
            inserted = true;
            tx
        });
        if !inserted {
            return Err(WalletError::Storage(format!("duplicate transaction id {id}")));
        }

        self.by_user.entry(user).or_default().push(id);
        Ok(())
    }

    fn get(&self, id: TransactionId) -> Result<Transaction, WalletError> {
        self.transactions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(WalletError::TransactionNotFound(id))
    }

    fn attach_session(
        &self,
        id: TransactionId,
        session: &str,
    ) -> Result<Transaction, WalletError> {
        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or(WalletError::TransactionNotFound(id))?;
        let tx = entry.value_mut();
        if tx.status != TransactionStatus::Pending || !tx.awaits_gateway() {
            return Err(WalletError::NotReconcilable(id));
        }
        tx.gateway_session = Some(session.to_string());
        Ok(tx.clone())
    }

    fn finalize(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        at: DateTime<Utc>,
        effect: SettleEffect<'_>,
    ) -> Result<Finalized, WalletError> {
        if !target.is_terminal() {
            return Err(WalletError::Storage(format!(
                "transaction {id} cannot be finalized as {target}"
            )));
        }

        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or(WalletError::TransactionNotFound(id))?;
        let tx = entry.value_mut();

        if tx.status.is_terminal() {
            return Ok(Finalized::AlreadyTerminal(tx.clone()));
        }

        effect(tx)?;

        tx.status = target;
        tx.settled_at = Some(at);
        *self.revisions.entry(tx.user.clone()).or_insert(0) += 1;

        Ok(Finalized::Applied(tx.clone()))
    }

    fn list_for_user(&self, user: &str) -> Result<Vec<Transaction>, WalletError> {
        // copy the ids first so no by_user guard is held while reading rows
        let ids = self
            .by_user
            .get(user)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        Ok(ids
            .into_iter()
            .filter_map(|id| self.transactions.get(&id).map(|entry| entry.value().clone()))
            .collect())
    }

    fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionId>, WalletError> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| {
                entry.status == TransactionStatus::Pending && entry.created_at < cutoff
            })
            .map(|entry| *entry.key())
            .collect())
    }

    fn revision(&self, user: &str) -> u64 {
        self.revisions.get(user).map(|entry| *entry.value()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, TopUpMethod};
    use chrono::{Duration, TimeZone};
    use rust_decimal::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn purchase(user: &str) -> Transaction {
        Transaction::purchase(user, Category::Canteen, dec!(10), None, t0())
    }

    fn noop(_: &Transaction) -> Result<(), WalletError> {
        Ok(())
    }

    #[test]
    fn test_insert_and_get() {
        let ledger = InMemoryLedger::new();
        let tx = purchase("alice");
        let id = tx.id;

        ledger.insert(tx.clone()).unwrap();

        assert_eq!(ledger.get(id).unwrap(), tx);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let ledger = InMemoryLedger::new();
        let tx = purchase("alice");

        ledger.insert(tx.clone()).unwrap();
        let result = ledger.insert(tx);

        assert!(matches!(result, Err(WalletError::Storage(_))));
        assert_eq!(ledger.list_for_user("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_get_unknown_transaction() {
        let ledger = InMemoryLedger::new();
        let id = uuid::Uuid::new_v4();

        assert_eq!(ledger.get(id), Err(WalletError::TransactionNotFound(id)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_finalize_applies_once_and_bumps_revision() {
        let ledger = InMemoryLedger::new();
        let tx = purchase("alice");
        let id = tx.id;
        ledger.insert(tx).unwrap();

        let first = ledger
            .finalize(id, TransactionStatus::Completed, t0(), &mut noop)
            .unwrap();
        let second = ledger
            .finalize(id, TransactionStatus::Failed, t0(), &mut noop)
            .unwrap();

        assert!(first.was_applied());
        assert_eq!(first.transaction().status, TransactionStatus::Completed);
        assert_eq!(first.transaction().settled_at, Some(t0()));
        assert!(!second.was_applied());
        assert_eq!(second.transaction().status, TransactionStatus::Completed);
        assert_eq!(ledger.revision("alice"), 1);
    }

    #[test]
    fn test_failed_effect_leaves_transaction_pending() {
        let ledger = InMemoryLedger::new();
        let tx = purchase("alice");
        let id = tx.id;
        ledger.insert(tx).unwrap();

        let result = ledger.finalize(id, TransactionStatus::Completed, t0(), &mut |_| {
            Err(WalletError::Storage("wallet shard unavailable".to_string()))
        });

        assert!(matches!(result, Err(WalletError::Storage(_))));
        assert_eq!(ledger.get(id).unwrap().status, TransactionStatus::Pending);
        assert_eq!(ledger.revision("alice"), 0);
    }

    #[test]
    fn test_effect_not_run_on_terminal_transaction() {
        let ledger = InMemoryLedger::new();
        let tx = purchase("alice");
        let id = tx.id;
        ledger.insert(tx).unwrap();
        ledger
            .finalize(id, TransactionStatus::Failed, t0(), &mut noop)
            .unwrap();

        let mut runs = 0;
        let outcome = ledger
            .finalize(id, TransactionStatus::Completed, t0(), &mut |_| {
                runs += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(runs, 0);
        assert_eq!(outcome.transaction().status, TransactionStatus::Failed);
    }

    #[test]
    fn test_finalize_to_pending_is_refused() {
        let ledger = InMemoryLedger::new();
        let tx = purchase("alice");
        let id = tx.id;
        ledger.insert(tx).unwrap();

        let result = ledger.finalize(id, TransactionStatus::Pending, t0(), &mut noop);

        assert!(matches!(result, Err(WalletError::Storage(_))));
    }

    #[test]
    fn test_concurrent_finalizers_run_effect_exactly_once() {
        let ledger = Arc::new(InMemoryLedger::new());
        let tx = Transaction::deposit("alice", TopUpMethod::Card, dec!(1000), t0());
        let id = tx.id;
        ledger.insert(tx).unwrap();

        let effects = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for _ in 0..16 {
            let ledger_clone = Arc::clone(&ledger);
            let effects_clone = Arc::clone(&effects);
            handles.push(thread::spawn(move || {
                ledger_clone
                    .finalize(id, TransactionStatus::Completed, t0(), &mut |_| {
                        effects_clone.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap()
                    .was_applied()
            }));
        }

        let applied = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|applied| *applied)
            .count();

        assert_eq!(applied, 1);
        assert_eq!(effects.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.revision("alice"), 1);
    }

    #[test]
    fn test_attach_session_only_on_pending_card_topup() {
        let ledger = InMemoryLedger::new();
        let card = Transaction::deposit("alice", TopUpMethod::Card, dec!(1000), t0());
        let bank = Transaction::deposit("alice", TopUpMethod::Bank, dec!(1000), t0());
        let (card_id, bank_id) = (card.id, bank.id);
        ledger.insert(card).unwrap();
        ledger.insert(bank).unwrap();

        let attached = ledger.attach_session(card_id, "cs_test_1").unwrap();
        assert_eq!(attached.gateway_session.as_deref(), Some("cs_test_1"));

        assert_eq!(
            ledger.attach_session(bank_id, "cs_test_2"),
            Err(WalletError::NotReconcilable(bank_id))
        );

        ledger
            .finalize(card_id, TransactionStatus::Failed, t0(), &mut noop)
            .unwrap();
        assert_eq!(
            ledger.attach_session(card_id, "cs_test_3"),
            Err(WalletError::NotReconcilable(card_id))
        );
    }

    #[test]
    fn test_pending_before_cutoff() {
        let ledger = InMemoryLedger::new();
        let mut old = Transaction::deposit("alice", TopUpMethod::Card, dec!(100), t0());
        old.created_at = t0() - Duration::hours(2);
        let fresh = Transaction::deposit("alice", TopUpMethod::Card, dec!(100), t0());
        let mut settled = Transaction::deposit("bob", TopUpMethod::Card, dec!(100), t0());
        settled.created_at = t0() - Duration::hours(2);
        let (old_id, settled_id) = (old.id, settled.id);

        ledger.insert(old).unwrap();
        ledger.insert(fresh).unwrap();
        ledger.insert(settled).unwrap();
        ledger
            .finalize(settled_id, TransactionStatus::Completed, t0(), &mut noop)
            .unwrap();

        let stale = ledger.pending_before(t0() - Duration::minutes(30)).unwrap();

        assert_eq!(stale, vec![old_id]);
    }

    #[test]
    fn test_list_for_user_keeps_insertion_order() {
        let ledger = InMemoryLedger::new();
        let ids: Vec<_> = (0..5)
            .map(|_| {
                let tx = purchase("alice");
                let id = tx.id;
                ledger.insert(tx).unwrap();
                id
            })
            .collect();
        ledger.insert(purchase("bob")).unwrap();

        let listed: Vec<_> = ledger
            .list_for_user("alice")
            .unwrap()
            .into_iter()
            .map(|tx| tx.id)
            .collect();

        assert_eq!(listed, ids);
        assert!(ledger.list_for_user("nobody").unwrap().is_empty());
    }
}

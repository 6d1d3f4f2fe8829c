//! Core traits for wallet storage, the transaction ledger and progression storage
//!
//! The orchestrator only talks to storage through these traits, so the
//! in-memory DashMap implementations can be swapped for a database-backed
//! store, or for a failing double in tests.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::types::{
    DebitOutcome, Progression, Transaction, TransactionId, TransactionStatus, Wallet,
    WalletError,
};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Holds one balance per user
///
/// Both mutating primitives must be linearizable per user: two calls on the
/// same wallet never interleave, calls on different wallets never contend.
pub trait WalletStore: Send + Sync {
    /// Open an empty wallet for a new user
    fn open(&self, user: &str, now: DateTime<Utc>) -> Result<Wallet, WalletError>;

    /// Snapshot of a wallet
    fn get(&self, user: &str) -> Result<Wallet, WalletError>;

    /// Atomically check `balance >= amount` and, if so, subtract it
    fn debit_if_sufficient(
        &self,
        user: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, WalletError>;

    /// Atomically add `amount`, returning the new balance
    fn credit(&self, user: &str, amount: Decimal, now: DateTime<Utc>)
        -> Result<Decimal, WalletError>;
}

/// Result of a terminal transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Finalized {
    /// This call moved the transaction out of `pending`
    Applied(Transaction),
    /// Someone else already did; the effect was not run
    AlreadyTerminal(Transaction),
}

impl Finalized {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Finalized::Applied(tx) | Finalized::AlreadyTerminal(tx) => tx,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Finalized::Applied(_))
    }
}

/// Balance effect run inside a terminal transition
pub type SettleEffect<'a> = &'a mut dyn FnMut(&Transaction) -> Result<(), WalletError>;

/// Append-mostly log of transactions
pub trait TransactionLedger: Send + Sync {
    /// Record a new pending transaction
    fn insert(&self, tx: Transaction) -> Result<(), WalletError>;

    /// Snapshot of a transaction
    fn get(&self, id: TransactionId) -> Result<Transaction, WalletError>;

    /// Store the gateway session reference of a pending card top-up
    fn attach_session(&self, id: TransactionId, session: &str)
        -> Result<Transaction, WalletError>;

    /// Move a pending transaction to `target`, running `effect` first
    ///
    /// The check for `pending`, the effect and the status write happen as one
    /// unit with respect to every other `finalize` on the same id. If the
    /// transaction is already terminal the effect is skipped and
    /// [`Finalized::AlreadyTerminal`] is returned. If the effect fails the
    /// transaction stays `pending` and the error is returned.
    fn finalize(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        at: DateTime<Utc>,
        effect: SettleEffect<'_>,
    ) -> Result<Finalized, WalletError>;

    /// All transactions of a user, oldest first
    fn list_for_user(&self, user: &str) -> Result<Vec<Transaction>, WalletError>;

    /// Ids of transactions still pending that were created before `cutoff`
    fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionId>, WalletError>;

    /// Number of terminal transitions recorded for a user so far
    fn revision(&self, user: &str) -> u64;
}

/// What a [`ProgressionStore::save`] did with the offered snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotSaved {
    /// Stored, replacing the snapshot carried here (if any)
    Replaced(Option<Progression>),
    /// Dropped because a newer revision is already stored
    Superseded,
}

/// Holds the last derived progression per user
pub trait ProgressionStore: Send + Sync {
    fn load(&self, user: &str) -> Result<Option<Progression>, WalletError>;

    /// Store `progression` unless a newer revision is already there
    ///
    /// The compare and the swap are one unit with respect to other saves for
    /// the same user, so two passes never both see the same predecessor.
    fn save(&self, progression: Progression) -> Result<SnapshotSaved, WalletError>;
}

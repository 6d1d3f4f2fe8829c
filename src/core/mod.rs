//! Core business logic module
//!
//! - `traits` - storage and clock abstractions
//! - `wallet_store` - per-user balances
//! - `ledger` - transaction log with exactly-once settlement
//! - `catalog` - achievement, rank and points tables
//! - `progression` - achievement and rank recomputation
//! - `hooks` - post-commit reactions
//! - `orchestrator` - every wallet operation end to end
//! - `sweeper` - background expiry of pending transactions

pub mod catalog;
pub mod hooks;
pub mod ledger;
pub mod orchestrator;
pub mod progression;
pub mod sweeper;
pub mod traits;
pub mod wallet_store;

pub use hooks::{CommitEvent, NotificationHook, PostCommitHook, ProgressionHook};
pub use ledger::InMemoryLedger;
pub use orchestrator::{
    EngineConfig, OrchestratorBuilder, PurchaseReceipt, PurchaseRequest, Reconciliation,
    TopUpReceipt, TopUpRequest, TransactionOrchestrator,
};
pub use progression::{
    derive_progression, InMemoryProgressionStore, ProgressionCalculator, ProgressionRules,
};
pub use sweeper::spawn_expiry_sweeper;
pub use traits::{
    Clock, Finalized, ManualClock, ProgressionStore, SnapshotSaved, SystemClock, TransactionLedger,
    WalletStore,
};
pub use wallet_store::InMemoryWalletStore;

//! Types module
//!
//! Contains the data structures shared by the engine, its collaborators and
//! the HTTP surface:
//! - `wallet`: per-user balance record
//! - `transaction`: transaction record, status lifecycle and request enums
//! - `progression`: achievements and rank
//! - `error`: error taxonomy for the engine

pub mod error;
pub mod progression;
pub mod transaction;
pub mod wallet;

pub use error::WalletError;
pub use progression::{Achievement, Progression, RankTier, UserRank};
pub use transaction::{
    validate_amount, Category, GatewayReport, TopUpMethod, Transaction, TransactionId,
    TransactionKind, TransactionStatus,
};
pub use wallet::{DebitOutcome, UserId, Wallet};

//! Campus Wallet Library
//! # Overview
//!
//! Transaction and progression engine for a campus digital wallet: purchases
//! from a stored balance, top-ups by bank transfer or hosted card checkout,
//! and achievements and ranks derived from spending.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Wallet, Transaction, Achievement, ...)
//! - [`core`] - Business logic components:
//!   - [`core::orchestrator`] - Every wallet operation end to end
//!   - [`core::wallet_store`] - Per-user balances with atomic debit and credit
//!   - [`core::ledger`] - Transaction log with exactly-once settlement
//!   - [`core::progression`] - Achievement and rank recomputation
//! - [`collaborators`] - Identity, payment gateway and notification seams
//! - [`server`] - HTTP surface
//! - [`settings`] / [`cli`] - Configuration and argument parsing
//!
//! # Transaction Lifecycle
//!
//! Every transaction is written `pending` first and then moves once to
//! `completed` or `failed`:
//!
//! - **Purchase**: debited immediately if the balance covers it
//! - **Bank top-up**: credited immediately
//! - **Card top-up**: credited only after the gateway confirms payment;
//!   abandoned checkouts are failed by the expiry sweep

pub mod cli;
pub mod collaborators;
pub mod core;
pub mod server;
pub mod settings;
pub mod types;

pub use core::{TransactionOrchestrator, TransactionLedger, WalletStore};
pub use types::{
    Achievement, Category, Progression, RankTier, TopUpMethod, Transaction, TransactionId,
    TransactionStatus, UserId, Wallet, WalletError,
};

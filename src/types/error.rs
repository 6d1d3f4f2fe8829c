//! Error types for the campus wallet engine
//!
//! Every fallible operation in the crate returns [`WalletError`]. The variants
//! follow the four failure families the orchestrator distinguishes:
//!
//! - **Validation**: bad amount, bad category, unsupported top-up method.
//!   Rejected before any state is created.
//! - **Authorization**: bad PIN. Rejected before any transaction row exists.
//! - **Business rule**: insufficient balance. A `failed` transaction is kept for audit.
//! - **Infrastructure**: storage or gateway unavailable mid-operation.

use rust_decimal::Decimal;
use thiserror::Error;

use super::transaction::TransactionId;
use super::wallet::UserId;

/// Main error type for the wallet engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    /// The PIN did not match the identity collaborator's record
    #[error("Invalid credential")]
    InvalidCredential,

    /// The wallet cannot cover the requested purchase
    ///
    /// Carries the balance observed under the wallet lock at the time of the check.
    #[error("Insufficient balance for user {user}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Owner of the wallet
        user: UserId,
        /// Balance at the time of the check
        balance: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Amount is zero, negative, too precise or below a minimum
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// Human-readable reason
        reason: String,
    },

    /// Purchase category missing or not part of the fixed set
    #[error("Invalid category '{0}'")]
    InvalidCategory(String),

    /// Top-up method recognised but not offered, or not recognised at all
    #[error("Top-up method '{0}' is currently unavailable")]
    MethodUnavailable(String),

    /// No transaction with this id exists
    #[error("Transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// No wallet exists for this user
    #[error("Wallet for user {0} not found")]
    WalletNotFound(UserId),

    /// A wallet was already opened for this user
    #[error("Wallet for user {0} already exists")]
    WalletExists(UserId),

    /// A gateway callback referenced a transaction that is not a card top-up
    #[error("Transaction {0} is not awaiting a gateway confirmation")]
    NotReconcilable(TransactionId),

    /// Balance arithmetic left the representable range
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Owner of the wallet
        user: UserId,
    },

    /// The backing store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The payment gateway failed or returned something unusable
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The notification sink refused an event
    #[error("Notification error: {0}")]
    Notification(String),
}

impl WalletError {
    /// Create an InsufficientBalance error
    pub fn insufficient_balance(user: &str, balance: Decimal, requested: Decimal) -> Self {
        WalletError::InsufficientBalance {
            user: user.to_string(),
            balance,
            requested,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        WalletError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    /// Create a WalletNotFound error
    pub fn wallet_not_found(user: &str) -> Self {
        WalletError::WalletNotFound(user.to_string())
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: &str) -> Self {
        WalletError::ArithmeticOverflow {
            operation: operation.to_string(),
            user: user.to_string(),
        }
    }

    /// Rejections that happen before any state is written
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidAmount { .. }
                | WalletError::InvalidCategory(_)
                | WalletError::MethodUnavailable(_)
        )
    }

    /// Failures of the store or of an external collaborator
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            WalletError::Storage(_) | WalletError::Gateway(_) | WalletError::Notification(_)
        )
    }
}

//! Wallet-related types
//!
//! A wallet is the single balance record a user owns. The arithmetic lives
//! here; the locking discipline that makes it safe lives in
//! [`crate::core::wallet_store`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::WalletError;

/// User identifier, as issued by the identity collaborator
pub type UserId = String;

/// Per-user stored balance
///
/// `balance` is never negative at a committed state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    /// Owner of the wallet
    pub user: UserId,

    /// Current balance in currency units with minor-unit precision
    pub balance: Decimal,

    /// Time of the last balance mutation (or of opening)
    pub last_updated: DateTime<Utc>,
}

/// Result of a conditional debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The amount was taken; carries the new balance
    Debited(Decimal),
    /// The balance could not cover the amount; carries the untouched balance
    Insufficient(Decimal),
}

impl DebitOutcome {
    /// Balance after the attempt, whatever its outcome
    pub fn balance(&self) -> Decimal {
        match self {
            DebitOutcome::Debited(balance) | DebitOutcome::Insufficient(balance) => *balance,
        }
    }

    pub fn is_debited(&self) -> bool {
        matches!(self, DebitOutcome::Debited(_))
    }
}

impl Wallet {
    /// Open an empty wallet
    pub fn open(user: &str, now: DateTime<Utc>) -> Self {
        Wallet {
            user: user.to_string(),
            balance: Decimal::ZERO,
            last_updated: now,
        }
    }

    /// Take `amount` if the balance covers it, otherwise leave the wallet untouched
    pub fn debit_if_sufficient(
        &mut self,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, WalletError> {
        if self.balance < amount {
            return Ok(DebitOutcome::Insufficient(self.balance));
        }

        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| WalletError::arithmetic_overflow("debit", &self.user))?;
        self.last_updated = now;
        Ok(DebitOutcome::Debited(self.balance))
    }

    /// Add `amount` to the balance
    pub fn credit(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<Decimal, WalletError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::arithmetic_overflow("credit", &self.user))?;
        self.last_updated = now;
        Ok(self.balance)
    }
}

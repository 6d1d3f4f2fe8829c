//! Post-commit reactions
//!
//! Hooks run after a transaction reached a terminal status. They see the
//! committed row and the wallet balance at that point. A hook that fails is
//! logged by the orchestrator and skipped; the commit stands.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::progression::ProgressionCalculator;
use super::traits::Clock;
use crate::collaborators::{Notification, NotificationKind, NotificationSink};
use crate::types::{Transaction, TransactionKind, TransactionStatus, WalletError};

/// A terminal transition that just happened
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub transaction: Transaction,
    /// Wallet balance right after the transition
    pub balance: Decimal,
}

#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_commit(&self, event: &CommitEvent) -> Result<(), WalletError>;
}

/// Recomputes progression and announces newly completed achievements
pub struct ProgressionHook {
    calculator: Arc<ProgressionCalculator>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl ProgressionHook {
    pub fn new(
        calculator: Arc<ProgressionCalculator>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ProgressionHook {
            calculator,
            sink,
            clock,
        }
    }
}

#[async_trait]
impl PostCommitHook for ProgressionHook {
    fn name(&self) -> &'static str {
        "progression"
    }

    async fn after_commit(&self, event: &CommitEvent) -> Result<(), WalletError> {
        // failed rows change nothing a pass looks at
        if event.transaction.status != TransactionStatus::Completed {
            return Ok(());
        }

        let user = &event.transaction.user;
        let recomputed = self.calculator.recompute(user)?;

        for title in recomputed.newly_completed {
            let notification = Notification::new(
                user,
                NotificationKind::Achievement,
                "Achievement Unlocked",
                format!("You completed \"{title}\"."),
                self.clock.now(),
            );
            if let Err(e) = self.sink.emit(notification) {
                tracing::warn!(%user, achievement = %title, error = %e, "achievement notification dropped");
            }
        }
        Ok(())
    }
}

/// Tells the user how a payment or top-up ended
pub struct NotificationHook {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl NotificationHook {
    pub fn new(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        NotificationHook { sink, clock }
    }

    fn describe(event: &CommitEvent) -> Option<(NotificationKind, &'static str, String)> {
        let tx = &event.transaction;
        match (tx.kind, tx.status) {
            (TransactionKind::Purchase { category }, TransactionStatus::Completed) => Some((
                NotificationKind::Payment,
                "Payment Successful",
                format!("Your payment of ৳{} for {category} was successful.", tx.amount),
            )),
            (TransactionKind::Deposit { .. }, TransactionStatus::Completed) => Some((
                NotificationKind::Topup,
                "Wallet Top-up Successful",
                format!("Your wallet has been topped up with ৳{}.", tx.amount),
            )),
            // a failed purchase is reported to the caller directly
            (TransactionKind::Deposit { .. }, TransactionStatus::Failed) => Some((
                NotificationKind::System,
                "Wallet Top-up Failed",
                format!(
                    "Your top-up of ৳{} was not completed. No money was added to your wallet.",
                    tx.amount
                ),
            )),
            _ => None,
        }
    }
}

#[async_trait]
impl PostCommitHook for NotificationHook {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn after_commit(&self, event: &CommitEvent) -> Result<(), WalletError> {
        let Some((kind, title, message)) = Self::describe(event) else {
            return Ok(());
        };
        self.sink.emit(Notification::new(
            &event.transaction.user,
            kind,
            title,
            message,
            self.clock.now(),
        ))
    }
}

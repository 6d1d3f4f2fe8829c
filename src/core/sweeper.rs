//! Background expiry of abandoned transactions

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::orchestrator::TransactionOrchestrator;

/// Run [`TransactionOrchestrator::expire_pending`] every `period`
///
/// The task runs until the handle is aborted or the runtime shuts down.
pub fn spawn_expiry_sweeper(
    orchestrator: Arc<TransactionOrchestrator>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match orchestrator.expire_pending().await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!(count = expired.len(), "expired pending transactions");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
            }
        }
    })
}

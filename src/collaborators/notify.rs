//! User-facing notifications
//!
//! Notifications are fire-and-forget. A sink reports failure through its
//! `Result` so the caller can log it, but a failed notification never undoes
//! the transaction it describes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::{UserId, WalletError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Payment,
    Topup,
    Achievement,
    System,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Payment => "payment",
            NotificationKind::Topup => "topup",
            NotificationKind::Achievement => "achievement",
            NotificationKind::System => "system",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub user: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Notification {
            user: user.to_string(),
            title: title.into(),
            message: message.into(),
            kind,
            created_at,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: Notification) -> Result<(), WalletError>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn emit(&self, notification: Notification) -> Result<(), WalletError> {
        tracing::info!(
            user = %notification.user,
            kind = %notification.kind,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Forwards notifications to an in-process receiver
///
/// Emitting fails once the receiver has been dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelSink { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn emit(&self, notification: Notification) -> Result<(), WalletError> {
        self.sender
            .send(notification)
            .map_err(|_| WalletError::Notification("notification receiver closed".to_string()))
    }
}

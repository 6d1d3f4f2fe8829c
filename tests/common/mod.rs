//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use campus_wallet::collaborators::{ChannelSink, Notification, PinDirectory, SandboxGateway};
use campus_wallet::core::{
    ManualClock, ProgressionRules, PurchaseRequest, TopUpRequest, TransactionOrchestrator,
};
use campus_wallet::server::{self, ServerState};
use campus_wallet::{Category, TopUpMethod};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc::UnboundedReceiver;

pub const PIN: &str = "13579";
pub const USERS: [&str; 3] = ["alice", "bob", "carol"];

pub struct Harness {
    pub engine: Arc<TransactionOrchestrator>,
    pub gateway: Arc<SandboxGateway>,
    pub clock: Arc<ManualClock>,
    pub notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_rules(ProgressionRules::default())
    }

    /// Users in [`USERS`] get PIN [`PIN`] and an open, empty wallet
    pub fn with_rules(rules: ProgressionRules) -> Self {
        let pins = Arc::new(PinDirectory::new());
        for user in USERS {
            pins.enroll(user, PIN).unwrap();
        }
        let gateway = Arc::new(SandboxGateway::new(
            "https://checkout.test/session",
            "https://wallet.test",
        ));
        let clock = Arc::new(ManualClock::new(noon()));
        let (sink, notifications) = ChannelSink::new();

        let engine = Arc::new(
            TransactionOrchestrator::builder()
                .identity(pins)
                .gateway(gateway.clone())
                .clock(clock.clone())
                .notifications(Arc::new(sink))
                .rules(rules)
                .build(),
        );
        for user in USERS {
            engine.register_user(user).unwrap();
        }

        Harness {
            engine,
            gateway,
            clock,
            notifications,
        }
    }

    pub async fn fund(&self, user: &str, amount: Decimal) {
        self.engine
            .submit_top_up(top_up(user, amount, TopUpMethod::Bank))
            .await
            .unwrap();
    }

    pub fn router(&self) -> axum::Router {
        server::router(ServerState {
            orchestrator: Arc::clone(&self.engine),
            sandbox: Some(Arc::clone(&self.gateway)),
        })
    }

    /// Router as deployed without the sandbox settle routes
    pub fn production_router(&self) -> axum::Router {
        server::router(ServerState {
            orchestrator: Arc::clone(&self.engine),
            sandbox: None,
        })
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut all = vec![];
        while let Ok(notification) = self.notifications.try_recv() {
            all.push(notification);
        }
        all
    }
}

/// 2024-03-01 12:00 UTC, which is 18:00 in Dhaka
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn purchase(user: &str, amount: Decimal) -> PurchaseRequest {
    PurchaseRequest {
        user: user.to_string(),
        category: Category::Canteen,
        amount,
        description: None,
        pin: PIN.to_string(),
    }
}

pub fn top_up(user: &str, amount: Decimal, method: TopUpMethod) -> TopUpRequest {
    TopUpRequest {
        user: user.to_string(),
        amount,
        method,
    }
}

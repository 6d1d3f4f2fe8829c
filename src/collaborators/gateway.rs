//! Hosted card checkout
//!
//! The engine opens a checkout session for each card top-up and later asks
//! the gateway whether that session was actually paid. A callback claiming
//! success is never trusted on its own.
//!
//! [`SandboxGateway`] keeps sessions in memory and lets a test or the
//! sandbox HTTP route decide how each one ends.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{TransactionId, WalletError};

/// Session returned when a checkout is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub session_ref: String,
    /// Where the user completes the payment
    pub redirect_url: String,
}

/// Payment state of a session as the gateway sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Paid,
    Unpaid,
    Cancelled,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        transaction_id: TransactionId,
    ) -> Result<CheckoutSession, WalletError>;

    async fn session_outcome(&self, session_ref: &str) -> Result<SessionOutcome, WalletError>;
}

/// Checkout session held by the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxSession {
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub outcome: SessionOutcome,
    pub success_url: String,
    pub cancel_url: String,
}

/// In-memory gateway for local runs and tests
#[derive(Debug)]
pub struct SandboxGateway {
    checkout_base_url: String,
    return_base_url: String,
    sessions: DashMap<String, SandboxSession>,
}

impl SandboxGateway {
    pub fn new(checkout_base_url: &str, return_base_url: &str) -> Self {
        SandboxGateway {
            checkout_base_url: checkout_base_url.trim_end_matches('/').to_string(),
            return_base_url: return_base_url.trim_end_matches('/').to_string(),
            sessions: DashMap::new(),
        }
    }

    /// Decide how a session ends
    pub fn settle(&self, session_ref: &str, outcome: SessionOutcome) -> Result<(), WalletError> {
        let mut session = self
            .sessions
            .get_mut(session_ref)
            .ok_or_else(|| WalletError::Gateway(format!("unknown session {session_ref}")))?;
        session.outcome = outcome;
        Ok(())
    }

    pub fn session(&self, session_ref: &str) -> Option<SandboxSession> {
        self.sessions.get(session_ref).map(|entry| entry.value().clone())
    }

    /// Session opened for a transaction, if any
    pub fn session_for(&self, transaction_id: TransactionId) -> Option<String> {
        self.sessions
            .iter()
            .find(|entry| entry.transaction_id == transaction_id)
            .map(|entry| entry.key().clone())
    }

    fn return_url(&self, success: bool, transaction_id: TransactionId) -> String {
        format!(
            "{}/payment/verify?success={success}&transactionId={transaction_id}",
            self.return_base_url
        )
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        SandboxGateway::new("http://localhost:3000/sandbox/checkout", "http://localhost:5173")
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        transaction_id: TransactionId,
    ) -> Result<CheckoutSession, WalletError> {
        let session_ref = format!("cs_sandbox_{}", uuid::Uuid::new_v4().simple());
        let session = SandboxSession {
            transaction_id,
            amount,
            outcome: SessionOutcome::Unpaid,
            success_url: self.return_url(true, transaction_id),
            cancel_url: self.return_url(false, transaction_id),
        };
        self.sessions.insert(session_ref.clone(), session);

        Ok(CheckoutSession {
            redirect_url: format!("{}/{session_ref}", self.checkout_base_url),
            session_ref,
        })
    }

    async fn session_outcome(&self, session_ref: &str) -> Result<SessionOutcome, WalletError> {
        self.sessions
            .get(session_ref)
            .map(|entry| entry.outcome)
            .ok_or_else(|| WalletError::Gateway(format!("unknown session {session_ref}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[tokio::test]
    async fn test_session_starts_unpaid() {
        let gateway = SandboxGateway::new("https://pay.test/checkout/", "https://wallet.test");
        let id = uuid::Uuid::new_v4();

        let checkout = gateway.create_checkout_session(dec!(1000), id).await.unwrap();

        assert!(checkout.session_ref.starts_with("cs_sandbox_"));
        assert_eq!(
            checkout.redirect_url,
            format!("https://pay.test/checkout/{}", checkout.session_ref)
        );
        assert_eq!(
            gateway.session_outcome(&checkout.session_ref).await,
            Ok(SessionOutcome::Unpaid)
        );
        assert_eq!(gateway.session_for(id), Some(checkout.session_ref));
    }

    #[tokio::test]
    async fn test_return_urls_carry_transaction_id() {
        let gateway = SandboxGateway::new("https://pay.test", "https://wallet.test/");
        let id = uuid::Uuid::new_v4();

        let checkout = gateway.create_checkout_session(dec!(150), id).await.unwrap();
        let session = gateway.session(&checkout.session_ref).unwrap();

        assert_eq!(
            session.success_url,
            format!("https://wallet.test/payment/verify?success=true&transactionId={id}")
        );
        assert_eq!(
            session.cancel_url,
            format!("https://wallet.test/payment/verify?success=false&transactionId={id}")
        );
    }

    #[tokio::test]
    async fn test_settle_changes_outcome() {
        let gateway = SandboxGateway::default();
        let checkout = gateway
            .create_checkout_session(dec!(500), uuid::Uuid::new_v4())
            .await
            .unwrap();

        gateway.settle(&checkout.session_ref, SessionOutcome::Paid).unwrap();

        assert_eq!(
            gateway.session_outcome(&checkout.session_ref).await,
            Ok(SessionOutcome::Paid)
        );
    }

    #[tokio::test]
    async fn test_unknown_session_is_a_gateway_error() {
        let gateway = SandboxGateway::default();

        assert!(matches!(
            gateway.session_outcome("cs_missing").await,
            Err(WalletError::Gateway(_))
        ));
        assert!(gateway.settle("cs_missing", SessionOutcome::Paid).is_err());
    }
}

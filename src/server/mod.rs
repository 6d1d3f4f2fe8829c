//! HTTP surface
//!
//! Thin axum layer over [`TransactionOrchestrator`]. The caller is
//! identified by the `x-user-id` header, set by the gateway in front of this
//! service once it has authenticated the session.

mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::collaborators::SandboxGateway;
use crate::core::TransactionOrchestrator;
use crate::types::WalletError;

pub use handlers::USER_HEADER;

#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    /// Present when checkout runs against the in-memory sandbox
    pub sandbox: Option<Arc<SandboxGateway>>,
}

#[derive(Debug)]
pub enum ServerError {
    Wallet(WalletError),
    Unauthenticated,
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance: Option<Decimal>,
}

fn status_for_wallet_error(err: &WalletError) -> StatusCode {
    match err {
        WalletError::InvalidAmount { .. }
        | WalletError::InvalidCategory(_)
        | WalletError::MethodUnavailable(_)
        | WalletError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        WalletError::InvalidCredential => StatusCode::UNAUTHORIZED,
        WalletError::TransactionNotFound(_) | WalletError::WalletNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        WalletError::WalletExists(_) | WalletError::NotReconcilable(_) => StatusCode::CONFLICT,
        WalletError::Gateway(_) => StatusCode::BAD_GATEWAY,
        WalletError::ArithmeticOverflow { .. }
        | WalletError::Storage(_)
        | WalletError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error, balance) = match self {
            ServerError::Wallet(err) => {
                let status = status_for_wallet_error(&err);
                let balance = match &err {
                    WalletError::InsufficientBalance { balance, .. } => Some(*balance),
                    _ => None,
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("request failed: {err}");
                    "internal server error".to_string()
                } else {
                    err.to_string()
                };
                (status, message, balance)
            }
            ServerError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                format!("missing {USER_HEADER} header"),
                None,
            ),
            ServerError::BadRequest(err) => (StatusCode::BAD_REQUEST, err, None),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error,
                balance,
            }),
        )
            .into_response()
    }
}

impl From<WalletError> for ServerError {
    fn from(value: WalletError) -> Self {
        Self::Wallet(value)
    }
}

pub fn router(state: ServerState) -> Router {
    let mut router = Router::new()
        .route("/payment", post(handlers::submit_purchase))
        .route("/wallet", post(handlers::open_wallet))
        .route("/wallet/topup", post(handlers::submit_top_up))
        .route("/wallet/verify-payment", post(handlers::verify_payment))
        .route("/wallet/balance", get(handlers::balance))
        .route("/transactions", get(handlers::history))
        .route("/achievements", get(handlers::achievements));

    if state.sandbox.is_some() {
        router = router.route(
            "/sandbox/checkout/{session}",
            get(handlers::sandbox_session).post(handlers::sandbox_settle),
        );
    }

    router.with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn run_with_listener<F>(
    state: ServerState,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::dec;

    #[rstest]
    #[case::amount(WalletError::invalid_amount(dec!(0), "zero"), StatusCode::BAD_REQUEST)]
    #[case::category(WalletError::InvalidCategory("x".into()), StatusCode::BAD_REQUEST)]
    #[case::method(WalletError::MethodUnavailable("mobile".into()), StatusCode::BAD_REQUEST)]
    #[case::pin(WalletError::InvalidCredential, StatusCode::UNAUTHORIZED)]
    #[case::wallet(WalletError::wallet_not_found("a"), StatusCode::NOT_FOUND)]
    #[case::exists(WalletError::WalletExists("a".into()), StatusCode::CONFLICT)]
    #[case::gateway(WalletError::Gateway("down".into()), StatusCode::BAD_GATEWAY)]
    #[case::storage(WalletError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_wallet_error_status(#[case] err: WalletError, #[case] expected: StatusCode) {
        let res = ServerError::from(err).into_response();
        assert_eq!(res.status(), expected);
    }

    #[test]
    fn test_unauthenticated_maps_to_401() {
        let res = ServerError::Unauthenticated.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_bad_request_maps_to_400() {
        let res = ServerError::BadRequest("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

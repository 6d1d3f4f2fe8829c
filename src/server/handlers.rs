//! Request handlers and their payloads.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{ServerError, ServerState};
use crate::collaborators::{SandboxSession, SessionOutcome};
use crate::core::{PurchaseRequest, TopUpReceipt, TopUpRequest};
use crate::types::{
    Achievement, Category, GatewayReport, TopUpMethod, Transaction, TransactionId,
    TransactionStatus, UserId, UserRank, WalletError,
};

pub const USER_HEADER: &str = "x-user-id";

/// Caller identity taken from [`USER_HEADER`]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CurrentUser(value.to_string()))
            .ok_or(ServerError::Unauthenticated)
    }
}

/// JSON body; a malformed or incomplete one is a 400 like any other bad input
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ApiJson(value))
            .map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentPayload {
    pub category: Option<String>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub transaction_id: TransactionId,
    pub balance: Decimal,
    pub transaction: Transaction,
}

pub async fn submit_purchase(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<PaymentPayload>,
) -> Result<Json<PaymentResponse>, ServerError> {
    let category = Category::parse_required(payload.category.as_deref())?;
    let receipt = state
        .orchestrator
        .submit_purchase(PurchaseRequest {
            user,
            category,
            amount: payload.amount,
            description: payload.description,
            pin: payload.pin,
        })
        .await?;

    Ok(Json(PaymentResponse {
        success: true,
        transaction_id: receipt.transaction.id,
        balance: receipt.balance,
        transaction: receipt.transaction,
    }))
}

#[derive(Debug, Serialize)]
pub struct WalletView {
    pub user: UserId,
    pub balance: Decimal,
    pub last_updated: DateTime<Utc>,
}

pub async fn open_wallet(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
) -> Result<(StatusCode, Json<WalletView>), ServerError> {
    let wallet = state.orchestrator.register_user(&user)?;

    Ok((
        StatusCode::CREATED,
        Json(WalletView {
            user: wallet.user,
            balance: wallet.balance,
            last_updated: wallet.last_updated,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TopUpPayload {
    pub amount: Decimal,
    pub method: String,
}

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub success: bool,
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub async fn submit_top_up(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<TopUpPayload>,
) -> Result<Json<TopUpResponse>, ServerError> {
    let method: TopUpMethod = payload.method.parse()?;
    let receipt = state
        .orchestrator
        .submit_top_up(TopUpRequest {
            user,
            amount: payload.amount,
            method,
        })
        .await?;

    let response = match receipt {
        TopUpReceipt::Credited {
            transaction,
            balance,
        } => TopUpResponse {
            success: true,
            transaction_id: transaction.id,
            status: transaction.status,
            balance: Some(balance),
            redirect_url: None,
            session_id: None,
        },
        TopUpReceipt::AwaitingGateway {
            transaction,
            checkout,
        } => TopUpResponse {
            success: true,
            transaction_id: transaction.id,
            status: transaction.status,
            balance: None,
            redirect_url: Some(checkout.redirect_url),
            session_id: Some(checkout.session_ref),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPayload {
    #[serde(alias = "transactionId")]
    pub transaction_id: String,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub status: TransactionStatus,
    pub balance: Decimal,
    /// The transaction had already been settled by an earlier call
    pub replayed: bool,
    pub transaction: Transaction,
}

pub async fn verify_payment(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<VerifyPayload>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let id: TransactionId = payload
        .transaction_id
        .trim()
        .parse()
        .map_err(|_| ServerError::BadRequest("invalid transaction id".to_string()))?;

    // someone else's transaction looks exactly like a missing one
    let existing = state.orchestrator.transaction(id)?;
    if existing.user != user {
        return Err(WalletError::TransactionNotFound(id).into());
    }

    let outcome = state
        .orchestrator
        .reconcile_gateway_callback(id, GatewayReport::from(payload.success))
        .await?;

    Ok(Json(VerifyResponse {
        success: outcome.transaction.status == TransactionStatus::Completed,
        status: outcome.transaction.status,
        balance: outcome.balance,
        replayed: outcome.replayed,
        transaction: outcome.transaction,
    }))
}

pub async fn balance(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state.orchestrator.balance(&user)?;

    Ok(Json(WalletView {
        user: wallet.user,
        balance: wallet.balance,
        last_updated: wallet.last_updated,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub transactions: Vec<Transaction>,
}

pub async fn history(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let transactions = state.orchestrator.history(&user, query.limit)?;
    Ok(Json(HistoryResponse { transactions }))
}

#[derive(Debug, Serialize)]
pub struct AchievementsResponse {
    pub achievements: Vec<Achievement>,
    pub rank: UserRank,
}

pub async fn achievements(
    CurrentUser(user): CurrentUser,
    State(state): State<ServerState>,
) -> Result<Json<AchievementsResponse>, ServerError> {
    let progression = state.orchestrator.achievements(&user)?;

    Ok(Json(AchievementsResponse {
        achievements: progression.achievements,
        rank: progression.rank,
    }))
}

fn sandbox(state: &ServerState) -> Result<&crate::collaborators::SandboxGateway, ServerError> {
    state
        .sandbox
        .as_deref()
        .ok_or_else(|| ServerError::BadRequest("sandbox checkout is disabled".to_string()))
}

pub async fn sandbox_session(
    State(state): State<ServerState>,
    Path(session): Path<String>,
) -> Result<Json<SandboxSession>, ServerError> {
    sandbox(&state)?
        .session(&session)
        .map(Json)
        .ok_or_else(|| WalletError::Gateway(format!("unknown session {session}")).into())
}

#[derive(Debug, Deserialize)]
pub struct SettlePayload {
    pub outcome: SessionOutcome,
}

pub async fn sandbox_settle(
    State(state): State<ServerState>,
    Path(session): Path<String>,
    ApiJson(payload): ApiJson<SettlePayload>,
) -> Result<Json<SandboxSession>, ServerError> {
    let gateway = sandbox(&state)?;
    gateway.settle(&session, payload.outcome)?;
    tracing::info!(%session, outcome = ?payload.outcome, "sandbox session settled");

    gateway
        .session(&session)
        .map(Json)
        .ok_or_else(|| WalletError::Gateway(format!("unknown session {session}")).into())
}

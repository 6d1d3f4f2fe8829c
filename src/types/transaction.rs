//! Transaction-related types
//!
//! A [`Transaction`] is created `pending` before any balance effect is
//! attempted and moves to exactly one terminal status. The shape of a
//! transaction is encoded in [`TransactionKind`]: a purchase always carries a
//! category, a deposit never does.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::WalletError;
use super::wallet::UserId;

/// Transaction identifier, generated at creation and never reused
pub type TransactionId = Uuid;

/// Number of fractional digits a monetary amount may carry
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Merchant category a purchase is paid to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Canteen,
    Library,
    Lab,
    Club,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Canteen,
        Category::Library,
        Category::Lab,
        Category::Club,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Canteen => "canteen",
            Category::Library => "library",
            Category::Lab => "lab",
            Category::Club => "club",
            Category::Other => "other",
        }
    }

    /// Parse a category that must be present
    ///
    /// Used at the request boundary, where the category arrives as loose text.
    pub fn parse_required(raw: Option<&str>) -> Result<Category, WalletError> {
        match raw {
            Some(raw) => raw.parse(),
            None => Err(WalletError::InvalidCategory(String::new())),
        }
    }
}

impl FromStr for Category {
    type Err = WalletError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| WalletError::InvalidCategory(raw.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a top-up is funded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopUpMethod {
    /// Trusted transfer, credited immediately
    Bank,
    /// Hosted card checkout, credited only after reconciliation
    Card,
    /// Mobile banking, not offered
    Mobile,
}

impl TopUpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopUpMethod::Bank => "bank",
            TopUpMethod::Card => "card",
            TopUpMethod::Mobile => "mobile",
        }
    }
}

impl FromStr for TopUpMethod {
    type Err = WalletError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bank" => Ok(TopUpMethod::Bank),
            "card" => Ok(TopUpMethod::Card),
            "mobile" => Ok(TopUpMethod::Mobile),
            _ => Err(WalletError::MethodUnavailable(raw.to_string())),
        }
    }
}

impl fmt::Display for TopUpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transaction does to the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money entering the wallet
    Deposit { method: TopUpMethod },
    /// Money leaving the wallet towards a merchant category
    Purchase { category: Category },
}

/// Lifecycle status of a transaction
///
/// `Pending` is the only non-terminal status. The only legal transitions are
/// `Pending -> Completed` and `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        })
    }
}

/// Outcome reported by a gateway callback
///
/// The report is a claim, not a proof: a reported success is re-verified
/// against the gateway before any credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayReport {
    Success,
    Failure,
}

impl From<bool> for GatewayReport {
    fn from(success: bool) -> Self {
        if success {
            GatewayReport::Success
        } else {
            GatewayReport::Failure
        }
    }
}

/// A single monetary event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user: UserId,
    pub amount: Decimal,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    /// Hosted checkout session, only for card top-ups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_session: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Time of the terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// New pending purchase
    pub fn purchase(
        user: &str,
        category: Category,
        amount: Decimal,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Payment for {category}"));
        Self::pending(user, amount, TransactionKind::Purchase { category }, description, now)
    }

    /// New pending deposit
    pub fn deposit(user: &str, method: TopUpMethod, amount: Decimal, now: DateTime<Utc>) -> Self {
        let description = format!("Wallet top up via {method}");
        Self::pending(user, amount, TransactionKind::Deposit { method }, description, now)
    }

    fn pending(
        user: &str,
        amount: Decimal,
        kind: TransactionKind,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            user: user.to_string(),
            amount,
            kind,
            status: TransactionStatus::Pending,
            gateway_session: None,
            description,
            created_at: now,
            settled_at: None,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self.kind {
            TransactionKind::Purchase { category } => Some(category),
            TransactionKind::Deposit { .. } => None,
        }
    }

    pub fn is_purchase(&self) -> bool {
        matches!(self.kind, TransactionKind::Purchase { .. })
    }

    pub fn is_completed_purchase(&self) -> bool {
        self.is_purchase() && self.status == TransactionStatus::Completed
    }

    /// Card top-ups are the only transactions settled by a gateway callback
    pub fn awaits_gateway(&self) -> bool {
        matches!(
            self.kind,
            TransactionKind::Deposit {
                method: TopUpMethod::Card
            }
        )
    }
}

/// Reject zero, negative and over-precise amounts
pub fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::invalid_amount(amount, "amount must be greater than 0"));
    }
    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(WalletError::invalid_amount(
            amount,
            "amount has more than 2 decimal places",
        ));
    }
    Ok(())
}

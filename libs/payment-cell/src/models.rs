// libs/payment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Card,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Wallet => write!(f, "wallet"),
            PaymentMethod::Card => write!(f, "card"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Uuid,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionKind {
    Deposit,
    Withdraw,
}

/// One entry in the append-only wallet ledger. Every balance mutation
/// writes exactly one of these, carrying the post-mutation balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: WalletTransactionKind,
    pub amount_cents: i64,
    pub description: String,
    pub balance_after_cents: i64,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub balance_cents: i64,
    pub recent_transactions: Vec<WalletTransaction>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("Insufficient funds in wallet")]
    InsufficientFunds,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("User not found")]
    UserNotFound,

    #[error("Wallet is being updated concurrently, try again")]
    ConcurrentUpdate,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

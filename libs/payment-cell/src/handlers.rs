// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{DepositRequest, PaymentError, WalletSummary, WithdrawRequest};
use crate::services::payment::PaymentService;
use crate::services::wallet::WalletService;

const WALLET_SUMMARY_ENTRIES: i32 = 10;

pub fn map_payment_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::InsufficientFunds => {
            AppError::BadRequest("Insufficient funds in wallet".to_string())
        }
        PaymentError::InvalidAmount => {
            AppError::BadRequest("Amount must be greater than zero".to_string())
        }
        PaymentError::UserNotFound => AppError::NotFound("User not found".to_string()),
        PaymentError::ConcurrentUpdate => {
            AppError::Conflict("Wallet is being updated concurrently, try again".to_string())
        }
        PaymentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn caller_id(user: &AuthUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

#[axum::debug_handler]
pub async fn wallet_detail(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = WalletService::new(&state);

    let balance = service.get_balance(user_id).await.map_err(map_payment_error)?;
    let recent = service.list_transactions(user_id, Some(WALLET_SUMMARY_ENTRIES)).await
        .map_err(map_payment_error)?;

    let summary = WalletSummary {
        balance_cents: balance,
        recent_transactions: recent,
    };

    Ok(Json(json!({
        "success": true,
        "wallet": summary,
    })))
}

#[axum::debug_handler]
pub async fn deposit_funds(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = WalletService::new(&state);

    let amount = request.amount_cents;
    let entry = service.deposit(
        user_id,
        amount,
        format!("Deposit of {} cents", amount),
        None,
    ).await.map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "transaction": entry,
        "message": "Funds deposited"
    })))
}

#[axum::debug_handler]
pub async fn withdraw_funds(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = WalletService::new(&state);

    let amount = request.amount_cents;
    let entry = service.withdraw(
        user_id,
        amount,
        format!("Withdrawal of {} cents", amount),
        None,
    ).await.map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "transaction": entry,
        "message": "Funds withdrawn"
    })))
}

#[axum::debug_handler]
pub async fn list_transactions(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = WalletService::new(&state);

    let transactions = service.list_transactions(user_id, None).await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "transactions": transactions,
    })))
}

#[axum::debug_handler]
pub async fn payment_history(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = PaymentService::new(&state);

    let payments = service.list_for_patient(user_id).await.map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "payments": payments,
    })))
}

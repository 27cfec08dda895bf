// libs/account-cell/src/handlers.rs
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

use crate::models::{
    AccountError, LoginRequest, OtpPurpose, PasswordResetConfirmRequest,
    PasswordResetRequest, RegisterRequest, ResendOtpRequest, UpdateProfileRequest,
    VerifyOtpRequest,
};
use crate::services::account::AccountService;

fn map_account_error(e: AccountError) -> AppError {
    match e {
        AccountError::EmailTaken => {
            AppError::Conflict("Email address already registered".to_string())
        }
        AccountError::UserNotFound => {
            AppError::NotFound("User not found".to_string())
        }
        AccountError::InvalidCredentials => {
            AppError::Auth("Invalid email or password".to_string())
        }
        AccountError::InvalidOtp => {
            AppError::BadRequest("Invalid OTP code".to_string())
        }
        AccountError::OtpExpired => {
            AppError::BadRequest("OTP has expired".to_string())
        }
        AccountError::ValidationError(msg) => AppError::ValidationError(msg),
        AccountError::TokenError(msg) => AppError::Internal(msg),
        AccountError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn caller_id(user: &AuthUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    let profile = service.register(request).await.map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "message": "Account created. Check your email for a verification code."
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    let response = service.login(request).await.map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "token": response.token,
        "user": response.user,
    })))
}

#[axum::debug_handler]
pub async fn verify_otp(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    let profile = service.verify_email(&request.email, &request.code).await
        .map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "message": "Email verified successfully"
    })))
}

#[axum::debug_handler]
pub async fn resend_otp(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<ResendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    service.resend_otp(&request.email, OtpPurpose::EmailVerification).await
        .map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "A new verification code has been sent"
    })))
}

#[axum::debug_handler]
pub async fn request_password_reset(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    service.request_password_reset(&request.email).await
        .map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "If the address is registered, a reset code has been sent"
    })))
}

#[axum::debug_handler]
pub async fn confirm_password_reset(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);

    service.confirm_password_reset(&request.email, &request.code, &request.new_password)
        .await
        .map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Password updated. You can now log in with your new password."
    })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = AccountService::new(&state);

    let profile = service.get_profile(user_id).await.map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "user": profile,
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = AccountService::new(&state);

    let profile = service.update_profile(user_id, request).await
        .map_err(map_account_error)?;

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "message": "Profile updated"
    })))
}

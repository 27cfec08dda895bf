// libs/account-cell/src/services/account.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_utils::jwt::sign_token;

use crate::models::{
    AccountError, LoginRequest, LoginResponse, OtpPurpose, RegisterRequest,
    UpdateProfileRequest, UserAccount, UserProfile, UserRole,
};
use crate::services::email::AccountEmailService;
use crate::services::otp::OtpService;
use crate::services::password::PasswordService;

const TOKEN_TTL_HOURS: i64 = 24;
const MAX_NAME_LENGTH: usize = 150;

pub struct AccountService {
    postgrest: Arc<PostgrestClient>,
    otp_service: OtpService,
    email_service: AccountEmailService,
    jwt_secret: String,
    email_pattern: Regex,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        let postgrest = Arc::new(PostgrestClient::new(config));
        let otp_service = OtpService::with_client(
            Arc::clone(&postgrest),
            config.otp_expiry_minutes,
        );

        Self {
            postgrest,
            otp_service,
            email_service: AccountEmailService::new(config),
            jwt_secret: config.jwt_secret.clone(),
            email_pattern: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
                .expect("static email pattern"),
        }
    }

    /// Patient self-registration. New accounts start unverified with an
    /// empty wallet; a verification OTP is emailed right away.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile, AccountError> {
        info!("Registering new account for {}", request.email);

        self.validate_registration(&request)?;

        if self.find_user_by_email(&request.email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AccountError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let user_data = json!({
            "id": Uuid::new_v4(),
            "email": request.email.to_lowercase(),
            "password_hash": password_hash,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone_number": request.phone_number,
            "role": UserRole::Patient,
            "is_verified": false,
            "wallet_balance_cents": 0,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<UserAccount> = self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/users",
            None,
            Some(user_data),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        let user = result.into_iter().next()
            .ok_or_else(|| AccountError::DatabaseError("Failed to create user".to_string()))?;

        let otp = self.otp_service.generate(user.id, OtpPurpose::EmailVerification).await?;
        self.email_service.send_verification_otp(&user, &otp).await;

        info!("Account {} registered", user.id);
        Ok(user.to_profile())
    }

    /// Password login. Unknown email and bad password produce the same
    /// error so the endpoint does not reveal which emails exist.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AccountError> {
        debug!("Login attempt for {}", request.email);

        let user = self.find_user_by_email(&request.email).await?
            .ok_or(AccountError::InvalidCredentials)?;

        let valid = PasswordService::verify_password(&request.password, &user.password_hash)
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?;
        if !valid {
            warn!("Failed login attempt for {}", request.email);
            return Err(AccountError::InvalidCredentials);
        }

        let token = sign_token(
            &user.id.to_string(),
            Some(&user.email),
            &user.role.to_string(),
            &self.jwt_secret,
            Duration::hours(TOKEN_TTL_HOURS),
        ).map_err(AccountError::TokenError)?;

        info!("User {} logged in", user.id);
        Ok(LoginResponse {
            token,
            user: user.to_profile(),
        })
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> Result<UserProfile, AccountError> {
        let user = self.find_user_by_email(email).await?
            .ok_or(AccountError::InvalidOtp)?;

        self.otp_service.verify(user.id, code, OtpPurpose::EmailVerification).await?;

        let updated = self.patch_user(user.id, json!({
            "is_verified": true,
            "updated_at": Utc::now().to_rfc3339(),
        })).await?;

        info!("Email verified for user {}", user.id);
        Ok(updated.to_profile())
    }

    pub async fn resend_otp(&self, email: &str, purpose: OtpPurpose) -> Result<(), AccountError> {
        let user = self.find_user_by_email(email).await?
            .ok_or(AccountError::UserNotFound)?;

        let otp = self.otp_service.generate(user.id, purpose).await?;
        match purpose {
            OtpPurpose::EmailVerification => {
                self.email_service.send_verification_otp(&user, &otp).await
            }
            OtpPurpose::PasswordReset => {
                self.email_service.send_password_reset_otp(&user, &otp).await
            }
        }

        Ok(())
    }

    /// Always succeeds from the caller's point of view so the endpoint
    /// does not leak which emails are registered.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        match self.find_user_by_email(email).await? {
            Some(user) => {
                let otp = self.otp_service.generate(user.id, OtpPurpose::PasswordReset).await?;
                self.email_service.send_password_reset_otp(&user, &otp).await;
            }
            None => {
                debug!("Password reset requested for unknown email");
            }
        }
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let user = self.find_user_by_email(email).await?
            .ok_or(AccountError::InvalidOtp)?;

        PasswordService::validate_password(new_password)?;
        self.otp_service.verify(user.id, code, OtpPurpose::PasswordReset).await?;

        let password_hash = PasswordService::hash_password(new_password)
            .map_err(|e| AccountError::ValidationError(e.to_string()))?;

        self.patch_user(user.id, json!({
            "password_hash": password_hash,
            "updated_at": Utc::now().to_rfc3339(),
        })).await?;

        info!("Password reset for user {}", user.id);
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, AccountError> {
        let user = self.find_user_by_id(user_id).await?
            .ok_or(AccountError::UserNotFound)?;
        Ok(user.to_profile())
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, AccountError> {
        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            self.validate_name(&first_name, "first name")?;
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            self.validate_name(&last_name, "last name")?;
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }

        if update_data.is_empty() {
            return self.get_profile(user_id).await;
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self.patch_user(user_id, Value::Object(update_data)).await?;
        Ok(updated.to_profile())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, AccountError> {
        let path = format!(
            "/rest/v1/users?email=eq.{}&limit=1",
            urlencoding::encode(&email.to_lowercase())
        );

        let result: Vec<UserAccount> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserAccount>, AccountError> {
        let path = format!("/rest/v1/users?id=eq.{}&limit=1", user_id);

        let result: Vec<UserAccount> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    async fn patch_user(&self, user_id: Uuid, body: Value) -> Result<UserAccount, AccountError> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);

        let result: Vec<UserAccount> = self.postgrest.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AccountError::UserNotFound)
    }

    fn validate_registration(&self, request: &RegisterRequest) -> Result<(), AccountError> {
        if !self.email_pattern.is_match(&request.email) {
            return Err(AccountError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }

        self.validate_name(&request.first_name, "first name")?;
        self.validate_name(&request.last_name, "last name")?;
        PasswordService::validate_password(&request.password)?;

        Ok(())
    }

    fn validate_name(&self, value: &str, field: &str) -> Result<(), AccountError> {
        if value.trim().is_empty() {
            return Err(AccountError::ValidationError(format!(
                "The {} cannot be empty", field
            )));
        }
        if value.len() > MAX_NAME_LENGTH {
            return Err(AccountError::ValidationError(format!(
                "The {} must be at most {} characters", field, MAX_NAME_LENGTH
            )));
        }
        Ok(())
    }
}

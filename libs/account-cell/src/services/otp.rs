// libs/account-cell/src/services/otp.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{AccountError, OtpCode, OtpPurpose};

/// One-time codes for email verification and password reset. At most one
/// live code exists per (user, purpose): generating a new code marks all
/// previous unused codes as used.
pub struct OtpService {
    postgrest: Arc<PostgrestClient>,
    expiry_minutes: i64,
}

impl OtpService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            postgrest: Arc::new(PostgrestClient::new(config)),
            expiry_minutes: config.otp_expiry_minutes,
        }
    }

    pub fn with_client(postgrest: Arc<PostgrestClient>, expiry_minutes: i64) -> Self {
        Self { postgrest, expiry_minutes }
    }

    pub async fn generate(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<OtpCode, AccountError> {
        debug!("Generating {} OTP for user {}", purpose, user_id);

        // Supersede outstanding codes for the same purpose
        let supersede_path = format!(
            "/rest/v1/otp_codes?user_id=eq.{}&purpose=eq.{}&is_used=eq.false",
            user_id, purpose
        );
        let _: Value = self.postgrest.request(
            Method::PATCH,
            &supersede_path,
            None,
            Some(json!({ "is_used": true })),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.expiry_minutes);

        let otp_data = json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "code": code,
            "purpose": purpose,
            "is_used": false,
            "expires_at": expires_at.to_rfc3339(),
            "created_at": now.to_rfc3339(),
        });

        let result: Vec<OtpCode> = self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/otp_codes",
            None,
            Some(otp_data),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        let otp = result.into_iter().next()
            .ok_or_else(|| AccountError::DatabaseError("Failed to create OTP".to_string()))?;

        info!("OTP {} created for user {} (expires {})", otp.id, user_id, otp.expires_at);
        Ok(otp)
    }

    /// Consume a code. Codes are single-use: a successful verification
    /// marks the row used before returning.
    pub async fn verify(
        &self,
        user_id: Uuid,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpCode, AccountError> {
        debug!("Verifying {} OTP for user {}", purpose, user_id);

        let path = format!(
            "/rest/v1/otp_codes?user_id=eq.{}&code=eq.{}&purpose=eq.{}&is_used=eq.false&order=created_at.desc&limit=1",
            user_id,
            urlencoding::encode(code),
            purpose
        );

        let result: Vec<OtpCode> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        let otp = result.into_iter().next().ok_or(AccountError::InvalidOtp)?;

        if !otp.is_valid(Utc::now()) {
            return Err(AccountError::OtpExpired);
        }

        let mark_used_path = format!("/rest/v1/otp_codes?id=eq.{}", otp.id);
        let _: Value = self.postgrest.request(
            Method::PATCH,
            &mark_used_path,
            None,
            Some(json!({ "is_used": true })),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        info!("OTP {} consumed for user {}", otp.id, user_id);
        Ok(otp)
    }
}

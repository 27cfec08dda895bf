use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;

use crate::jwt::sign_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub data_api_url: String,
    pub data_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            data_api_url: "http://localhost:54321".to_string(),
            data_api_key: "test-api-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Point the data API at a wiremock server.
    pub fn with_data_api_url(mut self, url: &str) -> Self {
        self.data_api_url = url.to_string();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            data_api_url: self.data_api_url.clone(),
            data_api_key: self.data_api_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            otp_expiry_minutes: 10,
            mail_api_url: String::new(),
            mail_api_token: String::new(),
            mail_from_address: "noreply@medbook.example".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }

    pub fn mint_token(&self, secret: &str) -> String {
        sign_token(&self.id, Some(&self.email), &self.role, secret, Duration::hours(24))
            .expect("test token")
    }

    pub fn mint_expired_token(&self, secret: &str) -> String {
        sign_token(&self.id, Some(&self.email), &self.role, secret, Duration::hours(-1))
            .expect("test token")
    }
}

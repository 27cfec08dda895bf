use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_api_url: String,
    pub data_api_key: String,
    pub jwt_secret: String,
    pub otp_expiry_minutes: i64,
    pub mail_api_url: String,
    pub mail_api_token: String,
    pub mail_from_address: String,
    pub site_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            data_api_url: env::var("DATA_API_URL")
                .unwrap_or_else(|_| {
                    warn!("DATA_API_URL not set, using empty value");
                    String::new()
                }),
            data_api_key: env::var("DATA_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("DATA_API_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            otp_expiry_minutes: env::var("OTP_EXPIRY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("MAIL_API_URL not set, emails will be logged instead of sent");
                    String::new()
                }),
            mail_api_token: env::var("MAIL_API_TOKEN")
                .unwrap_or_else(|_| String::new()),
            mail_from_address: env::var("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@medbook.example".to_string()),
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| {
                    warn!("SITE_URL not set, using default");
                    "http://localhost:3000".to_string()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.data_api_url.is_empty()
            && !self.data_api_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_mailer_configured(&self) -> bool {
        !self.mail_api_url.is_empty() && !self.mail_api_token.is_empty()
    }
}

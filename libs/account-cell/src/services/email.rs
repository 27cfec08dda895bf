// libs/account-cell/src/services/email.rs
use tracing::warn;

use shared_config::AppConfig;
use shared_mailer::{EmailMessage, MailerClient};

use crate::models::{OtpCode, UserAccount};

/// Account-related notification emails. Sending is best-effort: a mail
/// failure is logged and never fails the originating operation.
pub struct AccountEmailService {
    mailer: MailerClient,
    expiry_minutes: i64,
}

impl AccountEmailService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mailer: MailerClient::new(config),
            expiry_minutes: config.otp_expiry_minutes,
        }
    }

    pub async fn send_verification_otp(&self, user: &UserAccount, otp: &OtpCode) {
        let subject = "Verify Your Email Address - Medbook".to_string();
        let text = format!(
            "Hello {},\n\n\
             Welcome to Medbook! Please verify your email address by entering the following code:\n\n\
             Verification Code: {}\n\n\
             This code will expire in {} minutes.\n\n\
             If you didn't create an account with us, please ignore this email.\n\n\
             Best regards,\n\
             The Medbook Team",
            user.first_name, otp.code, self.expiry_minutes
        );

        self.send(user, subject, text).await;
    }

    pub async fn send_password_reset_otp(&self, user: &UserAccount, otp: &OtpCode) {
        let subject = "Password Reset Request - Medbook".to_string();
        let text = format!(
            "Hello {},\n\n\
             You requested to reset your password. Please use the following code to reset your password:\n\n\
             Reset Code: {}\n\n\
             This code will expire in {} minutes.\n\n\
             If you didn't request a password reset, please ignore this email.\n\n\
             Best regards,\n\
             The Medbook Team",
            user.first_name, otp.code, self.expiry_minutes
        );

        self.send(user, subject, text).await;
    }

    async fn send(&self, user: &UserAccount, subject: String, text: String) {
        let message = EmailMessage {
            to: user.email.clone(),
            subject,
            text,
        };

        if let Err(e) = self.mailer.send(message).await {
            warn!("Failed to send account email to {}: {}", user.email, e);
        }
    }
}

use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outbound mail client. Posts to the configured HTTP mail API; when the
/// mail API is not configured the rendered message is logged instead,
/// which is the development email backend.
pub struct MailerClient {
    client: Client,
    api_url: String,
    api_token: String,
    from_address: String,
    configured: bool,
}

impl MailerClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.mail_api_url.clone(),
            api_token: config.mail_api_token.clone(),
            from_address: config.mail_from_address.clone(),
            configured: config.is_mailer_configured(),
        }
    }

    pub async fn send(&self, message: EmailMessage) -> Result<()> {
        if !self.configured {
            info!(
                to = %message.to,
                subject = %message.subject,
                "Mail API not configured, logging email instead:\n{}",
                message.text
            );
            return Ok(());
        }

        debug!("Sending email to {} via {}", message.to, self.api_url);

        let body = serde_json::json!({
            "from": self.from_address,
            "to": message.to,
            "subject": message.subject,
            "text": message.text,
        });

        let response = self.client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            error!("Mail API error ({}): {}", status, response_text);
            anyhow::bail!("Mail API error ({}): {}", status, response_text);
        }

        info!("Email sent to {}", message.to);
        Ok(())
    }
}

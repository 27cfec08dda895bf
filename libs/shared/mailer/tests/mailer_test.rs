// libs/shared/mailer/tests/mailer_test.rs
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_mailer::{EmailMessage, MailerClient};

fn config(mail_api_url: &str, mail_api_token: &str) -> AppConfig {
    AppConfig {
        data_api_url: "http://localhost:54321".to_string(),
        data_api_key: "test-api-key".to_string(),
        jwt_secret: "test-secret".to_string(),
        otp_expiry_minutes: 10,
        mail_api_url: mail_api_url.to_string(),
        mail_api_token: mail_api_token.to_string(),
        mail_from_address: "noreply@medbook.example".to_string(),
        site_url: "http://localhost:3000".to_string(),
    }
}

fn message() -> EmailMessage {
    EmailMessage {
        to: "patient@example.com".to_string(),
        subject: "Test".to_string(),
        text: "Hello".to_string(),
    }
}

#[tokio::test]
async fn sends_through_the_mail_api_when_configured() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer mail-token"))
        .and(body_partial_json(json!({
            "from": "noreply@medbook.example",
            "to": "patient@example.com",
            "subject": "Test",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mailer = MailerClient::new(&config(&mock_server.uri(), "mail-token"));
    mailer.send(message()).await.unwrap();
}

#[tokio::test]
async fn falls_back_to_logging_when_not_configured() {
    // No mail API configured: the message is logged, not an error
    let mailer = MailerClient::new(&config("", ""));
    mailer.send(message()).await.unwrap();
}

#[tokio::test]
async fn surfaces_mail_api_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let mailer = MailerClient::new(&config(&mock_server.uri(), "mail-token"));
    assert!(mailer.send(message()).await.is_err());
}

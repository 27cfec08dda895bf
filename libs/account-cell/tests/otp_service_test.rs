// libs/account-cell/tests/otp_service_test.rs
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use account_cell::models::{AccountError, OtpPurpose};
use account_cell::services::otp::OtpService;
use shared_database::PostgrestClient;
use shared_utils::test_utils::TestConfig;

fn otp_row(user_id: Uuid, code: &str, purpose: &str, is_used: bool, expires_in_minutes: i64) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": user_id,
        "code": code,
        "purpose": purpose,
        "is_used": is_used,
        "expires_at": (Utc::now() + Duration::minutes(expires_in_minutes)).to_rfc3339(),
        "created_at": Utc::now().to_rfc3339(),
    })
}

fn service_for(mock_server: &MockServer) -> OtpService {
    let config = TestConfig::default()
        .with_data_api_url(&mock_server.uri())
        .to_app_config();
    OtpService::with_client(Arc::new(PostgrestClient::new(&config)), 10)
}

#[tokio::test]
async fn generate_supersedes_previous_codes_and_creates_a_new_one() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    // Older unused codes for the same purpose get marked used
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/otp_codes"))
        .and(query_param("is_used", "eq.false"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/otp_codes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            otp_row(user_id, "123456", "email_verification", false, 10)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let otp = service.generate(user_id, OtpPurpose::EmailVerification).await.unwrap();

    assert_eq!(otp.user_id, user_id);
    assert_eq!(otp.code.len(), 6);
    assert!(otp.code.chars().all(|c| c.is_ascii_digit()));
    assert!(!otp.is_used);
    assert!(otp.is_valid(Utc::now()));
}

#[tokio::test]
async fn verify_consumes_the_code() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/otp_codes"))
        .and(query_param("code", "eq.123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            otp_row(user_id, "123456", "email_verification", false, 10)
        ])))
        .mount(&mock_server)
        .await;

    // Single-use: verification flips is_used
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/otp_codes"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let otp = service.verify(user_id, "123456", OtpPurpose::EmailVerification).await.unwrap();
    assert_eq!(otp.code, "123456");
}

#[tokio::test]
async fn verify_rejects_unknown_codes() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/otp_codes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.verify(user_id, "000000", OtpPurpose::EmailVerification).await;

    assert_matches!(result, Err(AccountError::InvalidOtp));
}

#[tokio::test]
async fn verify_rejects_expired_codes() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/otp_codes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            otp_row(user_id, "123456", "email_verification", false, -1)
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.verify(user_id, "123456", OtpPurpose::EmailVerification).await;

    assert_matches!(result, Err(AccountError::OtpExpired));
}

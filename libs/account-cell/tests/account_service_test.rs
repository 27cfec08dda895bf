// libs/account-cell/tests/account_service_test.rs
use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use account_cell::models::{
    AccountError, LoginRequest, RegisterRequest, UserRole,
};
use account_cell::services::account::AccountService;
use account_cell::services::password::PasswordService;
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::TestConfig;

fn user_row(id: Uuid, email: &str, password_hash: &str) -> serde_json::Value {
    json!({
        "id": id,
        "email": email,
        "password_hash": password_hash,
        "first_name": "Test",
        "last_name": "Patient",
        "phone_number": null,
        "role": "patient",
        "is_verified": true,
        "wallet_balance_cents": 0,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: "clinic-visit-42".to_string(),
        first_name: "Test".to_string(),
        last_name: "Patient".to_string(),
        phone_number: None,
    }
}

async fn service_for(mock_server: &MockServer) -> (AccountService, String) {
    let test_config = TestConfig::default().with_data_api_url(&mock_server.uri());
    let secret = test_config.jwt_secret.clone();
    (AccountService::new(&test_config.to_app_config()), secret)
}

#[tokio::test]
async fn register_creates_an_unverified_patient_and_sends_an_otp() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    // No existing account with this email
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let mut created = user_row(user_id, "new@example.com", "hash");
    created["is_verified"] = json!(false);
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // OTP generation: supersede then insert
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/otp_codes"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/otp_codes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "code": "123456",
            "purpose": "email_verification",
            "is_used": false,
            "expires_at": Utc::now().to_rfc3339(),
            "created_at": Utc::now().to_rfc3339(),
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (service, _) = service_for(&mock_server).await;
    let profile = service.register(register_request("new@example.com")).await.unwrap();

    assert_eq!(profile.email, "new@example.com");
    assert_eq!(profile.role, UserRole::Patient);
    assert!(!profile.is_verified);
    assert_eq!(profile.wallet_balance_cents, 0);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_row(Uuid::new_v4(), "taken@example.com", "hash")
        ])))
        .mount(&mock_server)
        .await;

    let (service, _) = service_for(&mock_server).await;
    let result = service.register(register_request("taken@example.com")).await;

    assert_matches!(result, Err(AccountError::EmailTaken));
}

#[tokio::test]
async fn register_rejects_invalid_email_without_touching_storage() {
    let mock_server = MockServer::start().await;

    let (service, _) = service_for(&mock_server).await;
    let result = service.register(register_request("not-an-email")).await;

    assert_matches!(result, Err(AccountError::ValidationError(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn login_returns_a_token_that_validates() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let hash = PasswordService::hash_password("clinic-visit-42").unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.login@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_row(user_id, "login@example.com", &hash)
        ])))
        .mount(&mock_server)
        .await;

    let (service, secret) = service_for(&mock_server).await;
    let response = service.login(LoginRequest {
        email: "login@example.com".to_string(),
        password: "clinic-visit-42".to_string(),
    }).await.unwrap();

    let auth_user = validate_token(&response.token, &secret).unwrap();
    assert_eq!(auth_user.id, user_id.to_string());
    assert_eq!(auth_user.role.as_deref(), Some("patient"));
    assert_eq!(response.user.email, "login@example.com");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let mock_server = MockServer::start().await;
    let hash = PasswordService::hash_password("clinic-visit-42").unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_row(Uuid::new_v4(), "login@example.com", &hash)
        ])))
        .mount(&mock_server)
        .await;

    let (service, _) = service_for(&mock_server).await;
    let result = service.login(LoginRequest {
        email: "login@example.com".to_string(),
        password: "wrong-password-9".to_string(),
    }).await;

    assert_matches!(result, Err(AccountError::InvalidCredentials));
}

#[tokio::test]
async fn login_rejects_unknown_email_with_the_same_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (service, _) = service_for(&mock_server).await;
    let result = service.login(LoginRequest {
        email: "ghost@example.com".to_string(),
        password: "whatever-123".to_string(),
    }).await;

    assert_matches!(result, Err(AccountError::InvalidCredentials));
}

// libs/payment-cell/tests/wallet_service_test.rs
use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::models::{PaymentError, WalletTransactionKind};
use payment_cell::services::wallet::WalletService;
use shared_utils::test_utils::TestConfig;

fn ledger_row(user_id: Uuid, kind: &str, amount: i64, balance_after: i64) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": user_id,
        "kind": kind,
        "amount_cents": amount,
        "description": "test",
        "balance_after_cents": balance_after,
        "appointment_id": null,
        "created_at": Utc::now().to_rfc3339(),
    })
}

fn service_for(mock_server: &MockServer) -> WalletService {
    let config = TestConfig::default()
        .with_data_api_url(&mock_server.uri())
        .to_app_config();
    WalletService::new(&config)
}

#[tokio::test]
async fn deposit_updates_balance_and_appends_a_ledger_entry() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "wallet_balance_cents": 1_000 }
        ])))
        .mount(&mock_server)
        .await;

    // CAS succeeds: the guarded update returns the row
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("wallet_balance_cents", "eq.1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "wallet_balance_cents": 3_500 }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/wallet_transactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            ledger_row(user_id, "deposit", 2_500, 3_500)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let entry = service.deposit(user_id, 2_500, "test".to_string(), None).await.unwrap();

    assert_eq!(entry.kind, WalletTransactionKind::Deposit);
    assert_eq!(entry.amount_cents, 2_500);
    assert_eq!(entry.balance_after_cents, 3_500);
}

#[tokio::test]
async fn withdraw_rejects_amounts_above_the_balance() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "wallet_balance_cents": 100 }
        ])))
        .mount(&mock_server)
        .await;

    // The balance is never touched
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.withdraw(user_id, 500, "test".to_string(), None).await;

    assert_matches!(result, Err(PaymentError::InsufficientFunds));
}

#[tokio::test]
async fn zero_and_negative_amounts_are_rejected() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let user_id = Uuid::new_v4();

    assert_matches!(
        service.deposit(user_id, 0, "test".to_string(), None).await,
        Err(PaymentError::InvalidAmount)
    );
    assert_matches!(
        service.withdraw(user_id, -50, "test".to_string(), None).await,
        Err(PaymentError::InvalidAmount)
    );
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn lost_cas_races_are_retried_then_reported() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "wallet_balance_cents": 1_000 }
        ])))
        .mount(&mock_server)
        .await;

    // Empty representation = some other writer changed the balance first
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(3)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.deposit(user_id, 500, "test".to_string(), None).await;

    assert_matches!(result, Err(PaymentError::ConcurrentUpdate));
}

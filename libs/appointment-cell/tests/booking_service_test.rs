// libs/appointment-cell/tests/booking_service_test.rs
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, AppointmentStatus, ReserveSlotRequest};
use appointment_cell::services::booking::AppointmentBookingService;
use shared_utils::test_utils::{TestConfig, TestUser};

struct BookingFixture {
    patient: TestUser,
    doctor_id: Uuid,
    slot_id: Uuid,
    slot_date: String,
}

fn fixture() -> BookingFixture {
    BookingFixture {
        patient: TestUser::patient("patient@example.com"),
        doctor_id: Uuid::new_v4(),
        slot_id: Uuid::new_v4(),
        slot_date: (Utc::now() + Duration::days(7)).date_naive().to_string(),
    }
}

fn slot_row(f: &BookingFixture, is_available: bool) -> serde_json::Value {
    json!({
        "id": f.slot_id,
        "doctor_id": f.doctor_id,
        "slot_date": f.slot_date,
        "start_time": "09:00:00",
        "end_time": "09:15:00",
        "is_available": is_available,
        "created_by": null,
        "created_at": Utc::now().to_rfc3339(),
    })
}

fn doctor_row(f: &BookingFixture) -> serde_json::Value {
    json!({
        "id": f.doctor_id,
        "user_id": Uuid::new_v4(),
        "first_name": "Grace",
        "last_name": "Okafor",
        "email": "doctor@example.com",
        "specialty_id": Uuid::new_v4(),
        "specialty_name": "Cardiology",
        "license_number": "MD123456",
        "experience_years": 10,
        "bio": "Experienced cardiologist",
        "consultation_fee_cents": 15_000,
        "is_active": true,
        "average_rating": 4.5,
        "total_reviews": 12,
        "created_by": Uuid::new_v4(),
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

fn patient_row(f: &BookingFixture) -> serde_json::Value {
    json!({
        "id": f.patient.id,
        "email": f.patient.email,
        "password_hash": "hash",
        "first_name": "Test",
        "last_name": "Patient",
        "phone_number": null,
        "role": "patient",
        "is_verified": true,
        "wallet_balance_cents": 50_000,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

fn appointment_row(f: &BookingFixture, status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": f.patient.id,
        "doctor_id": f.doctor_id,
        "time_slot_id": f.slot_id,
        "status": status,
        "fee_cents": 15_000,
        "notes": null,
        "slot_date": f.slot_date,
        "start_time": "09:00:00",
        "end_time": "09:15:00",
        "doctor_name": "Grace Okafor",
        "specialty_name": "Cardiology",
        "patient_name": "Test Patient",
        "confirmation_sent": false,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

async fn mount_lookup_mocks(mock_server: &MockServer, f: &BookingFixture) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(f, true)])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(f)])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(f)])))
        .mount(mock_server)
        .await;

    // Lock sweep, acquisition and release
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(204))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(mock_server)
        .await;
}

fn service_for(mock_server: &MockServer) -> AppointmentBookingService {
    let config = TestConfig::default()
        .with_data_api_url(&mock_server.uri())
        .to_app_config();
    AppointmentBookingService::new(&config)
}

#[tokio::test]
async fn reserve_creates_a_pending_appointment_priced_from_the_doctor() {
    let mock_server = MockServer::start().await;
    let f = fixture();
    mount_lookup_mocks(&mock_server, &f).await;

    // CAS claim wins: the guarded update returns the claimed row
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(&f, false)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            appointment_row(&f, "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let appointment = service.reserve_slot(
        f.slot_id,
        &f.patient.to_auth_user(),
        ReserveSlotRequest { notes: None },
    ).await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.fee_cents, 15_000);
    assert_eq!(appointment.time_slot_id, f.slot_id);
}

#[tokio::test]
async fn reserve_fails_when_the_slot_is_claimed_concurrently() {
    let mock_server = MockServer::start().await;
    let f = fixture();
    mount_lookup_mocks(&mock_server, &f).await;

    // Empty representation from the guarded update = someone else won
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // No appointment row may be written
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.reserve_slot(
        f.slot_id,
        &f.patient.to_auth_user(),
        ReserveSlotRequest { notes: None },
    ).await;

    assert_matches!(result, Err(AppointmentError::SlotNotAvailable));
}

#[tokio::test]
async fn reserve_rejects_an_already_claimed_slot_before_locking() {
    let mock_server = MockServer::start().await;
    let f = fixture();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(&f, false)])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.reserve_slot(
        f.slot_id,
        &f.patient.to_auth_user(),
        ReserveSlotRequest { notes: None },
    ).await;

    assert_matches!(result, Err(AppointmentError::SlotNotAvailable));
}

#[tokio::test]
async fn cancel_frees_the_slot_and_refunds_a_wallet_payment() {
    let mock_server = MockServer::start().await;
    let f = fixture();
    let appointment = appointment_row(&f, "confirmed");
    let appointment_id: Uuid =
        serde_json::from_value(appointment["id"].clone()).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    let mut cancelled = appointment_row(&f, "cancelled");
    cancelled["id"] = json!(appointment_id);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    // The claim is released
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    // A successful wallet payment exists, so a refund is due
    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "patient_id": f.patient.id,
            "amount_cents": 15_000,
            "method": "wallet",
            "status": "success",
            "transaction_id": Uuid::new_v4(),
            "paid_at": Utc::now().to_rfc3339(),
            "created_at": Utc::now().to_rfc3339(),
        }])))
        .mount(&mock_server)
        .await;

    // Refund: balance read, CAS update, ledger append
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(&f)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "wallet_balance_cents": 65_000 }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/wallet_transactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "user_id": f.patient.id,
            "kind": "deposit",
            "amount_cents": 15_000,
            "description": "Refund for cancelled appointment with Dr. Grace Okafor",
            "balance_after_cents": 65_000,
            "appointment_id": appointment_id,
            "created_at": Utc::now().to_rfc3339(),
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.cancel_appointment(appointment_id, &f.patient.to_auth_user())
        .await
        .unwrap();

    assert_eq!(result.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn completed_appointments_cannot_be_cancelled() {
    let mock_server = MockServer::start().await;
    let f = fixture();
    let appointment = appointment_row(&f, "completed");
    let appointment_id: Uuid =
        serde_json::from_value(appointment["id"].clone()).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.cancel_appointment(appointment_id, &f.patient.to_auth_user()).await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition(AppointmentStatus::Completed))
    );
}

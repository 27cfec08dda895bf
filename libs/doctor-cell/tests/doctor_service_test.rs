// libs/doctor-cell/tests/doctor_service_test.rs
use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{CreateDoctorRequest, DoctorError, DoctorSearchFilters};
use doctor_cell::services::doctor::DoctorService;
use shared_utils::test_utils::TestConfig;

fn doctor_row(id: Uuid, specialty_id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": Uuid::new_v4(),
        "first_name": "Grace",
        "last_name": "Okafor",
        "email": "grace@example.com",
        "specialty_id": specialty_id,
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

fn specialty_row(id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Cardiology",
        "description": "Heart and vascular care",
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

fn create_request(specialty_id: Uuid) -> CreateDoctorRequest {
    CreateDoctorRequest {
        email: "grace@example.com".to_string(),
        password: "clinic-visit-42".to_string(),
        first_name: "Grace".to_string(),
        last_name: "Okafor".to_string(),
        phone_number: None,
        specialty_id,
        license_number: "MD123456".to_string(),
        experience_years: 10,
        bio: "Experienced cardiologist".to_string(),
        consultation_fee_cents: 15_000,
    }
}

fn service_for(mock_server: &MockServer) -> DoctorService {
    let config = TestConfig::default()
        .with_data_api_url(&mock_server.uri())
        .to_app_config();
    DoctorService::new(&config)
}

#[tokio::test]
async fn search_returns_active_doctors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            doctor_row(Uuid::new_v4(), Uuid::new_v4())
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let doctors = service.search(DoctorSearchFilters {
        specialty_id: None,
        specialty: None,
        q: None,
        min_experience: None,
        max_fee_cents: None,
        min_rating: None,
        limit: None,
        offset: None,
    }).await.unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].full_name(), "Grace Okafor");
}

#[tokio::test]
async fn create_doctor_creates_login_and_profile() {
    let mock_server = MockServer::start().await;
    let specialty_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            specialty_row(specialty_id)
        ])))
        .mount(&mock_server)
        .await;

    // License and email are both free
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            doctor_row(doctor_id, specialty_id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let doctor = service.create_doctor(create_request(specialty_id), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(doctor.id, doctor_id);
    assert_eq!(doctor.specialty_name, "Cardiology");
    assert!(doctor.is_active);
}

#[tokio::test]
async fn create_doctor_rejects_a_taken_license() {
    let mock_server = MockServer::start().await;
    let specialty_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            specialty_row(specialty_id)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4() }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.create_doctor(create_request(specialty_id), Uuid::new_v4()).await;

    assert_matches!(result, Err(DoctorError::LicenseTaken));
}

#[tokio::test]
async fn create_doctor_rejects_unknown_specialty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service.create_doctor(create_request(Uuid::new_v4()), Uuid::new_v4()).await;

    assert_matches!(result, Err(DoctorError::SpecialtyNotFound));
}

// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    CreateDoctorRequest, CreateSpecialtyRequest, DoctorError, DoctorSearchFilters,
    UpdateDoctorRequest, UpdateSpecialtyRequest,
};
use crate::services::doctor::DoctorService;
use crate::services::specialty::SpecialtyService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::SpecialtyNotFound => AppError::NotFound("Specialty not found".to_string()),
        DoctorError::LicenseTaken => {
            AppError::Conflict("License number already registered".to_string())
        }
        DoctorError::EmailTaken => {
            AppError::Conflict("Email address already registered".to_string())
        }
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn require_admin(user: &AuthUser) -> Result<Uuid, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can manage doctors".to_string(),
        ));
    }
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<DoctorSearchFilters>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctors = service.search(filters).await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "count": doctors.len(),
        "doctors": doctors,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service.get(doctor_id).await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
    })))
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = SpecialtyService::new(&state);

    let specialties = service.list().await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "specialties": specialties,
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let admin_id = require_admin(&user)?;
    let service = DoctorService::new(&state);

    let doctor = service.create_doctor(request, admin_id).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor account created"
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = DoctorService::new(&state);

    let doctor = service.update_doctor(doctor_id, request).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor updated"
    })))
}

#[axum::debug_handler]
pub async fn deactivate_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = DoctorService::new(&state);

    let doctor = service.deactivate(doctor_id).await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor deactivated"
    })))
}

#[axum::debug_handler]
pub async fn create_specialty(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = SpecialtyService::new(&state);

    let specialty = service.create(request).await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "specialty": specialty,
        "message": "Specialty created"
    })))
}

#[axum::debug_handler]
pub async fn update_specialty(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(specialty_id): Path<Uuid>,
    Json(request): Json<UpdateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = SpecialtyService::new(&state);

    let specialty = service.update(specialty_id, request).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "specialty": specialty,
        "message": "Specialty updated"
    })))
}

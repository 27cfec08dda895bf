// libs/appointment-cell/src/handlers.rs
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
    AppointmentError, BulkCreateSlotsRequest, ClearDayRequest, CreateSlotsRequest,
    PayAppointmentRequest, ReserveSlotRequest, SlotQuery,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::slots::SlotService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::SlotNotFound => {
            AppError::NotFound("Time slot not found".to_string())
        }
        AppointmentError::SlotNotAvailable => {
            AppError::Conflict("Time slot is already booked or unavailable".to_string())
        }
        AppointmentError::SlotInPast => {
            AppError::BadRequest("Time slot is in the past".to_string())
        }
        AppointmentError::NotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        AppointmentError::DoctorNotFound => {
            AppError::NotFound("Doctor not found".to_string())
        }
        AppointmentError::DoctorInactive => {
            AppError::BadRequest("Doctor is not accepting appointments".to_string())
        }
        AppointmentError::PatientNotFound => {
            AppError::NotFound("Patient not found".to_string())
        }
        AppointmentError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!(
                "Appointment cannot be modified in current status: {}", status
            ))
        }
        AppointmentError::LockContention => {
            AppError::Conflict("Could not reserve the slot, try again".to_string())
        }
        AppointmentError::Unauthorized => {
            AppError::Forbidden("Unauthorized access to appointment".to_string())
        }
        AppointmentError::InsufficientFunds => {
            AppError::BadRequest("Insufficient funds in wallet".to_string())
        }
        AppointmentError::PaymentFailed(msg) => AppError::Internal(msg),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&state);

    let slots = service.available_slots(query).await.map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "count": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn create_slots(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&state);

    let report = service.create_slots(request, &user).await.map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

#[axum::debug_handler]
pub async fn bulk_create_slots(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BulkCreateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&state);

    let report = service.bulk_create_slots(request, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&state);

    service.delete_slot(slot_id, &user).await.map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Time slot deleted"
    })))
}

#[axum::debug_handler]
pub async fn clear_day_slots(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ClearDayRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&state);

    let deleted = service.clear_day(request, &user).await.map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "deleted": deleted,
        "message": "Unbooked slots cleared for the day"
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn reserve_slot(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<ReserveSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service.reserve_slot(slot_id, &user, request).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment reserved. Complete the payment to confirm it."
    })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointments = service.list_my_appointments(&user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service.get_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service.cancel_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service.complete_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as completed"
    })))
}

#[axum::debug_handler]
pub async fn pay_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<PayAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service.pay_appointment(appointment_id, &user, request.method).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Payment successful. Your appointment is confirmed."
    })))
}

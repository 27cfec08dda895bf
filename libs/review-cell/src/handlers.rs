// libs/review-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateReviewRequest, ReviewError};
use crate::services::review::ReviewService;

fn map_review_error(e: ReviewError) -> AppError {
    match e {
        ReviewError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        ReviewError::NotYourAppointment => {
            AppError::Forbidden("You can only review your own appointments".to_string())
        }
        ReviewError::NotCompleted => {
            AppError::BadRequest(
                "You can only review appointments that have been completed".to_string(),
            )
        }
        ReviewError::AlreadyReviewed => {
            AppError::Conflict("This appointment has already been reviewed".to_string())
        }
        ReviewError::InvalidRating => {
            AppError::ValidationError("Rating must be between 1 and 5".to_string())
        }
        ReviewError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn submit_review(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = ReviewService::new(&state);

    let review = service.submit_review(appointment_id, patient_id, request).await
        .map_err(map_review_error)?;

    Ok(Json(json!({
        "success": true,
        "review": review,
        "message": "Thank you! Your review has been submitted."
    })))
}

#[axum::debug_handler]
pub async fn doctor_reviews(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&state);

    let reviews = service.list_for_doctor(doctor_id).await.map_err(map_review_error)?;

    Ok(Json(json!({
        "success": true,
        "count": reviews.len(),
        "reviews": reviews,
    })))
}

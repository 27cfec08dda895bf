// libs/review-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub is_anonymous: bool,
    pub patient_display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Listing shape: anonymous reviews never expose the patient.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPublic {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub patient_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewPublic {
    fn from(review: Review) -> Self {
        let patient_name = if review.is_anonymous {
            "Anonymous".to_string()
        } else {
            review.patient_display_name
        };

        Self {
            id: review.id,
            doctor_id: review.doctor_id,
            rating: review.rating,
            comment: review.comment,
            patient_name,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
    pub is_anonymous: Option<bool>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReviewError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("You can only review your own appointments")]
    NotYourAppointment,

    #[error("You can only review appointments that have been completed")]
    NotCompleted,

    #[error("This appointment has already been reviewed")]
    AlreadyReviewed,

    #[error("Rating must be between {MIN_RATING} and {MAX_RATING}")]
    InvalidRating,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

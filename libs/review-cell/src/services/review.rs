// libs/review-cell/src/services/review.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus};
use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    CreateReviewRequest, Review, ReviewError, ReviewPublic, MAX_RATING, MIN_RATING,
};

#[derive(Debug, Deserialize)]
struct RatingRow {
    rating: i16,
}

pub struct ReviewService {
    postgrest: Arc<PostgrestClient>,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            postgrest: Arc::new(PostgrestClient::new(config)),
        }
    }

    /// Submit a review for a completed appointment. One review per
    /// appointment; only the patient who attended may write it.
    pub async fn submit_review(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        request: CreateReviewRequest,
    ) -> Result<Review, ReviewError> {
        if !(MIN_RATING..=MAX_RATING).contains(&request.rating) {
            return Err(ReviewError::InvalidRating);
        }

        let appointment = self.fetch_appointment(appointment_id).await?;

        if appointment.patient_id != patient_id {
            return Err(ReviewError::NotYourAppointment);
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(ReviewError::NotCompleted);
        }

        let existing_path = format!(
            "/rest/v1/reviews?appointment_id=eq.{}&select=id&limit=1",
            appointment_id
        );
        let existing: Vec<Value> = self.postgrest.request(
            Method::GET,
            &existing_path,
            None,
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;
        if !existing.is_empty() {
            return Err(ReviewError::AlreadyReviewed);
        }

        let review_data = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": appointment.doctor_id,
            "rating": request.rating,
            "comment": request.comment,
            "is_anonymous": request.is_anonymous.unwrap_or(false),
            "patient_display_name": appointment.patient_name,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Review> = self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/reviews",
            None,
            Some(review_data),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        let review = result.into_iter().next()
            .ok_or_else(|| ReviewError::DatabaseError("Failed to create review".to_string()))?;

        self.update_doctor_rating(appointment.doctor_id).await?;

        info!("Review {} created for doctor {}", review.id, appointment.doctor_id);
        Ok(review)
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ReviewPublic>, ReviewError> {
        let path = format!(
            "/rest/v1/reviews?doctor_id=eq.{}&order=created_at.desc",
            doctor_id
        );

        let result: Vec<Review> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().map(ReviewPublic::from).collect())
    }

    /// Recompute the doctor's denormalized rating aggregate from the
    /// review table.
    async fn update_doctor_rating(&self, doctor_id: Uuid) -> Result<(), ReviewError> {
        let ratings_path = format!(
            "/rest/v1/reviews?doctor_id=eq.{}&select=rating",
            doctor_id
        );
        let ratings: Vec<RatingRow> = self.postgrest.request(
            Method::GET,
            &ratings_path,
            None,
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        let total_reviews = ratings.len() as i32;
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().map(|r| r.rating as f32).sum::<f32>() / ratings.len() as f32
        };

        debug!(
            "Updating doctor {} rating to {:.2} over {} reviews",
            doctor_id, average_rating, total_reviews
        );

        let doctor_path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let _: Value = self.postgrest.request(
            Method::PATCH,
            &doctor_path,
            None,
            Some(json!({
                "average_rating": average_rating,
                "total_reviews": total_reviews,
                "updated_at": Utc::now().to_rfc3339(),
            })),
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn fetch_appointment(&self, appointment_id: Uuid) -> Result<Appointment, ReviewError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);

        let result: Vec<Appointment> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(ReviewError::AppointmentNotFound)
    }
}

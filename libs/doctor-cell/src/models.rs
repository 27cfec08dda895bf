// libs/doctor-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A doctor profile. Display fields (names, email, specialty name) are
/// denormalized onto the row so search and listings need no joins; the
/// linked user account remains the login identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty_id: Uuid,
    pub specialty_name: String,
    pub license_number: String,
    pub experience_years: i32,
    pub bio: String,
    pub consultation_fee_cents: i64,
    pub is_active: bool,
    pub average_rating: f32,
    pub total_reviews: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorSearchFilters {
    pub specialty_id: Option<Uuid>,
    pub specialty: Option<String>,
    pub q: Option<String>,
    pub min_experience: Option<i32>,
    pub max_fee_cents: Option<i64>,
    pub min_rating: Option<f32>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Admin request creating a doctor: the login account and the profile are
/// created together.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub specialty_id: Uuid,
    pub license_number: String,
    pub experience_years: i32,
    pub bio: String,
    pub consultation_fee_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub consultation_fee_cents: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSpecialtyRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSpecialtyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Specialty not found")]
    SpecialtyNotFound,

    #[error("License number already registered")]
    LicenseTaken,

    #[error("Email address already registered")]
    EmailTaken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use payment_cell::models::PaymentMethod;

// ==============================================================================
// TIME SLOT MODELS
// ==============================================================================

/// A bookable slot on a doctor's calendar. `is_available` is the claim
/// flag: false exactly while a non-cancelled appointment holds the slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

/// Slot timing and display names are copied onto the row at booking so
/// listings and emails need no joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub time_slot_id: Uuid,
    pub status: AppointmentStatus,
    pub fee_cents: i64,
    pub notes: Option<String>,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub doctor_name: String,
    pub specialty_name: String,
    pub patient_name: String,
    pub confirmation_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: Uuid,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSlotsRequest {
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_times: Vec<NaiveTime>,
    pub slot_minutes: Option<i64>,
}

/// Bulk generation over a date range: slots are created for every listed
/// start time on every date whose weekday is selected (0 = Monday).
#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateSlotsRequest {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: Vec<u8>,
    pub start_times: Vec<NaiveTime>,
    pub slot_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearDayRequest {
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotGenerationReport {
    pub created: usize,
    pub skipped_past: usize,
    pub skipped_overlapping: usize,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveSlotRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayAppointmentRequest {
    pub method: PaymentMethod,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Time slot not found")]
    SlotNotFound,

    #[error("Time slot is already booked or unavailable")]
    SlotNotAvailable,

    #[error("Time slot is in the past")]
    SlotInPast,

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting appointments")]
    DoctorInactive,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Could not reserve the slot, try again")]
    LockContention,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Insufficient funds in wallet")]
    InsufficientFunds,

    #[error("Payment error: {0}")]
    PaymentFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

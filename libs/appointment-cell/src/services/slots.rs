// libs/appointment-cell/src/services/slots.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::services::doctor::DoctorService;
use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::AuthUser;

use crate::models::{
    AppointmentError, BulkCreateSlotsRequest, ClearDayRequest, CreateSlotsRequest,
    SlotGenerationReport, SlotQuery, TimeSlot,
};

const DEFAULT_SLOT_MINUTES: i64 = 15;
const MIN_SLOT_MINUTES: i64 = 5;
const MAX_SLOT_MINUTES: i64 = 120;
const MAX_BULK_RANGE_DAYS: i64 = 92;

/// Two half-open time ranges on the same date overlap.
pub fn ranges_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Dates in [start, end] whose weekday is in `weekdays` (0 = Monday).
pub fn expand_dates(start: NaiveDate, end: NaiveDate, weekdays: &[u8]) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if weekdays.contains(&(current.weekday().num_days_from_monday() as u8)) {
            dates.push(current);
        }
        current += Duration::days(1);
    }
    dates
}

pub struct SlotService {
    postgrest: Arc<PostgrestClient>,
    doctor_service: DoctorService,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            postgrest: Arc::new(PostgrestClient::new(config)),
            doctor_service: DoctorService::new(config),
        }
    }

    /// Available future slots for a doctor, optionally date-filtered.
    pub async fn available_slots(&self, query: SlotQuery) -> Result<Vec<TimeSlot>, AppointmentError> {
        let today = Utc::now().date_naive();
        let from = query.from.map_or(today, |d| d.max(today));

        let mut path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&is_available=eq.true&slot_date=gte.{}",
            query.doctor_id, from
        );
        if let Some(to) = query.to {
            path.push_str(&format!("&slot_date=lte.{}", to));
        }
        path.push_str("&order=slot_date.asc,start_time.asc");

        let result: Vec<TimeSlot> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(result)
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<TimeSlot, AppointmentError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}&limit=1", slot_id);

        let result: Vec<TimeSlot> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::SlotNotFound)
    }

    /// Create slots for a single date from a list of start times.
    pub async fn create_slots(
        &self,
        request: CreateSlotsRequest,
        caller: &AuthUser,
    ) -> Result<SlotGenerationReport, AppointmentError> {
        let created_by = self.authorize_calendar_access(caller, request.doctor_id).await?;
        let slot_minutes = validate_slot_minutes(request.slot_minutes)?;

        if request.start_times.is_empty() {
            return Err(AppointmentError::ValidationError(
                "At least one start time is required".to_string(),
            ));
        }

        self.generate_for_dates(
            request.doctor_id,
            vec![request.slot_date],
            &request.start_times,
            slot_minutes,
            created_by,
        ).await
    }

    /// Bulk generation over a date range, weekday set and start-time set.
    pub async fn bulk_create_slots(
        &self,
        request: BulkCreateSlotsRequest,
        caller: &AuthUser,
    ) -> Result<SlotGenerationReport, AppointmentError> {
        let created_by = self.authorize_calendar_access(caller, request.doctor_id).await?;
        let slot_minutes = validate_slot_minutes(request.slot_minutes)?;

        if request.start_date > request.end_date {
            return Err(AppointmentError::ValidationError(
                "End date must be after start date".to_string(),
            ));
        }
        if (request.end_date - request.start_date).num_days() > MAX_BULK_RANGE_DAYS {
            return Err(AppointmentError::ValidationError(format!(
                "Date range cannot exceed {} days", MAX_BULK_RANGE_DAYS
            )));
        }
        if request.weekdays.is_empty() || request.start_times.is_empty() {
            return Err(AppointmentError::ValidationError(
                "At least one weekday and one start time are required".to_string(),
            ));
        }
        if request.weekdays.iter().any(|d| *d > 6) {
            return Err(AppointmentError::ValidationError(
                "Weekdays must be between 0 (Monday) and 6 (Sunday)".to_string(),
            ));
        }

        let dates = expand_dates(request.start_date, request.end_date, &request.weekdays);

        self.generate_for_dates(
            request.doctor_id,
            dates,
            &request.start_times,
            slot_minutes,
            created_by,
        ).await
    }

    /// Delete a single unbooked slot.
    pub async fn delete_slot(&self, slot_id: Uuid, caller: &AuthUser) -> Result<(), AppointmentError> {
        let slot = self.get_slot(slot_id).await?;
        self.authorize_calendar_access(caller, slot.doctor_id).await?;

        // A claimed slot belongs to a live appointment
        if !slot.is_available {
            return Err(AppointmentError::SlotNotAvailable);
        }

        let path = format!("/rest/v1/time_slots?id=eq.{}&is_available=eq.true", slot_id);
        let _: Value = self.postgrest.request(
            Method::DELETE,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Slot {} deleted", slot_id);
        Ok(())
    }

    /// Clear a doctor's unbooked slots on one date. Claimed slots stay.
    pub async fn clear_day(
        &self,
        request: ClearDayRequest,
        caller: &AuthUser,
    ) -> Result<usize, AppointmentError> {
        self.authorize_calendar_access(caller, request.doctor_id).await?;

        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=eq.{}&is_available=eq.true",
            request.doctor_id, request.slot_date
        );

        let deleted: Vec<Value> = self.postgrest.request_with_headers(
            Method::DELETE,
            &path,
            None,
            None,
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Cleared {} slots for doctor {} on {}",
            deleted.len(), request.doctor_id, request.slot_date
        );
        Ok(deleted.len())
    }

    async fn generate_for_dates(
        &self,
        doctor_id: Uuid,
        dates: Vec<NaiveDate>,
        start_times: &[NaiveTime],
        slot_minutes: i64,
        created_by: Uuid,
    ) -> Result<SlotGenerationReport, AppointmentError> {
        let today = Utc::now().date_naive();
        let existing = self.existing_slots_by_date(doctor_id, &dates).await?;

        let mut rows = Vec::new();
        let mut skipped_past = 0;
        let mut skipped_overlapping = 0;
        let now = Utc::now();

        for date in dates {
            if date < today {
                skipped_past += start_times.len();
                continue;
            }

            let mut taken: Vec<(NaiveTime, NaiveTime)> = existing
                .get(&date)
                .cloned()
                .unwrap_or_default();

            for &start in start_times {
                let end = start + Duration::minutes(slot_minutes);
                if end <= start {
                    // Start time too close to midnight for this length
                    skipped_overlapping += 1;
                    continue;
                }

                if taken.iter().any(|&(s, e)| ranges_overlap(start, end, s, e)) {
                    skipped_overlapping += 1;
                    continue;
                }

                taken.push((start, end));
                rows.push(json!({
                    "id": Uuid::new_v4(),
                    "doctor_id": doctor_id,
                    "slot_date": date,
                    "start_time": start.format("%H:%M:%S").to_string(),
                    "end_time": end.format("%H:%M:%S").to_string(),
                    "is_available": true,
                    "created_by": created_by,
                    "created_at": now.to_rfc3339(),
                }));
            }
        }

        let slots: Vec<TimeSlot> = if rows.is_empty() {
            Vec::new()
        } else {
            self.postgrest.request_with_headers(
                Method::POST,
                "/rest/v1/time_slots",
                None,
                Some(Value::Array(rows)),
                Some(PostgrestClient::representation_headers()),
            ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        };

        info!(
            "Generated {} slots for doctor {} ({} past, {} overlapping skipped)",
            slots.len(), doctor_id, skipped_past, skipped_overlapping
        );

        Ok(SlotGenerationReport {
            created: slots.len(),
            skipped_past,
            skipped_overlapping,
            slots,
        })
    }

    async fn existing_slots_by_date(
        &self,
        doctor_id: Uuid,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, Vec<(NaiveTime, NaiveTime)>>, AppointmentError> {
        let mut map: HashMap<NaiveDate, Vec<(NaiveTime, NaiveTime)>> = HashMap::new();
        let (Some(min), Some(max)) = (dates.iter().min(), dates.iter().max()) else {
            return Ok(map);
        };

        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=gte.{}&slot_date=lte.{}",
            doctor_id, min, max
        );

        let existing: Vec<TimeSlot> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        for slot in existing {
            map.entry(slot.slot_date)
                .or_default()
                .push((slot.start_time, slot.end_time));
        }

        Ok(map)
    }

    /// Admins manage any calendar; a doctor only their own. Returns the
    /// caller's user id for the `created_by` column.
    async fn authorize_calendar_access(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
    ) -> Result<Uuid, AppointmentError> {
        let caller_id = Uuid::parse_str(&caller.id)
            .map_err(|_| AppointmentError::Unauthorized)?;

        // The doctor must exist either way
        let doctor = self.doctor_service.get(doctor_id).await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        if caller.is_admin() {
            return Ok(caller_id);
        }

        if caller.is_doctor() {
            let own_profile = self.doctor_service.find_by_user_id(caller_id).await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
            if own_profile.map(|d| d.id) == Some(doctor.id) {
                return Ok(caller_id);
            }
        }

        debug!("Calendar access denied for user {} on doctor {}", caller.id, doctor_id);
        Err(AppointmentError::Unauthorized)
    }
}

fn validate_slot_minutes(slot_minutes: Option<i64>) -> Result<i64, AppointmentError> {
    let minutes = slot_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&minutes) {
        return Err(AppointmentError::ValidationError(format!(
            "Slot length must be between {} and {} minutes",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(minutes)
}

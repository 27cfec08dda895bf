// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use account_cell::models::UserAccount;
use account_cell::services::account::AccountService;
use doctor_cell::models::Doctor;
use doctor_cell::services::doctor::DoctorService;
use payment_cell::models::{PaymentError, PaymentMethod, PaymentStatus};
use payment_cell::services::payment::PaymentService;
use payment_cell::services::wallet::WalletService;
use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::AuthUser;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, ReserveSlotRequest, TimeSlot,
};
use crate::services::email::AppointmentEmailService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locks::SchedulingLockService;
use crate::services::slots::SlotService;

const MAX_RESERVE_ATTEMPTS: u32 = 3;

pub struct AppointmentBookingService {
    postgrest: Arc<PostgrestClient>,
    lock_service: SchedulingLockService,
    lifecycle_service: AppointmentLifecycleService,
    slot_service: SlotService,
    doctor_service: DoctorService,
    account_service: AccountService,
    wallet_service: WalletService,
    payment_service: PaymentService,
    email_service: AppointmentEmailService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let postgrest = Arc::new(PostgrestClient::new(config));

        Self {
            lock_service: SchedulingLockService::new(Arc::clone(&postgrest)),
            lifecycle_service: AppointmentLifecycleService::new(),
            slot_service: SlotService::new(config),
            doctor_service: DoctorService::new(config),
            account_service: AccountService::new(config),
            wallet_service: WalletService::new(config),
            payment_service: PaymentService::new(config),
            email_service: AppointmentEmailService::new(config),
            postgrest,
        }
    }

    /// Reserve a slot for a patient. The slot claim is a compare-and-swap
    /// update guarded by a short-lived scheduling lock, so a slot can hold
    /// at most one non-cancelled appointment no matter how many callers
    /// race for it.
    pub async fn reserve_slot(
        &self,
        slot_id: Uuid,
        caller: &AuthUser,
        request: ReserveSlotRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = caller_uuid(caller)?;
        info!("Reserving slot {} for patient {}", slot_id, patient_id);

        let slot = self.slot_service.get_slot(slot_id).await?;
        validate_slot_is_bookable(&slot)?;

        let doctor = self.doctor_service.get(slot.doctor_id).await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;
        if !doctor.is_active {
            return Err(AppointmentError::DoctorInactive);
        }

        let patient = self.account_service.find_user_by_id(patient_id).await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::PatientNotFound)?;

        let lock_key = SchedulingLockService::slot_lock_key(slot_id);

        for attempt in 1..=MAX_RESERVE_ATTEMPTS {
            debug!("Reservation attempt {} for slot {}", attempt, slot_id);

            if !self.lock_service.acquire(&lock_key, slot.doctor_id).await? {
                // Someone else is mid-booking on this slot; back off
                if attempt < MAX_RESERVE_ATTEMPTS {
                    tokio::time::sleep(std::time::Duration::from_millis(100 * attempt as u64)).await;
                    continue;
                }
                return Err(AppointmentError::LockContention);
            }

            let result = self.reserve_under_lock(&slot, &doctor, &patient, &request).await;
            self.lock_service.release(&lock_key).await?;

            let appointment = result?;

            self.email_service.send_reservation_confirmation(
                &appointment,
                &patient.email,
                &patient.first_name,
            ).await;

            info!("Appointment {} reserved on slot {}", appointment.id, slot_id);
            return Ok(appointment);
        }

        Err(AppointmentError::LockContention)
    }

    async fn reserve_under_lock(
        &self,
        slot: &TimeSlot,
        doctor: &Doctor,
        patient: &UserAccount,
        request: &ReserveSlotRequest,
    ) -> Result<Appointment, AppointmentError> {
        // Final claim under lock: the filter on is_available makes a lost
        // race come back as an empty representation
        if !self.claim_slot(slot.id).await? {
            warn!("Slot {} was claimed concurrently", slot.id);
            return Err(AppointmentError::SlotNotAvailable);
        }

        let now = Utc::now();
        let appointment_data = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient.id,
            "doctor_id": doctor.id,
            "time_slot_id": slot.id,
            "status": AppointmentStatus::Pending,
            "fee_cents": doctor.consultation_fee_cents,
            "notes": request.notes.clone(),
            "slot_date": slot.slot_date,
            "start_time": slot.start_time.format("%H:%M:%S").to_string(),
            "end_time": slot.end_time.format("%H:%M:%S").to_string(),
            "doctor_name": doctor.full_name(),
            "specialty_name": doctor.specialty_name.clone(),
            "patient_name": patient.full_name(),
            "confirmation_sent": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        match self.postgrest.request_with_headers::<Vec<Appointment>>(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(appointment_data),
            Some(PostgrestClient::representation_headers()),
        ).await {
            Ok(rows) => rows.into_iter().next()
                .ok_or_else(|| AppointmentError::DatabaseError(
                    "Failed to create appointment".to_string(),
                )),
            Err(e) => {
                // Give the slot back rather than leaving it claimed with
                // no appointment
                error!("Appointment insert failed for slot {}: {}", slot.id, e);
                self.release_claim(slot.id).await?;
                Err(AppointmentError::DatabaseError(e.to_string()))
            }
        }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        caller: &AuthUser,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id).await?;
        self.authorize_view(&appointment, caller).await?;
        Ok(appointment)
    }

    /// The caller's appointments: a doctor sees their calendar, anyone
    /// else their own bookings.
    pub async fn list_my_appointments(
        &self,
        caller: &AuthUser,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let caller_id = caller_uuid(caller)?;

        let path = match self.resolve_caller_doctor(caller).await? {
            Some(doctor) => format!(
                "/rest/v1/appointments?doctor_id=eq.{}&order=slot_date.desc,start_time.desc",
                doctor.id
            ),
            None => format!(
                "/rest/v1/appointments?patient_id=eq.{}&order=slot_date.desc,start_time.desc",
                caller_id
            ),
        };

        let result: Vec<Appointment> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(result)
    }

    /// Cancel an appointment. Frees the slot and refunds a successful
    /// wallet payment back to the patient's wallet.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        caller: &AuthUser,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id).await?;
        self.authorize_modify(&appointment, caller).await?;

        self.lifecycle_service.validate_status_transition(
            &appointment.status,
            &AppointmentStatus::Cancelled,
        )?;

        let cancelled = self.patch_appointment(appointment_id, json!({
            "status": AppointmentStatus::Cancelled,
            "updated_at": Utc::now().to_rfc3339(),
        })).await?;

        // The claim is released only on cancellation
        self.release_claim(appointment.time_slot_id).await?;

        if let Some(payment) = self.payment_service
            .find_successful_wallet_payment(appointment_id).await
            .map_err(map_payment_error)?
        {
            self.wallet_service.deposit(
                appointment.patient_id,
                payment.amount_cents,
                format!("Refund for cancelled appointment with Dr. {}", appointment.doctor_name),
                Some(appointment_id),
            ).await.map_err(map_payment_error)?;
            info!("Refunded {} cents for appointment {}", payment.amount_cents, appointment_id);
        }

        if let Some(patient) = self.account_service.find_user_by_id(appointment.patient_id).await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        {
            self.email_service.send_cancellation_notification(
                &cancelled,
                &patient.email,
                &patient.first_name,
            ).await;
        }

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Mark a confirmed appointment completed. Completion is the terminal
    /// state reviews require.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        caller: &AuthUser,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id).await?;

        let is_own_calendar = self.resolve_caller_doctor(caller).await?
            .map(|d| d.id == appointment.doctor_id)
            .unwrap_or(false);
        if !caller.is_admin() && !is_own_calendar {
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle_service.validate_status_transition(
            &appointment.status,
            &AppointmentStatus::Completed,
        )?;

        let completed = self.patch_appointment(appointment_id, json!({
            "status": AppointmentStatus::Completed,
            "updated_at": Utc::now().to_rfc3339(),
        })).await?;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    /// Pay for a pending appointment from the wallet or by (simulated)
    /// card, then confirm it.
    pub async fn pay_appointment(
        &self,
        appointment_id: Uuid,
        caller: &AuthUser,
        method: PaymentMethod,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = caller_uuid(caller)?;
        let appointment = self.fetch_appointment(appointment_id).await?;

        if appointment.patient_id != patient_id {
            return Err(AppointmentError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Pending {
            return Err(AppointmentError::InvalidStatusTransition(appointment.status));
        }

        self.lifecycle_service.validate_status_transition(
            &appointment.status,
            &AppointmentStatus::Confirmed,
        )?;

        if method == PaymentMethod::Wallet {
            self.wallet_service.withdraw(
                patient_id,
                appointment.fee_cents,
                format!("Payment for appointment with Dr. {}", appointment.doctor_name),
                Some(appointment_id),
            ).await.map_err(map_payment_error)?;
        }

        if let Err(e) = self.payment_service.record_payment(
            appointment_id,
            patient_id,
            appointment.fee_cents,
            method,
            PaymentStatus::Success,
        ).await {
            // Compensate the debit so the ledger and balance stay honest
            if method == PaymentMethod::Wallet {
                error!("Payment record failed after wallet debit, refunding: {}", e);
                self.wallet_service.deposit(
                    patient_id,
                    appointment.fee_cents,
                    format!("Reversal of failed payment for appointment with Dr. {}",
                            appointment.doctor_name),
                    Some(appointment_id),
                ).await.map_err(map_payment_error)?;
            }
            return Err(map_payment_error(e));
        }

        let confirmed = self.patch_appointment(appointment_id, json!({
            "status": AppointmentStatus::Confirmed,
            "updated_at": Utc::now().to_rfc3339(),
        })).await?;

        if let Some(patient) = self.account_service.find_user_by_id(patient_id).await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        {
            self.email_service.send_payment_confirmation(
                &confirmed,
                &patient.email,
                &patient.first_name,
            ).await;

            if let Err(e) = self.postgrest.request::<Value>(
                Method::PATCH,
                &format!("/rest/v1/appointments?id=eq.{}", appointment_id),
                None,
                Some(json!({ "confirmation_sent": true })),
            ).await {
                warn!("Failed to flag confirmation email for {}: {}", appointment_id, e);
            }
        }

        info!("Appointment {} paid via {} and confirmed", appointment_id, method);
        Ok(confirmed)
    }

    // ==========================================================================
    // INTERNAL HELPERS
    // ==========================================================================

    async fn fetch_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);

        let result: Vec<Appointment> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: Value,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Appointment> = self.postgrest.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn claim_slot(&self, slot_id: Uuid) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/time_slots?id=eq.{}&is_available=eq.true",
            slot_id
        );

        let updated: Vec<TimeSlot> = self.postgrest.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "is_available": false })),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!updated.is_empty())
    }

    async fn release_claim(&self, slot_id: Uuid) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);

        let _: Value = self.postgrest.request(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "is_available": true })),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn resolve_caller_doctor(
        &self,
        caller: &AuthUser,
    ) -> Result<Option<Doctor>, AppointmentError> {
        if !caller.is_doctor() {
            return Ok(None);
        }
        let caller_id = caller_uuid(caller)?;
        self.doctor_service.find_by_user_id(caller_id).await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    async fn authorize_view(
        &self,
        appointment: &Appointment,
        caller: &AuthUser,
    ) -> Result<(), AppointmentError> {
        if caller.is_admin() {
            return Ok(());
        }

        let caller_id = caller_uuid(caller)?;
        if appointment.patient_id == caller_id {
            return Ok(());
        }

        if let Some(doctor) = self.resolve_caller_doctor(caller).await? {
            if doctor.id == appointment.doctor_id {
                return Ok(());
            }
        }

        Err(AppointmentError::Unauthorized)
    }

    async fn authorize_modify(
        &self,
        appointment: &Appointment,
        caller: &AuthUser,
    ) -> Result<(), AppointmentError> {
        // Same circle as viewing: the patient, the doctor, or an admin
        self.authorize_view(appointment, caller).await
    }
}

fn caller_uuid(caller: &AuthUser) -> Result<Uuid, AppointmentError> {
    Uuid::parse_str(&caller.id).map_err(|_| AppointmentError::Unauthorized)
}

fn validate_slot_is_bookable(slot: &TimeSlot) -> Result<(), AppointmentError> {
    if !slot.is_available {
        return Err(AppointmentError::SlotNotAvailable);
    }

    let now = Utc::now();
    let today = now.date_naive();
    if slot.slot_date < today
        || (slot.slot_date == today && slot.start_time <= now.time())
    {
        return Err(AppointmentError::SlotInPast);
    }

    Ok(())
}

fn map_payment_error(e: PaymentError) -> AppointmentError {
    match e {
        PaymentError::InsufficientFunds => AppointmentError::InsufficientFunds,
        other => AppointmentError::PaymentFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveTime};

    fn slot_at(date_offset_days: i64, start: NaiveTime, available: bool) -> TimeSlot {
        let date = (Utc::now() + Duration::days(date_offset_days)).date_naive();
        TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            slot_date: date,
            start_time: start,
            end_time: start + Duration::minutes(15),
            is_available: available,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn claimed_slot_is_not_bookable() {
        let slot = slot_at(1, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), false);
        assert_matches!(
            validate_slot_is_bookable(&slot),
            Err(AppointmentError::SlotNotAvailable)
        );
    }

    #[test]
    fn past_slot_is_not_bookable() {
        let slot = slot_at(-1, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), true);
        assert_matches!(
            validate_slot_is_bookable(&slot),
            Err(AppointmentError::SlotInPast)
        );
    }

    #[test]
    fn future_slot_is_bookable() {
        let slot = slot_at(7, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), true);
        assert!(validate_slot_is_bookable(&slot).is_ok());
    }
}

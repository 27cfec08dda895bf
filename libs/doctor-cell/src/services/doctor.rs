// libs/doctor-cell/src/services/doctor.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use account_cell::models::UserRole;
use account_cell::services::password::PasswordService;
use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorSearchFilters, UpdateDoctorRequest,
};
use crate::services::specialty::SpecialtyService;

const DEFAULT_SEARCH_LIMIT: i32 = 20;

pub struct DoctorService {
    postgrest: Arc<PostgrestClient>,
    specialty_service: SpecialtyService,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        let postgrest = Arc::new(PostgrestClient::new(config));
        let specialty_service = SpecialtyService::with_client(Arc::clone(&postgrest));

        Self { postgrest, specialty_service }
    }

    /// Public search over active doctors, ordered by rating.
    pub async fn search(&self, filters: DoctorSearchFilters) -> Result<Vec<Doctor>, DoctorError> {
        let path = Self::build_search_path(&filters);
        debug!("Searching doctors: {}", path);

        let result: Vec<Doctor> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(result)
    }

    pub(crate) fn build_search_path(filters: &DoctorSearchFilters) -> String {
        let mut path = String::from("/rest/v1/doctors?is_active=eq.true");

        if let Some(specialty_id) = filters.specialty_id {
            path.push_str(&format!("&specialty_id=eq.{}", specialty_id));
        }
        if let Some(specialty) = &filters.specialty {
            path.push_str(&format!(
                "&specialty_name=ilike.{}",
                urlencoding::encode(&format!("*{}*", specialty))
            ));
        }
        if let Some(q) = &filters.q {
            let pattern = urlencoding::encode(&format!("*{}*", q)).into_owned();
            path.push_str(&format!(
                "&or=(first_name.ilike.{},last_name.ilike.{})",
                pattern, pattern
            ));
        }
        if let Some(min_experience) = filters.min_experience {
            path.push_str(&format!("&experience_years=gte.{}", min_experience));
        }
        if let Some(max_fee) = filters.max_fee_cents {
            path.push_str(&format!("&consultation_fee_cents=lte.{}", max_fee));
        }
        if let Some(min_rating) = filters.min_rating {
            path.push_str(&format!("&average_rating=gte.{}", min_rating));
        }

        path.push_str("&order=average_rating.desc,total_reviews.desc");
        path.push_str(&format!("&limit={}", filters.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)));
        if let Some(offset) = filters.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        path
    }

    pub async fn get(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&limit=1", doctor_id);

        let result: Vec<Doctor> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    /// Find the doctor profile owned by a user account, if any. Used by
    /// the appointment cell to resolve the calling doctor.
    pub async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}&limit=1", user_id);

        let result: Vec<Doctor> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    /// Admin operation: create the doctor's login account and profile in
    /// one step.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        created_by: Uuid,
    ) -> Result<Doctor, DoctorError> {
        info!("Creating doctor account for {}", request.email);

        self.validate_create(&request)?;

        let specialty = self.specialty_service.get(request.specialty_id).await?;

        // License numbers are unique across doctors
        let license_path = format!(
            "/rest/v1/doctors?license_number=eq.{}&select=id&limit=1",
            urlencoding::encode(&request.license_number)
        );
        let existing_license: Vec<Value> = self.postgrest.request(
            Method::GET,
            &license_path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        if !existing_license.is_empty() {
            return Err(DoctorError::LicenseTaken);
        }

        let email_path = format!(
            "/rest/v1/users?email=eq.{}&select=id&limit=1",
            urlencoding::encode(&request.email.to_lowercase())
        );
        let existing_email: Vec<Value> = self.postgrest.request(
            Method::GET,
            &email_path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        if !existing_email.is_empty() {
            return Err(DoctorError::EmailTaken);
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| DoctorError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let user_data = json!({
            "id": user_id,
            "email": request.email.to_lowercase(),
            "password_hash": password_hash,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone_number": request.phone_number,
            "role": UserRole::Doctor,
            "is_verified": true,
            "wallet_balance_cents": 0,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let _: Value = self.postgrest.request(
            Method::POST,
            "/rest/v1/users",
            None,
            Some(user_data),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctor_data = json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email.to_lowercase(),
            "specialty_id": specialty.id,
            "specialty_name": specialty.name,
            "license_number": request.license_number,
            "experience_years": request.experience_years,
            "bio": request.bio,
            "consultation_fee_cents": request.consultation_fee_cents,
            "is_active": true,
            "average_rating": 0.0,
            "total_reviews": 0,
            "created_by": created_by,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<Doctor> = match self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            None,
            Some(doctor_data),
            Some(PostgrestClient::representation_headers()),
        ).await {
            Ok(rows) => rows,
            Err(e) => {
                // Don't leave an orphaned login behind
                warn!("Doctor profile insert failed, removing user {}: {}", user_id, e);
                let cleanup_path = format!("/rest/v1/users?id=eq.{}", user_id);
                let _: Result<Value, _> = self.postgrest.request(
                    Method::DELETE,
                    &cleanup_path,
                    None,
                    None,
                ).await;
                return Err(DoctorError::DatabaseError(e.to_string()));
            }
        };

        let doctor = result.into_iter().next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create doctor".to_string()))?;

        info!("Doctor {} created by admin {}", doctor.id, created_by);
        Ok(doctor)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        let current = self.get(doctor_id).await?;
        let mut update_data = serde_json::Map::new();
        let mut user_update = serde_json::Map::new();

        if let Some(first_name) = &request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
            user_update.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = &request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
            user_update.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(specialty_id) = request.specialty_id {
            let specialty = self.specialty_service.get(specialty_id).await?;
            update_data.insert("specialty_id".to_string(), json!(specialty.id));
            update_data.insert("specialty_name".to_string(), json!(specialty.name));
        }
        if let Some(experience_years) = request.experience_years {
            if experience_years < 0 {
                return Err(DoctorError::ValidationError(
                    "Experience years cannot be negative".to_string(),
                ));
            }
            update_data.insert("experience_years".to_string(), json!(experience_years));
        }
        if let Some(bio) = &request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(fee) = request.consultation_fee_cents {
            if fee < 0 {
                return Err(DoctorError::ValidationError(
                    "Consultation fee cannot be negative".to_string(),
                ));
            }
            update_data.insert("consultation_fee_cents".to_string(), json!(fee));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }

        if update_data.is_empty() {
            return Ok(current);
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.postgrest.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(Value::Object(update_data)),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctor = result.into_iter().next().ok_or(DoctorError::NotFound)?;

        if !user_update.is_empty() {
            user_update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
            let user_path = format!("/rest/v1/users?id=eq.{}", current.user_id);
            let _: Value = self.postgrest.request(
                Method::PATCH,
                &user_path,
                None,
                Some(Value::Object(user_update)),
            ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        }

        Ok(doctor)
    }

    /// Doctors are never hard-deleted; deactivation hides them from
    /// search and blocks new bookings.
    pub async fn deactivate(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        info!("Deactivating doctor {}", doctor_id);

        self.update_doctor(doctor_id, UpdateDoctorRequest {
            first_name: None,
            last_name: None,
            specialty_id: None,
            experience_years: None,
            bio: None,
            consultation_fee_cents: None,
            is_active: Some(false),
        }).await
    }

    fn validate_create(&self, request: &CreateDoctorRequest) -> Result<(), DoctorError> {
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "Doctor name cannot be empty".to_string(),
            ));
        }
        if request.license_number.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "License number cannot be empty".to_string(),
            ));
        }
        if request.experience_years < 0 {
            return Err(DoctorError::ValidationError(
                "Experience years cannot be negative".to_string(),
            ));
        }
        if request.consultation_fee_cents < 0 {
            return Err(DoctorError::ValidationError(
                "Consultation fee cannot be negative".to_string(),
            ));
        }
        PasswordService::validate_password(&request.password)
            .map_err(|e| DoctorError::ValidationError(e.to_string()))?;

        Ok(())
    }
}

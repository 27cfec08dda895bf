// libs/doctor-cell/src/services/specialty.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{CreateSpecialtyRequest, DoctorError, Specialty, UpdateSpecialtyRequest};

pub struct SpecialtyService {
    postgrest: Arc<PostgrestClient>,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            postgrest: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub fn with_client(postgrest: Arc<PostgrestClient>) -> Self {
        Self { postgrest }
    }

    pub async fn list(&self) -> Result<Vec<Specialty>, DoctorError> {
        let result: Vec<Specialty> = self.postgrest.request(
            Method::GET,
            "/rest/v1/specialties?order=name.asc",
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(result)
    }

    pub async fn get(&self, specialty_id: Uuid) -> Result<Specialty, DoctorError> {
        let path = format!("/rest/v1/specialties?id=eq.{}&limit=1", specialty_id);

        let result: Vec<Specialty> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(DoctorError::SpecialtyNotFound)
    }

    pub async fn create(&self, request: CreateSpecialtyRequest) -> Result<Specialty, DoctorError> {
        if request.name.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "Specialty name cannot be empty".to_string(),
            ));
        }

        debug!("Creating specialty {}", request.name);

        let now = Utc::now();
        let specialty_data = json!({
            "id": Uuid::new_v4(),
            "name": request.name,
            "description": request.description,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<Specialty> = self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/specialties",
            None,
            Some(specialty_data),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let specialty = result.into_iter().next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create specialty".to_string()))?;

        info!("Specialty {} created", specialty.id);
        Ok(specialty)
    }

    pub async fn update(
        &self,
        specialty_id: Uuid,
        request: UpdateSpecialtyRequest,
    ) -> Result<Specialty, DoctorError> {
        let mut update_data = serde_json::Map::new();

        if let Some(name) = &request.name {
            if name.trim().is_empty() {
                return Err(DoctorError::ValidationError(
                    "Specialty name cannot be empty".to_string(),
                ));
            }
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(description) = &request.description {
            update_data.insert("description".to_string(), json!(description));
        }

        if update_data.is_empty() {
            return self.get(specialty_id).await;
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/specialties?id=eq.{}", specialty_id);
        let result: Vec<Specialty> = self.postgrest.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(Value::Object(update_data)),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let specialty = result.into_iter().next().ok_or(DoctorError::SpecialtyNotFound)?;

        // Keep the denormalized name on doctor rows in step
        if request.name.is_some() {
            let doctors_path = format!("/rest/v1/doctors?specialty_id=eq.{}", specialty_id);
            let _: Value = self.postgrest.request(
                Method::PATCH,
                &doctors_path,
                None,
                Some(json!({ "specialty_name": specialty.name })),
            ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        }

        Ok(specialty)
    }
}

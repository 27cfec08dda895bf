// libs/payment-cell/src/services/payment.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use tracing::{debug, info};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{Payment, PaymentError, PaymentMethod, PaymentStatus};

pub struct PaymentService {
    postgrest: Arc<PostgrestClient>,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            postgrest: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub fn with_client(postgrest: Arc<PostgrestClient>) -> Self {
        Self { postgrest }
    }

    pub async fn record_payment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        amount_cents: i64,
        method: PaymentMethod,
        status: PaymentStatus,
    ) -> Result<Payment, PaymentError> {
        debug!("Recording {} payment for appointment {}", method, appointment_id);

        let now = Utc::now();
        let payment_data = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "amount_cents": amount_cents,
            "method": method,
            "status": status,
            "transaction_id": Uuid::new_v4(),
            "paid_at": now.to_rfc3339(),
            "created_at": now.to_rfc3339(),
        });

        let result: Vec<Payment> = self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/payments",
            None,
            Some(payment_data),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let payment = result.into_iter().next()
            .ok_or_else(|| PaymentError::DatabaseError("Failed to record payment".to_string()))?;

        info!("Payment {} recorded for appointment {}", payment.id, appointment_id);
        Ok(payment)
    }

    /// The successful wallet payment for an appointment, if one exists.
    /// Cancellation uses this to decide whether a refund is due.
    pub async fn find_successful_wallet_payment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Payment>, PaymentError> {
        let path = format!(
            "/rest/v1/payments?appointment_id=eq.{}&method=eq.wallet&status=eq.success&limit=1",
            appointment_id
        );

        let result: Vec<Payment> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Payment>, PaymentError> {
        let path = format!(
            "/rest/v1/payments?patient_id=eq.{}&order=created_at.desc",
            patient_id
        );

        let result: Vec<Payment> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        Ok(result)
    }
}

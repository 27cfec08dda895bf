// libs/appointment-cell/src/services/locks.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::AppointmentError;

const LOCK_TIMEOUT_SECONDS: i64 = 30;

/// Advisory locks over a `scheduling_locks` table. The table has a unique
/// constraint on `lock_key`, so only one process can hold a key at a time;
/// expired rows are swept before each acquisition attempt. The lock
/// narrows the booking race window - correctness is still guaranteed by
/// the compare-and-swap slot claim.
pub struct SchedulingLockService {
    postgrest: Arc<PostgrestClient>,
    process_id: String,
}

impl SchedulingLockService {
    pub fn new(postgrest: Arc<PostgrestClient>) -> Self {
        Self {
            postgrest,
            process_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn slot_lock_key(slot_id: Uuid) -> String {
        format!("slot:{}", slot_id)
    }

    pub async fn acquire(&self, lock_key: &str, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        debug!("Acquiring scheduling lock {}", lock_key);

        // Sweep expired locks so a crashed holder cannot block forever
        let sweep_path = format!(
            "/rest/v1/scheduling_locks?expires_at=lt.{}",
            urlencoding::encode(&Utc::now().to_rfc3339())
        );
        let _: Value = self.postgrest.request(
            Method::DELETE,
            &sweep_path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let now = Utc::now();
        let lock_data = json!({
            "id": Uuid::new_v4(),
            "lock_key": lock_key,
            "doctor_id": doctor_id,
            "acquired_at": now.to_rfc3339(),
            "expires_at": (now + Duration::seconds(LOCK_TIMEOUT_SECONDS)).to_rfc3339(),
            "process_id": self.process_id,
        });

        // The unique constraint on lock_key turns a race into a 409
        match self.postgrest.request::<Value>(
            Method::POST,
            "/rest/v1/scheduling_locks",
            None,
            Some(lock_data),
        ).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                if message.starts_with("Conflict") {
                    warn!("Scheduling lock {} is held elsewhere", lock_key);
                    Ok(false)
                } else {
                    Err(AppointmentError::DatabaseError(message))
                }
            }
        }
    }

    pub async fn release(&self, lock_key: &str) -> Result<(), AppointmentError> {
        debug!("Releasing scheduling lock {}", lock_key);

        let path = format!(
            "/rest/v1/scheduling_locks?lock_key=eq.{}&process_id=eq.{}",
            urlencoding::encode(lock_key),
            self.process_id
        );
        let _: Value = self.postgrest.request(
            Method::DELETE,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

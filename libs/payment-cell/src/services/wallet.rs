// libs/payment-cell/src/services/wallet.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{PaymentError, WalletTransaction, WalletTransactionKind};

const MAX_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct BalanceRow {
    wallet_balance_cents: i64,
}

/// Wallet balance mutations. Every change is a compare-and-swap on the
/// previous balance (the update filters on `wallet_balance_cents`), so a
/// concurrent spend cannot overdraw or lose an update; each successful
/// mutation appends one ledger entry with the post-mutation balance.
pub struct WalletService {
    postgrest: Arc<PostgrestClient>,
}

impl WalletService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            postgrest: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub fn with_client(postgrest: Arc<PostgrestClient>) -> Self {
        Self { postgrest }
    }

    pub async fn get_balance(&self, user_id: Uuid) -> Result<i64, PaymentError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&select=wallet_balance_cents&limit=1",
            user_id
        );

        let result: Vec<BalanceRow> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        result.into_iter().next()
            .map(|row| row.wallet_balance_cents)
            .ok_or(PaymentError::UserNotFound)
    }

    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        description: String,
        appointment_id: Option<Uuid>,
    ) -> Result<WalletTransaction, PaymentError> {
        self.mutate_balance(
            user_id,
            amount_cents,
            WalletTransactionKind::Deposit,
            description,
            appointment_id,
        ).await
    }

    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        description: String,
        appointment_id: Option<Uuid>,
    ) -> Result<WalletTransaction, PaymentError> {
        self.mutate_balance(
            user_id,
            amount_cents,
            WalletTransactionKind::Withdraw,
            description,
            appointment_id,
        ).await
    }

    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: Option<i32>,
    ) -> Result<Vec<WalletTransaction>, PaymentError> {
        let mut path = format!(
            "/rest/v1/wallet_transactions?user_id=eq.{}&order=created_at.desc",
            user_id
        );
        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }

        let result: Vec<WalletTransaction> = self.postgrest.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        Ok(result)
    }

    async fn mutate_balance(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        kind: WalletTransactionKind,
        description: String,
        appointment_id: Option<Uuid>,
    ) -> Result<WalletTransaction, PaymentError> {
        if amount_cents <= 0 {
            return Err(PaymentError::InvalidAmount);
        }

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            let current = self.get_balance(user_id).await?;

            let new_balance = match kind {
                WalletTransactionKind::Deposit => current + amount_cents,
                WalletTransactionKind::Withdraw => {
                    if current < amount_cents {
                        return Err(PaymentError::InsufficientFunds);
                    }
                    current - amount_cents
                }
            };

            // CAS: the filter on the old balance makes a concurrent update
            // come back as an empty representation
            let path = format!(
                "/rest/v1/users?id=eq.{}&wallet_balance_cents=eq.{}",
                user_id, current
            );
            let updated: Vec<BalanceRow> = self.postgrest.request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(json!({
                    "wallet_balance_cents": new_balance,
                    "updated_at": Utc::now().to_rfc3339(),
                })),
                Some(PostgrestClient::representation_headers()),
            ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

            if updated.is_empty() {
                warn!(
                    "Wallet CAS lost for user {} (attempt {}/{})",
                    user_id, attempt, MAX_RETRY_ATTEMPTS
                );
                tokio::time::sleep(std::time::Duration::from_millis(50 * attempt as u64)).await;
                continue;
            }

            let entry = self.append_ledger_entry(
                user_id,
                kind,
                amount_cents,
                new_balance,
                description,
                appointment_id,
            ).await?;

            info!(
                "Wallet {} of {} cents for user {} (balance now {})",
                kind_label(kind), amount_cents, user_id, new_balance
            );
            return Ok(entry);
        }

        Err(PaymentError::ConcurrentUpdate)
    }

    async fn append_ledger_entry(
        &self,
        user_id: Uuid,
        kind: WalletTransactionKind,
        amount_cents: i64,
        balance_after_cents: i64,
        description: String,
        appointment_id: Option<Uuid>,
    ) -> Result<WalletTransaction, PaymentError> {
        debug!("Appending ledger entry for user {}", user_id);

        let entry_data = json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "kind": kind,
            "amount_cents": amount_cents,
            "description": description,
            "balance_after_cents": balance_after_cents,
            "appointment_id": appointment_id,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<WalletTransaction> = self.postgrest.request_with_headers(
            Method::POST,
            "/rest/v1/wallet_transactions",
            None,
            Some(entry_data),
            Some(PostgrestClient::representation_headers()),
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        result.into_iter().next()
            .ok_or_else(|| PaymentError::DatabaseError("Failed to record ledger entry".to_string()))
    }
}

fn kind_label(kind: WalletTransactionKind) -> &'static str {
    match kind {
        WalletTransactionKind::Deposit => "deposit",
        WalletTransactionKind::Withdraw => "withdrawal",
    }
}

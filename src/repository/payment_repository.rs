use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::error::ErrorKind;
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{BookingStatus, CallbackOutcome, NewPaymentIntent, PaymentIntent, PaymentIntentStatus},
    error::{AppError, Result},
    repository::PaymentIntentRepository,
};

#[derive(FromRow)]
struct PaymentIntentRow {
    id: String,
    booking_id: String,
    amount_cents: i64,
    txn_ref: String,
    status: String,
    failure_reason: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const INTENT_COLUMNS: &str =
    "id, booking_id, amount_cents, txn_ref, status, failure_reason, created_at, updated_at";

pub struct SqlitePaymentIntentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentIntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_status(s: &str) -> Result<PaymentIntentStatus> {
        match s {
            "Pending" => Ok(PaymentIntentStatus::Pending),
            "Success" => Ok(PaymentIntentStatus::Success),
            "Failed" => Ok(PaymentIntentStatus::Failed),
            _ => Err(AppError::Database(format!("Invalid payment intent status: {}", s))),
        }
    }

    fn row_to_intent(row: PaymentIntentRow) -> Result<PaymentIntent> {
        Ok(PaymentIntent {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            booking_id: Uuid::parse_str(&row.booking_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            amount_cents: row.amount_cents,
            txn_ref: row.txn_ref,
            status: Self::parse_status(&row.status)?,
            failure_reason: row.failure_reason,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .map(|db| db.kind() == ErrorKind::UniqueViolation)
            .unwrap_or(false)
    }
}

#[async_trait]
impl PaymentIntentRepository for SqlitePaymentIntentRepository {
    async fn create(&self, intent: NewPaymentIntent) -> Result<PaymentIntent> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                id, booking_id, amount_cents, txn_ref, status,
                failure_reason, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(intent.booking_id.to_string())
        .bind(intent.amount_cents)
        .bind(&intent.txn_ref)
        .bind(PaymentIntentStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                AppError::Conflict("Transaction reference already exists".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        let row = sqlx::query_as::<_, PaymentIntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE id = ?",
            INTENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Self::row_to_intent(row)
    }

    async fn find_by_txn_ref(&self, txn_ref: &str) -> Result<Option<PaymentIntent>> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE txn_ref = ?",
            INTENT_COLUMNS
        ))
        .bind(txn_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_intent(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<PaymentIntent>> {
        let rows = sqlx::query_as::<_, PaymentIntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE booking_id = ? ORDER BY created_at DESC",
            INTENT_COLUMNS
        ))
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_intent).collect()
    }

    async fn finalize_success(&self, txn_ref: &str) -> Result<CallbackOutcome> {
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        // The terminal-state guard is the sole idempotency gate: a replayed
        // callback loses this update and reports AlreadyFinalized.
        let result = sqlx::query(
            "UPDATE payment_intents SET status = ?, updated_at = ? WHERE txn_ref = ? AND status = ?"
        )
        .bind(PaymentIntentStatus::Success.as_str())
        .bind(now)
        .bind(txn_ref)
        .bind(PaymentIntentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Query through the open transaction; fetching from the pool
            // here could deadlock on a small pool.
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM payment_intents WHERE txn_ref = ?"
            )
            .bind(txn_ref)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            return if exists == 0 {
                Err(AppError::NotFound("Payment intent not found".to_string()))
            } else {
                Ok(CallbackOutcome::AlreadyFinalized)
            };
        }

        let booking_id = sqlx::query_scalar::<_, String>(
            "SELECT booking_id FROM payment_intents WHERE txn_ref = ?"
        )
        .bind(txn_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let confirmed = sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?"
        )
        .bind(BookingStatus::Confirmed.as_str())
        .bind(now)
        .bind(&booking_id)
        .bind(BookingStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if confirmed.rows_affected() == 0 {
            // A booking confirmed out of band is consistent with a
            // successful payment; anything else aborts the whole unit and
            // leaves the intent Pending.
            let status = sqlx::query_scalar::<_, String>(
                "SELECT status FROM bookings WHERE id = ?"
            )
            .bind(&booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            match status.as_deref() {
                Some("Confirmed") => {}
                Some(other) => {
                    return Err(AppError::InvalidStateTransition(format!(
                        "Cannot confirm booking in status {}",
                        other
                    )));
                }
                None => {
                    return Err(AppError::NotFound("Booking not found".to_string()));
                }
            }
        }

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(CallbackOutcome::Confirmed)
    }

    async fn finalize_failure(&self, txn_ref: &str, reason: &str) -> Result<CallbackOutcome> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = ?, failure_reason = ?, updated_at = ?
            WHERE txn_ref = ? AND status = ?
            "#
        )
        .bind(PaymentIntentStatus::Failed.as_str())
        .bind(reason)
        .bind(now)
        .bind(txn_ref)
        .bind(PaymentIntentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.find_by_txn_ref(txn_ref).await? {
                None => Err(AppError::NotFound("Payment intent not found".to_string())),
                Some(_) => Ok(CallbackOutcome::AlreadyFinalized),
            };
        }

        Ok(CallbackOutcome::Failed { reason: reason.to_string() })
    }
}

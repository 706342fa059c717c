use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::{
    domain::{BookingStatus, CallbackOutcome, NewPaymentIntent, PaymentIntent},
    error::{AppError, Result},
    gateway::{GatewayCallbackVerifier, GatewayRedirect, GatewayRequestBuilder},
    repository::{BookingRepository, PaymentIntentRepository},
};

/// Minimum entropy bar for the gateway transaction reference; collisions
/// are detected through the unique column and regenerated.
const TXN_REF_LEN: usize = 8;
const MAX_TXN_REF_ATTEMPTS: u32 = 5;

pub struct PaymentService {
    bookings: Arc<dyn BookingRepository>,
    intents: Arc<dyn PaymentIntentRepository>,
    request_builder: GatewayRequestBuilder,
    verifier: GatewayCallbackVerifier,
}

impl PaymentService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        intents: Arc<dyn PaymentIntentRepository>,
        request_builder: GatewayRequestBuilder,
        verifier: GatewayCallbackVerifier,
    ) -> Self {
        Self { bookings, intents, request_builder, verifier }
    }

    /// Opens a Pending intent for a booking and builds the signed redirect
    /// the user is sent to. The amount offered by the caller must equal
    /// the booking total; on mismatch nothing is persisted.
    pub async fn open_intent(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        client_ip: &str,
    ) -> Result<(PaymentIntent, GatewayRedirect)> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.status != BookingStatus::Pending {
            return Err(AppError::InvalidStateTransition(
                "Only pending bookings can be paid".to_string(),
            ));
        }

        if amount_cents != booking.total_price_cents {
            return Err(AppError::AmountMismatch);
        }

        for _ in 0..MAX_TXN_REF_ATTEMPTS {
            let txn_ref = generate_txn_ref();
            match self
                .intents
                .create(NewPaymentIntent {
                    booking_id,
                    amount_cents,
                    txn_ref,
                })
                .await
            {
                Ok(intent) => {
                    let redirect =
                        self.request_builder.build(&booking, &intent.txn_ref, client_ip, Utc::now());
                    tracing::info!(
                        booking_id = %booking_id,
                        txn_ref = %intent.txn_ref,
                        amount_cents,
                        "payment intent opened"
                    );
                    return Ok((intent, redirect));
                }
                Err(AppError::Conflict(_)) => {
                    tracing::debug!("transaction reference collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(
            "Could not allocate a unique transaction reference".to_string(),
        ))
    }

    /// Authenticates an inbound gateway callback and applies its outcome
    /// exactly once. Replays and out-of-order deliveries fall out as
    /// `AlreadyFinalized`; a bad signature mutates nothing.
    pub async fn handle_callback(
        &self,
        query: &HashMap<String, String>,
    ) -> Result<CallbackOutcome> {
        let callback = self.verifier.verify(query)?;

        if callback.is_success() {
            self.apply_success(&callback.txn_ref).await
        } else {
            self.apply_failure(&callback.txn_ref, &callback.response_code).await
        }
    }

    pub async fn apply_success(&self, txn_ref: &str) -> Result<CallbackOutcome> {
        let outcome = self.intents.finalize_success(txn_ref).await?;
        match &outcome {
            CallbackOutcome::Confirmed => {
                tracing::info!(txn_ref, "payment succeeded, booking confirmed");
            }
            CallbackOutcome::AlreadyFinalized => {
                tracing::info!(txn_ref, "duplicate success callback ignored");
            }
            CallbackOutcome::Failed { .. } => {}
        }
        Ok(outcome)
    }

    /// A failed payment leaves the booking Pending so the user can retry
    /// with a new intent; cancelling is not an automatic side effect.
    pub async fn apply_failure(&self, txn_ref: &str, reason: &str) -> Result<CallbackOutcome> {
        let outcome = self.intents.finalize_failure(txn_ref, reason).await?;
        match &outcome {
            CallbackOutcome::Failed { reason } => {
                tracing::info!(txn_ref, reason = %reason, "payment failed");
            }
            CallbackOutcome::AlreadyFinalized => {
                tracing::info!(txn_ref, "duplicate failure callback ignored");
            }
            CallbackOutcome::Confirmed => {}
        }
        Ok(outcome)
    }

    pub async fn find_by_txn_ref(&self, txn_ref: &str) -> Result<Option<PaymentIntent>> {
        self.intents.find_by_txn_ref(txn_ref).await
    }

    pub async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<PaymentIntent>> {
        self.intents.list_by_booking(booking_id).await
    }
}

fn generate_txn_ref() -> String {
    let mut rng = rand::thread_rng();
    (0..TXN_REF_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

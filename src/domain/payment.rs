use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt to pay for a booking, correlated with the gateway via
/// `txn_ref`. Success and Failed are terminal; a later callback for a
/// terminal intent is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub txn_ref: String,
    pub status: PaymentIntentStatus,
    /// Gateway response code, recorded on failure.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentIntentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::Pending => "Pending",
            PaymentIntentStatus::Success => "Success",
            PaymentIntentStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentIntentStatus::Pending)
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub txn_ref: String,
}

/// Result of applying an authenticated gateway callback. A duplicate
/// delivery is reported, not surfaced as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Intent moved to Success and the booking was confirmed.
    Confirmed,
    /// Intent moved to Failed; the booking stays Pending for retry.
    Failed { reason: String },
    /// The intent was already terminal; nothing changed.
    AlreadyFinalized,
}

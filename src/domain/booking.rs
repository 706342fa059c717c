use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Booking lifecycle: Pending -> Confirmed, Pending -> Cancelled,
/// Confirmed -> Cancelled. Nothing transitions out of Cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passenger_count: i64,
    /// Flight price x passenger count, fixed at creation.
    pub total_price_cents: i64,
    pub status: BookingStatus,
    /// Set in the same transaction as the seat release so a replayed
    /// cancellation cannot release twice.
    pub seats_released: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    /// Caller-supplied label; not validated against any seat map.
    pub seat_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PassengerInfo {
    #[validate(length(min = 1, message = "Passenger name is required"))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Passenger phone is required"))]
    pub phone: String,
    pub seat_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub flight_id: Uuid,
    #[validate(length(min = 1, message = "A booking needs at least one passenger"))]
    #[validate(nested)]
    pub passengers: Vec<PassengerInfo>,
}

/// Repository input for the creation unit of work; the total has already
/// been computed from the flight price and is immutable afterwards.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub total_price_cents: i64,
    pub passengers: Vec<PassengerInfo>,
}

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod flight_repository;
pub mod booking_repository;
pub mod payment_repository;

pub use flight_repository::SqliteFlightRepository;
pub use booking_repository::SqliteBookingRepository;
pub use payment_repository::SqlitePaymentIntentRepository;

/// Flight persistence plus the seat-inventory operations. Seats are a
/// fungible counter on the flight row; reserve/release are the only two
/// ways it moves, and both happen in a single guarded statement so
/// concurrent adjustments on the same flight are serialized by the
/// database, not in application memory.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn create(&self, flight: NewFlight) -> Result<Flight>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Flight>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Flight>>;
    /// Atomically decrements the counter; fails with `InsufficientSeats`
    /// when fewer than `count` seats remain. Returns the new count.
    async fn reserve_seats(&self, id: Uuid, count: i64) -> Result<i64>;
    /// Atomically increments the counter. The caller guarantees `count`
    /// matches what the corresponding booking reserved.
    async fn release_seats(&self, id: Uuid, count: i64) -> Result<i64>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Creation unit of work: seat reservation, booking row, and passenger
    /// rows commit together or not at all.
    async fn create(&self, booking: NewBooking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_passengers(&self, booking_id: Uuid) -> Result<Vec<Passenger>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;
    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>>;
    /// Pending -> Confirmed, guarded on the current status. Seats were
    /// committed at creation and are not touched.
    async fn confirm(&self, id: Uuid) -> Result<Booking>;
    /// Pending|Confirmed -> Cancelled plus the seat release, one
    /// transaction. Release is keyed by the booking's `seats_released`
    /// flag so it applies at most once.
    async fn cancel(&self, id: Uuid) -> Result<Booking>;
}

#[async_trait]
pub trait PaymentIntentRepository: Send + Sync {
    /// Persists a Pending intent. A `txn_ref` collision surfaces as
    /// `Conflict` so the caller can regenerate instead of overwriting.
    async fn create(&self, intent: NewPaymentIntent) -> Result<PaymentIntent>;
    async fn find_by_txn_ref(&self, txn_ref: &str) -> Result<Option<PaymentIntent>>;
    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<PaymentIntent>>;
    /// Pending -> Success and the owning booking's confirmation, one
    /// transaction. A terminal intent reports `AlreadyFinalized` without
    /// touching anything.
    async fn finalize_success(&self, txn_ref: &str) -> Result<CallbackOutcome>;
    /// Pending -> Failed, recording the gateway code. The booking stays
    /// Pending; retrying with a fresh intent is the caller's decision.
    async fn finalize_failure(&self, txn_ref: &str, reason: &str) -> Result<CallbackOutcome>;
}

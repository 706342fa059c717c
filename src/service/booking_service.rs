use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{Booking, BookingStatus, CreateBookingRequest, NewBooking, Passenger},
    error::{AppError, Result},
    repository::{BookingRepository, FlightRepository},
};

/// The booking lifecycle. This is the only component that mutates booking
/// status, and the only caller of the seat-inventory adjustments.
pub struct BookingService {
    flights: Arc<dyn FlightRepository>,
    bookings: Arc<dyn BookingRepository>,
}

impl BookingService {
    pub fn new(flights: Arc<dyn FlightRepository>, bookings: Arc<dyn BookingRepository>) -> Self {
        Self { flights, bookings }
    }

    /// Creates a booking in Pending with its passengers, reserving seats
    /// as part of the same unit of work. The total price is computed here,
    /// once, and never changes afterwards.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<(Booking, Vec<Passenger>)> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let flight = self
            .flights
            .find_by_id(request.flight_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Flight not found".to_string()))?;

        let total_price_cents = flight.price_cents * request.passengers.len() as i64;

        let booking = self
            .bookings
            .create(NewBooking {
                user_id: request.user_id,
                flight_id: request.flight_id,
                total_price_cents,
                passengers: request.passengers,
            })
            .await?;

        tracing::info!(
            booking_id = %booking.id,
            flight_id = %booking.flight_id,
            passengers = booking.passenger_count,
            "booking created"
        );

        let passengers = self.bookings.list_passengers(booking.id).await?;
        Ok((booking, passengers))
    }

    /// Invoked by the payment path only; seats were committed at creation.
    pub async fn confirm_booking(&self, id: Uuid) -> Result<Booking> {
        let booking = self.bookings.confirm(id).await?;
        tracing::info!(booking_id = %booking.id, "booking confirmed");
        Ok(booking)
    }

    pub async fn cancel_booking(&self, id: Uuid) -> Result<Booking> {
        let booking = self.bookings.cancel(id).await?;
        tracing::info!(
            booking_id = %booking.id,
            seats = booking.passenger_count,
            "booking cancelled, seats released"
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<(Booking, Vec<Passenger>)> {
        let booking = self
            .bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        let passengers = self.bookings.list_passengers(id).await?;
        Ok((booking, passengers))
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        self.bookings.list_by_user(user_id).await
    }

    pub async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        self.bookings.list_by_status(status).await
    }
}

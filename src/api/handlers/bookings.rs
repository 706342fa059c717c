use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Booking, BookingStatus, CreateBookingRequest, Passenger},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct PassengerDto {
    full_name: String,
    email: String,
    phone: String,
    seat_number: Option<String>,
}

impl From<Passenger> for PassengerDto {
    fn from(passenger: Passenger) -> Self {
        Self {
            full_name: passenger.full_name,
            email: passenger.email,
            phone: passenger.phone,
            seat_number: passenger.seat_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingDto {
    id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    passenger_count: i64,
    total_price_cents: i64,
    status: BookingStatus,
    created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    passengers: Vec<PassengerDto>,
}

impl BookingDto {
    fn from_parts(booking: Booking, passengers: Vec<Passenger>) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            flight_id: booking.flight_id,
            passenger_count: booking.passenger_count,
            total_price_cents: booking.total_price_cents,
            status: booking.status,
            created_at: booking.created_at.to_rfc3339(),
            passengers: passengers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self::from_parts(booking, Vec::new())
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    let (booking, passengers) = state.service_context.booking_service
        .create_booking(request)
        .await?;

    Ok((StatusCode::CREATED, Json(BookingDto::from_parts(booking, passengers))))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let (booking, passengers) = state.service_context.booking_service
        .get_booking(id)
        .await?;

    Ok(Json(BookingDto::from_parts(booking, passengers)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<BookingDto>,
    total: usize,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let bookings = state.service_context.booking_service
        .list_by_user(params.user_id)
        .await?;

    let total = bookings.len();
    let bookings: Vec<BookingDto> = bookings.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { bookings, total }))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state.service_context.booking_service
        .cancel_booking(id)
        .await?;

    Ok(Json(booking.into()))
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::Flight,
    error::{AppError, Result},
};

const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Pins caller-supplied pagination to a sane range. A negative limit
/// would read as "no limit" once bound into SQLite.
fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_LIMIT), offset.max(0))
}

#[derive(Debug, Serialize)]
pub struct FlightDto {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: String,
    arrival_time: String,
    price_cents: i64,
    available_seats: i64,
}

impl From<Flight> for FlightDto {
    fn from(flight: Flight) -> Self {
        Self {
            id: flight.id,
            flight_number: flight.flight_number,
            origin: flight.origin,
            destination: flight.destination,
            departure_time: flight.departure_time.to_rfc3339(),
            arrival_time: flight.arrival_time.to_rfc3339(),
            price_cents: flight.price_cents,
            available_seats: flight.available_seats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    flights: Vec<FlightDto>,
    total: usize,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let (limit, offset) = clamp_page(params.limit, params.offset);
    let flights = state.service_context.flight_repo
        .list(limit, offset)
        .await?;

    let total = flights.len();
    let flights: Vec<FlightDto> = flights.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { flights, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FlightDto>> {
    let flight = state.service_context.flight_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Flight not found".to_string()))?;

    Ok(Json(flight.into()))
}

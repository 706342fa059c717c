use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Flight, NewFlight},
    error::{AppError, Result},
    repository::FlightRepository,
};

#[derive(FromRow)]
struct FlightRow {
    id: String,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: NaiveDateTime,
    arrival_time: NaiveDateTime,
    price_cents: i64,
    available_seats: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteFlightRepository {
    pool: SqlitePool,
}

impl SqliteFlightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_flight(row: FlightRow) -> Result<Flight> {
        Ok(Flight {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_time: DateTime::from_naive_utc_and_offset(row.departure_time, Utc),
            arrival_time: DateTime::from_naive_utc_and_offset(row.arrival_time, Utc),
            price_cents: row.price_cents,
            available_seats: row.available_seats,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn current_seats(&self, id_str: &str) -> Result<Option<i64>> {
        let seats = sqlx::query_scalar::<_, i64>(
            "SELECT available_seats FROM flights WHERE id = ?"
        )
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(seats)
    }
}

#[async_trait]
impl FlightRepository for SqliteFlightRepository {
    async fn create(&self, flight: NewFlight) -> Result<Flight> {
        if flight.available_seats < 0 {
            return Err(AppError::Validation("Available seats cannot be negative".to_string()));
        }
        if flight.arrival_time <= flight.departure_time {
            return Err(AppError::Validation("Arrival time must be after departure time".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO flights (
                id, flight_number, origin, destination,
                departure_time, arrival_time, price_cents, available_seats,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&flight.flight_number)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(flight.departure_time.naive_utc())
        .bind(flight.arrival_time.naive_utc())
        .bind(flight.price_cents)
        .bind(flight.available_seats)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created flight".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, flight_number, origin, destination,
                   departure_time, arrival_time, price_cents, available_seats,
                   created_at, updated_at
            FROM flights
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_flight(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, flight_number, origin, destination,
                   departure_time, arrival_time, price_cents, available_seats,
                   created_at, updated_at
            FROM flights
            ORDER BY departure_time ASC
            LIMIT ? OFFSET ?
            "#
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_flight).collect()
    }

    async fn reserve_seats(&self, id: Uuid, count: i64) -> Result<i64> {
        if count < 1 {
            return Err(AppError::Validation("Seat count must be at least 1".to_string()));
        }

        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        // The sufficiency check and the decrement are one statement, so
        // two racing reservations can never jointly overdraw the counter.
        let result = sqlx::query(
            r#"
            UPDATE flights
            SET available_seats = available_seats - ?,
                updated_at = ?
            WHERE id = ? AND available_seats >= ?
            "#
        )
        .bind(count)
        .bind(now)
        .bind(&id_str)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.current_seats(&id_str).await? {
                None => Err(AppError::NotFound("Flight not found".to_string())),
                Some(available) => Err(AppError::InsufficientSeats { requested: count, available }),
            };
        }

        self.current_seats(&id_str).await?.ok_or_else(|| {
            AppError::Database("Flight disappeared after reservation".to_string())
        })
    }

    async fn release_seats(&self, id: Uuid, count: i64) -> Result<i64> {
        if count < 1 {
            return Err(AppError::Validation("Seat count must be at least 1".to_string()));
        }

        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE flights
            SET available_seats = available_seats + ?,
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(count)
        .bind(now)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Flight not found".to_string()));
        }

        self.current_seats(&id_str).await?.ok_or_else(|| {
            AppError::Database("Flight disappeared after release".to_string())
        })
    }
}

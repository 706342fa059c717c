use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, NewBooking, Passenger},
    error::{AppError, Result},
    repository::BookingRepository,
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    user_id: String,
    flight_id: String,
    passenger_count: i64,
    total_price_cents: i64,
    status: String,
    seats_released: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct PassengerRow {
    id: String,
    booking_id: String,
    full_name: String,
    email: String,
    phone: String,
    seat_number: Option<String>,
    created_at: NaiveDateTime,
}

const BOOKING_COLUMNS: &str =
    "id, user_id, flight_id, passenger_count, total_price_cents, status, seats_released, created_at, updated_at";

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_status(s: &str) -> Result<BookingStatus> {
        match s {
            "Pending" => Ok(BookingStatus::Pending),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
        }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            flight_id: Uuid::parse_str(&row.flight_id).map_err(|e| AppError::Database(e.to_string()))?,
            passenger_count: row.passenger_count,
            total_price_cents: row.total_price_cents,
            status: Self::parse_status(&row.status)?,
            seats_released: row.seats_released,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_passenger(row: PassengerRow) -> Result<Passenger> {
        Ok(Passenger {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            booking_id: Uuid::parse_str(&row.booking_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            seat_number: row.seat_number,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, booking: NewBooking) -> Result<Booking> {
        let passenger_count = booking.passengers.len() as i64;
        if passenger_count < 1 {
            return Err(AppError::Validation("A booking needs at least one passenger".to_string()));
        }

        let booking_id = Uuid::new_v4();
        let flight_id_str = booking.flight_id.to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        // Seat reservation and booking insertion commit as one unit; an
        // exhausted counter rolls everything back and no booking exists.
        let reserved = sqlx::query(
            r#"
            UPDATE flights
            SET available_seats = available_seats - ?,
                updated_at = ?
            WHERE id = ? AND available_seats >= ?
            "#
        )
        .bind(passenger_count)
        .bind(now)
        .bind(&flight_id_str)
        .bind(passenger_count)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if reserved.rows_affected() == 0 {
            let available = sqlx::query_scalar::<_, i64>(
                "SELECT available_seats FROM flights WHERE id = ?"
            )
            .bind(&flight_id_str)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            return match available {
                None => Err(AppError::NotFound("Flight not found".to_string())),
                Some(available) => Err(AppError::InsufficientSeats {
                    requested: passenger_count,
                    available,
                }),
            };
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, user_id, flight_id, passenger_count, total_price_cents,
                status, seats_released, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#
        )
        .bind(booking_id.to_string())
        .bind(booking.user_id.to_string())
        .bind(&flight_id_str)
        .bind(passenger_count)
        .bind(booking.total_price_cents)
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        for passenger in &booking.passengers {
            sqlx::query(
                r#"
                INSERT INTO booking_passengers (
                    id, booking_id, full_name, email, phone, seat_number, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(booking_id.to_string())
            .bind(&passenger.full_name)
            .bind(&passenger.email)
            .bind(&passenger.phone)
            .bind(&passenger.seat_number)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(booking_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn list_passengers(&self, booking_id: Uuid) -> Result<Vec<Passenger>> {
        let rows = sqlx::query_as::<_, PassengerRow>(
            r#"
            SELECT id, booking_id, full_name, email, phone, seat_number, created_at
            FROM booking_passengers
            WHERE booking_id = ?
            ORDER BY created_at ASC, id ASC
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_passenger).collect()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = ? ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE status = ? ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn confirm(&self, id: Uuid) -> Result<Booking> {
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        // Guarded on the current status: a racing writer loses the update
        // and falls through to the state check below.
        let result = sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?"
        )
        .bind(BookingStatus::Confirmed.as_str())
        .bind(now)
        .bind(&id_str)
        .bind(BookingStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(id).await? {
                None => Err(AppError::NotFound("Booking not found".to_string())),
                Some(booking) => Err(AppError::InvalidStateTransition(format!(
                    "Only pending bookings can be confirmed (current status: {})",
                    booking.status.as_str()
                ))),
            };
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve confirmed booking".to_string())
        })
    }

    async fn cancel(&self, id: Uuid) -> Result<Booking> {
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        // Status change and release marker flip together; the marker keeps
        // a replayed cancellation from releasing the same seats twice.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = ?, seats_released = 1, updated_at = ?
            WHERE id = ? AND status IN (?, ?) AND seats_released = 0
            "#
        )
        .bind(BookingStatus::Cancelled.as_str())
        .bind(now)
        .bind(&id_str)
        .bind(BookingStatus::Pending.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Query through the open transaction; fetching from the pool
            // here could deadlock on a small pool.
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM bookings WHERE id = ?"
            )
            .bind(&id_str)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            return if exists == 0 {
                Err(AppError::NotFound("Booking not found".to_string()))
            } else {
                Err(AppError::InvalidStateTransition(
                    "Booking is already cancelled".to_string(),
                ))
            };
        }

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(&id_str)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            "UPDATE flights SET available_seats = available_seats + ?, updated_at = ? WHERE id = ?"
        )
        .bind(row.passenger_count)
        .bind(now)
        .bind(&row.flight_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Self::row_to_booking(row)
    }
}

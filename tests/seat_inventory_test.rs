use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use skyfare::{
    domain::NewFlight,
    error::AppError,
    repository::{FlightRepository, SqliteFlightRepository},
};

async fn setup_pool() -> anyhow::Result<SqlitePool> {
    // One connection so every task shares the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

fn sample_flight(available_seats: i64, price_cents: i64) -> NewFlight {
    let departure = Utc::now() + Duration::days(7);
    NewFlight {
        flight_number: "SF100".to_string(),
        origin: "SGN".to_string(),
        destination: "HAN".to_string(),
        departure_time: departure,
        arrival_time: departure + Duration::hours(2),
        price_cents,
        available_seats,
    }
}

#[tokio::test]
async fn reserve_and_release_adjust_the_counter() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = SqliteFlightRepository::new(pool);
    let flight = repo.create(sample_flight(10, 10_000)).await?;

    assert_eq!(repo.reserve_seats(flight.id, 3).await?, 7);
    assert_eq!(repo.reserve_seats(flight.id, 7).await?, 0);
    assert_eq!(repo.release_seats(flight.id, 3).await?, 3);

    let flight = repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight.available_seats, 3);
    Ok(())
}

#[tokio::test]
async fn reserving_more_than_available_fails_without_mutation() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = SqliteFlightRepository::new(pool);
    let flight = repo.create(sample_flight(2, 10_000)).await?;

    let err = repo.reserve_seats(flight.id, 3).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientSeats { requested: 3, available: 2 }
    ));

    let flight = repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight.available_seats, 2);
    Ok(())
}

#[tokio::test]
async fn reserving_on_unknown_flight_is_not_found() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = SqliteFlightRepository::new(pool);

    let err = repo.reserve_seats(uuid::Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn no_overselling_under_contention() -> anyhow::Result<()> {
    // N concurrent single-seat reservations against N-1 seats: exactly
    // N-1 must succeed and exactly one must see InsufficientSeats.
    const N: usize = 8;

    let pool = setup_pool().await?;
    let repo = Arc::new(SqliteFlightRepository::new(pool));
    let flight = repo.create(sample_flight((N - 1) as i64, 10_000)).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let repo = repo.clone();
        let flight_id = flight.id;
        handles.push(tokio::spawn(async move {
            repo.reserve_seats(flight_id, 1).await
        }));
    }

    let mut successes = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(AppError::InsufficientSeats { .. }) => rejected += 1,
            Err(e) => return Err(e.into()),
        }
    }

    assert_eq!(successes, N - 1);
    assert_eq!(rejected, 1);

    let flight = repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight.available_seats, 0);
    Ok(())
}

#[tokio::test]
async fn counter_balances_at_quiescence() -> anyhow::Result<()> {
    // available = initial - sum(reserved) + sum(released)
    let pool = setup_pool().await?;
    let repo = Arc::new(SqliteFlightRepository::new(pool));
    let flight = repo.create(sample_flight(50, 10_000)).await?;

    let mut handles = Vec::new();
    for i in 0..10 {
        let repo = repo.clone();
        let flight_id = flight.id;
        handles.push(tokio::spawn(async move {
            repo.reserve_seats(flight_id, 2).await?;
            if i % 2 == 0 {
                repo.release_seats(flight_id, 2).await?;
            }
            Ok::<_, AppError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    // 10 x reserve(2) = 20 out, 5 x release(2) = 10 back.
    let flight = repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight.available_seats, 50 - 20 + 10);
    Ok(())
}

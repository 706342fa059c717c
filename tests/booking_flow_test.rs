use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use skyfare::{
    config::GatewaySettings,
    domain::{
        BookingStatus, CallbackOutcome, CreateBookingRequest, NewFlight, PassengerInfo,
        PaymentIntentStatus,
    },
    error::AppError,
    gateway::signing,
    repository::{BookingRepository, FlightRepository},
    service::ServiceContext,
};

const TEST_SECRET: &str = "test-secret";

async fn setup_context() -> anyhow::Result<ServiceContext> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let flight_repo = Arc::new(skyfare::repository::SqliteFlightRepository::new(pool.clone()));
    let booking_repo = Arc::new(skyfare::repository::SqliteBookingRepository::new(pool.clone()));
    let payment_repo =
        Arc::new(skyfare::repository::SqlitePaymentIntentRepository::new(pool.clone()));

    let gateway = GatewaySettings {
        merchant_code: "TESTCODE".to_string(),
        hash_secret: TEST_SECRET.to_string(),
        pay_url: "https://gateway.example/pay".to_string(),
        return_url: "http://localhost:8080/payment/result".to_string(),
        currency: "VND".to_string(),
        locale: "vn".to_string(),
        validity_minutes: 15,
    };

    Ok(ServiceContext::new(
        flight_repo,
        booking_repo,
        payment_repo,
        gateway,
        pool,
    ))
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

fn passenger(name: &str) -> PassengerInfo {
    PassengerInfo {
        full_name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: "+84901234567".to_string(),
        seat_number: None,
    }
}

/// Builds a gateway callback query the way the gateway would: signs its
/// own fields, then the transport-local extras ride on top unsigned.
fn gateway_callback(txn_ref: &str, response_code: &str, booking_id: Uuid) -> HashMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("vnp_TxnRef".to_string(), txn_ref.to_string());
    fields.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    fields.insert("vnp_TransactionNo".to_string(), "14422574".to_string());
    fields.insert("vnp_TmnCode".to_string(), "TESTCODE".to_string());
    let signature = signing::sign(&fields, TEST_SECRET);

    let mut query: HashMap<String, String> = fields.into_iter().collect();
    query.insert("vnp_SecureHash".to_string(), signature);
    query.insert("bookingId".to_string(), booking_id.to_string());
    query
}

#[tokio::test]
async fn booking_is_paid_confirmed_and_cancelled_end_to_end() -> anyhow::Result<()> {
    let ctx = setup_context().await?;
    let flight = ctx.flight_repo.create(sample_flight(2, 10_000)).await?;
    let user_id = Uuid::new_v4();

    // Book both seats.
    let (booking, passengers) = ctx
        .booking_service
        .create_booking(CreateBookingRequest {
            user_id,
            flight_id: flight.id,
            passengers: vec![passenger("Alice Nguyen"), passenger("Binh Tran")],
        })
        .await?;

    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.total_price_cents, 20_000);
    assert_eq!(passengers.len(), 2);
    let flight_now = ctx.flight_repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight_now.available_seats, 0);

    // Open a payment intent and get the signed redirect.
    let (intent, redirect) = ctx
        .payment_service
        .open_intent(booking.id, 20_000, "198.51.100.7")
        .await?;
    assert_eq!(intent.status, PaymentIntentStatus::Pending);
    assert_eq!(intent.txn_ref.len(), 8);
    assert!(redirect.url.starts_with("https://gateway.example/pay?"));
    assert!(redirect.url.contains("vnp_SecureHash="));

    // The gateway reports success.
    let query = gateway_callback(&intent.txn_ref, "00", booking.id);
    let outcome = ctx.payment_service.handle_callback(&query).await?;
    assert_eq!(outcome, CallbackOutcome::Confirmed);

    let booking_now = ctx.booking_repo.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking_now.status, BookingStatus::Confirmed);
    let intent_now = ctx.payment_service.find_by_txn_ref(&intent.txn_ref).await?.unwrap();
    assert_eq!(intent_now.status, PaymentIntentStatus::Success);

    // The gateway redelivers the same callback; nothing moves.
    let outcome = ctx.payment_service.handle_callback(&query).await?;
    assert_eq!(outcome, CallbackOutcome::AlreadyFinalized);
    let booking_now = ctx.booking_repo.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking_now.status, BookingStatus::Confirmed);
    let flight_now = ctx.flight_repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight_now.available_seats, 0);

    // The user cancels the confirmed booking; seats come back.
    let cancelled = ctx.booking_service.cancel_booking(booking.id).await?;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    let flight_now = ctx.flight_repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight_now.available_seats, 2);

    Ok(())
}

#[tokio::test]
async fn booking_fails_when_seats_run_out() -> anyhow::Result<()> {
    let ctx = setup_context().await?;
    let flight = ctx.flight_repo.create(sample_flight(1, 10_000)).await?;
    let user_id = Uuid::new_v4();

    let err = ctx
        .booking_service
        .create_booking(CreateBookingRequest {
            user_id,
            flight_id: flight.id,
            passengers: vec![passenger("Alice Nguyen"), passenger("Binh Tran")],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientSeats { .. }));

    // The whole unit of work rolled back: no booking, counter untouched.
    assert!(ctx.booking_service.list_by_user(user_id).await?.is_empty());
    let flight_now = ctx.flight_repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight_now.available_seats, 1);
    Ok(())
}

#[tokio::test]
async fn booking_requires_at_least_one_passenger() -> anyhow::Result<()> {
    let ctx = setup_context().await?;
    let flight = ctx.flight_repo.create(sample_flight(5, 10_000)).await?;

    let err = ctx
        .booking_service
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            flight_id: flight.id,
            passengers: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn cancelled_booking_cannot_be_confirmed() -> anyhow::Result<()> {
    let ctx = setup_context().await?;
    let flight = ctx.flight_repo.create(sample_flight(3, 10_000)).await?;

    let (booking, _) = ctx
        .booking_service
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            flight_id: flight.id,
            passengers: vec![passenger("Alice Nguyen")],
        })
        .await?;

    ctx.booking_service.cancel_booking(booking.id).await?;

    let err = ctx.booking_service.confirm_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
    Ok(())
}

#[tokio::test]
async fn cancelling_twice_releases_seats_only_once() -> anyhow::Result<()> {
    let ctx = setup_context().await?;
    let flight = ctx.flight_repo.create(sample_flight(3, 10_000)).await?;

    let (booking, _) = ctx
        .booking_service
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            flight_id: flight.id,
            passengers: vec![passenger("Alice Nguyen"), passenger("Binh Tran")],
        })
        .await?;
    let flight_now = ctx.flight_repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight_now.available_seats, 1);

    let cancelled = ctx.booking_service.cancel_booking(booking.id).await?;
    assert!(cancelled.seats_released);

    let err = ctx.booking_service.cancel_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    // Exactly one release: back to 3, not 5.
    let flight_now = ctx.flight_repo.find_by_id(flight.id).await?.unwrap();
    assert_eq!(flight_now.available_seats, 3);
    Ok(())
}

#[tokio::test]
async fn paying_a_cancelled_booking_is_rejected() -> anyhow::Result<()> {
    let ctx = setup_context().await?;
    let flight = ctx.flight_repo.create(sample_flight(3, 10_000)).await?;

    let (booking, _) = ctx
        .booking_service
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            flight_id: flight.id,
            passengers: vec![passenger("Alice Nguyen")],
        })
        .await?;
    ctx.booking_service.cancel_booking(booking.id).await?;

    let err = ctx
        .payment_service
        .open_intent(booking.id, 10_000, "198.51.100.7")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
    Ok(())
}

use clap::Parser;
use chrono::{Duration, Utc};
use fake::{Fake, faker::internet::en::SafeEmail, faker::name::en::Name, faker::phone_number::en::PhoneNumber};
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use skyfare::{
    domain::{CreateBookingRequest, NewFlight, PassengerInfo},
    repository::{
        FlightRepository, SqliteBookingRepository, SqliteFlightRepository,
        SqlitePaymentIntentRepository,
    },
    service::ServiceContext,
};

#[derive(Parser)]
#[command(about = "Seed the Skyfare database with sample flights")]
struct Args {
    #[arg(long, default_value = "sqlite:skyfare.db")]
    database_url: String,

    /// Number of flights to create
    #[arg(long, default_value_t = 8)]
    flights: usize,

    /// Also create a demo booking on the first flight
    #[arg(long)]
    demo_booking: bool,
}

const ROUTES: &[(&str, &str)] = &[
    ("SGN", "HAN"),
    ("SGN", "DAD"),
    ("HAN", "DAD"),
    ("SGN", "PQC"),
    ("HAN", "CXR"),
    ("DAD", "PQC"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let flight_repo = SqliteFlightRepository::new(db_pool.clone());
    let mut rng = rand::thread_rng();

    println!("✈️  Creating {} flights...", args.flights);
    let mut first_flight_id = None;
    for i in 0..args.flights {
        let (origin, destination) = ROUTES[i % ROUTES.len()];
        let departure = Utc::now()
            + Duration::days(rng.gen_range(1..30))
            + Duration::hours(rng.gen_range(0..24));
        let duration = Duration::minutes(rng.gen_range(60..180));

        let flight = flight_repo.create(NewFlight {
            flight_number: format!("SF{:03}", 100 + i),
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_time: departure,
            arrival_time: departure + duration,
            price_cents: rng.gen_range(50..300) * 1000,
            available_seats: rng.gen_range(80..200),
        })
        .await?;

        if first_flight_id.is_none() {
            first_flight_id = Some(flight.id);
        }
        println!("  ✅ {} {} -> {} ({} seats)", flight.flight_number, flight.origin, flight.destination, flight.available_seats);
    }

    if args.demo_booking {
        let flight_id = first_flight_id.expect("at least one flight was seeded");

        let booking_repo = std::sync::Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo = std::sync::Arc::new(SqlitePaymentIntentRepository::new(db_pool.clone()));
        let context = ServiceContext::new(
            std::sync::Arc::new(SqliteFlightRepository::new(db_pool.clone())),
            booking_repo,
            payment_repo,
            skyfare::config::GatewaySettings::default(),
            db_pool.clone(),
        );

        println!("🧳 Creating demo booking...");
        let passengers = (0..2)
            .map(|_| PassengerInfo {
                full_name: Name().fake(),
                email: SafeEmail().fake(),
                phone: PhoneNumber().fake(),
                seat_number: None,
            })
            .collect();

        let (booking, _) = context
            .booking_service
            .create_booking(CreateBookingRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers,
            })
            .await?;

        println!("  ✅ Booking {} ({} passengers, total {} cents)", booking.id, booking.passenger_count, booking.total_price_cents);
    }

    println!("✨ Seeding complete!");

    Ok(())
}

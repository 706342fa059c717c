use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skyfare::{
    api,
    config::Settings,
    repository::{SqliteBookingRepository, SqliteFlightRepository, SqlitePaymentIntentRepository},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyfare=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration. No silent fallback: the gateway secret has no
    // usable default, and starting without one would leave callback
    // authentication wide open.
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            anyhow::bail!("configuration error: {e}");
        }
    };
    if !settings.gateway.has_usable_secret() {
        anyhow::bail!("gateway.hash_secret is unset or still the placeholder; refusing to start");
    }

    tracing::info!("Starting Skyfare server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize repositories
    let flight_repo = Arc::new(SqliteFlightRepository::new(db_pool.clone()));
    let booking_repo = Arc::new(SqliteBookingRepository::new(db_pool.clone()));
    let payment_repo = Arc::new(SqlitePaymentIntentRepository::new(db_pool.clone()));

    // Create service context; the gateway secret is injected here once
    // and stays immutable for the life of the process
    let service_context = Arc::new(ServiceContext::new(
        flight_repo,
        booking_repo,
        payment_repo,
        settings.gateway.clone(),
        db_pool.clone(),
    ));

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}

pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // API routes
        .nest("/api", api_routes())

        // Gateway return endpoint; the gateway authenticates through the
        // callback signature, not through any session
        .route("/payment/result", get(handlers::payments::callback))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/flights", get(handlers::flights::list))
        .route("/flights/:id", get(handlers::flights::get))
        .route("/bookings", post(handlers::bookings::create))
        .route("/bookings", get(handlers::bookings::list))
        .route("/bookings/:id", get(handlers::bookings::get))
        .route("/bookings/:id/cancel", post(handlers::bookings::cancel))
        .route("/payments", post(handlers::payments::create))
        .route("/payments/:booking_id", get(handlers::payments::list_by_booking))
}

use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Skyfare API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Flight booking and payment reconciliation service",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "flights": "/api/flights",
            "bookings": "/api/bookings",
            "payments": "/api/payments"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

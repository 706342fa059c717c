pub mod booking_service;
pub mod payment_service;

use std::sync::Arc;
use sqlx::SqlitePool;

use crate::config::GatewaySettings;
use crate::gateway::{GatewayCallbackVerifier, GatewayRequestBuilder};
use crate::repository::*;

pub use booking_service::BookingService;
pub use payment_service::PaymentService;

pub struct ServiceContext {
    pub flight_repo: Arc<dyn FlightRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentIntentRepository>,
    pub booking_service: Arc<BookingService>,
    pub payment_service: Arc<PaymentService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        flight_repo: Arc<dyn FlightRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        payment_repo: Arc<dyn PaymentIntentRepository>,
        gateway: GatewaySettings,
        db_pool: SqlitePool,
    ) -> Self {
        let booking_service = Arc::new(BookingService::new(
            flight_repo.clone(),
            booking_repo.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            booking_repo.clone(),
            payment_repo.clone(),
            GatewayRequestBuilder::new(gateway.clone()),
            GatewayCallbackVerifier::new(gateway),
        ));

        Self {
            flight_repo,
            booking_repo,
            payment_repo,
            booking_service,
            payment_service,
            db_pool,
        }
    }
}

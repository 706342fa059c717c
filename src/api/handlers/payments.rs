use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{CallbackOutcome, PaymentIntent, PaymentIntentStatus},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentDto {
    pub booking_id: Uuid,
    pub amount_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentCreatedDto {
    payment_id: Uuid,
    txn_ref: String,
    amount_cents: i64,
    payment_url: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentDto {
    id: Uuid,
    booking_id: Uuid,
    amount_cents: i64,
    txn_ref: String,
    status: PaymentIntentStatus,
    failure_reason: Option<String>,
    created_at: String,
}

impl From<PaymentIntent> for PaymentIntentDto {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            booking_id: intent.booking_id,
            amount_cents: intent.amount_cents,
            txn_ref: intent.txn_ref,
            status: intent.status,
            failure_reason: intent.failure_reason,
            created_at: intent.created_at.to_rfc3339(),
        }
    }
}

/// Opens a payment intent and returns the signed gateway redirect.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentDto>,
) -> Result<(StatusCode, Json<PaymentCreatedDto>)> {
    let ip = client_ip(&headers);
    let (intent, redirect) = state.service_context.payment_service
        .open_intent(request.booking_id, request.amount_cents, &ip)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentCreatedDto {
            payment_id: intent.id,
            txn_ref: intent.txn_ref,
            amount_cents: intent.amount_cents,
            payment_url: redirect.url,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// The gateway's return endpoint. Authentication is the signature over
/// the query parameters; duplicates acknowledge as applied so the gateway
/// stops retrying.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<CallbackAck>> {
    let outcome = state.service_context.payment_service
        .handle_callback(&query)
        .await?;

    let ack = match outcome {
        CallbackOutcome::Confirmed => CallbackAck { status: "confirmed", reason: None },
        CallbackOutcome::Failed { reason } => CallbackAck { status: "failed", reason: Some(reason) },
        CallbackOutcome::AlreadyFinalized => CallbackAck { status: "already_finalized", reason: None },
    };

    Ok(Json(ack))
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    payments: Vec<PaymentIntentDto>,
    total: usize,
}

pub async fn list_by_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ListResponse>> {
    let payments = state.service_context.payment_service
        .list_by_booking(booking_id)
        .await?;

    let total = payments.len();
    let payments: Vec<PaymentIntentDto> = payments.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { payments, total }))
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

//! # Transaction Creation
//!
//! `POST /v1/transactions` allocates a proxy number for a requester and a
//! provider and records the ride. On success both parties are texted from
//! the proxy number in a background task; the response does not wait for
//! delivery and delivery failures never change it.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mask_core::{ProviderId, RequesterId, TransactionDetails};
use mask_engine::{notify_parties, Allocation};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Longest accepted start or destination text, in bytes.
const MAX_LOCATION_LEN: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/transactions", post(create_transaction))
}

/// Request to book a ride between a requester and a provider.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    pub requester_id: i64,
    pub provider_id: i64,
    /// Pickup location.
    pub start: String,
    pub destination: String,
    pub scheduled_at: DateTime<Utc>,
}

impl CreateTransactionRequest {
    fn validate(self) -> Result<(RequesterId, ProviderId, TransactionDetails), AppError> {
        let start = location("start", self.start)?;
        let destination = location("destination", self.destination)?;
        Ok((
            RequesterId::new(self.requester_id),
            ProviderId::new(self.provider_id),
            TransactionDetails {
                start_location: start,
                end_location: destination,
                scheduled_at: self.scheduled_at,
            },
        ))
    }
}

fn location(field: &str, raw: String) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.len() > MAX_LOCATION_LEN {
        return Err(AppError::Validation(format!(
            "{field} exceeds {MAX_LOCATION_LEN} bytes"
        )));
    }
    Ok(trimmed.to_string())
}

/// A booked ride and the proxy number both parties should use.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub requester_id: i64,
    pub provider_id: i64,
    pub proxy_number: String,
    pub start: String,
    pub destination: String,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&Allocation> for TransactionResponse {
    fn from(allocation: &Allocation) -> Self {
        let tx = &allocation.transaction;
        Self {
            id: *tx.id.as_uuid(),
            requester_id: tx.requester_id.get(),
            provider_id: tx.provider_id.get(),
            proxy_number: allocation.proxy.address.as_str().to_string(),
            start: tx.details.start_location.clone(),
            destination: tx.details.end_location.clone(),
            scheduled_at: tx.details.scheduled_at,
            created_at: tx.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Ride booked and proxy number bound", body = TransactionResponse),
        (status = 404, description = "Unknown requester or provider", body = crate::error::ErrorBody),
        (status = 409, description = "No proxy number available for this pair", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request body", body = crate::error::ErrorBody),
    ),
    tag = "transactions"
)]
pub(crate) async fn create_transaction(
    State(state): State<AppState>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let (requester_id, provider_id, details) = extract_json(body)?.validate()?;

    let allocation = match state
        .allocator
        .allocate(requester_id, provider_id, details)
        .await
    {
        Ok(allocation) => {
            state.metrics.record_allocation("allocated");
            allocation
        }
        Err(e) => {
            state.metrics.record_allocation(e.kind());
            return Err(e.into());
        }
    };

    let response = TransactionResponse::from(&allocation);
    spawn_notifications(&state, allocation);
    Ok((StatusCode::CREATED, Json(response)))
}

fn spawn_notifications(state: &AppState, allocation: Allocation) {
    let notifier = state.notifier.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        let report = notify_parties(notifier.as_ref(), &allocation).await;
        metrics.record_notification(report.requester.is_ok());
        metrics.record_notification(report.provider.is_ok());
    });
}

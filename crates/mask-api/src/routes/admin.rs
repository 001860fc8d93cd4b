//! # Admin Read Surface
//!
//! Read-only listings for operators:
//!
//! - `GET /v1/admin/overview`       — everything below in one document
//! - `GET /v1/admin/proxy-numbers`  — the proxy pool
//! - `GET /v1/admin/transactions`   — transactions with party names and proxy number
//! - `GET /v1/admin/requesters`     — registered requesters
//! - `GET /v1/admin/providers`      — registered providers

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mask_core::{Party, ProxyNumber, TransactionView};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/overview", get(overview))
        .route("/v1/admin/proxy-numbers", get(list_proxy_numbers))
        .route("/v1/admin/transactions", get(list_transactions))
        .route("/v1/admin/requesters", get(list_requesters))
        .route("/v1/admin/providers", get(list_providers))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A pool entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProxyNumberResponse {
    pub id: i64,
    pub number: String,
}

impl From<ProxyNumber> for ProxyNumberResponse {
    fn from(proxy: ProxyNumber) -> Self {
        Self {
            id: proxy.id.get(),
            number: proxy.address.as_str().to_string(),
        }
    }
}

/// A requester or provider.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PartyResponse {
    pub id: i64,
    pub name: String,
    pub number: String,
}

impl<Id: Into<i64>> From<Party<Id>> for PartyResponse {
    fn from(party: Party<Id>) -> Self {
        Self {
            id: party.id.into(),
            name: party.display_name,
            number: party.address.as_str().to_string(),
        }
    }
}

/// A transaction as operators see it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub requester_name: String,
    pub provider_name: String,
    pub start: String,
    pub destination: String,
    pub scheduled_at: DateTime<Utc>,
    pub proxy_number: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionView> for TransactionSummary {
    fn from(view: TransactionView) -> Self {
        Self {
            id: *view.id.as_uuid(),
            requester_name: view.requester_name,
            provider_name: view.provider_name,
            start: view.start_location,
            destination: view.end_location,
            scheduled_at: view.scheduled_at,
            proxy_number: view.proxy_address.as_str().to_string(),
            created_at: view.created_at,
        }
    }
}

/// Every admin listing at once.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminOverview {
    pub proxy_numbers: Vec<ProxyNumberResponse>,
    pub transactions: Vec<TransactionSummary>,
    pub requesters: Vec<PartyResponse>,
    pub providers: Vec<PartyResponse>,
}

fn convert<T, U: From<T>>(items: Vec<T>) -> Vec<U> {
    items.into_iter().map(U::from).collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/admin/overview",
    responses(
        (status = 200, description = "Pool, transactions, and parties", body = AdminOverview),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn overview(State(state): State<AppState>) -> Result<Json<AdminOverview>, AppError> {
    let (proxy_numbers, transactions, requesters, providers) = tokio::try_join!(
        state.directory.list_proxy_numbers(),
        state.ledger.list_transactions(),
        state.directory.list_requesters(),
        state.directory.list_providers(),
    )?;
    Ok(Json(AdminOverview {
        proxy_numbers: convert(proxy_numbers),
        transactions: convert(transactions),
        requesters: convert(requesters),
        providers: convert(providers),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/admin/proxy-numbers",
    responses(
        (status = 200, description = "The proxy pool in id order", body = Vec<ProxyNumberResponse>),
    ),
    tag = "admin"
)]
pub(crate) async fn list_proxy_numbers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProxyNumberResponse>>, AppError> {
    Ok(Json(convert(state.directory.list_proxy_numbers().await?)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/transactions",
    responses(
        (status = 200, description = "Transactions, oldest first", body = Vec<TransactionSummary>),
    ),
    tag = "admin"
)]
pub(crate) async fn list_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionSummary>>, AppError> {
    Ok(Json(convert(state.ledger.list_transactions().await?)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/requesters",
    responses(
        (status = 200, description = "Registered requesters", body = Vec<PartyResponse>),
    ),
    tag = "admin"
)]
pub(crate) async fn list_requesters(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartyResponse>>, AppError> {
    Ok(Json(convert(state.directory.list_requesters().await?)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/providers",
    responses(
        (status = 200, description = "Registered providers", body = Vec<PartyResponse>),
    ),
    tag = "admin"
)]
pub(crate) async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartyResponse>>, AppError> {
    Ok(Json(convert(state.directory.list_providers().await?)))
}

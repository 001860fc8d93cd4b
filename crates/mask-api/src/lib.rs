//! # mask-api — HTTP Service for the Masked Relay Stack
//!
//! ## API Surface
//!
//! | Route                      | Module                     | Purpose |
//! |----------------------------|----------------------------|---------|
//! | `POST /v1/transactions`    | [`routes::transactions`]   | Book a ride, bind a proxy number, notify both parties |
//! | `POST /webhook`            | [`routes::webhooks`]       | Relay an inbound text |
//! | `GET  /webhook-voice`      | [`routes::webhooks`]       | Call-flow XML for an inbound call |
//! | `GET  /v1/admin/*`         | [`routes::admin`]          | Pool, transactions, parties |
//! | `GET  /openapi.json`       | [`openapi`]                | OpenAPI document |
//! | `GET  /health/*`           | this module                | Liveness and readiness probes |
//! | `GET  /metrics`            | this module                | Prometheus scrape endpoint |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the application router with all routes and middleware.
///
/// Health probes and `/metrics` sit outside the metrics middleware so
/// scrapes and probes do not count as traffic.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();
    let metrics_on = state.metrics_enabled;

    let mut api = Router::new()
        .merge(routes::transactions::router())
        .merge(routes::webhooks::router())
        .merge(routes::admin::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(64 * 1024));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(axum::Extension(metrics));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        probes = probes.route("/metrics", axum::routing::get(prometheus_metrics));
    }

    Router::new().merge(probes.with_state(state)).merge(api)
}

/// GET /metrics: refreshes the pool and ledger gauges, then encodes
/// every metric in the Prometheus text format.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = &state.metrics;

    let counts = tokio::try_join!(
        state.directory.list_proxy_numbers(),
        state.ledger.list_transactions(),
        state.directory.list_requesters(),
        state.directory.list_providers(),
    );
    match counts {
        Ok((proxies, transactions, requesters, providers)) => {
            metrics.proxy_numbers_total().set(proxies.len() as f64);
            metrics.transactions_total().set(transactions.len() as f64);
            metrics.requesters_total().set(requesters.len() as f64);
            metrics.providers_total().set(providers.len() as f64);
        }
        // Keep the last known gauge values; the scrape itself still succeeds.
        Err(e) => tracing::warn!(error = %e, "could not refresh domain gauges"),
    }

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("metrics encoding failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Liveness probe. The process is up and serving requests.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The backing store answers.
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.directory.health_check().await {
        Ok(()) => (StatusCode::OK, "ready").into_response(),
        Err(e) => {
            tracing::warn!("store health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "store unreachable").into_response()
        }
    }
}

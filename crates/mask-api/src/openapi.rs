//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Masked Relay API",
        description = "Books rides on shared proxy numbers and relays texts and calls between riders and drivers without revealing their real numbers.\n\nThe admin endpoints are unauthenticated; deploy them behind the operator network."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        crate::routes::transactions::create_transaction,
        crate::routes::webhooks::message_webhook,
        crate::routes::webhooks::voice_webhook,
        crate::routes::admin::overview,
        crate::routes::admin::list_proxy_numbers,
        crate::routes::admin::list_transactions,
        crate::routes::admin::list_requesters,
        crate::routes::admin::list_providers,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::transactions::CreateTransactionRequest,
        crate::routes::transactions::TransactionResponse,
        crate::routes::webhooks::MessageEvent,
        crate::routes::admin::AdminOverview,
        crate::routes::admin::ProxyNumberResponse,
        crate::routes::admin::PartyResponse,
        crate::routes::admin::TransactionSummary,
    )),
    tags(
        (name = "transactions", description = "Ride booking and proxy number allocation"),
        (name = "webhooks", description = "Inbound texts and calls from the messaging provider"),
        (name = "admin", description = "Read-only operator listings"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/transactions",
            "/webhook",
            "/webhook-voice",
            "/v1/admin/overview",
            "/v1/admin/proxy-numbers",
            "/v1/admin/transactions",
            "/v1/admin/requesters",
            "/v1/admin/providers",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

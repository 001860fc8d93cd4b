//! # Inbound Webhooks
//!
//! Endpoints the messaging provider calls for traffic on proxy numbers:
//!
//! - `POST /webhook`       — inbound text, form fields `originator`,
//!   `recipient`, `payload`. Relayed verbatim to the sender's counterparty.
//!   Always answered with `OK` unless the store fails, so the provider does
//!   not redeliver texts that simply have no match.
//! - `GET  /webhook-voice` — inbound call, query `source`, `destination`.
//!   Answered with call-flow XML: a masked transfer, or a spoken apology.

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use mask_core::Address;
use mask_engine::CallFlow;

use crate::error::AppError;
use crate::state::AppState;

/// Body returned for every accepted message webhook.
pub const ACK: &str = "OK";

pub const XML_CONTENT_TYPE: &str = "application/xml";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(message_webhook))
        .route("/webhook-voice", get(voice_webhook))
}

/// Inbound text on a proxy number.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageEvent {
    /// Real number of the sender.
    pub originator: String,
    /// Proxy number the text was sent to.
    pub recipient: String,
    pub payload: String,
}

/// Inbound call on a proxy number.
#[derive(Debug, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VoiceEvent {
    /// Real number of the caller.
    pub source: String,
    /// Proxy number that was dialled.
    pub destination: String,
}

fn addresses(sender: &str, proxy: &str) -> Option<(Address, Address)> {
    match (Address::new(sender), Address::new(proxy)) {
        (Ok(sender), Ok(proxy)) => Some((sender, proxy)),
        (Err(e), _) | (_, Err(e)) => {
            tracing::debug!(error = %e, "webhook carried an unusable address");
            None
        }
    }
}

#[utoipa::path(
    post,
    path = "/webhook",
    request_body(content = MessageEvent, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Acknowledged", body = String),
        (status = 503, description = "Store unavailable; the provider should redeliver", body = crate::error::ErrorBody),
    ),
    tag = "webhooks"
)]
pub(crate) async fn message_webhook(
    State(state): State<AppState>,
    form: Result<Form<MessageEvent>, FormRejection>,
) -> Result<&'static str, AppError> {
    let event = match form {
        Ok(Form(event)) => event,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "malformed message webhook");
            state.metrics.record_routing("message", "malformed");
            return Ok(ACK);
        }
    };

    let Some((sender, proxy)) = addresses(&event.originator, &event.recipient) else {
        state.metrics.record_routing("message", "malformed");
        return Ok(ACK);
    };

    let outcome = state.router.route(&proxy, &sender).await?;
    state.metrics.record_routing("message", outcome.as_str());

    if let Some(message) = outcome.forward_message(&event.payload) {
        match state.notifier.send(&message).await {
            Ok(_) => {
                tracing::info!(proxy = %proxy, "inbound message relayed");
                state.metrics.record_notification(true);
            }
            Err(e) => {
                tracing::warn!(proxy = %proxy, error = %e, "relaying inbound message failed");
                state.metrics.record_notification(false);
            }
        }
    } else {
        tracing::info!(proxy = %proxy, "inbound message has no matching transaction");
    }

    Ok(ACK)
}

#[utoipa::path(
    get,
    path = "/webhook-voice",
    params(VoiceEvent),
    responses(
        (status = 200, description = "Call-flow XML", content_type = "application/xml", body = String),
    ),
    tag = "webhooks"
)]
pub(crate) async fn voice_webhook(
    State(state): State<AppState>,
    query: Result<Query<VoiceEvent>, QueryRejection>,
) -> impl IntoResponse {
    let flow = match query {
        Ok(Query(event)) => call_flow(&state, &event).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "malformed voice webhook");
            state.metrics.record_routing("voice", "malformed");
            CallFlow::apology()
        }
    };
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], flow.to_xml())
}

/// A store failure still answers the call, with the apology.
async fn call_flow(state: &AppState, event: &VoiceEvent) -> CallFlow {
    let Some((caller, proxy)) = addresses(&event.source, &event.destination) else {
        state.metrics.record_routing("voice", "malformed");
        return CallFlow::apology();
    };

    match state.router.route(&proxy, &caller).await {
        Ok(outcome) => {
            state.metrics.record_routing("voice", outcome.as_str());
            tracing::info!(proxy = %proxy, outcome = outcome.as_str(), "inbound call routed");
            CallFlow::from_outcome(&outcome)
        }
        Err(e) => {
            tracing::error!(proxy = %proxy, error = %e, "routing inbound call failed");
            state.metrics.record_routing("voice", "store_error");
            CallFlow::apology()
        }
    }
}

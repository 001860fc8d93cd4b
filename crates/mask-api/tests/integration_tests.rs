//! # Integration Tests for mask-api
//!
//! Drives the full router over the in-memory store with a recording
//! notifier: ride booking, inbound text relay, voice call flows, admin
//! listings, health probes, and metrics.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use mask_api::config::AppConfig;
use mask_api::state::AppState;
use mask_core::{Address, ExclusionPolicy, Provider, Provisioning, ProxyNumber, Requester};
use mask_notify::{OutboundMessage, RecordingNotifier};
use mask_store::MemoryStore;

struct Harness {
    app: axum::Router,
    notifier: RecordingNotifier,
    store: MemoryStore,
    alice: Requester,
    bob: Provider,
    carol: Provider,
    pool: Vec<ProxyNumber>,
}

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

async fn harness(pool_size: usize, policy: ExclusionPolicy) -> Harness {
    let store = MemoryStore::new();
    let alice = store.add_requester("Alice", addr("31600000001")).await.unwrap();
    let bob = store.add_provider("Bob", addr("31600000002")).await.unwrap();
    let carol = store.add_provider("Carol", addr("31600000003")).await.unwrap();
    let mut pool = Vec::new();
    for i in 0..pool_size {
        pool.push(
            store
                .add_proxy_number(addr(&format!("3197010000{i}")))
                .await
                .unwrap(),
        );
    }

    let notifier = RecordingNotifier::new();
    let config = AppConfig {
        exclusion_policy: policy,
        ..AppConfig::default()
    };
    let state = AppState::new(Arc::new(store.clone()), Arc::new(notifier.clone()), &config);

    Harness {
        app: mask_api::app(state),
        notifier,
        store,
        alice,
        bob,
        carol,
        pool,
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, String, Option<String>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

fn book(requester_id: i64, provider_id: i64) -> Request<Body> {
    let body = serde_json::json!({
        "requester_id": requester_id,
        "provider_id": provider_id,
        "start": "Leidseplein",
        "destination": "Amsterdam Zuid",
        "scheduled_at": "2026-10-17T21:30:00Z",
    });
    Request::builder()
        .method("POST")
        .uri("/v1/transactions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn text(originator: &str, recipient: &str, payload: &str) -> Request<Body> {
    let form = format!(
        "originator={originator}&recipient={recipient}&payload={}",
        payload.replace(' ', "+")
    );
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

fn call(source: &str, destination: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/webhook-voice?source={source}&destination={destination}"))
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Ride notifications are sent from a background task.
async fn wait_for_messages(notifier: &RecordingNotifier, count: usize) -> Vec<OutboundMessage> {
    for _ in 0..100 {
        let sent = notifier.sent();
        if sent.len() >= count {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    notifier.sent()
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let h = harness(0, ExclusionPolicy::Union).await;
    let (status, body, _) = send(&h.app, get("/health/liveness")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let h = harness(0, ExclusionPolicy::Union).await;
    let (status, body, _) = send(&h.app, get("/health/readiness")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");
}

// -- Transaction Creation -----------------------------------------------------

#[tokio::test]
async fn test_booking_binds_proxy_and_notifies_both_parties() {
    let h = harness(2, ExclusionPolicy::Union).await;
    let (status, body, _) = send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;
    assert_eq!(status, StatusCode::CREATED);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["proxy_number"], h.pool[0].address.as_str());
    assert_eq!(json["start"], "Leidseplein");
    assert_eq!(json["destination"], "Amsterdam Zuid");

    let sent = wait_for_messages(&h.notifier, 2).await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.originator == h.pool[0].address));
    let to_alice = sent.iter().find(|m| m.recipient == h.alice.address).unwrap();
    assert_eq!(
        to_alice.body,
        "Bob will pick you up at 2026-10-17 21:30 UTC. Reply to this message to contact the driver."
    );
    let to_bob = sent.iter().find(|m| m.recipient == h.bob.address).unwrap();
    assert!(to_bob.body.starts_with("Alice will wait for you at"));
}

#[tokio::test]
async fn test_exhausted_pool_returns_no_capacity() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let (status, _, _) = send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = send(&h.app, book(h.alice.id.get(), h.carol.id.get())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], "NO_CAPACITY");
    assert_eq!(
        json["error"]["message"],
        "No number available! Please extend your pool."
    );
    assert_eq!(h.store.transaction_count(), 1);
}

#[tokio::test]
async fn test_unknown_party_returns_404() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let (status, body, _) = send(&h.app, book(h.alice.id.get(), 404)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("NOT_FOUND"));
    assert_eq!(h.store.transaction_count(), 0);
}

#[tokio::test]
async fn test_malformed_booking_returns_422() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let request = Request::builder()
        .method("POST")
        .uri("/v1/transactions")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"requester_id": 1}"#))
        .unwrap();
    let (status, body, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("VALIDATION_ERROR"));
}

// -- Message Webhook ----------------------------------------------------------

#[tokio::test]
async fn test_text_is_relayed_to_counterparty() {
    let h = harness(1, ExclusionPolicy::Union).await;
    send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;
    wait_for_messages(&h.notifier, 2).await;

    let proxy = h.pool[0].address.as_str();
    let (status, body, _) = send(&h.app, text("31600000002", proxy, "I am outside")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let sent = h.notifier.sent();
    let relayed = sent.last().unwrap();
    assert_eq!(relayed.originator.as_str(), proxy);
    assert_eq!(relayed.recipient, h.alice.address);
    assert_eq!(relayed.body, "I am outside");
}

#[tokio::test]
async fn test_unmatched_text_is_acknowledged_and_dropped() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let (status, body, _) =
        send(&h.app, text("31600000009", h.pool[0].address.as_str(), "hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_text_is_acknowledged() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("payload=only"))
        .unwrap();
    let (status, body, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

// -- Voice Webhook ------------------------------------------------------------

#[tokio::test]
async fn test_call_is_transferred_masked() {
    let h = harness(1, ExclusionPolicy::Union).await;
    send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;

    let (status, body, content_type) =
        send(&h.app, call("31600000001", h.pool[0].address.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/xml"));
    assert_eq!(
        body,
        r#"<?xml version="1.0" encoding="UTF-8"?><Transfer destination="31600000002" mask="true" />"#
    );
}

#[tokio::test]
async fn test_unknown_caller_hears_apology() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let (status, body, content_type) =
        send(&h.app, call("31600000001", h.pool[0].address.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/xml"));
    assert!(body.contains(r#"<Say language="en-GB" voice="female">Sorry, we cannot identify your transaction."#));
}

#[tokio::test]
async fn test_call_without_parameters_hears_apology() {
    let h = harness(1, ExclusionPolicy::Union).await;
    let (status, body, _) = send(&h.app, get("/webhook-voice")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Say "));
}

/// Under the per-pair policy Alice can hold P1 with both Bob and Carol.
/// Her calls on P1 reach whoever was booked first.
#[tokio::test]
async fn test_ambiguous_sender_reaches_earliest_transaction() {
    let h = harness(1, ExclusionPolicy::PerPair).await;
    let (first, _, _) = send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;
    let (second, _, _) = send(&h.app, book(h.alice.id.get(), h.carol.id.get())).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CREATED);

    let (_, body, _) = send(&h.app, call("31600000001", h.pool[0].address.as_str())).await;
    assert!(body.contains(r#"destination="31600000002""#));

    let (_, body, _) = send(&h.app, call("31600000003", h.pool[0].address.as_str())).await;
    assert!(body.contains(r#"destination="31600000001""#));
}

// -- Admin --------------------------------------------------------------------

#[tokio::test]
async fn test_admin_overview_lists_everything() {
    let h = harness(2, ExclusionPolicy::Union).await;
    send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;

    let (status, body, _) = send(&h.app, get("/v1/admin/overview")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["proxy_numbers"].as_array().unwrap().len(), 2);
    assert_eq!(json["requesters"][0]["name"], "Alice");
    assert_eq!(json["providers"].as_array().unwrap().len(), 2);

    let tx = &json["transactions"][0];
    assert_eq!(tx["requester_name"], "Alice");
    assert_eq!(tx["provider_name"], "Bob");
    assert_eq!(tx["start"], "Leidseplein");
    assert_eq!(tx["proxy_number"], h.pool[0].address.as_str());
}

#[tokio::test]
async fn test_admin_listings() {
    let h = harness(3, ExclusionPolicy::Union).await;
    for (uri, expected) in [
        ("/v1/admin/proxy-numbers", 3),
        ("/v1/admin/transactions", 0),
        ("/v1/admin/requesters", 1),
        ("/v1/admin/providers", 2),
    ] {
        let (status, body, _) = send(&h.app, get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), expected, "{uri}");
    }
}

// -- OpenAPI and Metrics ------------------------------------------------------

#[tokio::test]
async fn test_openapi_document_is_served() {
    let h = harness(0, ExclusionPolicy::Union).await;
    let (status, body, _) = send(&h.app, get("/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["paths"]["/v1/transactions"].is_object());
}

#[tokio::test]
async fn test_metrics_report_domain_counters() {
    let h = harness(1, ExclusionPolicy::Union).await;
    send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;
    send(&h.app, book(h.alice.id.get(), h.bob.id.get())).await;
    send(&h.app, call("31600000009", h.pool[0].address.as_str())).await;

    let (status, body, _) = send(&h.app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"mask_allocations_total{outcome="allocated"} 1"#));
    assert!(body.contains(r#"mask_allocations_total{outcome="no_capacity"} 1"#));
    assert!(body.contains(r#"mask_routing_lookups_total{channel="voice",outcome="unmatched"} 1"#));
    assert!(body.contains("mask_transactions_total 1"));
    assert!(body.contains("mask_http_requests_total"));
}

#[tokio::test]
async fn test_metrics_can_be_disabled() {
    let store = MemoryStore::new();
    let config = AppConfig {
        metrics_enabled: false,
        ..AppConfig::default()
    };
    let state = AppState::new(Arc::new(store), Arc::new(RecordingNotifier::new()), &config);
    let app = mask_api::app(state);
    let (status, _, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//! # MessageBird client against a mock server
//!
//! Verifies request construction (path, auth header, JSON body) and the
//! mapping of error responses, without touching the live API.

use std::time::Duration;

use mask_core::Address;
use mask_notify::{MessageBirdClient, Notifier, NotifierConfig, NotifyError, OutboundMessage};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> MessageBirdClient {
    let config = NotifierConfig {
        api_key: Some("test_access_key".into()),
        endpoint: url::Url::parse(&server.uri()).unwrap(),
        timeout: Duration::from_secs(2),
    };
    MessageBirdClient::new(&config).expect("client build")
}

fn message() -> OutboundMessage {
    OutboundMessage {
        originator: Address::new("31970000000").unwrap(),
        recipient: Address::new("31612345678").unwrap(),
        body: "David Driver will pick you up at 2026-10-17 09:30. Reply to this message to contact the driver.".into(),
    }
}

#[tokio::test]
async fn sends_message_with_access_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("Authorization", "AccessKey test_access_key"))
        .and(body_json(serde_json::json!({
            "originator": "31970000000",
            "recipients": ["31612345678"],
            "body": message().body,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "e8077d803532c0b5937c639b60216938",
            "direction": "mt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = client(&server).send(&message()).await.unwrap();
    assert_eq!(
        delivery.message_id.as_deref(),
        Some("e8077d803532c0b5937c639b60216938")
    );
}

#[tokio::test]
async fn non_success_status_is_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string(r#"{"errors":[{"code":9,"description":"no (correct) recipients found"}]}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).send(&message()).await.unwrap_err();
    match err {
        NotifyError::Api { status, body, .. } => {
            assert_eq!(status, 422);
            assert!(body.contains("recipients"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn accepted_message_without_body_has_no_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let delivery = client(&server).send(&message()).await.unwrap();
    assert!(delivery.message_id.is_none());
}

#[tokio::test]
async fn transport_failure_is_an_http_error() {
    let config = NotifierConfig {
        api_key: Some("k".into()),
        endpoint: url::Url::parse("http://127.0.0.1:1/").unwrap(),
        timeout: Duration::from_millis(200),
    };
    let err = MessageBirdClient::new(&config)
        .unwrap()
        .send(&message())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Http { .. }));
}

#[tokio::test]
async fn long_error_body_is_cut_on_a_character_boundary() {
    let server = MockServer::start().await;
    let body = format!("{}é tail", "x".repeat(511));
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .mount(&server)
        .await;

    let err = client(&server).send(&message()).await.unwrap_err();
    match err {
        NotifyError::Api { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "x".repeat(511));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

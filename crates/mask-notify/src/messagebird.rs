//! # MessageBird SMS Client
//!
//! Sends text messages through `POST {endpoint}/messages`, authenticated
//! with an `AccessKey` authorization header. The message appears to come
//! from the proxy number (`originator`) and goes to a single recipient.
//!
//! One attempt per message. Transport failures and non-2xx responses are
//! returned to the caller as [`NotifyError`]; there is no retry here.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ConfigError, NotifierConfig};
use crate::error::NotifyError;
use crate::{Delivery, Notifier, OutboundMessage};

/// Maximum number of response-body bytes kept in an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Wire shape of a MessageBird message creation request.
#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    originator: &'a str,
    recipients: [&'a str; 1],
    body: &'a str,
}

/// HTTP client for the MessageBird messages API.
pub struct MessageBirdClient {
    client: reqwest::Client,
    messages_url: String,
}

impl std::fmt::Debug for MessageBirdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBirdClient")
            .field("messages_url", &self.messages_url)
            .finish_non_exhaustive()
    }
}

impl MessageBirdClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the API key is missing or holds
    /// characters that cannot appear in an HTTP header.
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let api_key = config.api_key.as_deref().ok_or(ConfigError::Invalid {
            var: "MESSAGEBIRD_API_KEY",
            reason: "not set".to_string(),
        })?;

        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("AccessKey {api_key}"))
            .map_err(|_| ConfigError::Invalid {
                var: "MESSAGEBIRD_API_KEY",
                reason: "invalid characters".to_string(),
            })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid {
                var: "MESSAGEBIRD_ENDPOINT",
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let messages_url = format!(
            "{}/messages",
            config.endpoint.as_str().trim_end_matches('/')
        );
        Ok(Self {
            client,
            messages_url,
        })
    }
}

#[async_trait]
impl Notifier for MessageBirdClient {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError> {
        let payload = CreateMessage {
            originator: message.originator.as_str(),
            recipients: [message.recipient.as_str()],
            body: &message.body,
        };

        let resp = self
            .client
            .post(&self.messages_url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| NotifyError::Http {
                endpoint: self.messages_url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, ERROR_BODY_LIMIT);
            return Err(NotifyError::Api {
                endpoint: self.messages_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        // The message is accepted once we have a 2xx; an unreadable body
        // only costs us the provider's message id.
        let message_id = match resp.json::<serde_json::Value>().await {
            Ok(v) => v.get("id").and_then(|id| id.as_str()).map(String::from),
            Err(e) => {
                tracing::debug!(error = %e, "messaging API returned an unparseable body");
                None
            }
        };

        tracing::debug!(
            originator = %message.originator,
            message_id = message_id.as_deref().unwrap_or("-"),
            "message accepted by MessageBird"
        );
        Ok(Delivery { message_id })
    }

    fn channel(&self) -> &'static str {
        "messagebird"
    }
}

/// Cut `s` to at most `limit` bytes without splitting a character.
fn truncate_at_char_boundary(s: &mut String, limit: usize) {
    let mut end = limit.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_backs_off_to_a_character_boundary() {
        let mut s = format!("{}é", "a".repeat(3));
        truncate_at_char_boundary(&mut s, 4);
        assert_eq!(s, "aaa");

        let mut short = "héllo".to_string();
        truncate_at_char_boundary(&mut short, 512);
        assert_eq!(short, "héllo");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = MessageBirdClient::new(&NotifierConfig::default()).unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }

    #[test]
    fn messages_url_has_single_slash() {
        let mut config = NotifierConfig {
            api_key: Some("k".into()),
            ..NotifierConfig::default()
        };
        config.endpoint = url::Url::parse("https://sms.example.test/api/").unwrap();
        let client = MessageBirdClient::new(&config).unwrap();
        assert_eq!(client.messages_url, "https://sms.example.test/api/messages");
    }

    #[test]
    fn request_body_has_single_recipient_array() {
        let payload = CreateMessage {
            originator: "31970000",
            recipients: ["31970111"],
            body: "hi",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "originator": "31970000",
                "recipients": ["31970111"],
                "body": "hi"
            })
        );
    }
}

//! # mask-notify — Outbound Notifications
//!
//! The engine hands finished `(proxy, recipient, body)` triples to a
//! [`Notifier`]. Implementations:
//!
//! - [`MessageBirdClient`] — sends SMS through the MessageBird REST API.
//! - [`LogNotifier`] — logs the message and reports success. Used when no
//!   API key is configured.
//! - [`RecordingNotifier`] — keeps every message in memory and can be told
//!   to fail. Used by tests.
//!
//! ## Delivery guarantees
//!
//! None. A notifier makes one attempt and reports the outcome to its
//! caller. Nothing in this crate retries; the orchestration layer decides
//! whether a failure is logged, alerted on, or ignored.

pub mod config;
pub mod error;
pub mod log;
pub mod messagebird;
pub mod recording;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mask_core::Address;

pub use config::{ConfigError, NotifierConfig};
pub use error::NotifyError;
pub use log::LogNotifier;
pub use messagebird::MessageBirdClient;
pub use recording::RecordingNotifier;

/// A text message sent from a proxy number to one real address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// The proxy number the message appears to come from.
    pub originator: Address,
    /// The real address receiving the message.
    pub recipient: Address,
    /// Message text.
    pub body: String,
}

/// Acknowledgement from the delivery channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Provider-assigned message id, when the channel returns one.
    pub message_id: Option<String>,
}

/// A channel able to deliver [`OutboundMessage`]s.
///
/// Implementations must be `Send + Sync` so they can be shared across
/// request handlers behind an `Arc`.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempt delivery once.
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError>;

    /// Human-readable channel name for logs and metrics labels.
    fn channel(&self) -> &'static str;
}

//! In-memory notifier that records every message.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use mask_core::Address;

use crate::error::NotifyError;
use crate::{Delivery, Notifier, OutboundMessage};

#[derive(Default)]
struct Inner {
    sent: Vec<OutboundMessage>,
    failing: Vec<Address>,
}

/// Records messages instead of sending them.
///
/// Recipients registered with [`fail_for`](Self::fail_for) get a
/// [`NotifyError::Rejected`] and are not recorded.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for RecordingNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingNotifier")
            .field("sent", &self.inner.lock().sent.len())
            .finish()
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `recipient` fail.
    pub fn fail_for(&self, recipient: Address) {
        self.inner.lock().failing.push(recipient);
    }

    /// Messages delivered so far, in order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.inner.lock().sent.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError> {
        let mut inner = self.inner.lock();
        if inner.failing.contains(&message.recipient) {
            return Err(NotifyError::Rejected(format!(
                "recipient {} is configured to fail",
                message.recipient
            )));
        }
        inner.sent.push(message.clone());
        Ok(Delivery {
            message_id: Some(format!("rec-{}", inner.sent.len())),
        })
    }

    fn channel(&self) -> &'static str {
        "recording"
    }
}

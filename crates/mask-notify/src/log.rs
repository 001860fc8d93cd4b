//! Log-only notifier, selected when no messaging credentials are configured.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::{Delivery, Notifier, OutboundMessage};

/// Writes each message to the log and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError> {
        tracing::info!(
            originator = %message.originator,
            recipient = %message.recipient,
            body = %message.body,
            "notification (log only, no messaging channel configured)"
        );
        Ok(Delivery::default())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

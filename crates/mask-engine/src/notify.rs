//! # Ride Notifications
//!
//! After a successful allocation each party gets one text from the bound
//! proxy number telling them who to expect and when. Replies to that text
//! go through the message webhook and reach the other party.
//!
//! Delivery is attempted once per party. Failures are logged and returned
//! in the [`NotificationReport`]; they never undo or fail the allocation,
//! and nothing here retries them.

use mask_core::PartyKind;
use mask_notify::{Delivery, Notifier, NotifyError, OutboundMessage};

use crate::allocator::Allocation;

/// Format of the pickup time in notification texts.
pub const SCHEDULE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// The two texts announcing a new transaction: `[to requester, to provider]`.
pub fn ride_notifications(allocation: &Allocation) -> [OutboundMessage; 2] {
    let scheduled = allocation
        .transaction
        .details
        .scheduled_at
        .format(SCHEDULE_FORMAT);
    let proxy = &allocation.proxy.address;

    [
        OutboundMessage {
            originator: proxy.clone(),
            recipient: allocation.requester.address.clone(),
            body: format!(
                "{} will pick you up at {scheduled}. Reply to this message to contact the driver.",
                allocation.provider.display_name
            ),
        },
        OutboundMessage {
            originator: proxy.clone(),
            recipient: allocation.provider.address.clone(),
            body: format!(
                "{} will wait for you at {scheduled}. Reply to this message to contact the customer.",
                allocation.requester.display_name
            ),
        },
    ]
}

/// Per-party delivery outcome.
#[derive(Debug)]
pub struct NotificationReport {
    pub requester: Result<Delivery, NotifyError>,
    pub provider: Result<Delivery, NotifyError>,
}

impl NotificationReport {
    pub fn all_delivered(&self) -> bool {
        self.requester.is_ok() && self.provider.is_ok()
    }

    /// Failed deliveries with the side they were meant for.
    pub fn failures(&self) -> impl Iterator<Item = (PartyKind, &NotifyError)> {
        [
            (PartyKind::Requester, self.requester.as_ref().err()),
            (PartyKind::Provider, self.provider.as_ref().err()),
        ]
        .into_iter()
        .filter_map(|(kind, err)| err.map(|err| (kind, err)))
    }
}

/// Send both ride notifications through `notifier`.
///
/// Both sends are attempted even if the first fails.
pub async fn notify_parties(notifier: &dyn Notifier, allocation: &Allocation) -> NotificationReport {
    let [to_requester, to_provider] = ride_notifications(allocation);
    let requester = send_logged(notifier, &to_requester, allocation, PartyKind::Requester).await;
    let provider = send_logged(notifier, &to_provider, allocation, PartyKind::Provider).await;
    NotificationReport {
        requester,
        provider,
    }
}

async fn send_logged(
    notifier: &dyn Notifier,
    message: &OutboundMessage,
    allocation: &Allocation,
    party: PartyKind,
) -> Result<Delivery, NotifyError> {
    let result = notifier.send(message).await;
    match &result {
        Ok(_) => tracing::debug!(
            transaction_id = %allocation.transaction.id,
            party = %party,
            channel = notifier.channel(),
            "ride notification sent"
        ),
        Err(e) => tracing::warn!(
            transaction_id = %allocation.transaction.id,
            party = %party,
            channel = notifier.channel(),
            error = %e,
            "ride notification failed; not retried"
        ),
    }
    result
}

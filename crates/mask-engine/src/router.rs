//! # Inbound Routing
//!
//! Resolves an inbound `(proxy address, sender address)` pair to the real
//! address of the sender's counterparty. A pure lookup: nothing is written.
//!
//! Unknown proxy numbers and senders that are not a party to any
//! transaction on the proxy both yield [`RouteOutcome::Unmatched`]; neither
//! is an error.
//!
//! Without release or expiry, a sender can be a party to several
//! transactions on the same proxy. The ledger then reports the earliest
//! one and the number of candidates; the router forwards to the earliest
//! and logs a warning.

use std::sync::Arc;

use mask_core::{Address, Directory, Ledger, PartyKind, ProxyNumber, StoreError, TransactionId};
use mask_notify::OutboundMessage;

/// Result of a routing lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Deliver to `destination`, presenting `proxy` as the origin.
    Forward {
        destination: Address,
        proxy: ProxyNumber,
        transaction_id: TransactionId,
        /// Which side of the transaction receives the event.
        counterparty: PartyKind,
    },
    /// No transaction binds the sender to this proxy.
    Unmatched,
}

impl RouteOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }

    pub fn destination(&self) -> Option<&Address> {
        match self {
            Self::Forward { destination, .. } => Some(destination),
            Self::Unmatched => None,
        }
    }

    /// Label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward { .. } => "forwarded",
            Self::Unmatched => "unmatched",
        }
    }

    /// The message to relay for an inbound text, payload unchanged.
    pub fn forward_message(&self, payload: &str) -> Option<OutboundMessage> {
        match self {
            Self::Forward {
                destination, proxy, ..
            } => Some(OutboundMessage {
                originator: proxy.address.clone(),
                recipient: destination.clone(),
                body: payload.to_string(),
            }),
            Self::Unmatched => None,
        }
    }
}

/// Looks up counterparties for inbound messages and calls.
#[derive(Clone)]
pub struct Router {
    directory: Arc<dyn Directory>,
    ledger: Arc<dyn Ledger>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(directory: Arc<dyn Directory>, ledger: Arc<dyn Ledger>) -> Self {
        Self { directory, ledger }
    }

    /// Resolve the counterparty of `sender` on `proxy_address`.
    ///
    /// When the sender is both the requester and the provider of the
    /// matched transaction, the requester side wins and the event goes to
    /// the provider address.
    ///
    /// # Errors
    ///
    /// Store failures propagate unchanged.
    pub async fn route(
        &self,
        proxy_address: &Address,
        sender: &Address,
    ) -> Result<RouteOutcome, StoreError> {
        let Some(proxy) = self.directory.proxy_by_address(proxy_address).await? else {
            tracing::debug!(proxy = %proxy_address, "inbound event on unknown proxy number");
            return Ok(RouteOutcome::Unmatched);
        };

        let Some(binding) = self
            .ledger
            .find_active_binding(proxy.id, sender, None)
            .await?
        else {
            tracing::debug!(proxy = %proxy.address, "sender has no transaction on proxy");
            return Ok(RouteOutcome::Unmatched);
        };

        if binding.candidates > 1 {
            tracing::warn!(
                proxy = %proxy.address,
                transaction_id = %binding.transaction.id,
                candidates = binding.candidates,
                "ambiguous routing: sender has several transactions on this proxy, using the earliest"
            );
        }

        let (destination, counterparty) = if binding.requester_address == *sender {
            (binding.provider_address, PartyKind::Provider)
        } else {
            (binding.requester_address, PartyKind::Requester)
        };

        Ok(RouteOutcome::Forward {
            destination,
            proxy,
            transaction_id: binding.transaction.id,
            counterparty,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mask_core::{ExclusionPolicy, NewTransaction, ProxyId, Provisioning, TransactionDetails};
    use mask_store::MemoryStore;

    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn details() -> TransactionDetails {
        TransactionDetails {
            start_location: "Dam Square".into(),
            end_location: "Schiphol".into(),
            scheduled_at: Utc.with_ymd_and_hms(2026, 10, 18, 7, 0, 0).unwrap(),
        }
    }

    async fn bound_store(requester: &str, provider: &str) -> (MemoryStore, ProxyNumber) {
        let store = MemoryStore::new();
        let r = store.add_requester("Alice", addr(requester)).await.unwrap();
        let p = store.add_provider("Bob", addr(provider)).await.unwrap();
        let proxy = store.add_proxy_number(addr("31970100000")).await.unwrap();
        store
            .create(
                NewTransaction {
                    requester_id: r.id,
                    provider_id: p.id,
                    proxy_id: proxy.id,
                    details: details(),
                },
                ExclusionPolicy::Union,
            )
            .await
            .unwrap();
        (store, proxy)
    }

    fn router(store: &MemoryStore) -> Router {
        let store = Arc::new(store.clone());
        Router::new(store.clone(), store)
    }

    #[tokio::test]
    async fn routes_both_directions() {
        let (store, proxy) = bound_store("31600000001", "31600000002").await;
        let router = router(&store);

        let to_provider = router.route(&proxy.address, &addr("31600000001")).await.unwrap();
        assert_eq!(to_provider.destination(), Some(&addr("31600000002")));
        assert!(matches!(
            to_provider,
            RouteOutcome::Forward { counterparty: PartyKind::Provider, .. }
        ));

        let to_requester = router.route(&proxy.address, &addr("31600000002")).await.unwrap();
        assert_eq!(to_requester.destination(), Some(&addr("31600000001")));
    }

    #[tokio::test]
    async fn unknown_proxy_is_unmatched() {
        let (store, _) = bound_store("31600000001", "31600000002").await;
        let outcome = router(&store)
            .route(&addr("31970999999"), &addr("31600000001"))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Unmatched);
        assert!(outcome.forward_message("hi").is_none());
    }

    #[tokio::test]
    async fn stranger_is_unmatched() {
        let (store, proxy) = bound_store("31600000001", "31600000002").await;
        let outcome = router(&store)
            .route(&proxy.address, &addr("31600000099"))
            .await
            .unwrap();
        assert!(!outcome.is_match());
        assert_eq!(outcome.as_str(), "unmatched");
    }

    #[tokio::test]
    async fn self_dealing_sender_reaches_provider_side() {
        let (store, proxy) = bound_store("31600000001", "31600000001").await;
        let outcome = router(&store)
            .route(&proxy.address, &addr("31600000001"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RouteOutcome::Forward { counterparty: PartyKind::Provider, .. }
        ));
    }

    #[tokio::test]
    async fn forwarded_message_keeps_payload_and_uses_proxy_as_originator() {
        let (store, proxy) = bound_store("31600000001", "31600000002").await;
        let outcome = router(&store)
            .route(&proxy.address, &addr("31600000002"))
            .await
            .unwrap();

        let message = outcome.forward_message("  on my way :)  ").unwrap();
        assert_eq!(message.originator, proxy.address);
        assert_eq!(message.recipient, addr("31600000001"));
        assert_eq!(message.body, "  on my way :)  ");
        assert_eq!(proxy.id, ProxyId::new(1));
    }
}

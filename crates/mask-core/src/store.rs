//! # Store Capabilities
//!
//! The engine never talks to a database directly. It holds an
//! `Arc<dyn Directory>` and an `Arc<dyn Ledger>` and reads fresh state on
//! every call; nothing caches ledger contents between operations.
//!
//! Implementations must be safe under concurrent, parallel use. Any call
//! may suspend on I/O.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::{
    Binding, NewTransaction, PartyRef, Provider, ProxyNumber, Requester, Transaction,
    TransactionView,
};
use crate::error::{LedgerError, StoreError};
use crate::identity::{Address, ProviderId, ProxyId, RequesterId};
use crate::policy::{ExclusionHistory, ExclusionPolicy};

/// Read access to parties and the proxy pool.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a requester by id.
    async fn requester(&self, id: RequesterId) -> Result<Option<Requester>, StoreError>;

    /// Look up a provider by id.
    async fn provider(&self, id: ProviderId) -> Result<Option<Provider>, StoreError>;

    /// Look up a proxy number by id.
    async fn proxy_number(&self, id: ProxyId) -> Result<Option<ProxyNumber>, StoreError>;

    /// Resolve a proxy address to its pool entry.
    async fn proxy_by_address(&self, address: &Address)
        -> Result<Option<ProxyNumber>, StoreError>;

    /// Snapshot of the whole pool in ascending id order.
    async fn list_proxy_numbers(&self) -> Result<Vec<ProxyNumber>, StoreError>;

    /// All requesters in ascending id order.
    async fn list_requesters(&self) -> Result<Vec<Requester>, StoreError>;

    /// All providers in ascending id order.
    async fn list_providers(&self) -> Result<Vec<Provider>, StoreError>;

    /// Verify the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Append-only record of transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append a transaction.
    ///
    /// The referential check, the exclusion check under `policy`, and the
    /// append happen atomically with respect to every other `create`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ConstraintViolation`] if the requester, provider,
    ///   or proxy number does not exist.
    /// - [`LedgerError::Conflict`] if the proxy number is already in the
    ///   pair's exclusion set.
    async fn create(
        &self,
        new: NewTransaction,
        policy: ExclusionPolicy,
    ) -> Result<Transaction, LedgerError>;

    /// Every proxy number ever bound to a transaction involving `party`.
    async fn proxy_ids_used_by(&self, party: PartyRef) -> Result<BTreeSet<ProxyId>, StoreError>;

    /// Every proxy number ever bound to a transaction of exactly this pair.
    async fn proxy_ids_used_by_pair(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
    ) -> Result<BTreeSet<ProxyId>, StoreError>;

    /// Find the transaction on `proxy_id` whose requester and provider
    /// addresses are `{address_a, address_b}` in either order. With
    /// `address_b` absent, any transaction in which `address_a` is one of
    /// the two parties matches.
    ///
    /// When several transactions match, the earliest created one is
    /// returned and [`Binding::candidates`] reports the match count.
    async fn find_active_binding(
        &self,
        proxy_id: ProxyId,
        address_a: &Address,
        address_b: Option<&Address>,
    ) -> Result<Option<Binding>, StoreError>;

    /// All transactions joined with party names and proxy addresses,
    /// oldest first.
    async fn list_transactions(&self) -> Result<Vec<TransactionView>, StoreError>;

    /// Binding history of a prospective pair.
    async fn exclusion_history(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
    ) -> Result<ExclusionHistory, StoreError> {
        Ok(ExclusionHistory {
            requester: self
                .proxy_ids_used_by(PartyRef::Requester(requester_id))
                .await?,
            provider: self
                .proxy_ids_used_by(PartyRef::Provider(provider_id))
                .await?,
            pair: self
                .proxy_ids_used_by_pair(requester_id, provider_id)
                .await?,
        })
    }
}

/// Out-of-band creation of parties and proxy numbers.
///
/// Used by the provisioning CLI and by tests; the engine never calls it.
#[async_trait]
pub trait Provisioning: Send + Sync {
    /// Register a requester.
    async fn add_requester(
        &self,
        display_name: &str,
        address: Address,
    ) -> Result<Requester, StoreError>;

    /// Register a provider.
    async fn add_provider(&self, display_name: &str, address: Address)
        -> Result<Provider, StoreError>;

    /// Add a number to the proxy pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateAddress`] if the address is already
    /// in the pool; routing resolves proxy addresses to a single entry.
    async fn add_proxy_number(&self, address: Address) -> Result<ProxyNumber, StoreError>;
}

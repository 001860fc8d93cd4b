//! In-process storage backend.
//!
//! All state sits behind one `RwLock`. Reads share the lock; provisioning
//! and ledger appends take it exclusively, which makes the check-and-append
//! in [`Ledger::create`] atomic. Transactions are kept in append order, so
//! "earliest" is simply "first in the vector".

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use mask_core::{
    Address, Binding, Directory, ExclusionHistory, ExclusionPolicy, Ledger, LedgerError,
    NewTransaction, Party, PartyRef, Provider, ProviderId, Provisioning, ProxyId, ProxyNumber,
    Requester, RequesterId, StoreError, Transaction, TransactionId, TransactionView,
};

#[derive(Default)]
struct Inner {
    requesters: BTreeMap<RequesterId, Requester>,
    providers: BTreeMap<ProviderId, Provider>,
    proxies: BTreeMap<ProxyId, ProxyNumber>,
    transactions: Vec<Transaction>,
    next_requester: i64,
    next_provider: i64,
    next_proxy: i64,
}

impl Inner {
    fn history(&self, requester_id: RequesterId, provider_id: ProviderId) -> ExclusionHistory {
        let mut history = ExclusionHistory::default();
        for tx in &self.transactions {
            let by_requester = tx.requester_id == requester_id;
            let by_provider = tx.provider_id == provider_id;
            if by_requester {
                history.requester.insert(tx.proxy_id);
            }
            if by_provider {
                history.provider.insert(tx.proxy_id);
            }
            if by_requester && by_provider {
                history.pair.insert(tx.proxy_id);
            }
        }
        history
    }

    fn addresses_of(&self, tx: &Transaction) -> Option<(&Address, &Address)> {
        let requester = self.requesters.get(&tx.requester_id)?;
        let provider = self.providers.get(&tx.provider_id)?;
        Some((&requester.address, &provider.address))
    }
}

/// In-memory implementation of every store capability.
///
/// Cheaply cloneable via `Arc`; all clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("requesters", &inner.requesters.len())
            .field("providers", &inner.providers.len())
            .field("proxies", &inner.proxies.len())
            .field("transactions", &inner.transactions.len())
            .finish()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions in the ledger.
    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }
}

/// Does a transaction with these party addresses match the lookup?
fn addresses_match(
    requester: &Address,
    provider: &Address,
    a: &Address,
    b: Option<&Address>,
) -> bool {
    match b {
        None => a == requester || a == provider,
        Some(b) => (a == requester && b == provider) || (a == provider && b == requester),
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn requester(&self, id: RequesterId) -> Result<Option<Requester>, StoreError> {
        Ok(self.inner.read().requesters.get(&id).cloned())
    }

    async fn provider(&self, id: ProviderId) -> Result<Option<Provider>, StoreError> {
        Ok(self.inner.read().providers.get(&id).cloned())
    }

    async fn proxy_number(&self, id: ProxyId) -> Result<Option<ProxyNumber>, StoreError> {
        Ok(self.inner.read().proxies.get(&id).cloned())
    }

    async fn proxy_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<ProxyNumber>, StoreError> {
        Ok(self
            .inner
            .read()
            .proxies
            .values()
            .find(|p| &p.address == address)
            .cloned())
    }

    async fn list_proxy_numbers(&self) -> Result<Vec<ProxyNumber>, StoreError> {
        Ok(self.inner.read().proxies.values().cloned().collect())
    }

    async fn list_requesters(&self) -> Result<Vec<Requester>, StoreError> {
        Ok(self.inner.read().requesters.values().cloned().collect())
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, StoreError> {
        Ok(self.inner.read().providers.values().cloned().collect())
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn create(
        &self,
        new: NewTransaction,
        policy: ExclusionPolicy,
    ) -> Result<Transaction, LedgerError> {
        let mut inner = self.inner.write();

        if !inner.requesters.contains_key(&new.requester_id) {
            return Err(LedgerError::ConstraintViolation(format!(
                "requester {} does not exist",
                new.requester_id
            )));
        }
        if !inner.providers.contains_key(&new.provider_id) {
            return Err(LedgerError::ConstraintViolation(format!(
                "provider {} does not exist",
                new.provider_id
            )));
        }
        if !inner.proxies.contains_key(&new.proxy_id) {
            return Err(LedgerError::ConstraintViolation(format!(
                "proxy number {} does not exist",
                new.proxy_id
            )));
        }

        let history = inner.history(new.requester_id, new.provider_id);
        if policy.excluded(&history).contains(&new.proxy_id) {
            return Err(LedgerError::Conflict {
                requester_id: new.requester_id,
                provider_id: new.provider_id,
                proxy_id: new.proxy_id,
            });
        }

        let tx = Transaction {
            id: TransactionId::new(),
            requester_id: new.requester_id,
            provider_id: new.provider_id,
            proxy_id: new.proxy_id,
            details: new.details,
            created_at: Utc::now(),
        };
        inner.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn proxy_ids_used_by(&self, party: PartyRef) -> Result<BTreeSet<ProxyId>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| match party {
                PartyRef::Requester(id) => tx.requester_id == id,
                PartyRef::Provider(id) => tx.provider_id == id,
            })
            .map(|tx| tx.proxy_id)
            .collect())
    }

    async fn proxy_ids_used_by_pair(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
    ) -> Result<BTreeSet<ProxyId>, StoreError> {
        Ok(self.inner.read().history(requester_id, provider_id).pair)
    }

    async fn find_active_binding(
        &self,
        proxy_id: ProxyId,
        address_a: &Address,
        address_b: Option<&Address>,
    ) -> Result<Option<Binding>, StoreError> {
        let inner = self.inner.read();
        let mut first: Option<Binding> = None;
        let mut candidates = 0usize;

        for tx in inner.transactions.iter().filter(|tx| tx.proxy_id == proxy_id) {
            let Some((requester, provider)) = inner.addresses_of(tx) else {
                continue;
            };
            if !addresses_match(requester, provider, address_a, address_b) {
                continue;
            }
            candidates += 1;
            if first.is_none() {
                first = Some(Binding {
                    transaction: tx.clone(),
                    requester_address: requester.clone(),
                    provider_address: provider.clone(),
                    candidates: 0,
                });
            }
        }

        Ok(first.map(|mut binding| {
            binding.candidates = candidates;
            binding
        }))
    }

    async fn list_transactions(&self) -> Result<Vec<TransactionView>, StoreError> {
        let inner = self.inner.read();
        inner
            .transactions
            .iter()
            .map(|tx| {
                let requester = inner.requesters.get(&tx.requester_id);
                let provider = inner.providers.get(&tx.provider_id);
                let proxy = inner.proxies.get(&tx.proxy_id);
                match (requester, provider, proxy) {
                    (Some(r), Some(p), Some(x)) => Ok(TransactionView {
                        id: tx.id,
                        requester_name: r.display_name.clone(),
                        provider_name: p.display_name.clone(),
                        start_location: tx.details.start_location.clone(),
                        end_location: tx.details.end_location.clone(),
                        scheduled_at: tx.details.scheduled_at,
                        proxy_address: x.address.clone(),
                        created_at: tx.created_at,
                    }),
                    _ => Err(StoreError::Corrupt {
                        table: "transactions",
                        reason: format!("transaction {} has a dangling reference", tx.id),
                    }),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Provisioning for MemoryStore {
    async fn add_requester(
        &self,
        display_name: &str,
        address: Address,
    ) -> Result<Requester, StoreError> {
        let mut inner = self.inner.write();
        let party = Party::new(RequesterId::new(inner.next_requester + 1), display_name, address)?;
        inner.next_requester = party.id.get();
        inner.requesters.insert(party.id, party.clone());
        tracing::debug!(requester_id = %party.id, "provisioned requester");
        Ok(party)
    }

    async fn add_provider(
        &self,
        display_name: &str,
        address: Address,
    ) -> Result<Provider, StoreError> {
        let mut inner = self.inner.write();
        let party = Party::new(ProviderId::new(inner.next_provider + 1), display_name, address)?;
        inner.next_provider = party.id.get();
        inner.providers.insert(party.id, party.clone());
        tracing::debug!(provider_id = %party.id, "provisioned provider");
        Ok(party)
    }

    async fn add_proxy_number(&self, address: Address) -> Result<ProxyNumber, StoreError> {
        let mut inner = self.inner.write();
        if inner.proxies.values().any(|p| p.address == address) {
            return Err(StoreError::DuplicateAddress(address));
        }
        inner.next_proxy += 1;
        let proxy = ProxyNumber {
            id: ProxyId::new(inner.next_proxy),
            address,
        };
        inner.proxies.insert(proxy.id, proxy.clone());
        tracing::debug!(proxy_id = %proxy.id, "provisioned proxy number");
        Ok(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mask_core::TransactionDetails;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn details() -> TransactionDetails {
        TransactionDetails {
            start_location: "Dam Square".into(),
            end_location: "Schiphol".into(),
            scheduled_at: Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
        }
    }

    fn new_tx(r: RequesterId, p: ProviderId, x: ProxyId) -> NewTransaction {
        NewTransaction {
            requester_id: r,
            provider_id: p,
            proxy_id: x,
            details: details(),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_in_ascending_order() {
        let store = MemoryStore::new();
        let a = store.add_proxy_number(addr("31970001")).await.unwrap();
        let b = store.add_proxy_number(addr("31970002")).await.unwrap();
        assert!(a.id < b.id);
        let pool = store.list_proxy_numbers().await.unwrap();
        assert_eq!(pool.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn duplicate_proxy_address_is_rejected() {
        let store = MemoryStore::new();
        store.add_proxy_number(addr("31970001")).await.unwrap();
        let err = store.add_proxy_number(addr("31970001")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAddress(_)));
    }

    #[tokio::test]
    async fn create_rejects_dangling_references() {
        let store = MemoryStore::new();
        let r = store.add_requester("Alice", addr("100")).await.unwrap();
        let p = store.add_provider("Bob", addr("200")).await.unwrap();

        let err = store
            .create(new_tx(r.id, p.id, ProxyId::new(99)), ExclusionPolicy::Union)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConstraintViolation(_)));

        let err = store
            .create(
                new_tx(RequesterId::new(42), p.id, ProxyId::new(1)),
                ExclusionPolicy::Union,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConstraintViolation(_)));
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn create_rejects_repeated_pair_binding_under_both_policies() {
        for policy in [ExclusionPolicy::Union, ExclusionPolicy::PerPair] {
            let store = MemoryStore::new();
            let r = store.add_requester("Alice", addr("100")).await.unwrap();
            let p = store.add_provider("Bob", addr("200")).await.unwrap();
            let x = store.add_proxy_number(addr("900")).await.unwrap();

            store.create(new_tx(r.id, p.id, x.id), policy).await.unwrap();
            let err = store.create(new_tx(r.id, p.id, x.id), policy).await.unwrap_err();
            assert!(matches!(err, LedgerError::Conflict { .. }), "{policy}");
            assert_eq!(store.transaction_count(), 1);
        }
    }

    #[tokio::test]
    async fn union_policy_rejects_proxy_used_by_one_party() {
        let store = MemoryStore::new();
        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        let carol = store.add_provider("Carol", addr("300")).await.unwrap();
        let x = store.add_proxy_number(addr("900")).await.unwrap();

        store
            .create(new_tx(alice.id, bob.id, x.id), ExclusionPolicy::Union)
            .await
            .unwrap();
        let err = store
            .create(new_tx(alice.id, carol.id, x.id), ExclusionPolicy::Union)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));

        store
            .create(new_tx(alice.id, carol.id, x.id), ExclusionPolicy::PerPair)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn per_pair_policy_rejects_proxy_used_by_both_parties() {
        let store = MemoryStore::new();
        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let dave = store.add_requester("Dave", addr("101")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        let carol = store.add_provider("Carol", addr("300")).await.unwrap();
        let x = store.add_proxy_number(addr("900")).await.unwrap();

        store
            .create(new_tx(alice.id, bob.id, x.id), ExclusionPolicy::PerPair)
            .await
            .unwrap();
        store
            .create(new_tx(dave.id, carol.id, x.id), ExclusionPolicy::PerPair)
            .await
            .unwrap();

        // Alice and Carol never met, but each already holds x elsewhere.
        let err = store
            .create(new_tx(alice.id, carol.id, x.id), ExclusionPolicy::PerPair)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
        assert_eq!(store.transaction_count(), 2);
    }

    #[tokio::test]
    async fn used_by_reports_both_roles() {
        let store = MemoryStore::new();
        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        let x1 = store.add_proxy_number(addr("901")).await.unwrap();
        let x2 = store.add_proxy_number(addr("902")).await.unwrap();
        store
            .create(new_tx(alice.id, bob.id, x1.id), ExclusionPolicy::Union)
            .await
            .unwrap();
        store
            .create(new_tx(alice.id, bob.id, x2.id), ExclusionPolicy::Union)
            .await
            .unwrap();

        let by_alice = store
            .proxy_ids_used_by(PartyRef::Requester(alice.id))
            .await
            .unwrap();
        let by_bob = store
            .proxy_ids_used_by(PartyRef::Provider(bob.id))
            .await
            .unwrap();
        assert_eq!(by_alice, BTreeSet::from([x1.id, x2.id]));
        assert_eq!(by_bob, by_alice);

        // Requester and provider id spaces are disjoint: provider 1 is not requester 1.
        let by_provider_one = store
            .proxy_ids_used_by(PartyRef::Provider(ProviderId::new(alice.id.get() + 100)))
            .await
            .unwrap();
        assert!(by_provider_one.is_empty());
    }

    #[tokio::test]
    async fn binding_matches_in_either_order() {
        let store = MemoryStore::new();
        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        let x = store.add_proxy_number(addr("900")).await.unwrap();
        let tx = store
            .create(new_tx(alice.id, bob.id, x.id), ExclusionPolicy::Union)
            .await
            .unwrap();

        for (a, b) in [("100", "200"), ("200", "100")] {
            let found = store
                .find_active_binding(x.id, &addr(a), Some(&addr(b)))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.transaction.id, tx.id);
            assert_eq!(found.candidates, 1);
        }

        assert!(store
            .find_active_binding(x.id, &addr("100"), Some(&addr("300")))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_active_binding(x.id, &addr("300"), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn ambiguous_binding_resolves_to_earliest() {
        let store = MemoryStore::new();
        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        let carol = store.add_provider("Carol", addr("300")).await.unwrap();
        let x = store.add_proxy_number(addr("900")).await.unwrap();
        let first = store
            .create(new_tx(alice.id, bob.id, x.id), ExclusionPolicy::PerPair)
            .await
            .unwrap();
        store
            .create(new_tx(alice.id, carol.id, x.id), ExclusionPolicy::PerPair)
            .await
            .unwrap();

        let found = store
            .find_active_binding(x.id, &addr("100"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.transaction.id, first.id);
        assert_eq!(found.provider_address, addr("200"));
        assert_eq!(found.candidates, 2);
    }

    #[tokio::test]
    async fn transaction_listing_joins_names() {
        let store = MemoryStore::new();
        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        let x = store.add_proxy_number(addr("900")).await.unwrap();
        store
            .create(new_tx(alice.id, bob.id, x.id), ExclusionPolicy::Union)
            .await
            .unwrap();

        let views = store.list_transactions().await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].requester_name, "Alice");
        assert_eq!(views[0].provider_name, "Bob");
        assert_eq!(views[0].proxy_address, addr("900"));
        assert_eq!(views[0].end_location, "Schiphol");
    }

    #[tokio::test]
    async fn blank_names_are_rejected_at_provisioning() {
        let store = MemoryStore::new();
        let err = store.add_requester("  ", addr("100")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.list_requesters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_names_do_not_consume_ids() {
        let store = MemoryStore::new();
        assert!(store.add_requester("", addr("100")).await.is_err());
        assert!(store.add_provider(" ", addr("200")).await.is_err());

        let alice = store.add_requester("Alice", addr("100")).await.unwrap();
        let bob = store.add_provider("Bob", addr("200")).await.unwrap();
        assert_eq!(alice.id, RequesterId::new(1));
        assert_eq!(bob.id, ProviderId::new(1));
    }
}

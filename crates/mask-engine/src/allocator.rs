//! # Proxy Number Allocation
//!
//! `allocate(requester, provider, details)`:
//!
//! 1. Resolve both parties. A missing party is reported before any ledger
//!    read.
//! 2. Compute the pair's exclusion set under the configured
//!    [`ExclusionPolicy`].
//! 3. Take the lowest-id proxy number outside the exclusion set. None left
//!    means [`AllocationError::NoCapacity`] and no ledger entry.
//! 4. Append the transaction. The ledger re-checks the exclusion set
//!    atomically; a [`LedgerError::Conflict`] sends us back to step 2 with
//!    a fresh history, up to `max_attempts` times.
//!
//! Steps 2 through 4 run under a per-pair async mutex, so two allocations
//! for the same pair never interleave inside one process. Allocations for
//! different pairs that share a party are serialized by the ledger only.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use mask_core::{
    Directory, ExclusionPolicy, Ledger, LedgerError, NewTransaction, Provider, ProviderId,
    ProxyId, ProxyNumber, Requester, RequesterId, StoreError, Transaction, TransactionDetails,
};

/// Ledger appends attempted per allocation before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Why an allocation did not produce a transaction.
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("requester {0} not found")]
    RequesterNotFound(RequesterId),

    #[error("provider {0} not found")]
    ProviderNotFound(ProviderId),

    /// Every proxy number in the pool is excluded for this pair, or
    /// concurrent allocations kept winning until the retry budget ran out.
    #[error("no proxy number available for requester {requester_id} / provider {provider_id}")]
    NoCapacity {
        requester_id: RequesterId,
        provider_id: ProviderId,
    },

    /// The ledger refused a reference that resolved a moment earlier.
    #[error("ledger constraint violation: {0}")]
    ConstraintViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AllocationError {
    /// Whether the caller named a party that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RequesterNotFound(_) | Self::ProviderNotFound(_)
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequesterNotFound(_) | Self::ProviderNotFound(_) => "not_found",
            Self::NoCapacity { .. } => "no_capacity",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::Store(_) => "store_error",
        }
    }
}

/// A successful allocation: the new transaction with both parties and the
/// bound proxy number resolved, ready for notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub transaction: Transaction,
    pub requester: Requester,
    pub provider: Provider,
    pub proxy: ProxyNumber,
}

/// Pick the lowest-id proxy number not in `excluded`.
///
/// Does not rely on `pool` being sorted.
pub fn select_proxy<'a>(
    pool: &'a [ProxyNumber],
    excluded: &BTreeSet<ProxyId>,
) -> Option<&'a ProxyNumber> {
    pool.iter()
        .filter(|proxy| !excluded.contains(&proxy.id))
        .min_by_key(|proxy| proxy.id)
}

type PairKey = (RequesterId, ProviderId);

/// Binds proxy numbers to new transactions.
pub struct Allocator {
    directory: Arc<dyn Directory>,
    ledger: Arc<dyn Ledger>,
    policy: ExclusionPolicy,
    max_attempts: u32,
    locks: DashMap<PairKey, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("policy", &self.policy)
            .field("max_attempts", &self.max_attempts)
            .field("pairs_in_flight", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl Allocator {
    /// Allocator with the default [`ExclusionPolicy`] and retry budget.
    pub fn new(directory: Arc<dyn Directory>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            directory,
            ledger,
            policy: ExclusionPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            locks: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: ExclusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the ledger append budget. Values below one are raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn policy(&self) -> ExclusionPolicy {
        self.policy
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Bind a proxy number to a new transaction between two parties.
    ///
    /// # Errors
    ///
    /// - [`AllocationError::RequesterNotFound`] / [`AllocationError::ProviderNotFound`]
    ///   if a party does not exist.
    /// - [`AllocationError::NoCapacity`] if the pool is exhausted for the
    ///   pair. Nothing is written.
    /// - [`AllocationError::Store`] if the store fails. Not retried.
    pub async fn allocate(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
        details: TransactionDetails,
    ) -> Result<Allocation, AllocationError> {
        let requester = self
            .directory
            .requester(requester_id)
            .await?
            .ok_or(AllocationError::RequesterNotFound(requester_id))?;
        let provider = self
            .directory
            .provider(provider_id)
            .await?
            .ok_or(AllocationError::ProviderNotFound(provider_id))?;

        let slot = self.pair_slot((requester_id, provider_id));
        let result = {
            let _guard = slot.acquire().await;
            self.bind(requester_id, provider_id, details).await
        };
        drop(slot);

        let (transaction, proxy) = result?;
        tracing::info!(
            transaction_id = %transaction.id,
            requester_id = %requester_id,
            provider_id = %provider_id,
            proxy = %proxy.address,
            "proxy number allocated"
        );
        Ok(Allocation {
            transaction,
            requester,
            provider,
            proxy,
        })
    }

    async fn bind(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
        details: TransactionDetails,
    ) -> Result<(Transaction, ProxyNumber), AllocationError> {
        let no_capacity = || AllocationError::NoCapacity {
            requester_id,
            provider_id,
        };

        for attempt in 1..=self.max_attempts {
            let history = self
                .ledger
                .exclusion_history(requester_id, provider_id)
                .await?;
            let excluded = self.policy.excluded(&history);
            let pool = self.directory.list_proxy_numbers().await?;

            let Some(proxy) = select_proxy(&pool, &excluded).cloned() else {
                tracing::info!(
                    requester_id = %requester_id,
                    provider_id = %provider_id,
                    pool_size = pool.len(),
                    excluded = excluded.len(),
                    policy = %self.policy,
                    "proxy pool exhausted for pair"
                );
                return Err(no_capacity());
            };

            let new = NewTransaction {
                requester_id,
                provider_id,
                proxy_id: proxy.id,
                details: details.clone(),
            };
            match self.ledger.create(new, self.policy).await {
                Ok(transaction) => return Ok((transaction, proxy)),
                Err(LedgerError::Conflict { proxy_id, .. }) => {
                    tracing::warn!(
                        requester_id = %requester_id,
                        provider_id = %provider_id,
                        proxy_id = %proxy_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        "proxy number taken by a concurrent allocation"
                    );
                }
                Err(LedgerError::ConstraintViolation(reason)) => {
                    return Err(AllocationError::ConstraintViolation(reason));
                }
                Err(LedgerError::Store(e)) => return Err(e.into()),
            }
        }

        tracing::warn!(
            requester_id = %requester_id,
            provider_id = %provider_id,
            max_attempts = self.max_attempts,
            "allocation retries exhausted"
        );
        Err(no_capacity())
    }

    fn pair_slot(&self, key: PairKey) -> PairSlot<'_> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PairSlot {
            locks: &self.locks,
            key,
            lock: Some(lock),
        }
    }
}

/// A task's claim on a pair's mutex. Dropping it, on completion or when
/// the allocation future is cancelled, removes the map entry once no
/// other task holds or awaits the mutex.
struct PairSlot<'a> {
    locks: &'a DashMap<PairKey, Arc<Mutex<()>>>,
    key: PairKey,
    lock: Option<Arc<Mutex<()>>>,
}

impl PairSlot<'_> {
    /// Wait for the pair's mutex. Always `Some` while the slot is alive.
    async fn acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

impl Drop for PairSlot<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        // Clones are only taken under the shard lock, so a count of one is final.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

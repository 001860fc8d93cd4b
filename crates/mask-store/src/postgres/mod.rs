//! # PostgreSQL Backend
//!
//! Persists parties, the proxy pool, and the ledger via SQLx. All queries
//! use runtime-checked `sqlx::query` so the crate builds without a live
//! database.
//!
//! ## Ledger appends
//!
//! `create` opens a SQL transaction and takes `FOR UPDATE` row locks on
//! the requester and then the provider. Every append touching either party
//! queues behind those locks, so the exclusion history read inside the
//! transaction cannot go stale before the insert. The
//! `transactions_pair_proxy_unique` constraint is the final backstop.

mod rows;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use mask_core::{
    Address, Binding, Directory, ExclusionHistory, ExclusionPolicy, Ledger, LedgerError,
    NewTransaction, PartyKind, PartyRef, Provider, ProviderId, Provisioning, ProxyId, ProxyNumber,
    Requester, RequesterId, StoreError, Transaction, TransactionId, TransactionView,
};

use self::rows::{
    classify, unavailable, BindingRow, PartyRow, ProxyRow, TransactionViewRow, WriteFailure,
};

const BINDING_QUERY: &str = "
    SELECT t.id, t.requester_id, t.provider_id, t.proxy_id,
           t.start_location, t.end_location, t.scheduled_at, t.created_at,
           r.address AS requester_address, p.address AS provider_address,
           COUNT(*) OVER () AS candidates
    FROM transactions t
    JOIN requesters r ON r.id = t.requester_id
    JOIN providers p ON p.id = t.provider_id
    WHERE t.proxy_id = $1
      AND ((r.address = $2 AND ($3::text IS NULL OR p.address = $3))
        OR (p.address = $2 AND ($3::text IS NULL OR r.address = $3)))
    ORDER BY t.seq
    LIMIT 1";

const TRANSACTION_VIEW_QUERY: &str = "
    SELECT t.id, r.display_name AS requester_name, p.display_name AS provider_name,
           t.start_location, t.end_location, t.scheduled_at,
           x.address AS proxy_address, t.created_at
    FROM transactions t
    JOIN requesters r ON r.id = t.requester_id
    JOIN providers p ON p.id = t.provider_id
    JOIN proxy_numbers x ON x.id = t.proxy_id
    ORDER BY t.seq";

/// PostgreSQL implementation of every store capability.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` with a bounded pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(unavailable)?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn history_with<'e, E>(
        executor: E,
        requester_id: RequesterId,
        provider_id: ProviderId,
    ) -> Result<ExclusionHistory, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows: Vec<(i64, bool, bool)> = sqlx::query_as(
            "SELECT proxy_id, requester_id = $1, provider_id = $2
             FROM transactions
             WHERE requester_id = $1 OR provider_id = $2",
        )
        .bind(requester_id.get())
        .bind(provider_id.get())
        .fetch_all(executor)
        .await?;

        let mut history = ExclusionHistory::default();
        for (proxy, by_requester, by_provider) in rows {
            let proxy = ProxyId::new(proxy);
            if by_requester {
                history.requester.insert(proxy);
            }
            if by_provider {
                history.provider.insert(proxy);
            }
            if by_requester && by_provider {
                history.pair.insert(proxy);
            }
        }
        Ok(history)
    }

    async fn list_parties(&self, kind: PartyKind) -> Result<Vec<PartyRow>, StoreError> {
        let sql = match kind {
            PartyKind::Requester => "SELECT id, display_name, address FROM requesters ORDER BY id",
            PartyKind::Provider => "SELECT id, display_name, address FROM providers ORDER BY id",
        };
        sqlx::query_as::<_, PartyRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn requester(&self, id: RequesterId) -> Result<Option<Requester>, StoreError> {
        sqlx::query_as::<_, PartyRow>(
            "SELECT id, display_name, address FROM requesters WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .map(PartyRow::into_requester)
        .transpose()
    }

    async fn provider(&self, id: ProviderId) -> Result<Option<Provider>, StoreError> {
        sqlx::query_as::<_, PartyRow>(
            "SELECT id, display_name, address FROM providers WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .map(PartyRow::into_provider)
        .transpose()
    }

    async fn proxy_number(&self, id: ProxyId) -> Result<Option<ProxyNumber>, StoreError> {
        sqlx::query_as::<_, ProxyRow>("SELECT id, address FROM proxy_numbers WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .map(ProxyRow::into_proxy)
            .transpose()
    }

    async fn proxy_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<ProxyNumber>, StoreError> {
        sqlx::query_as::<_, ProxyRow>("SELECT id, address FROM proxy_numbers WHERE address = $1")
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .map(ProxyRow::into_proxy)
            .transpose()
    }

    async fn list_proxy_numbers(&self) -> Result<Vec<ProxyNumber>, StoreError> {
        sqlx::query_as::<_, ProxyRow>("SELECT id, address FROM proxy_numbers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(ProxyRow::into_proxy)
            .collect()
    }

    async fn list_requesters(&self) -> Result<Vec<Requester>, StoreError> {
        self.list_parties(PartyKind::Requester)
            .await?
            .into_iter()
            .map(PartyRow::into_requester)
            .collect()
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, StoreError> {
        self.list_parties(PartyKind::Provider)
            .await?
            .into_iter()
            .map(PartyRow::into_provider)
            .collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgStore {
    async fn create(
        &self,
        new: NewTransaction,
        policy: ExclusionPolicy,
    ) -> Result<Transaction, LedgerError> {
        let conflict = || LedgerError::Conflict {
            requester_id: new.requester_id,
            provider_id: new.provider_id,
            proxy_id: new.proxy_id,
        };

        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // Lock order is always requester, then provider.
        let requester: Option<i64> =
            sqlx::query_scalar("SELECT id FROM requesters WHERE id = $1 FOR UPDATE")
                .bind(new.requester_id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(unavailable)?;
        if requester.is_none() {
            return Err(LedgerError::ConstraintViolation(format!(
                "requester {} does not exist",
                new.requester_id
            )));
        }

        let provider: Option<i64> =
            sqlx::query_scalar("SELECT id FROM providers WHERE id = $1 FOR UPDATE")
                .bind(new.provider_id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(unavailable)?;
        if provider.is_none() {
            return Err(LedgerError::ConstraintViolation(format!(
                "provider {} does not exist",
                new.provider_id
            )));
        }

        let history = Self::history_with(&mut *tx, new.requester_id, new.provider_id)
            .await
            .map_err(unavailable)?;
        if policy.excluded(&history).contains(&new.proxy_id) {
            return Err(conflict());
        }

        let id = TransactionId::new();
        let inserted: Result<DateTime<Utc>, sqlx::Error> = sqlx::query_scalar(
            "INSERT INTO transactions
                (id, requester_id, provider_id, proxy_id, start_location, end_location, scheduled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING created_at",
        )
        .bind(*id.as_uuid())
        .bind(new.requester_id.get())
        .bind(new.provider_id.get())
        .bind(new.proxy_id.get())
        .bind(&new.details.start_location)
        .bind(&new.details.end_location)
        .bind(new.details.scheduled_at)
        .fetch_one(&mut *tx)
        .await;

        let created_at = match inserted {
            Ok(created_at) => created_at,
            Err(e) => {
                return Err(match classify(&e) {
                    WriteFailure::Unique => conflict(),
                    WriteFailure::ForeignKey => LedgerError::ConstraintViolation(format!(
                        "proxy number {} does not exist",
                        new.proxy_id
                    )),
                    WriteFailure::Other => LedgerError::Store(unavailable(e)),
                });
            }
        };

        tx.commit().await.map_err(unavailable)?;

        Ok(Transaction {
            id,
            requester_id: new.requester_id,
            provider_id: new.provider_id,
            proxy_id: new.proxy_id,
            details: new.details,
            created_at,
        })
    }

    async fn proxy_ids_used_by(&self, party: PartyRef) -> Result<BTreeSet<ProxyId>, StoreError> {
        let (sql, id) = match party {
            PartyRef::Requester(id) => (
                "SELECT DISTINCT proxy_id FROM transactions WHERE requester_id = $1",
                id.get(),
            ),
            PartyRef::Provider(id) => (
                "SELECT DISTINCT proxy_id FROM transactions WHERE provider_id = $1",
                id.get(),
            ),
        };
        let ids: Vec<i64> = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(ids.into_iter().map(ProxyId::new).collect())
    }

    async fn proxy_ids_used_by_pair(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
    ) -> Result<BTreeSet<ProxyId>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT proxy_id FROM transactions WHERE requester_id = $1 AND provider_id = $2",
        )
        .bind(requester_id.get())
        .bind(provider_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(ids.into_iter().map(ProxyId::new).collect())
    }

    async fn exclusion_history(
        &self,
        requester_id: RequesterId,
        provider_id: ProviderId,
    ) -> Result<ExclusionHistory, StoreError> {
        Self::history_with(&self.pool, requester_id, provider_id)
            .await
            .map_err(unavailable)
    }

    async fn find_active_binding(
        &self,
        proxy_id: ProxyId,
        address_a: &Address,
        address_b: Option<&Address>,
    ) -> Result<Option<Binding>, StoreError> {
        sqlx::query_as::<_, BindingRow>(BINDING_QUERY)
            .bind(proxy_id.get())
            .bind(address_a.as_str())
            .bind(address_b.map(Address::as_str))
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .map(BindingRow::into_binding)
            .transpose()
    }

    async fn list_transactions(&self) -> Result<Vec<TransactionView>, StoreError> {
        sqlx::query_as::<_, TransactionViewRow>(TRANSACTION_VIEW_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(TransactionViewRow::into_view)
            .collect()
    }
}

#[async_trait]
impl Provisioning for PgStore {
    async fn add_requester(
        &self,
        display_name: &str,
        address: Address,
    ) -> Result<Requester, StoreError> {
        let name = mask_core::domain::validate_display_name(display_name.to_string())?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO requesters (display_name, address) VALUES ($1, $2) RETURNING id",
        )
        .bind(&name)
        .bind(address.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        tracing::info!(requester_id = id, "provisioned requester");
        Ok(Requester {
            id: RequesterId::new(id),
            display_name: name,
            address,
        })
    }

    async fn add_provider(
        &self,
        display_name: &str,
        address: Address,
    ) -> Result<Provider, StoreError> {
        let name = mask_core::domain::validate_display_name(display_name.to_string())?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO providers (display_name, address) VALUES ($1, $2) RETURNING id",
        )
        .bind(&name)
        .bind(address.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        tracing::info!(provider_id = id, "provisioned provider");
        Ok(Provider {
            id: ProviderId::new(id),
            display_name: name,
            address,
        })
    }

    async fn add_proxy_number(&self, address: Address) -> Result<ProxyNumber, StoreError> {
        let inserted: Result<i64, sqlx::Error> =
            sqlx::query_scalar("INSERT INTO proxy_numbers (address) VALUES ($1) RETURNING id")
                .bind(address.as_str())
                .fetch_one(&self.pool)
                .await;
        let id = match inserted {
            Ok(id) => id,
            Err(e) if classify(&e) == WriteFailure::Unique => {
                return Err(StoreError::DuplicateAddress(address));
            }
            Err(e) => return Err(unavailable(e)),
        };
        tracing::info!(proxy_id = id, "provisioned proxy number");
        Ok(ProxyNumber {
            id: ProxyId::new(id),
            address,
        })
    }
}

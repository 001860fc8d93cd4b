//! Internal row types for SQLx mapping and their conversion into domain
//! values. A row that fails domain validation is reported as
//! [`StoreError::Corrupt`] rather than silently patched.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mask_core::{
    Address, Binding, Party, ProviderId, ProxyId, ProxyNumber, RequesterId, StoreError,
    Transaction, TransactionDetails, TransactionId, TransactionView,
};

/// SQLSTATE for `unique_violation`.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for `foreign_key_violation`.
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Classification of a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteFailure {
    Unique,
    ForeignKey,
    Other,
}

pub(crate) fn classify_sqlstate(code: Option<&str>) -> WriteFailure {
    match code {
        Some(UNIQUE_VIOLATION) => WriteFailure::Unique,
        Some(FOREIGN_KEY_VIOLATION) => WriteFailure::ForeignKey,
        _ => WriteFailure::Other,
    }
}

pub(crate) fn classify(err: &sqlx::Error) -> WriteFailure {
    match err {
        sqlx::Error::Database(db) => classify_sqlstate(db.code().as_deref()),
        _ => WriteFailure::Other,
    }
}

pub(crate) fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn address(table: &'static str, raw: String) -> Result<Address, StoreError> {
    Address::new(raw).map_err(|e| StoreError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PartyRow {
    pub id: i64,
    pub display_name: String,
    pub address: String,
}

impl PartyRow {
    pub fn into_party<Id>(
        self,
        table: &'static str,
        id: impl FnOnce(i64) -> Id,
    ) -> Result<Party<Id>, StoreError> {
        let address = address(table, self.address)?;
        Party::new(id(self.id), self.display_name, address).map_err(|e| StoreError::Corrupt {
            table,
            reason: e.to_string(),
        })
    }

    pub fn into_requester(self) -> Result<Party<RequesterId>, StoreError> {
        self.into_party("requesters", RequesterId::new)
    }

    pub fn into_provider(self) -> Result<Party<ProviderId>, StoreError> {
        self.into_party("providers", ProviderId::new)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProxyRow {
    pub id: i64,
    pub address: String,
}

impl ProxyRow {
    pub fn into_proxy(self) -> Result<ProxyNumber, StoreError> {
        Ok(ProxyNumber {
            id: ProxyId::new(self.id),
            address: address("proxy_numbers", self.address)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BindingRow {
    pub id: Uuid,
    pub requester_id: i64,
    pub provider_id: i64,
    pub proxy_id: i64,
    pub start_location: String,
    pub end_location: String,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub requester_address: String,
    pub provider_address: String,
    pub candidates: i64,
}

impl BindingRow {
    pub fn into_binding(self) -> Result<Binding, StoreError> {
        Ok(Binding {
            transaction: Transaction {
                id: TransactionId::from_uuid(self.id),
                requester_id: RequesterId::new(self.requester_id),
                provider_id: ProviderId::new(self.provider_id),
                proxy_id: ProxyId::new(self.proxy_id),
                details: TransactionDetails {
                    start_location: self.start_location,
                    end_location: self.end_location,
                    scheduled_at: self.scheduled_at,
                },
                created_at: self.created_at,
            },
            requester_address: address("requesters", self.requester_address)?,
            provider_address: address("providers", self.provider_address)?,
            candidates: usize::try_from(self.candidates).unwrap_or(usize::MAX),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransactionViewRow {
    pub id: Uuid,
    pub requester_name: String,
    pub provider_name: String,
    pub start_location: String,
    pub end_location: String,
    pub scheduled_at: DateTime<Utc>,
    pub proxy_address: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionViewRow {
    pub fn into_view(self) -> Result<TransactionView, StoreError> {
        Ok(TransactionView {
            id: TransactionId::from_uuid(self.id),
            requester_name: self.requester_name,
            provider_name: self.provider_name,
            start_location: self.start_location,
            end_location: self.end_location,
            scheduled_at: self.scheduled_at,
            proxy_address: address("proxy_numbers", self.proxy_address)?,
            created_at: self.created_at,
        })
    }
}

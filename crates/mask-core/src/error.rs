//! # Error Types
//!
//! Errors shared by every store backend and the engine above them.
//!
//! - [`ValidationError`] — malformed input rejected at construction time.
//! - [`StoreError`] — the backing store failed. Infrastructure failures
//!   are fatal to the operation and are propagated unchanged; the core
//!   defines no retry policy for them.
//! - [`LedgerError`] — a ledger append was refused.

use thiserror::Error;

use crate::identity::{Address, ProviderId, ProxyId, RequesterId};

/// Input validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A contact address failed validation.
    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A display name failed validation.
    #[error("invalid display name: {0}")]
    InvalidDisplayName(&'static str),

    /// An exclusion policy name was not recognized.
    #[error("unknown exclusion policy {0:?} (expected \"union\" or \"per-pair\")")]
    UnknownPolicy(String),
}

/// Failure of the backing store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a domain value.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Provisioning tried to register a proxy address that already exists.
    #[error("proxy address {0} is already provisioned")]
    DuplicateAddress(Address),

    /// Provisioning input was rejected before reaching the store.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Reason a ledger append was refused.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A referenced requester, provider, or proxy number does not exist.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The proxy number is already excluded for this pair. Raised when a
    /// concurrent allocation bound it between the allocator's read and
    /// the append.
    #[error(
        "proxy {proxy_id} conflicts with existing bindings of requester {requester_id} / provider {provider_id}"
    )]
    Conflict {
        /// Requester of the refused transaction.
        requester_id: RequesterId,
        /// Provider of the refused transaction.
        provider_id: ProviderId,
        /// Proxy number that was already taken.
        proxy_id: ProxyId,
    },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

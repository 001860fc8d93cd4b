//! # mask-core — Foundational Types for the Masked Relay Stack
//!
//! The Masked Relay Stack hides the real contact addresses of a requester
//! and a provider from each other by routing their messages and calls
//! through a shared proxy number bound to their transaction.
//!
//! This crate holds everything the other crates agree on:
//!
//! - [`identity`] — identifier newtypes ([`RequesterId`], [`ProviderId`],
//!   [`ProxyId`], [`TransactionId`]) and the validated contact [`Address`].
//! - [`domain`] — parties, proxy numbers, transactions, and the joined
//!   views the admin surface reads.
//! - [`policy`] — the [`ExclusionPolicy`] deciding which proxy numbers a
//!   prospective pair may not reuse.
//! - [`store`] — the [`Directory`], [`Ledger`], and [`Provisioning`]
//!   capability traits implemented by `mask-store`.
//! - [`error`] — the store and ledger error taxonomy.
//!
//! ## Crate Policy
//!
//! - No I/O. Storage backends live in `mask-store`, the allocation and
//!   routing engine in `mask-engine`.
//! - Stores are injected as trait objects; nothing in the stack reaches
//!   for a global.

pub mod domain;
pub mod error;
pub mod identity;
pub mod policy;
pub mod store;

pub use domain::{
    Binding, NewTransaction, Party, PartyKind, PartyRef, Provider, ProxyNumber, Requester,
    Transaction, TransactionDetails, TransactionView,
};
pub use error::{LedgerError, StoreError, ValidationError};
pub use identity::{Address, ProviderId, ProxyId, RequesterId, TransactionId};
pub use policy::{ExclusionHistory, ExclusionPolicy};
pub use store::{Directory, Ledger, Provisioning};

//! # mask-store — Storage Backends
//!
//! Two implementations of the [`Directory`](mask_core::Directory),
//! [`Ledger`](mask_core::Ledger), and [`Provisioning`](mask_core::Provisioning)
//! capabilities:
//!
//! - [`MemoryStore`] — in-process maps behind a single `parking_lot`
//!   lock. State is lost on restart. Used for development and tests.
//! - [`PgStore`] — PostgreSQL via SQLx with embedded migrations. The
//!   `(requester_id, provider_id, proxy_id)` unique constraint backs the
//!   ledger's conflict check.
//!
//! ## Atomicity of `Ledger::create`
//!
//! Both backends perform the referential check, the exclusion check, and
//! the append as one atomic step: `MemoryStore` under its write lock,
//! `PgStore` inside a SQL transaction holding row locks on both parties.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

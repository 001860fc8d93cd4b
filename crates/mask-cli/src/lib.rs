//! # mask-cli — Operator CLI for the Masked Relay Stack
//!
//! Provides the `mask` command-line interface:
//!
//! - `mask init` — Run the PostgreSQL migrations.
//! - `mask requester add` / `mask provider add` — Register parties.
//! - `mask proxy add` — Extend the proxy pool.
//! - `mask list` — Print pool, transactions, and parties.
//! - `mask route` — Dry-run the inbound routing lookup.
//!
//! ```bash
//! export DATABASE_URL=postgres://localhost/mask
//! mask init
//! mask proxy add 3197010260188
//! mask requester add --name "Alice" --number 31612345678
//! mask route --proxy 3197010260188 --sender 31612345678
//! ```
//!
//! Every command function takes the store as a parameter so the same code
//! runs against `PgStore` in the binary and `MemoryStore` in tests.

pub mod list;
pub mod provision;
pub mod route;

use anyhow::{Context, Result};
use mask_core::Address;

/// Parse a command-line contact address.
pub fn parse_address(raw: &str) -> Result<Address> {
    Address::new(raw).with_context(|| format!("invalid number {raw:?}"))
}

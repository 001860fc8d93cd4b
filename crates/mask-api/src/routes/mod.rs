//! # API Route Modules
//!
//! - `transactions` — ride booking: allocation plus ride notifications.
//! - `webhooks` — inbound message and call events from the messaging
//!   provider, routed through the proxy number's transaction.
//! - `admin` — read-only listings of the pool, transactions, and parties.

pub mod admin;
pub mod transactions;
pub mod webhooks;

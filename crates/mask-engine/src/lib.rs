//! # mask-engine — Allocation and Routing
//!
//! The two operations with real invariants live here:
//!
//! - [`Allocator::allocate`] picks the lowest-numbered proxy number that
//!   the prospective (requester, provider) pair may use and binds it in
//!   the ledger.
//! - [`Router::route`] resolves an inbound (proxy, sender) pair to the
//!   real address of the sender's counterparty.
//!
//! Around them sit the renderers the inbound surface needs: [`voice`]
//! turns a routing outcome into the call-flow XML the telephony provider
//! executes, and [`notify`] composes and dispatches the two texts sent
//! after a successful allocation.
//!
//! Stores are injected as `Arc<dyn Directory>` / `Arc<dyn Ledger>`. No
//! ledger state is cached between calls.

pub mod allocator;
pub mod notify;
pub mod router;
pub mod voice;

pub use allocator::{select_proxy, Allocation, AllocationError, Allocator, DEFAULT_MAX_ATTEMPTS};
pub use notify::{notify_parties, ride_notifications, NotificationReport};
pub use router::{RouteOutcome, Router};
pub use voice::CallFlow;

//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics and the domain counters the
//!   handlers update.
//!
//! Request tracing uses `tower_http::trace::TraceLayer` directly; see
//! [`crate::app`].

pub mod metrics;

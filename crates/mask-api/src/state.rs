//! # Application State
//!
//! Everything a handler needs, cheaply cloneable. Stores are held as
//! capability trait objects so the same handlers serve the in-memory and
//! the PostgreSQL backend.

use std::sync::Arc;

use mask_core::{Directory, Ledger};
use mask_engine::{Allocator, Router};
use mask_notify::Notifier;

use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub ledger: Arc<dyn Ledger>,
    pub allocator: Arc<Allocator>,
    pub router: Router,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: ApiMetrics,
    pub metrics_enabled: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("allocator", &self.allocator)
            .field("notifier", &self.notifier.channel())
            .field("metrics_enabled", &self.metrics_enabled)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the engine over one store implementing both capabilities.
    pub fn new<S>(store: Arc<S>, notifier: Arc<dyn Notifier>, config: &AppConfig) -> Self
    where
        S: Directory + Ledger + 'static,
    {
        let directory: Arc<dyn Directory> = store.clone();
        let ledger: Arc<dyn Ledger> = store;

        let allocator = Allocator::new(directory.clone(), ledger.clone())
            .with_policy(config.exclusion_policy)
            .with_max_attempts(config.allocation_attempts);
        let router = Router::new(directory.clone(), ledger.clone());

        Self {
            directory,
            ledger,
            allocator: Arc::new(allocator),
            router,
            notifier,
            metrics: ApiMetrics::new(),
            metrics_enabled: config.metrics_enabled,
        }
    }
}

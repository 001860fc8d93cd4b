//! Masked Relay API server.
//!
//! Storage is PostgreSQL when `DATABASE_URL` is set (migrations run at
//! startup) and in-memory otherwise. Outbound texts go through MessageBird
//! when `MESSAGEBIRD_API_KEY` is set and are only logged otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mask_api::config::{AppConfig, LogFormat};
use mask_api::state::AppState;
use mask_notify::{LogNotifier, MessageBirdClient, Notifier};
use mask_store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let notifier: Arc<dyn Notifier> = match config.notifier.api_key {
        Some(_) => Arc::new(
            MessageBirdClient::new(&config.notifier).context("building MessageBird client")?,
        ),
        None => {
            tracing::warn!("MESSAGEBIRD_API_KEY not set; notifications are logged, not sent");
            Arc::new(LogNotifier)
        }
    };

    let state = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.db_max_connections)
                .await
                .context("connecting to PostgreSQL")?;
            store.migrate().await.context("running migrations")?;
            tracing::info!("using PostgreSQL store");
            AppState::new(Arc::new(store), notifier, &config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, state is lost on restart");
            AppState::new(Arc::new(MemoryStore::new()), notifier, &config)
        }
    };

    tracing::info!(
        policy = %config.exclusion_policy,
        allocation_attempts = config.allocation_attempts,
        channel = state.notifier.channel(),
        "engine configured"
    );

    let app = mask_api::app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("mask-api listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

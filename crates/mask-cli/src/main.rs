//! # mask CLI entry point
//!
//! Parses command-line arguments, connects to PostgreSQL, and dispatches
//! to subcommand handlers.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mask_cli::list::{run_list, ListArgs};
use mask_cli::provision::{run_provider, run_proxy, run_requester, PartyArgs, ProxyArgs};
use mask_cli::route::{run_route, RouteArgs};
use mask_store::PgStore;

/// Masked Relay operator CLI
///
/// Initializes the database, provisions parties and proxy numbers, and
/// inspects the ledger and routing.
#[derive(Parser, Debug)]
#[command(name = "mask", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or upgrade the schema.
    Init,

    /// Manage requesters.
    Requester(PartyArgs),

    /// Manage providers.
    Provider(PartyArgs),

    /// Manage the proxy number pool.
    Proxy(ProxyArgs),

    /// Print the pool, transactions, and parties.
    List(ListArgs),

    /// Show where an inbound text or call on a proxy number would go.
    Route(RouteArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let url = cli
        .database_url
        .context("no database configured; pass --database-url or set DATABASE_URL")?;
    let store = Arc::new(
        PgStore::connect(&url, 2)
            .await
            .context("connecting to PostgreSQL")?,
    );
    tracing::debug!("connected to PostgreSQL");

    match cli.command {
        Commands::Init => {
            store.migrate().await.context("running migrations")?;
            println!("schema is up to date");
            Ok(0)
        }
        Commands::Requester(args) => run_requester(&args, store.as_ref()).await,
        Commands::Provider(args) => run_provider(&args, store.as_ref()).await,
        Commands::Proxy(args) => run_proxy(&args, store.as_ref()).await,
        Commands::List(args) => run_list(&args, store.as_ref()).await,
        Commands::Route(args) => run_route(&args, store).await,
    }
}

//! # Route Subcommand
//!
//! Dry-runs the lookup the webhooks perform for an inbound text or call,
//! without sending anything. Useful for answering "where would this go?"
//! when a party reports a message that never arrived.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use mask_core::{Directory, Ledger};
use mask_engine::{CallFlow, RouteOutcome, Router};

use crate::parse_address;

/// Arguments for the `mask route` subcommand.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Proxy number the event arrives on.
    #[arg(long)]
    pub proxy: String,

    /// Real number of the sender or caller.
    #[arg(long)]
    pub sender: String,

    /// Also print the call-flow XML a call would receive.
    #[arg(long)]
    pub voice: bool,
}

/// Human-readable summary of a routing outcome.
pub fn describe(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Forward {
            destination,
            proxy,
            transaction_id,
            counterparty,
        } => format!(
            "forward to {counterparty} {destination} via proxy {} (transaction {transaction_id})",
            proxy.address
        ),
        RouteOutcome::Unmatched => "unmatched: no transaction binds this sender to the proxy".to_string(),
    }
}

/// Execute `mask route`. Exits with 2 when the lookup is unmatched.
pub async fn run_route<S>(args: &RouteArgs, store: Arc<S>) -> Result<u8>
where
    S: Directory + Ledger + 'static,
{
    let proxy = parse_address(&args.proxy)?;
    let sender = parse_address(&args.sender)?;

    let router = Router::new(store.clone(), store);
    let outcome = router
        .route(&proxy, &sender)
        .await
        .context("routing lookup failed")?;

    println!("{}", describe(&outcome));
    if args.voice {
        println!("{}", CallFlow::from_outcome(&outcome).to_xml());
    }

    Ok(if outcome.is_match() { 0 } else { 2 })
}

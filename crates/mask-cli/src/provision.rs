//! # Provisioning Subcommands
//!
//! `mask requester add`, `mask provider add`, and `mask proxy add`. Rows are
//! created through the store's provisioning capability; the allocation
//! engine never creates parties or proxy numbers itself.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use mask_core::Provisioning;

use crate::parse_address;

/// Arguments for the `mask requester` and `mask provider` subcommands.
#[derive(Args, Debug)]
pub struct PartyArgs {
    #[command(subcommand)]
    pub command: PartyCommand,
}

#[derive(Subcommand, Debug)]
pub enum PartyCommand {
    /// Register a party with its real number.
    Add {
        /// Display name shown in notifications.
        #[arg(long)]
        name: String,
        /// Real contact number.
        #[arg(long)]
        number: String,
    },
}

/// Arguments for the `mask proxy` subcommand.
#[derive(Args, Debug)]
pub struct ProxyArgs {
    #[command(subcommand)]
    pub command: ProxyCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProxyCommand {
    /// Add one or more numbers to the proxy pool.
    Add {
        /// Proxy numbers to add.
        #[arg(required = true)]
        numbers: Vec<String>,
    },
}

/// Execute `mask requester`.
pub async fn run_requester<S: Provisioning + ?Sized>(args: &PartyArgs, store: &S) -> Result<u8> {
    match &args.command {
        PartyCommand::Add { name, number } => {
            let requester = store
                .add_requester(name, parse_address(number)?)
                .await
                .context("adding requester")?;
            tracing::info!(requester_id = %requester.id, "requester added");
            println!("requester {} {} {}", requester.id, requester.display_name, requester.address);
            Ok(0)
        }
    }
}

/// Execute `mask provider`.
pub async fn run_provider<S: Provisioning + ?Sized>(args: &PartyArgs, store: &S) -> Result<u8> {
    match &args.command {
        PartyCommand::Add { name, number } => {
            let provider = store
                .add_provider(name, parse_address(number)?)
                .await
                .context("adding provider")?;
            tracing::info!(provider_id = %provider.id, "provider added");
            println!("provider {} {} {}", provider.id, provider.display_name, provider.address);
            Ok(0)
        }
    }
}

/// Execute `mask proxy`.
///
/// Numbers are validated up front so a typo does not leave half the batch
/// added. A number already in the pool stops the batch at that point.
pub async fn run_proxy<S: Provisioning + ?Sized>(args: &ProxyArgs, store: &S) -> Result<u8> {
    match &args.command {
        ProxyCommand::Add { numbers } => {
            let addresses = numbers
                .iter()
                .map(|n| parse_address(n))
                .collect::<Result<Vec<_>>>()?;
            for address in addresses {
                let proxy = store
                    .add_proxy_number(address.clone())
                    .await
                    .with_context(|| format!("adding proxy number {address}"))?;
                tracing::info!(proxy_id = %proxy.id, "proxy number added");
                println!("proxy {} {}", proxy.id, proxy.address);
            }
            Ok(0)
        }
    }
}

//! # List Subcommand
//!
//! Prints the proxy pool, the transaction ledger, and both party tables,
//! as aligned text or as one JSON document.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use mask_core::{Directory, Ledger, Provider, ProxyNumber, Requester, TransactionView};

/// Format for `mask list` output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the `mask list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Everything `mask list` reports.
#[derive(Debug, Serialize)]
pub struct Overview {
    pub proxy_numbers: Vec<ProxyNumber>,
    pub transactions: Vec<TransactionView>,
    pub requesters: Vec<Requester>,
    pub providers: Vec<Provider>,
}

impl Overview {
    pub async fn load<S: Directory + Ledger + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self {
            proxy_numbers: store.list_proxy_numbers().await.context("listing proxy numbers")?,
            transactions: store.list_transactions().await.context("listing transactions")?,
            requesters: store.list_requesters().await.context("listing requesters")?,
            providers: store.list_providers().await.context("listing providers")?,
        })
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("Proxy numbers ({})\n", self.proxy_numbers.len()));
        for p in &self.proxy_numbers {
            out.push_str(&format!("  {:>4}  {}\n", p.id, p.address));
        }

        out.push_str(&format!("\nTransactions ({})\n", self.transactions.len()));
        for t in &self.transactions {
            out.push_str(&format!(
                "  {}  {} -> {}  {} to {}  at {}  via {}\n",
                t.id,
                t.requester_name,
                t.provider_name,
                t.start_location,
                t.end_location,
                t.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
                t.proxy_address,
            ));
        }

        out.push_str(&format!("\nRequesters ({})\n", self.requesters.len()));
        for r in &self.requesters {
            out.push_str(&format!("  {:>4}  {}  {}\n", r.id, r.display_name, r.address));
        }

        out.push_str(&format!("\nProviders ({})\n", self.providers.len()));
        for p in &self.providers {
            out.push_str(&format!("  {:>4}  {}  {}\n", p.id, p.display_name, p.address));
        }

        out
    }
}

/// Execute `mask list`.
pub async fn run_list<S: Directory + Ledger + ?Sized>(args: &ListArgs, store: &S) -> Result<u8> {
    let overview = Overview::load(store).await?;
    match args.format {
        OutputFormat::Text => print!("{}", overview.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&overview)?),
    }
    Ok(0)
}

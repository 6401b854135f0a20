//! Explorer-driven commands: flat block and transaction lists, chain walks,
//! block transactions.

use anyhow::{Context, Result};
use blockrelay_core::Identifier;
use blockrelay_core::config::RelayConfig;
use blockrelay_services::{BatchReport, Relay};

use super::{Options, collect_ids, delivery, explorer, open_sinks, optional_node};

pub async fn blocks(config: &RelayConfig, opts: &Options, args: &[&str]) -> Result<BatchReport> {
    let ids = collect_ids(args, opts)?;
    let explorer = explorer(config)?;
    let node = optional_node(config, opts)?;
    let relay = Relay::from_config(&explorer, delivery(node.as_ref()), config);
    relay.blocks(&ids, open_sinks(config, node.is_none())?).await
}

pub async fn chain(config: &RelayConfig, opts: &Options, start: &str) -> Result<BatchReport> {
    let start: Identifier = start
        .parse()
        .with_context(|| format!("invalid start identifier '{}'", start))?;
    let explorer = explorer(config)?;
    let node = optional_node(config, opts)?;
    let relay = Relay::from_config(&explorer, delivery(node.as_ref()), config);
    relay
        .chain(start, opts.limit, open_sinks(config, node.is_none())?)
        .await
}

pub async fn block_txs(config: &RelayConfig, opts: &Options, args: &[&str]) -> Result<BatchReport> {
    let ids = collect_ids(args, opts)?;
    let explorer = explorer(config)?;
    let node = optional_node(config, opts)?;
    let relay = Relay::from_config(&explorer, delivery(node.as_ref()), config);
    relay
        .block_transactions(&ids, open_sinks(config, node.is_none())?)
        .await
}

pub async fn transactions(config: &RelayConfig, opts: &Options, args: &[&str]) -> Result<BatchReport> {
    let ids = collect_ids(args, opts)?;
    let explorer = explorer(config)?;
    let node = optional_node(config, opts)?;
    let relay = Relay::from_config(&explorer, delivery(node.as_ref()), config);
    relay
        .transactions(&ids, open_sinks(config, node.is_none())?)
        .await
}

//! Look up a file of raw transactions on the explorer.

use std::path::Path;

use anyhow::Result;
use blockrelay_core::config::RelayConfig;
use blockrelay_services::{BatchReport, Relay};

use super::{Options, delivery, explorer, open_sinks, optional_node, read_lines};

pub async fn run(config: &RelayConfig, opts: &Options, file: &str) -> Result<BatchReport> {
    let lines = read_lines(Path::new(file))?;
    let explorer = explorer(config)?;
    let node = optional_node(config, opts)?;
    let relay = Relay::from_config(&explorer, delivery(node.as_ref()), config);
    relay
        .check_transactions(&lines, open_sinks(config, node.is_none())?)
        .await
}

//! Replay a file of raw payloads into the node.

use std::path::Path;

use anyhow::Result;
use blockrelay_core::PayloadKind;
use blockrelay_core::config::RelayConfig;
use blockrelay_services::{BatchReport, submit_lines};

use super::{Options, node, open_sinks, read_lines};

pub async fn run(
    config: &RelayConfig,
    opts: &Options,
    kind: PayloadKind,
    file: &str,
) -> Result<BatchReport> {
    let lines = select(read_lines(Path::new(file))?, opts.skip, opts.take);
    let node = node(config)?;
    tracing::info!(%kind, count = lines.len(), endpoint = node.endpoint(), "submitting");
    submit_lines(
        &node,
        kind,
        &lines,
        config.policy.on_transport_error,
        open_sinks(config, false)?,
    )
    .await
}

/// Line range `[skip, skip + take)`.
fn select(lines: Vec<String>, skip: usize, take: Option<usize>) -> Vec<String> {
    lines
        .into_iter()
        .skip(skip)
        .take(take.unwrap_or(usize::MAX))
        .collect()
}

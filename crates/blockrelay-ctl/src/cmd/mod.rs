//! CLI command modules and the helpers they share.

pub mod check;
pub mod config;
pub mod fetch;
pub mod submit;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use blockrelay_core::Identifier;
use blockrelay_core::config::{RelayConfig, TransportPolicy};
use blockrelay_services::{
    BatchReport, Delivery, ErrorClassifier, ExplorerClient, RpcSubmitter, Sinks,
};

/// Flags accepted by every command.
#[derive(Debug, Default)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub err: Option<PathBuf>,
    pub ids_file: Option<PathBuf>,
    pub on_transport_error: Option<TransportPolicy>,
    pub concurrency: Option<usize>,
    pub limit: Option<u64>,
    pub skip: usize,
    pub take: Option<usize>,
    pub submit: bool,
    pub with_coinbase: bool,
    pub json: bool,
}

// ── Clients ───────────────────────────────────────────────────────────────────

pub fn explorer(config: &RelayConfig) -> Result<ExplorerClient> {
    ExplorerClient::new(
        config.explorer.base_url.clone(),
        Duration::from_secs(config.explorer.timeout_secs),
    )
}

pub fn node(config: &RelayConfig) -> Result<RpcSubmitter> {
    RpcSubmitter::from_config(&config.node, ErrorClassifier::from_policy(&config.policy))
}

/// Node client when `--submit` was given.
pub fn optional_node(config: &RelayConfig, opts: &Options) -> Result<Option<RpcSubmitter>> {
    opts.submit.then(|| node(config)).transpose()
}

pub fn delivery(node: Option<&RpcSubmitter>) -> Delivery<'_> {
    match node {
        Some(node) => Delivery::Submit(node),
        None => Delivery::Persist,
    }
}

/// Failure sink always; output sink only when payloads are persisted.
pub fn open_sinks(config: &RelayConfig, persist: bool) -> Result<Sinks> {
    let out = persist.then_some(config.output.out_path.as_path());
    Sinks::open(out, Some(config.output.err_path.as_path()))
}

// ── Input ─────────────────────────────────────────────────────────────────────

pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

/// Identifiers from the command line followed by those in `--ids`.
pub fn collect_ids(args: &[&str], opts: &Options) -> Result<Vec<Identifier>> {
    let mut words: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    if let Some(path) = &opts.ids_file {
        words.extend(read_lines(path)?);
    }
    let ids = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| {
            w.parse::<Identifier>()
                .with_context(|| format!("invalid identifier '{}'", w))
        })
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!ids.is_empty(), "no identifiers given");
    Ok(ids)
}

// ── Output ────────────────────────────────────────────────────────────────────

pub fn print_report(report: &BatchReport, opts: &Options) -> Result<()> {
    if opts.json {
        let value = serde_json::json!({
            "fetched": report.fetched,
            "submitted": report.submitted,
            "submit_transport_failures": report.submit_transport_failures,
            "halted": report.halted.as_ref().map(|h| h.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let f = &report.fetched;
    let s = &report.submitted;
    println!("═══════════════════════════════════════");
    println!("  Relay Summary");
    println!("═══════════════════════════════════════");
    println!("  Verified         : {}", f.verified);
    println!("  Invalid          : {}", f.invalid);
    println!("  Not found        : {}", f.not_found);
    println!("  Fetch failures   : {}", f.transport_failures);
    if s.total() > 0 || report.submit_transport_failures > 0 {
        println!();
        println!("  Accepted         : {}", s.accepted);
        println!("  Duplicate        : {}", s.duplicate);
        println!("  Other error      : {}", s.other);
        println!("  Submit failures  : {}", report.submit_transport_failures);
    }
    if let Some(halt) = &report.halted {
        println!();
        println!("  Halted: {}", halt);
    }
    Ok(())
}

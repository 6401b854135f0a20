//! blockrelay — pull blocks and transactions from an explorer, verify them,
//! and persist or replay them into a node.

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use blockrelay_core::PayloadKind;
use blockrelay_core::config::RelayConfig;

use cmd::Options;

fn print_usage() {
    println!("Usage: blockrelay [--config <path>] <command> [args] [options]");
    println!();
    println!("Commands:");
    println!("  fetch-blocks <id>... | --ids <file>      Fetch, verify and keep raw blocks");
    println!("  fetch-chain <start-id> [--limit <n>]     Walk the chain forward from a block");
    println!("  fetch-block-txs <id>... | --ids <file>   Fetch the transactions of blocks");
    println!("      [--with-coinbase]                    Include each block's coinbase");
    println!("  fetch-txs <id>... | --ids <file>         Fetch, verify and keep raw transactions");
    println!("  check-txs <hex-file>                     Look up raw transactions by their hash");
    println!("  submit-blocks <hex-file>                 Replay raw blocks into the node");
    println!("  submit-txs <hex-file>                    Replay raw transactions into the node");
    println!("      [--skip <n>] [--take <n>]            Line range to submit");
    println!("  config                                   Show the effective configuration");
    println!("  config init                              Write the default config file");
    println!();
    println!("Options:");
    println!("  --config <path>                 Config file (default: $BLOCKRELAY_CONFIG or ~/.config/blockrelay/config.toml)");
    println!("  --out <file>                    Verified payloads, one per line");
    println!("  --err <file>                    Original line of every failed item");
    println!("  --submit                        Submit fetched payloads instead of writing them");
    println!("  --on-transport-error abort|skip What a network failure does to the batch");
    println!("  --concurrency <n>               Parallel transaction fetches");
    println!("  --json                          Print the summary as JSON");
    println!();
    println!("Logging goes to stderr; set RUST_LOG to adjust (default: info).");
}

/// Value following the flag at `args[*i]`; advances `i` past it.
fn take_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .with_context(|| format!("{} requires a value", flag))
}

fn parse_args(args: &[String]) -> Result<(Options, Vec<String>)> {
    let mut opts = Options::default();
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" => opts.config = Some(PathBuf::from(take_value(args, &mut i)?)),
            "--out" => opts.out = Some(PathBuf::from(take_value(args, &mut i)?)),
            "--err" => opts.err = Some(PathBuf::from(take_value(args, &mut i)?)),
            "--ids" => opts.ids_file = Some(PathBuf::from(take_value(args, &mut i)?)),
            "--on-transport-error" => {
                let v = take_value(args, &mut i)?;
                opts.on_transport_error = Some(v.parse().map_err(anyhow::Error::msg)?);
            }
            "--concurrency" => {
                let v = take_value(args, &mut i)?;
                opts.concurrency = Some(v.parse().context("--concurrency must be a number")?);
            }
            "--limit" => {
                let v = take_value(args, &mut i)?;
                opts.limit = Some(v.parse().context("--limit must be a number")?);
            }
            "--skip" => {
                let v = take_value(args, &mut i)?;
                opts.skip = v.parse().context("--skip must be a number")?;
            }
            "--take" => {
                let v = take_value(args, &mut i)?;
                opts.take = Some(v.parse().context("--take must be a number")?);
            }
            "--submit" => opts.submit = true,
            "--with-coinbase" => opts.with_coinbase = true,
            "--json" => opts.json = true,
            _ => positional.push(flag.to_string()),
        }
        i += 1;
    }
    Ok((opts, positional))
}

fn load_config(opts: &Options) -> Result<RelayConfig> {
    let mut config = match &opts.config {
        Some(path) => RelayConfig::load_from(path),
        None => RelayConfig::load(),
    }
    .context("failed to load configuration")?;

    if let Some(n) = opts.concurrency {
        config.explorer.concurrency = n;
    }
    if let Some(policy) = opts.on_transport_error {
        config.policy.on_transport_error = policy;
    }
    if opts.with_coinbase {
        config.explorer.include_coinbase = true;
    }
    if let Some(out) = &opts.out {
        config.output.out_path = out.clone();
    }
    if let Some(err) = &opts.err {
        config.output.err_path = err.clone();
    }
    Ok(config)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (opts, positional) = parse_args(&args)?;
    let words: Vec<&str> = positional.iter().map(String::as_str).collect();

    if matches!(words.as_slice(), [] | ["help"] | ["--help"] | ["-h"]) {
        print_usage();
        return Ok(());
    }
    if let ["config", rest @ ..] = words.as_slice() {
        return cmd::config::run(opts.config.as_deref(), rest);
    }

    let config = load_config(&opts)?;

    let report = match words.as_slice() {
        ["fetch-blocks", ids @ ..] => cmd::fetch::blocks(&config, &opts, ids).await?,
        ["fetch-chain", start] => cmd::fetch::chain(&config, &opts, start).await?,
        ["fetch-block-txs", ids @ ..] => cmd::fetch::block_txs(&config, &opts, ids).await?,
        ["fetch-txs", ids @ ..] => cmd::fetch::transactions(&config, &opts, ids).await?,
        ["check-txs", file] => cmd::check::run(&config, &opts, file).await?,
        ["submit-blocks", file] => cmd::submit::run(&config, &opts, PayloadKind::Block, file).await?,
        ["submit-txs", file] => {
            cmd::submit::run(&config, &opts, PayloadKind::Transaction, file).await?
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    cmd::print_report(&report, &opts)?;
    if report.is_halted() {
        std::process::exit(1);
    }
    Ok(())
}

//! `config` and `config init`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blockrelay_core::config::RelayConfig;

pub fn run(explicit: Option<&Path>, rest: &[&str]) -> Result<()> {
    let path: PathBuf = explicit.map(Path::to_path_buf).unwrap_or_else(RelayConfig::file_path);

    match rest {
        [] => {
            let config = RelayConfig::load_from(&path).context("failed to load configuration")?;
            println!("# {}", path.display());
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ["init"] => {
            let existed = path.exists();
            RelayConfig::write_default_if_missing(&path)?;
            if existed {
                println!("Config already exists at {}", path.display());
            } else {
                println!("Wrote default config to {}", path.display());
            }
            Ok(())
        }
        other => anyhow::bail!("unknown config command: {}", other.join(" ")),
    }
}

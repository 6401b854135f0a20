//! Configuration system for blockrelay.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. --config <path> (explicit override on the command line)
//!   2. $BLOCKRELAY_CONFIG
//!   3. $XDG_CONFIG_HOME/blockrelay/config.toml
//!   4. ~/.config/blockrelay/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub explorer: ExplorerConfig,
    pub node: NodeConfig,
    pub policy: PolicyConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// API root; `/rawblock/{id}`, `/block/{id}`, `/rawtx/{id}` hang off it.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Max in-flight fetches for independent items. 1 = strictly sequential.
    pub concurrency: usize,
    /// Also fetch the first (coinbase) transaction of each block.
    pub include_coinbase: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// JSON-RPC endpoint of the node being fed.
    pub rpc_url: String,
    /// HTTP basic auth user. Empty = no auth header.
    pub rpc_user: String,
    pub rpc_password: String,
    /// Value of the `id` member of every request.
    pub request_id: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// RPC error codes meaning "the node already has this".
    pub duplicate_codes: Vec<i64>,
    /// What a network failure does to the rest of the batch.
    pub on_transport_error: TransportPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Verified payloads, one hex record per line.
    pub out_path: PathBuf,
    /// Original input line of every item that failed.
    pub err_path: PathBuf,
}

/// Reaction to a transport-class failure (network, timeout, bad response).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPolicy {
    /// Stop the batch. Later items may depend on the failed one.
    #[default]
    Abort,
    /// Record the item as failed and move on. For independent items only.
    Skip,
}

impl std::str::FromStr for TransportPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" | "continue" => Ok(Self::Skip),
            other => Err(format!("unknown transport policy '{}' (abort|skip)", other)),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Code the node uses for "already known / already in mempool".
pub const DEFAULT_DUPLICATE_CODE: i64 = 19;

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tbch.blockdozer.com/api".to_string(),
            timeout_secs: 30,
            concurrency: 4,
            include_coinbase: false,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:18332".to_string(),
            rpc_user: String::new(),
            rpc_password: String::new(),
            request_id: "blockrelay".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            duplicate_codes: vec![DEFAULT_DUPLICATE_CODE],
            on_transport_error: TransportPolicy::Abort,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_path: PathBuf::from("relay_out.txt"),
            err_path: PathBuf::from("relay_err.txt"),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("blockrelay")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid value for {0}: {1}")]
    InvalidEnv(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RelayConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path. A missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            RelayConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BLOCKRELAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing(path: &Path) -> Result<PathBuf, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
            }
            let text = RelayConfig::default().to_toml()?;
            std::fs::write(path, text)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        Ok(path.to_path_buf())
    }

    /// Apply BLOCKRELAY_* overrides, reading each key through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BLOCKRELAY_EXPLORER__BASE_URL") {
            self.explorer.base_url = v;
        }
        if let Some(v) = lookup("BLOCKRELAY_EXPLORER__TIMEOUT_SECS") {
            self.explorer.timeout_secs = parse_env("BLOCKRELAY_EXPLORER__TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("BLOCKRELAY_EXPLORER__CONCURRENCY") {
            self.explorer.concurrency = parse_env("BLOCKRELAY_EXPLORER__CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("BLOCKRELAY_EXPLORER__INCLUDE_COINBASE") {
            self.explorer.include_coinbase = parse_env("BLOCKRELAY_EXPLORER__INCLUDE_COINBASE", &v)?;
        }
        if let Some(v) = lookup("BLOCKRELAY_NODE__RPC_URL") {
            self.node.rpc_url = v;
        }
        if let Some(v) = lookup("BLOCKRELAY_NODE__RPC_USER") {
            self.node.rpc_user = v;
        }
        if let Some(v) = lookup("BLOCKRELAY_NODE__RPC_PASSWORD") {
            self.node.rpc_password = v;
        }
        if let Some(v) = lookup("BLOCKRELAY_NODE__REQUEST_ID") {
            self.node.request_id = v;
        }
        if let Some(v) = lookup("BLOCKRELAY_NODE__TIMEOUT_SECS") {
            self.node.timeout_secs = parse_env("BLOCKRELAY_NODE__TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("BLOCKRELAY_POLICY__DUPLICATE_CODES") {
            self.policy.duplicate_codes = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_env("BLOCKRELAY_POLICY__DUPLICATE_CODES", s.trim()))
                .collect::<Result<Vec<i64>, ConfigError>>()?;
        }
        if let Some(v) = lookup("BLOCKRELAY_POLICY__ON_TRANSPORT_ERROR") {
            self.policy.on_transport_error = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnv("BLOCKRELAY_POLICY__ON_TRANSPORT_ERROR", e))?;
        }
        if let Some(v) = lookup("BLOCKRELAY_OUTPUT__OUT_PATH") {
            self.output.out_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("BLOCKRELAY_OUTPUT__ERR_PATH") {
            self.output.err_path = PathBuf::from(v);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnv(key, value.to_string()))
}

//! Remote block source. The explorer API, behind a trait.
//!
//! One request per call. No caching and no retry here; whoever drives the
//! source decides what a failure means for the batch.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use blockrelay_core::wire::{BlockMetaResponse, RawBlockResponse, RawTxResponse, NOT_FOUND_MARKER};
use blockrelay_core::{Identifier, RawPayload};

/// Metadata of one block: where it sits and what follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub id: Identifier,
    pub height: Option<u64>,
    /// Transactions in block order; the coinbase comes first.
    pub txids: Vec<Identifier>,
    /// None on the current tip.
    pub next: Option<Identifier>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The explorer does not know the identifier.
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: Identifier },

    /// Connection refused, timeout, or the body could not be read.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Non-success status without the not-found marker.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body is not the expected JSON shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Read side of the migration.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_raw_block(&self, id: &Identifier) -> Result<RawPayload, FetchError>;

    async fn fetch_block_meta(&self, id: &Identifier) -> Result<ChainLink, FetchError>;

    async fn fetch_raw_tx(&self, id: &Identifier) -> Result<RawPayload, FetchError>;
}

// ── HTTP explorer ─────────────────────────────────────────────────────────────

/// Insight-style explorer API client.
#[derive(Clone)]
pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
}

impl ExplorerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build explorer HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str, id: &Identifier) -> String {
        format!("{}/{}/{}", self.base_url, endpoint, id)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &'static str,
        endpoint: &str,
        id: &Identifier,
    ) -> Result<T, FetchError> {
        let url = self.url(endpoint, id);
        tracing::debug!(%url, "explorer request");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| FetchError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if body.contains(NOT_FOUND_MARKER) {
            return Err(FetchError::NotFound { what, id: *id });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
            url,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl BlockSource for ExplorerClient {
    async fn fetch_raw_block(&self, id: &Identifier) -> Result<RawPayload, FetchError> {
        let resp: RawBlockResponse = self.get_json("block", "rawblock", id).await?;
        Ok(RawPayload::from_hex(resp.rawblock))
    }

    async fn fetch_block_meta(&self, id: &Identifier) -> Result<ChainLink, FetchError> {
        let resp: BlockMetaResponse = self.get_json("block", "block", id).await?;
        chain_link(id, resp).map_err(|reason| FetchError::Malformed {
            url: self.url("block", id),
            reason,
        })
    }

    async fn fetch_raw_tx(&self, id: &Identifier) -> Result<RawPayload, FetchError> {
        let resp: RawTxResponse = self.get_json("transaction", "rawtx", id).await?;
        Ok(RawPayload::from_hex(resp.rawtx))
    }
}

/// Lift the wire metadata into typed identifiers. The explorer must describe
/// the block that was asked for.
fn chain_link(requested: &Identifier, resp: BlockMetaResponse) -> Result<ChainLink, String> {
    let parse = |field: &str, value: &str| {
        value
            .parse::<Identifier>()
            .map_err(|e| format!("{} '{}': {}", field, value, e))
    };

    let id = parse("hash", &resp.hash)?;
    if id != *requested {
        return Err(format!("hash {} does not match requested {}", id, requested));
    }
    let txids = resp
        .tx
        .iter()
        .map(|t| parse("tx", t))
        .collect::<Result<Vec<_>, _>>()?;
    let next = resp
        .nextblockhash
        .as_deref()
        .map(|n| parse("nextblockhash", n))
        .transpose()?;

    Ok(ChainLink {
        id,
        height: resp.height,
        txids,
        next,
    })
}

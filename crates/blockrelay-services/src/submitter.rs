//! Write side of the migration: hand raw payloads to a node over JSON-RPC.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use blockrelay_core::config::NodeConfig;
use blockrelay_core::wire::{RpcRequest, RpcResponse};
use blockrelay_core::{PayloadKind, RawPayload};

use crate::classifier::{ErrorClassifier, SubmissionOutcome};

/// The submission never produced an outcome. Not counted.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("node at {endpoint} unreachable: {message}")]
    Transport { endpoint: String, message: String },

    #[error("node at {endpoint} sent a malformed response: {reason}")]
    Malformed { endpoint: String, reason: String },
}

#[async_trait]
pub trait NodeSubmitter: Send + Sync {
    async fn submit(
        &self,
        kind: PayloadKind,
        payload: &RawPayload,
    ) -> Result<SubmissionOutcome, SubmitError>;

    async fn submit_block(&self, payload: &RawPayload) -> Result<SubmissionOutcome, SubmitError> {
        self.submit(PayloadKind::Block, payload).await
    }

    async fn submit_transaction(
        &self,
        payload: &RawPayload,
    ) -> Result<SubmissionOutcome, SubmitError> {
        self.submit(PayloadKind::Transaction, payload).await
    }
}

/// JSON-RPC 1.0 client for `submitblock` / `sendrawtransaction`.
pub struct RpcSubmitter {
    client: reqwest::Client,
    endpoint: String,
    request_id: String,
    auth: Option<(String, String)>,
    classifier: ErrorClassifier,
}

impl RpcSubmitter {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        classifier: ErrorClassifier,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build node RPC client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_id: "blockrelay".to_string(),
            auth: None,
            classifier,
        })
    }

    pub fn from_config(node: &NodeConfig, classifier: ErrorClassifier) -> anyhow::Result<Self> {
        let mut submitter = Self::new(
            node.rpc_url.clone(),
            Duration::from_secs(node.timeout_secs),
            classifier,
        )?
        .with_request_id(node.request_id.clone());
        if !node.rpc_user.is_empty() {
            submitter = submitter.with_basic_auth(node.rpc_user.clone(), node.rpc_password.clone());
        }
        Ok(submitter)
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NodeSubmitter for RpcSubmitter {
    async fn submit(
        &self,
        kind: PayloadKind,
        payload: &RawPayload,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let transport = |e: reqwest::Error| SubmitError::Transport {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        };

        let body = serde_json::to_string(&RpcRequest::new(&self.request_id, kind, payload.as_hex()))
            .map_err(|e| SubmitError::Malformed {
                endpoint: self.endpoint.clone(),
                reason: format!("request encoding: {}", e),
            })?;

        let mut req = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain;")
            .body(body);
        if let Some((user, password)) = &self.auth {
            req = req.basic_auth(user, Some(password));
        }

        // Nodes answer RPC-level errors with HTTP 500 and a JSON body, so the
        // status is not consulted.
        let resp = req.send().await.map_err(transport)?;
        let text = resp.text().await.map_err(transport)?;

        let parsed: RpcResponse =
            serde_json::from_str(&text).map_err(|e| SubmitError::Malformed {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        Ok(self.classifier.outcome(parsed))
    }
}

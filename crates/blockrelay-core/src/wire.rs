//! Wire schemas for the two HTTP peers: the block explorer and the node.
//!
//! These types ARE the protocol. Fields the tool relies on are required, so a
//! response that lacks one fails to deserialize instead of surfacing later as
//! a missing value. Fields the tool ignores are not modelled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::PayloadKind;

// ── Explorer ──────────────────────────────────────────────────────────────────

/// Marker an explorer puts in the body for an unknown identifier.
///
/// The status code is not reliable for this, so bodies are searched for it
/// before anything else.
pub const NOT_FOUND_MARKER: &str = "Not found";

/// `GET {base}/rawblock/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlockResponse {
    pub rawblock: String,
}

/// `GET {base}/rawtx/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTxResponse {
    pub rawtx: String,
}

/// `GET {base}/block/{id}` : only the fields used for traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMetaResponse {
    pub hash: String,
    #[serde(default)]
    pub height: Option<u64>,
    pub tx: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextblockhash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previousblockhash: Option<String>,
}

// ── Node JSON-RPC ─────────────────────────────────────────────────────────────

/// JSON-RPC 1.0 request carrying one hex payload.
///
/// ```json
/// {"jsonrpc":"1.0","id":"blockrelay","method":"submitblock","params":["<hex>"]}
/// ```
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a str,
    pub method: &'static str,
    pub params: [&'a str; 1],
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: &'a str, kind: PayloadKind, hex: &'a str) -> Self {
        Self {
            jsonrpc: "1.0",
            id,
            method: kind.rpc_method(),
            params: [hex],
        }
    }
}

/// JSON-RPC response. `error` must be present, `null` on success.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Value,
    // deserialize_with disables serde's implicit None for a missing Option.
    #[serde(deserialize_with = "Option::deserialize")]
    pub error: Option<RpcError>,
}

/// The node's error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.message)
        }
    }
}

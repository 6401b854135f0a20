//! Raw serialized records as they move between explorer, files and node.
//!
//! A payload is kept as the hex text it arrived in. Explorers hand it out as
//! hex, sink files store it as hex, and the node accepts it as hex, so bytes
//! are only materialized for hashing.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::hash::Identifier;

/// What kind of record a payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Block,
    Transaction,
}

impl PayloadKind {
    /// Node RPC method that accepts this kind.
    pub fn rpc_method(self) -> &'static str {
        match self {
            PayloadKind::Block => "submitblock",
            PayloadKind::Transaction => "sendrawtransaction",
        }
    }

    /// Explorer endpoint serving the raw form.
    pub fn explorer_endpoint(self) -> &'static str {
        match self {
            PayloadKind::Block => "rawblock",
            PayloadKind::Transaction => "rawtx",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Block => f.write_str("block"),
            PayloadKind::Transaction => f.write_str("transaction"),
        }
    }
}

/// An immutable serialized block or transaction, hex-encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct RawPayload {
    hex: String,
}

impl RawPayload {
    /// Wrap hex text. Surrounding whitespace (a trailing newline from a
    /// file line, say) is dropped; nothing else is checked here.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        let hex = hex.into();
        let trimmed = hex.trim();
        if trimmed.len() == hex.len() {
            Self { hex }
        } else {
            Self {
                hex: trimmed.to_string(),
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hex: hex::encode(bytes),
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Decode to bytes. Fails on odd length or non-hex characters.
    pub fn decode(&self) -> Result<Bytes, hex::FromHexError> {
        hex::decode(&self.hex).map(Bytes::from)
    }

    /// Identifier of the decoded record.
    pub fn identifier(&self) -> Result<Identifier, hex::FromHexError> {
        Ok(Identifier::of(&self.decode()?))
    }

    /// Length in bytes once decoded.
    pub fn len(&self) -> usize {
        self.hex.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.hex.is_empty()
    }
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 16;
        match self.hex.get(..PREVIEW) {
            Some(head) if self.hex.len() > PREVIEW => {
                write!(f, "RawPayload({}… {} bytes)", head, self.len())
            }
            _ => write!(f, "RawPayload({})", self.hex),
        }
    }
}

//! Content identifiers for blocks and transactions.
//!
//! An identifier is the double SHA-256 of the serialized record:
//!
//!   id = SHA256(SHA256(payload))
//!
//! The digest is kept in internal byte order (little-endian, as hashed).
//! Every identifier that crosses the explorer, the node, a file or a log
//! line is rendered big-endian: bytes reversed, then hex-encoded. Parsing
//! does the opposite. There is no unsafe code in this module.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::payload::RawPayload;

// ── SHA-256d ──────────────────────────────────────────────────────────────────

/// Double SHA-256 of a byte slice, in internal byte order.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

// ── Identifier ────────────────────────────────────────────────────────────────

/// A 32-byte content hash naming a block or transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; 32]);

impl Identifier {
    /// Identifier of a serialized record.
    pub fn of(payload: &[u8]) -> Self {
        Self(sha256d(payload))
    }

    /// Wrap a digest already in internal byte order.
    pub fn from_internal(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The digest in internal byte order.
    pub fn as_internal(&self) -> &[u8; 32] {
        &self.0
    }

    /// Big-endian hex, the form explorers and nodes display.
    pub fn to_hex(&self) -> String {
        let mut display = self.0;
        display.reverse();
        hex::encode(display)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IdentifierError {
    #[error("identifier is not valid hex: {0}")]
    NotHex(#[from] hex::FromHexError),
    #[error("identifier must be 32 bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    /// Parse display hex (either case). Reverses back into internal order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s.trim())?;
        let mut bytes: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| IdentifierError::WrongLength(decoded.len()))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_hex())
    }
}

// ── Verification ──────────────────────────────────────────────────────────────

/// Why a payload failed verification.
#[derive(Debug, Error, PartialEq)]
pub enum Invalid {
    #[error("payload is not valid hex: {0}")]
    Undecodable(#[from] hex::FromHexError),
    #[error("identifier mismatch: claimed {claimed}, computed {computed}")]
    Mismatch {
        claimed: Identifier,
        computed: Identifier,
    },
}

/// True when `payload` hashes to `claimed`.
///
/// The comparison is case-insensitive. A claimed identifier that does not
/// parse can never match.
pub fn verify(payload: &[u8], claimed: &str) -> bool {
    match claimed.parse::<Identifier>() {
        Ok(claimed) => Identifier::of(payload) == claimed,
        Err(_) => false,
    }
}

/// Same as [`verify`] for a hex-encoded payload. Undecodable hex is a
/// verification failure, not an error.
pub fn verify_hex(hex_payload: &str, claimed: &str) -> bool {
    match hex::decode(hex_payload.trim()) {
        Ok(bytes) => verify(&bytes, claimed),
        Err(_) => false,
    }
}

/// Verify a fetched payload, reporting why it failed.
///
/// Returns the computed identifier on success.
pub fn check(payload: &RawPayload, claimed: &Identifier) -> Result<Identifier, Invalid> {
    let computed = payload.identifier()?;
    if computed == *claimed {
        Ok(computed)
    } else {
        Err(Invalid::Mismatch {
            claimed: *claimed,
            computed,
        })
    }
}

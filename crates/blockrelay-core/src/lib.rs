//! blockrelay-core — identifiers, payloads, wire schemas and configuration.
//! All other blockrelay crates depend on this one.

pub mod config;
pub mod hash;
pub mod payload;
pub mod wire;

pub use hash::{Identifier, Invalid};
pub use payload::{PayloadKind, RawPayload};

//! Submission outcome classification.
//!
//! A node answers every submission with an `error` member. `null` means
//! accepted. A non-null error is either the node saying it already has the
//! record (benign during a replay) or a real rejection. Which codes mean
//! "already have it" differs between node implementations, so the set is
//! configuration, not a constant.

use blockrelay_core::config::{PolicyConfig, DEFAULT_DUPLICATE_CODE};
use blockrelay_core::wire::{RpcError, RpcResponse};

/// Class of a non-null RPC error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    DuplicateOrExpected,
    OtherError,
}

/// Result of one completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted,
    DuplicateOrExpected(RpcError),
    OtherError(RpcError),
}

impl SubmissionOutcome {
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            SubmissionOutcome::Accepted => None,
            SubmissionOutcome::DuplicateOrExpected(e) | SubmissionOutcome::OtherError(e) => Some(e),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted => "accepted",
            SubmissionOutcome::DuplicateOrExpected(_) => "duplicate",
            SubmissionOutcome::OtherError(_) => "other-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    duplicate_codes: Vec<i64>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new([DEFAULT_DUPLICATE_CODE])
    }
}

impl ErrorClassifier {
    pub fn new(duplicate_codes: impl IntoIterator<Item = i64>) -> Self {
        Self {
            duplicate_codes: duplicate_codes.into_iter().collect(),
        }
    }

    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(policy.duplicate_codes.iter().copied())
    }

    pub fn classify(&self, code: i64) -> Classification {
        if self.duplicate_codes.contains(&code) {
            Classification::DuplicateOrExpected
        } else {
            Classification::OtherError
        }
    }

    /// Map a full RPC response to an outcome.
    pub fn outcome(&self, response: RpcResponse) -> SubmissionOutcome {
        match response.error {
            None => SubmissionOutcome::Accepted,
            Some(err) => match self.classify(err.code) {
                Classification::DuplicateOrExpected => SubmissionOutcome::DuplicateOrExpected(err),
                Classification::OtherError => SubmissionOutcome::OtherError(err),
            },
        }
    }
}

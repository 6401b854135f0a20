//! Run accounting: three-way tally of completed submissions.

use std::fmt;

use serde::Serialize;

use crate::classifier::SubmissionOutcome;

/// Accepted / duplicate / other counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub accepted: u64,
    pub duplicate: u64,
    pub other: u64,
}

impl RunCounters {
    pub fn total(&self) -> u64 {
        self.accepted + self.duplicate + self.other
    }
}

impl fmt::Display for RunCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} duplicate={} other-error={}",
            self.accepted, self.duplicate, self.other
        )
    }
}

/// Single owner of a batch's [`RunCounters`].
///
/// `record` is called once per submission that produced an outcome.
/// Transport failures never reach it.
#[derive(Debug, Default)]
pub struct RunAccountant {
    counters: RunCounters,
    attempts: u64,
}

impl RunAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Accepted => self.counters.accepted += 1,
            SubmissionOutcome::DuplicateOrExpected(_) => self.counters.duplicate += 1,
            SubmissionOutcome::OtherError(_) => self.counters.other += 1,
        }
        self.attempts += 1;
        debug_assert_eq!(self.counters.total(), self.attempts);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn summary(&self) -> RunCounters {
        self.counters
    }
}

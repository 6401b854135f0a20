//! blockrelay-services — explorer client, chain walker, node submitter and
//! the relay jobs that tie them together.

pub mod accountant;
pub mod classifier;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod submitter;
pub mod walker;


pub use accountant::{RunAccountant, RunCounters};
pub use classifier::{Classification, ErrorClassifier, SubmissionOutcome};
pub use pipeline::{submit_lines, BatchReport, Delivery, FetchTally, Halt, Relay};
pub use sink::{LineSink, Sinks};
pub use source::{BlockSource, ChainLink, ExplorerClient, FetchError};
pub use submitter::{NodeSubmitter, RpcSubmitter, SubmitError};
pub use walker::{ChainWalker, WalkError, WalkStage};

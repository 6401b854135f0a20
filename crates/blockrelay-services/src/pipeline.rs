//! Relay jobs: fetch → verify → persist or submit → account.
//!
//! Every job drives one `Batch`, which owns the sinks, the fetch tally and
//! the [`RunAccountant`]. Fetches may run ahead of the batch through a
//! bounded, order-preserving stream; everything that mutates state happens in
//! the single loop consuming that stream.

use std::ops::ControlFlow;
use std::pin::pin;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use blockrelay_core::config::{RelayConfig, TransportPolicy};
use blockrelay_core::hash::{self, Invalid};
use blockrelay_core::{Identifier, PayloadKind, RawPayload};

use crate::accountant::{RunAccountant, RunCounters};
use crate::classifier::SubmissionOutcome;
use crate::sink::Sinks;
use crate::source::{BlockSource, FetchError};
use crate::submitter::{NodeSubmitter, SubmitError};
use crate::walker::ChainWalker;

/// Log a progress line every this many items.
const PROGRESS_EVERY: u64 = 100;

/// What happens to a verified payload.
#[derive(Clone, Copy)]
pub enum Delivery<'a> {
    /// Write its hex to the output sink.
    Persist,
    /// Hand it to the node and account the outcome.
    Submit(&'a dyn NodeSubmitter),
}

/// Fetch-side counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchTally {
    pub verified: u64,
    pub invalid: u64,
    pub not_found: u64,
    pub transport_failures: u64,
}

impl FetchTally {
    pub fn failed(&self) -> u64 {
        self.invalid + self.not_found + self.transport_failures
    }
}

/// Why a batch stopped before its input ran out.
#[derive(Debug, Error)]
pub enum Halt {
    #[error("fetching {item} failed: {source}")]
    Fetch {
        item: String,
        #[source]
        source: FetchError,
    },

    #[error("submitting item #{position} failed: {source}")]
    Submit {
        position: u64,
        #[source]
        source: SubmitError,
    },

    /// The successor of an already delivered block could not be looked up.
    #[error("chain walk ended after {id}: {source}")]
    WalkEnded {
        id: Identifier,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub fetched: FetchTally,
    pub submitted: RunCounters,
    /// Submissions that never produced an outcome.
    pub submit_transport_failures: u64,
    pub halted: Option<Halt>,
}

impl BatchReport {
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

// ── Batch ─────────────────────────────────────────────────────────────────────

struct Batch<'a> {
    delivery: Delivery<'a>,
    kind: PayloadKind,
    policy: TransportPolicy,
    sinks: Sinks,
    accountant: RunAccountant,
    tally: FetchTally,
    submit_transport_failures: u64,
    items: u64,
    halted: Option<Halt>,
}

impl<'a> Batch<'a> {
    fn new(delivery: Delivery<'a>, kind: PayloadKind, policy: TransportPolicy, sinks: Sinks) -> Self {
        Self {
            delivery,
            kind,
            policy,
            sinks,
            accountant: RunAccountant::new(),
            tally: FetchTally::default(),
            submit_transport_failures: 0,
            items: 0,
            halted: None,
        }
    }

    /// Handle one fetch result. `line` is the item's original input line,
    /// written to the failure sink if anything goes wrong.
    async fn fetched(
        &mut self,
        line: &str,
        claimed: &Identifier,
        result: Result<RawPayload, FetchError>,
    ) -> Result<ControlFlow<()>> {
        self.tick();
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => return self.fetch_failed(line, claimed, e),
        };

        match hash::check(&payload, claimed) {
            Ok(_) => {
                self.tally.verified += 1;
                self.deliver(line, &payload).await
            }
            Err(invalid) => {
                self.invalid(line, claimed, &invalid)?;
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    fn invalid(&mut self, line: &str, claimed: &Identifier, invalid: &Invalid) -> Result<()> {
        self.tally.invalid += 1;
        tracing::warn!(kind = %self.kind, id = %claimed, error = %invalid, "verification failed");
        self.sinks.write_failure(line)
    }

    fn fetch_failed(
        &mut self,
        line: &str,
        id: &Identifier,
        error: FetchError,
    ) -> Result<ControlFlow<()>> {
        self.sinks.write_failure(line)?;
        if error.is_not_found() {
            self.tally.not_found += 1;
            tracing::warn!(kind = %self.kind, %id, "not found on explorer");
            return Ok(ControlFlow::Continue(()));
        }

        self.tally.transport_failures += 1;
        tracing::error!(kind = %self.kind, %id, error = %error, policy = ?self.policy, "fetch failed");
        Ok(self.apply_policy(|| Halt::Fetch {
            item: id.to_hex(),
            source: error,
        }))
    }

    async fn deliver(&mut self, line: &str, payload: &RawPayload) -> Result<ControlFlow<()>> {
        let node = match self.delivery {
            Delivery::Persist => {
                self.sinks.write_output(payload.as_hex())?;
                return Ok(ControlFlow::Continue(()));
            }
            Delivery::Submit(node) => node,
        };

        match node.submit(self.kind, payload).await {
            Ok(outcome) => {
                match &outcome {
                    SubmissionOutcome::Accepted => {
                        tracing::debug!(kind = %self.kind, "accepted");
                    }
                    SubmissionOutcome::DuplicateOrExpected(e) => {
                        tracing::debug!(kind = %self.kind, code = e.code, "already known");
                    }
                    SubmissionOutcome::OtherError(e) => {
                        tracing::warn!(kind = %self.kind, code = e.code, message = %e.message, "node rejected submission");
                        self.sinks.write_failure(line)?;
                    }
                }
                self.accountant.record(&outcome);
                Ok(ControlFlow::Continue(()))
            }
            Err(error) => {
                self.submit_transport_failures += 1;
                self.sinks.write_failure(line)?;
                tracing::error!(kind = %self.kind, error = %error, policy = ?self.policy, "submission failed");
                let position = self.items;
                Ok(self.apply_policy(|| Halt::Submit {
                    position,
                    source: error,
                }))
            }
        }
    }

    fn apply_policy(&mut self, halt: impl FnOnce() -> Halt) -> ControlFlow<()> {
        match self.policy {
            TransportPolicy::Skip => ControlFlow::Continue(()),
            TransportPolicy::Abort => {
                self.halted = Some(halt());
                ControlFlow::Break(())
            }
        }
    }

    fn tick(&mut self) {
        self.items += 1;
        if self.items % PROGRESS_EVERY == 0 {
            tracing::info!(
                kind = %self.kind,
                items = self.items,
                verified = self.tally.verified,
                failed = self.tally.failed(),
                submitted = %self.accountant.summary(),
                "progress"
            );
        }
    }

    fn finish(mut self) -> Result<BatchReport> {
        self.sinks.finish()?;
        let report = BatchReport {
            fetched: self.tally,
            submitted: self.accountant.summary(),
            submit_transport_failures: self.submit_transport_failures,
            halted: self.halted,
        };
        match &report.halted {
            None => tracing::info!(
                kind = %self.kind,
                items = self.items,
                verified = report.fetched.verified,
                failed = report.fetched.failed(),
                submitted = %report.submitted,
                "batch complete"
            ),
            Some(halt) => tracing::error!(
                kind = %self.kind,
                items = self.items,
                submitted = %report.submitted,
                reason = %halt,
                "batch halted"
            ),
        }
        Ok(report)
    }
}

// ── Relay ─────────────────────────────────────────────────────────────────────

/// Explorer-driven relay jobs.
pub struct Relay<'a> {
    source: &'a dyn BlockSource,
    delivery: Delivery<'a>,
    policy: TransportPolicy,
    concurrency: usize,
    include_coinbase: bool,
}

impl<'a> Relay<'a> {
    pub fn new(source: &'a dyn BlockSource, delivery: Delivery<'a>) -> Self {
        Self {
            source,
            delivery,
            policy: TransportPolicy::default(),
            concurrency: 1,
            include_coinbase: false,
        }
    }

    pub fn from_config(
        source: &'a dyn BlockSource,
        delivery: Delivery<'a>,
        config: &RelayConfig,
    ) -> Self {
        Self::new(source, delivery)
            .with_policy(config.policy.on_transport_error)
            .with_concurrency(config.explorer.concurrency)
            .with_coinbase(config.explorer.include_coinbase)
    }

    pub fn with_policy(mut self, policy: TransportPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Transaction fetches in flight at once. Zero is treated as one.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_coinbase(mut self, include: bool) -> Self {
        self.include_coinbase = include;
        self
    }

    fn batch(&self, kind: PayloadKind, sinks: Sinks) -> Batch<'a> {
        Batch::new(self.delivery, kind, self.policy, sinks)
    }

    /// Fetch, verify and deliver each block of a flat identifier list.
    pub async fn blocks(&self, ids: &[Identifier], sinks: Sinks) -> Result<BatchReport> {
        tracing::info!(count = ids.len(), "relaying blocks");
        let mut batch = self.batch(PayloadKind::Block, sinks);
        for id in ids {
            let result = self.source.fetch_raw_block(id).await;
            if batch.fetched(&id.to_hex(), id, result).await?.is_break() {
                break;
            }
        }
        batch.finish()
    }

    /// Walk the chain from `start` by successor pointer, at most `limit`
    /// blocks, delivering each in chain order.
    pub async fn chain(
        &self,
        start: Identifier,
        limit: Option<u64>,
        sinks: Sinks,
    ) -> Result<BatchReport> {
        tracing::info!(%start, ?limit, "walking chain");
        let mut batch = self.batch(PayloadKind::Block, sinks);
        let mut walker = ChainWalker::new(self.source, start);

        while limit.map_or(true, |l| walker.yielded() < l) {
            let Some(step) = walker.next().await else {
                break;
            };
            let flow = match step {
                Ok((id, payload)) => batch.fetched(&id.to_hex(), &id, Ok(payload)).await?,
                // The block itself was already accounted; only the walk stops.
                Err(e) if e.ends_walk() => {
                    tracing::warn!(id = %e.id, error = %e.source, "successor unknown, walk ends here");
                    batch.halted = Some(Halt::WalkEnded {
                        id: e.id,
                        source: e.source,
                    });
                    break;
                }
                Err(e) => batch.fetched(&e.id.to_hex(), &e.id, Err(e.source)).await?,
            };
            if flow.is_break() {
                break;
            }
        }

        tracing::info!(blocks = walker.yielded(), height = ?walker.height(), "chain walk finished");
        batch.finish()
    }

    /// Fetch, verify and deliver each transaction of a flat identifier list,
    /// keeping input order while up to `concurrency` fetches are in flight.
    pub async fn transactions(&self, ids: &[Identifier], sinks: Sinks) -> Result<BatchReport> {
        tracing::info!(count = ids.len(), concurrency = self.concurrency, "relaying transactions");
        let mut batch = self.batch(PayloadKind::Transaction, sinks);
        let source = self.source;
        let mut fetches = pin!(stream::iter(ids)
            .map(|txid| async move { (txid, source.fetch_raw_tx(txid).await) })
            .buffered(self.concurrency));

        while let Some((txid, result)) = fetches.next().await {
            if batch.fetched(&txid.to_hex(), txid, result).await?.is_break() {
                break;
            }
        }
        batch.finish()
    }

    /// Fetch and deliver the transactions of each block in listing order.
    /// The coinbase is skipped unless configured otherwise.
    pub async fn block_transactions(
        &self,
        block_ids: &[Identifier],
        sinks: Sinks,
    ) -> Result<BatchReport> {
        tracing::info!(blocks = block_ids.len(), concurrency = self.concurrency, "relaying block transactions");
        let mut batch = self.batch(PayloadKind::Transaction, sinks);
        let skip = usize::from(!self.include_coinbase);

        'blocks: for block_id in block_ids {
            let link = match self.source.fetch_block_meta(block_id).await {
                Ok(link) => link,
                Err(e) => {
                    batch.tick();
                    if batch.fetch_failed(&block_id.to_hex(), block_id, e)?.is_break() {
                        break;
                    }
                    continue;
                }
            };
            tracing::debug!(block = %block_id, height = ?link.height, txs = link.txids.len(), "block listed");

            let source = self.source;
            let mut fetches = pin!(stream::iter(link.txids.into_iter().skip(skip))
                .map(|txid| async move { (txid, source.fetch_raw_tx(&txid).await) })
                .buffered(self.concurrency));

            while let Some((txid, result)) = fetches.next().await {
                if batch.fetched(&txid.to_hex(), &txid, result).await?.is_break() {
                    break 'blocks;
                }
            }
        }
        batch.finish()
    }

    /// Look up each raw transaction line on the explorer by its computed
    /// identifier. Lines that are unknown, undecodable or fail to fetch go to
    /// the failure sink verbatim.
    pub async fn check_transactions<I, S>(&self, lines: I, sinks: Sinks) -> Result<BatchReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        tracing::info!(count = lines.len(), concurrency = self.concurrency, "checking transactions");

        let mut batch = self.batch(PayloadKind::Transaction, sinks);
        let source = self.source;
        let mut lookups = pin!(stream::iter(lines)
            .map(|line| async move {
                let computed = RawPayload::from_hex(line.as_str()).identifier();
                let result = match &computed {
                    Ok(id) => Some(source.fetch_raw_tx(id).await),
                    Err(_) => None,
                };
                (line, computed, result)
            })
            .buffered(self.concurrency));

        while let Some((line, computed, result)) = lookups.next().await {
            let flow = match (computed, result) {
                (Ok(id), Some(result)) => batch.fetched(&line, &id, result).await?,
                (Err(e), _) => {
                    batch.tick();
                    batch.tally.invalid += 1;
                    tracing::warn!(error = %e, "line is not hex");
                    batch.sinks.write_failure(&line)?;
                    ControlFlow::Continue(())
                }
                (Ok(_), None) => ControlFlow::Continue(()),
            };
            if flow.is_break() {
                break;
            }
        }
        batch.finish()
    }
}

/// Resubmit hex payloads, one per line, in order. Blank lines are skipped.
pub async fn submit_lines<I, S>(
    node: &dyn NodeSubmitter,
    kind: PayloadKind,
    lines: I,
    policy: TransportPolicy,
    sinks: Sinks,
) -> Result<BatchReport>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut batch = Batch::new(Delivery::Submit(node), kind, policy, sinks);
    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        batch.tick();
        let payload = RawPayload::from_hex(line);
        if batch.deliver(line, &payload).await?.is_break() {
            break;
        }
    }
    batch.finish()
}

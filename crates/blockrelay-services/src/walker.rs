//! Chain traversal by successor pointer.
//!
//! The walker is a cursor, not a recursion: each `next()` performs at most
//! one raw-payload fetch, preceded by the metadata fetch of the previous
//! block when the successor is still unknown.
//!
//!   next() #1: rawblock(start)                      → yield start
//!   next() #2: block(start) → next = b, rawblock(b) → yield b
//!   next() #n: block(tip)   → no next               → None
//!
//! A caller can persist or submit each block before the following one is
//! fetched. Traversal is single use.

use thiserror::Error;

use blockrelay_core::{Identifier, RawPayload};

use crate::source::{BlockSource, FetchError};

/// Which half of a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStage {
    RawPayload,
    Metadata,
}

#[derive(Debug, Error)]
#[error("chain walk at {id} ({stage:?}): {source}")]
pub struct WalkError {
    pub id: Identifier,
    pub stage: WalkStage,
    #[source]
    pub source: FetchError,
}

impl WalkError {
    /// True when the walk cannot go on past this error.
    pub fn ends_walk(&self) -> bool {
        self.stage == WalkStage::Metadata
    }
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    /// Fetch this block's payload next.
    Payload(Identifier),
    /// Payload handed out; look up its successor.
    Successor(Identifier),
    Done,
}

pub struct ChainWalker<'a> {
    source: &'a dyn BlockSource,
    cursor: Cursor,
    yielded: u64,
    height: Option<u64>,
}

impl<'a> ChainWalker<'a> {
    pub fn new(source: &'a dyn BlockSource, start: Identifier) -> Self {
        Self {
            source,
            cursor: Cursor::Payload(start),
            yielded: 0,
            height: None,
        }
    }

    /// Blocks handed out so far (including ones whose payload fetch failed).
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Height of the last block whose metadata carried one.
    pub fn height(&self) -> Option<u64> {
        self.height
    }

    pub fn is_done(&self) -> bool {
        matches!(self.cursor, Cursor::Done)
    }

    /// Next block in chain order, or None past the tip.
    pub async fn next(&mut self) -> Option<Result<(Identifier, RawPayload), WalkError>> {
        loop {
            match self.cursor {
                Cursor::Done => return None,
                Cursor::Successor(id) => match self.source.fetch_block_meta(&id).await {
                    Ok(link) => {
                        if link.height.is_some() {
                            self.height = link.height;
                        }
                        match link.next {
                            Some(next) => self.cursor = Cursor::Payload(next),
                            None => {
                                tracing::debug!(tip = %id, height = ?self.height, "no successor, chain walk complete");
                                self.cursor = Cursor::Done;
                                return None;
                            }
                        }
                    }
                    Err(source) => {
                        self.cursor = Cursor::Done;
                        return Some(Err(WalkError {
                            id,
                            stage: WalkStage::Metadata,
                            source,
                        }));
                    }
                },
                Cursor::Payload(id) => {
                    self.cursor = Cursor::Successor(id);
                    self.yielded += 1;
                    return Some(match self.source.fetch_raw_block(&id).await {
                        Ok(payload) => Ok((id, payload)),
                        Err(source) => Err(WalkError {
                            id,
                            stage: WalkStage::RawPayload,
                            source,
                        }),
                    });
                }
            }
        }
    }
}

//! Packrat memoization
//!
//! A memo node records its child's outcome per (parser, position, context
//! token): success or failure, the end position, and the effect delta the
//! match produced. A later invocation with the same key replays the delta
//! onto the current log and jumps to the recorded end instead of re-running
//! the child. Failures are memoized too.
//!
//! Memoizers live in the parse context's state map under the memo node's
//! [`StateKey`] and are created lazily on first use, so the grammar stays
//! shareable across concurrent parses. Nodes that deliberately share one
//! memoizer use [`MemoStrategy::SharedTable`] or
//! [`MemoStrategy::SharedRing`], which drop the parser from the key and
//! answer by position alone.

use crate::context::{ParseContext, StateKey};
use crate::effect::Effect;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::grammar::{ContextExtractFn, NodeId};
use crate::table::{RhTable, TableEntry};
use std::hash::{BuildHasher, Hash, Hasher};

/// Which memoizer a memo node creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoStrategy {
    /// Unbounded table keyed by parser, position and context token.
    Table,
    /// Unbounded table keyed by position and context token only, for memo
    /// nodes sharing one state key.
    SharedTable,
    /// Bounded ring keeping the most recent results, scanned linearly.
    Ring(usize),
    /// Bounded ring keyed by position and context token only.
    SharedRing(usize),
}

/// One memoized outcome.
pub(crate) struct MemoEntry {
    hash: u64,
    /// `None` in unqualified (shared) tables.
    parser: Option<NodeId>,
    pos: usize,
    token: u64,
    success: bool,
    end: usize,
    delta: Vec<Effect>,
}

impl TableEntry for MemoEntry {
    fn hash(&self) -> u64 {
        self.hash
    }
    fn matches(&self, other: &Self) -> bool {
        self.parser == other.parser && self.pos == other.pos && self.token == other.token
    }
}

// Fixed seeds keep entry hashes stable between lookup and insertion.
fn hasher() -> ahash::AHasher {
    ahash::RandomState::with_seeds(0x5d1f, 0x3a42, 0x90b7, 0x1c68).build_hasher()
}

fn key_hash(parser: Option<NodeId>, pos: usize, token: u64) -> u64 {
    let mut h = hasher();
    parser.hash(&mut h);
    pos.hash(&mut h);
    token.hash(&mut h);
    h.finish()
}

/// A memo node's per-parse store.
pub(crate) enum MemoState {
    Table {
        table: RhTable<MemoEntry>,
        qualified: bool,
    },
    Ring {
        entries: Vec<MemoEntry>,
        capacity: usize,
        cursor: usize,
        qualified: bool,
    },
}

impl MemoState {
    fn new(strategy: MemoStrategy) -> Self {
        match strategy {
            MemoStrategy::Table => Self::Table {
                table: RhTable::new(),
                qualified: true,
            },
            MemoStrategy::SharedTable => Self::Table {
                table: RhTable::new(),
                qualified: false,
            },
            MemoStrategy::Ring(capacity) => Self::Ring {
                entries: Vec::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
                cursor: 0,
                qualified: true,
            },
            MemoStrategy::SharedRing(capacity) => Self::Ring {
                entries: Vec::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
                cursor: 0,
                qualified: false,
            },
        }
    }

    fn lookup(&self, parser: NodeId, pos: usize, token: u64) -> Option<&MemoEntry> {
        match self {
            Self::Table { table, qualified } => {
                let key_parser = qualified.then_some(parser);
                table.get(key_hash(key_parser, pos, token), |entry| {
                    entry.parser == key_parser && entry.pos == pos && entry.token == token
                })
            }
            Self::Ring {
                entries, qualified, ..
            } => {
                let key_parser = qualified.then_some(parser);
                entries.iter().rev().find(|entry| {
                    entry.parser == key_parser && entry.pos == pos && entry.token == token
                })
            }
        }
    }

    fn store(&mut self, parser: NodeId, pos: usize, token: u64, success: bool, end: usize, delta: Vec<Effect>) {
        match self {
            Self::Table { table, qualified } => {
                let key_parser = qualified.then_some(parser);
                table.insert(MemoEntry {
                    hash: key_hash(key_parser, pos, token),
                    parser: key_parser,
                    pos,
                    token,
                    success,
                    end,
                    delta,
                });
            }
            Self::Ring {
                entries,
                capacity,
                cursor,
                qualified,
            } => {
                let key_parser = qualified.then_some(parser);
                let entry = MemoEntry {
                    hash: key_hash(key_parser, pos, token),
                    parser: key_parser,
                    pos,
                    token,
                    success,
                    end,
                    delta,
                };
                if entries.len() < *capacity {
                    entries.push(entry);
                } else {
                    entries[*cursor] = entry;
                    *cursor = (*cursor + 1) % *capacity;
                }
            }
        }
    }
}

/// Attempt a memo node: answer from the store or run the child and record.
pub(crate) fn attempt(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    node: NodeId,
    child: NodeId,
    key: StateKey,
    strategy: MemoStrategy,
    context: Option<&ContextExtractFn>,
) -> Result<bool, EngineError> {
    let pos = ctx.pos;
    let token = context.map_or(0, |extract| extract(ctx));

    let memo = ctx
        .take_state(key)
        .and_then(|boxed| boxed.downcast::<MemoState>().ok())
        .unwrap_or_else(|| Box::new(MemoState::new(strategy)));

    if let Some(entry) = memo.lookup(node, pos, token) {
        let hit = (entry.success, entry.end, entry.delta.clone());
        ctx.put_state(key, memo);
        let (success, end, delta) = hit;
        if success {
            ctx.replay(&delta);
            ctx.pos = end;
        }
        return Ok(success);
    }
    ctx.put_state(key, memo);

    let mark = ctx.log.mark();
    let success = engine.attempt(child, ctx)?;
    let (end, delta) = if success {
        (ctx.pos, ctx.log.delta(mark))
    } else {
        (pos, Vec::new())
    };

    if let Some(mut memo) = ctx
        .take_state(key)
        .and_then(|boxed| boxed.downcast::<MemoState>().ok())
    {
        memo.store(node, pos, token, success, end, delta);
        ctx.put_state(key, memo);
    }
    Ok(success)
}

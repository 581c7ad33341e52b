//! Token disambiguation cache
//!
//! A [`TokenSet`] registers the base parsers of a tokenizer, one per token
//! kind. Token nodes built over the set ask "which kind matches here"; the
//! first such question at a position runs *all* base parsers and caches the
//! arbitration result (longest match wins, first registered wins ties), so
//! alternatives re-asking at the same position after backtracking pay a
//! cache hit instead of re-tokenizing.
//!
//! The cache is per parse, keyed by position, and lives in the context's
//! state map under the set's [`StateKey`].

use crate::context::{ParseContext, StateKey};
use crate::effect::Effect;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::grammar::{NodeId, TokenKinds};
use crate::table::{RhTable, TableEntry};
use std::hash::{BuildHasher, Hash, Hasher};

/// A registry of base token parsers, one per kind index.
pub struct TokenSet {
    pub(crate) base: Vec<NodeId>,
    pub(crate) key: StateKey,
}

impl TokenSet {
    pub(crate) fn new(base: Vec<NodeId>) -> Self {
        Self {
            base,
            key: StateKey::fresh(),
        }
    }

    /// Number of registered token kinds.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// Whether the registry is empty. Registries are validated non-empty
    /// at construction, so this is false in practice.
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// Arbitration result at one position.
struct TokenEntry {
    hash: u64,
    pos: usize,
    /// Winning kind index, or `None` when no base parser matched.
    winner: Option<usize>,
    end: usize,
    delta: Vec<Effect>,
}

impl TableEntry for TokenEntry {
    fn hash(&self) -> u64 {
        self.hash
    }
    fn matches(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

fn pos_hash(pos: usize) -> u64 {
    let mut h = ahash::RandomState::with_seeds(0x77aa, 0x1b2c, 0xe93d, 0x480f).build_hasher();
    pos.hash(&mut h);
    h.finish()
}

struct TokenCache {
    table: RhTable<TokenEntry>,
}

/// Attempt a token node: arbitrate (or recall) the winning kind at the
/// current position, then accept it if it is one of the requested kinds.
pub(crate) fn attempt(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    set: &TokenSet,
    kinds: &TokenKinds,
) -> Result<bool, EngineError> {
    let pos = ctx.pos;

    let cached = recall(ctx, set.key, pos);
    let (winner, end, delta) = match cached {
        Some(hit) => hit,
        None => {
            let computed = arbitrate(engine, ctx, set)?;
            let cache = ctx
                .take_state(set.key)
                .and_then(|boxed| boxed.downcast::<TokenCache>().ok());
            let mut cache = cache.unwrap_or_else(|| {
                Box::new(TokenCache {
                    table: RhTable::new(),
                })
            });
            cache.table.insert(TokenEntry {
                hash: pos_hash(pos),
                pos,
                winner: computed.0,
                end: computed.1,
                delta: computed.2.clone(),
            });
            ctx.put_state(set.key, cache);
            computed
        }
    };

    match winner {
        Some(kind) if kinds.accepts(kind) => {
            ctx.replay(&delta);
            ctx.pos = end;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Look up a cached arbitration at `pos`.
fn recall(
    ctx: &mut ParseContext,
    key: StateKey,
    pos: usize,
) -> Option<(Option<usize>, usize, Vec<Effect>)> {
    let cache = ctx.take_state(key)?;
    let cache = match cache.downcast::<TokenCache>() {
        Ok(cache) => cache,
        Err(other) => {
            ctx.put_state(key, other);
            return None;
        }
    };
    let hit = cache
        .table
        .get(pos_hash(pos), |entry| entry.pos == pos)
        .map(|entry| (entry.winner, entry.end, entry.delta.clone()));
    ctx.put_state(key, cache);
    hit
}

/// Run every base parser at the current position and pick the longest
/// match; the first registered wins ties. Each trial is rolled back.
fn arbitrate(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    set: &TokenSet,
) -> Result<(Option<usize>, usize, Vec<Effect>), EngineError> {
    let pos = ctx.pos;
    let mut best: Option<(usize, usize, Vec<Effect>)> = None;
    for (kind, &parser) in set.base.iter().enumerate() {
        let mark = ctx.log.mark();
        if engine.attempt(parser, ctx)? {
            let end = ctx.pos;
            if best.as_ref().map_or(true, |(_, best_end, _)| end > *best_end) {
                best = Some((kind, end, ctx.log.delta(mark)));
            }
            ctx.rollback(mark);
            ctx.pos = pos;
        }
    }
    Ok(match best {
        Some((kind, end, delta)) => (Some(kind), end, delta),
        None => (None, pos, Vec::new()),
    })
}

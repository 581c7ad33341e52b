//! Seed-growing left recursion
//!
//! A left-recursive node runs its body in a fixed-point loop. The first
//! iteration parses with recursion disabled (the recursive invocation
//! fails), producing the seed. Each further iteration re-runs the body with
//! the recursive invocation answering from the best result so far (its
//! recorded effect delta plus end position); the loop stops when an
//! iteration no longer extends the match. Progress is strict, so the loop
//! terminates on finite input.
//!
//! Frames are keyed by the node's [`StateKey`] and stacked per position:
//! re-entering the same node at a *different* position starts an
//! independent fixed point. Guarded nodes hide all active frames for their
//! child's duration, which is what permits bounded middle recursion.

use crate::context::{ParseContext, StateKey};
use crate::effect::Effect;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::grammar::NodeId;

/// One active fixed-point computation.
pub(crate) struct RecFrame {
    /// Position the fixed point is anchored at.
    pub(crate) pos: usize,
    /// End of the best match so far; `None` while parsing the seed.
    pub(crate) end: Option<usize>,
    /// Effect delta of the best match so far.
    pub(crate) delta: Vec<Effect>,
}

/// Attempt a left-recursive node: either answer a recursive invocation
/// from the active frame, or drive a new fixed point.
pub(crate) fn attempt(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    child: NodeId,
    key: StateKey,
) -> Result<bool, EngineError> {
    let pos = ctx.pos;

    // Recursive invocation at an active position: answer from the frame.
    if let Some(frames) = ctx.recursions.get(&key) {
        if let Some(frame) = frames.iter().rev().find(|f| f.pos == pos) {
            return Ok(match frame.end {
                None => false,
                Some(end) => {
                    let delta = frame.delta.clone();
                    ctx.replay(&delta);
                    ctx.pos = end;
                    true
                }
            });
        }
    }

    ctx.recursions.entry(key).or_default().push(RecFrame {
        pos,
        end: None,
        delta: Vec::new(),
    });

    let grown = grow(engine, ctx, child, key, pos);

    // Frames are pushed and popped in pairs; a guard restores what it hides.
    let frame = ctx.recursions.get_mut(&key).and_then(Vec::pop);
    grown?;
    let Some(frame) = frame else {
        return Ok(false);
    };

    Ok(match frame.end {
        None => false,
        Some(end) => {
            ctx.replay(&frame.delta);
            ctx.pos = end;
            true
        }
    })
}

/// Run the fixed-point loop, leaving the best result in the top frame.
fn grow(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    child: NodeId,
    key: StateKey,
    pos: usize,
) -> Result<(), EngineError> {
    loop {
        let mark = ctx.log.mark();
        if !engine.attempt(child, ctx)? {
            return Ok(());
        }
        let end = ctx.pos;
        let best = ctx
            .recursions
            .get(&key)
            .and_then(|frames| frames.last())
            .and_then(|frame| frame.end);
        let improved = best.map_or(true, |best| end > best);
        if !improved {
            ctx.rollback(mark);
            ctx.pos = pos;
            return Ok(());
        }
        let delta = ctx.log.delta(mark);
        ctx.rollback(mark);
        ctx.pos = pos;
        if let Some(frame) = ctx.recursions.get_mut(&key).and_then(|f| f.last_mut()) {
            frame.end = Some(end);
            frame.delta = delta;
        }
    }
}

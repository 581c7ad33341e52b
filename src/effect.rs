//! Side-effect log with exact rollback
//!
//! Combinators mutate per-parse state (the value stack, custom state
//! objects, whitespace spans) only through logged [`SideEffect`]s. Applying
//! an effect is eager: it mutates the state immediately and records an undo
//! closure. Rolling back to an earlier mark pops entries in strict reverse
//! (LIFO) order and runs their undos, restoring the exact observable state
//! present at that mark.
//!
//! [`EffectLog::delta`] returns the effects applied since a mark without
//! consuming them. A delta can later be re-applied onto a descendant log to
//! replay a previously achieved result whose originating branch was
//! discarded - the longest-match, left-recursion, memo and token-cache
//! machinery all rely on this.

use crate::context::{ParseState, Value};
use std::rc::Rc;

/// Undo closure produced by applying a [`SideEffect`].
///
/// Runs exactly once, reversing exactly the mutation its apply performed.
pub type Undo = Box<dyn FnOnce(&mut ParseState)>;

/// A shareable, re-applicable side effect.
pub type Effect = Rc<dyn SideEffect>;

/// A reversible mutation of per-parse state.
///
/// `apply` must be re-runnable: the same effect may be applied again on a
/// descendant log when a recorded delta is replayed. Each application
/// returns the undo for exactly that application.
pub trait SideEffect {
    /// Mutate the state and return the closure reversing this mutation.
    fn apply(&self, state: &mut ParseState) -> Undo;
}

/// Build an effect from a closure.
///
/// The closure is the apply action; it must return the undo for the
/// mutation it just performed.
pub fn effect<F>(apply: F) -> Effect
where
    F: Fn(&mut ParseState) -> Undo + 'static,
{
    struct FnEffect<F>(F);

    impl<F> SideEffect for FnEffect<F>
    where
        F: Fn(&mut ParseState) -> Undo,
    {
        fn apply(&self, state: &mut ParseState) -> Undo {
            (self.0)(state)
        }
    }

    Rc::new(FnEffect(apply))
}

/// Push a value onto the value stack.
pub struct Push {
    value: Value,
}

impl Push {
    /// Create a push effect for `value`.
    pub fn new(value: Value) -> Effect {
        Rc::new(Self { value })
    }
}

impl SideEffect for Push {
    fn apply(&self, state: &mut ParseState) -> Undo {
        state.values.push(self.value.clone());
        Box::new(|state| {
            state.values.pop();
        })
    }
}

/// Pop every value pushed at or above a stack index.
///
/// The undo restores the popped values in their original order.
pub struct Drain {
    from: usize,
}

impl Drain {
    /// Create a drain effect truncating the stack to `from` entries.
    pub fn new(from: usize) -> Effect {
        Rc::new(Self { from })
    }
}

impl SideEffect for Drain {
    fn apply(&self, state: &mut ParseState) -> Undo {
        let removed = state.values.drain_from(self.from);
        Box::new(move |state| {
            for value in removed {
                state.values.push(value);
            }
        })
    }
}

/// Record the span of an optional whitespace match.
///
/// Emitted by the string combinator when its whitespace sub-parser
/// succeeds; logged so backtracking discards the span along with the match.
pub struct RecordWhitespace {
    span: (usize, usize),
}

impl RecordWhitespace {
    /// Create a record effect for the half-open span `start..end`.
    pub fn new(start: usize, end: usize) -> Effect {
        Rc::new(Self { span: (start, end) })
    }
}

impl SideEffect for RecordWhitespace {
    fn apply(&self, state: &mut ParseState) -> Undo {
        state.whitespace_spans.push(self.span);
        Box::new(|state| {
            state.whitespace_spans.pop();
        })
    }
}

/// Applied entry: the effect plus the undo its application produced.
struct Applied {
    effect: Effect,
    undo: Option<Undo>,
}

/// The ordered log of applied side effects.
///
/// Append-only except for truncation on rollback; never reordered.
#[derive(Default)]
pub struct EffectLog {
    applied: Vec<Applied>,
}

impl EffectLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of applied entries; doubles as the current mark.
    #[inline]
    pub fn mark(&self) -> usize {
        self.applied.len()
    }

    /// Apply `effect` to `state` and record it.
    pub fn apply(&mut self, state: &mut ParseState, effect: Effect) {
        let undo = effect.apply(state);
        self.applied.push(Applied {
            effect,
            undo: Some(undo),
        });
    }

    /// Undo every entry past `mark`, newest first.
    pub fn rollback(&mut self, mark: usize, state: &mut ParseState) {
        while self.applied.len() > mark {
            if let Some(mut entry) = self.applied.pop() {
                if let Some(undo) = entry.undo.take() {
                    undo(state);
                }
            }
        }
    }

    /// The effects applied since `mark`, oldest first, without consuming.
    pub fn delta(&self, mark: usize) -> Vec<Effect> {
        self.applied[mark..]
            .iter()
            .map(|entry| entry.effect.clone())
            .collect()
    }
}

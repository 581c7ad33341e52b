//! Mutable per-parse state
//!
//! A [`ParseContext`] is created for each top-level invocation and never
//! reused. It owns the input, the current position, the furthest-error
//! position, the side-effect log, and the [`ParseState`] that logged
//! effects mutate (value stack, keyed state objects, whitespace spans).
//!
//! Parser nodes themselves are immutable and shared across parses; any
//! per-parse state a node needs lives in the context's state map under the
//! node's [`StateKey`], so concurrent parses over the same grammar never
//! share mutable state.

use crate::effect::{Effect, EffectLog, Push};
use crate::grammar::NodeId;
use crate::leftrec::RecFrame;
use hashbrown::HashMap;
use std::any::Any;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A value on the parse value stack.
pub type Value = Rc<dyn Any>;

/// Opaque key identifying a per-parse state object.
///
/// Each key is globally unique; a parser node allocates one at construction
/// time and uses it to find its own state in any context it runs in.
/// Cooperating nodes may deliberately share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey(u64);

impl StateKey {
    /// Allocate a fresh, never-before-issued key.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The parse input: a character sequence or a token-object sequence.
///
/// Character input is indexed by code point, not by byte, so literals match
/// code-point-exactly on non-BMP input.
pub enum Input {
    /// Character input, one entry per code point.
    Text(Vec<char>),
    /// Token-list input of opaque objects.
    Objects(Vec<Value>),
}

impl Input {
    /// Build character input from a string slice.
    pub fn text(s: &str) -> Self {
        Self::Text(s.chars().collect())
    }

    /// Build token-list input.
    pub fn objects(items: Vec<Value>) -> Self {
        Self::Objects(items)
    }

    /// Number of input elements (code points or objects).
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(chars) => chars.len(),
            Self::Objects(items) => items.len(),
        }
    }

    /// Whether the input is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

/// The value stack: a double-ended stack of [`Value`]s.
///
/// Combinator actions push results here; backtracking pops them through the
/// effect log's undos, never directly.
#[derive(Default)]
pub struct ValueStack {
    items: VecDeque<Value>,
}

impl ValueStack {
    /// Push a value on top.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.items.push_back(value);
    }

    /// Pop the top value.
    #[inline]
    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop_back()
    }

    /// Peek at the top value.
    #[inline]
    pub fn peek(&self) -> Option<&Value> {
        self.items.back()
    }

    /// Number of values on the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clone the values at indices `from..`, bottom first.
    pub fn look(&self, from: usize) -> Vec<Value> {
        self.items.iter().skip(from).cloned().collect()
    }

    /// Remove and return the values at indices `from..`, bottom first.
    pub fn drain_from(&mut self, from: usize) -> Vec<Value> {
        self.items.drain(from.min(self.items.len())..).collect()
    }

    /// Consume the stack into a plain vector, bottom first.
    pub fn into_vec(self) -> Vec<Value> {
        self.items.into_iter().collect()
    }
}

/// The state mutated by logged side effects.
pub struct ParseState {
    /// The value stack (the AST under construction).
    pub values: ValueStack,
    /// Per-parse state objects, keyed by [`StateKey`]; created lazily.
    pub map: HashMap<StateKey, Box<dyn Any>>,
    /// Spans of optional whitespace matched by string combinators.
    pub whitespace_spans: Vec<(usize, usize)>,
}

impl ParseState {
    /// Create empty state.
    pub fn new() -> Self {
        Self {
            values: ValueStack::default(),
            map: HashMap::new(),
            whitespace_spans: Vec::new(),
        }
    }
}

impl Default for ParseState {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of the invocation call stack, recorded when
/// [`ParseOptions::record_call_stack`](crate::engine::ParseOptions) is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// The invoked node.
    pub node: NodeId,
    /// Input position at invocation.
    pub position: usize,
}

/// Mutable parsing context: one per top-level invocation.
pub struct ParseContext {
    /// The owned input.
    pub input: Input,
    /// Current input position. Meaningful only while parsing; reset on
    /// backtrack by the invocation wrapper.
    pub pos: usize,
    /// Furthest failure position observed so far. Monotonic.
    pub error_pos: Option<usize>,
    /// The side-effect log.
    pub log: EffectLog,
    /// State mutated through logged effects.
    pub state: ParseState,
    /// Active left-recursion frames, per `LeftRecursive` node key.
    pub(crate) recursions: HashMap<StateKey, Vec<RecFrame>>,
    /// Invocation stack, if call-stack recording is enabled.
    pub(crate) call_stack: Option<Vec<CallFrame>>,
    /// Snapshot of the call stack at the furthest error.
    pub(crate) error_call_stack: Option<Vec<CallFrame>>,
    /// Exclusive input limit imposed by a bounded combinator.
    pub(crate) end_limit: Option<usize>,
}

impl ParseContext {
    /// Create a context over `input`.
    pub fn new(input: Input, record_call_stack: bool) -> Self {
        Self {
            input,
            pos: 0,
            error_pos: None,
            log: EffectLog::new(),
            state: ParseState::new(),
            recursions: HashMap::new(),
            call_stack: record_call_stack.then(Vec::new),
            error_call_stack: None,
            end_limit: None,
        }
    }

    /// Effective input length, honoring any bounded limit.
    #[inline]
    pub fn len(&self) -> usize {
        match self.end_limit {
            Some(limit) => self.input.len().min(limit),
            None => self.input.len(),
        }
    }

    /// Whether the effective input is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The character at `pos`, if within the effective input and the input
    /// is text.
    #[inline]
    pub fn char_at(&self, pos: usize) -> Option<char> {
        if pos >= self.len() {
            return None;
        }
        match &self.input {
            Input::Text(chars) => Some(chars[pos]),
            Input::Objects(_) => None,
        }
    }

    /// The object at `pos`, if within the effective input and the input is
    /// a token list.
    #[inline]
    pub fn object_at(&self, pos: usize) -> Option<&Value> {
        if pos >= self.len() {
            return None;
        }
        match &self.input {
            Input::Text(_) => None,
            Input::Objects(items) => Some(&items[pos]),
        }
    }

    /// Apply a side effect through the log.
    #[inline]
    pub fn apply(&mut self, effect: Effect) {
        self.log.apply(&mut self.state, effect);
    }

    /// Push a value onto the value stack as a logged effect.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.apply(Push::new(value));
    }

    /// Re-apply a recorded delta, oldest effect first.
    pub fn replay(&mut self, delta: &[Effect]) {
        for effect in delta {
            self.apply(effect.clone());
        }
    }

    /// Roll the log back to `mark`.
    #[inline]
    pub fn rollback(&mut self, mark: usize) {
        self.log.rollback(mark, &mut self.state);
    }

    /// Record a failure at `position`, advancing the furthest error and
    /// snapshotting the call stack when it moves.
    pub(crate) fn register_failure(&mut self, position: usize) {
        if self.error_pos.map_or(true, |err| position > err) {
            self.error_pos = Some(position);
            if let Some(stack) = &self.call_stack {
                self.error_call_stack = Some(stack.clone());
            }
        }
    }

    /// Snapshot the furthest-error state, for speculative combinators.
    pub(crate) fn save_error(&self) -> (Option<usize>, Option<Vec<CallFrame>>) {
        (self.error_pos, self.error_call_stack.clone())
    }

    /// Restore a furthest-error snapshot.
    pub(crate) fn restore_error(&mut self, saved: (Option<usize>, Option<Vec<CallFrame>>)) {
        self.error_pos = saved.0;
        self.error_call_stack = saved.1;
    }

    /// Remove a state object for exclusive use; pair with [`Self::put_state`].
    pub(crate) fn take_state(&mut self, key: StateKey) -> Option<Box<dyn Any>> {
        self.state.map.remove(&key)
    }

    /// Return a state object taken with [`Self::take_state`].
    pub(crate) fn put_state(&mut self, key: StateKey, value: Box<dyn Any>) {
        self.state.map.insert(key, value);
    }

    /// Borrow the state object under `key`, creating it with `init` first
    /// if absent. For use by user actions and custom parsers.
    ///
    /// # Panics
    ///
    /// Panics if the object stored under `key` is not a `T`. Each key must
    /// be used with a single state type for the lifetime of the parse.
    pub fn state_entry<T: Any>(&mut self, key: StateKey, init: impl FnOnce() -> T) -> &mut T {
        self.state
            .map
            .entry(key)
            .or_insert_with(|| Box::new(init()))
            .downcast_mut::<T>()
            .expect("state object type mismatch for key")
    }
}

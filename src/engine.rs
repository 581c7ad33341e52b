//! Parser execution
//!
//! [`run`] drives a grammar over an input. Every node invocation goes
//! through one wrapper ([`Engine::attempt`]): it is the only place that
//! resets the position and rolls the effect log back on failure, and the
//! only place the furthest-error position is updated. Combinator execution
//! itself ([`Engine::execute`]) can therefore assume a clean contract: a
//! child either succeeds with the position advanced and its effects
//! applied, or fails with no observable trace.
//!
//! Ordinary parse failure is a normal outcome ([`ParseResult`] with
//! `success == false`); [`EngineError`] is reserved for grammars that are
//! unusable (malformed, unresolved references, runaway recursion).

use crate::analysis;
use crate::context::{CallFrame, Input, ParseContext, StateKey, Value};
use crate::custom::Recurse;
use crate::effect::{Drain, Effect, RecordWhitespace};
use crate::error::EngineError;
use crate::expr;
use crate::grammar::{ActionScope, Grammar, Kind, NodeId};
use crate::leftrec;
use crate::memo;
use crate::tokens;
use crate::trace::Metrics;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::time::Instant;

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Default recursion-depth limit.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Knobs for a single [`run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Record the invocation call stack and snapshot it at the furthest
    /// error. Costs allocation per invocation; off by default.
    pub record_call_stack: bool,
    /// Reject malformed grammars before parsing. On by default.
    pub well_formedness_check: bool,
    /// Collect per-node invocation metrics.
    pub trace: bool,
    /// Recursion-depth guard limit.
    pub max_recursion_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            record_call_stack: false,
            well_formedness_check: true,
            trace: false,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable call-stack recording.
    pub fn with_call_stack(mut self) -> Self {
        self.record_call_stack = true;
        self
    }

    /// Skip the pre-parse well-formedness check.
    pub fn without_check(mut self) -> Self {
        self.well_formedness_check = false;
        self
    }

    /// Enable per-node metrics collection.
    pub fn with_trace(mut self) -> Self {
        self.trace = true;
        self
    }

    /// Set the recursion-depth guard limit.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

/// Outcome of a [`run`].
pub struct ParseResult {
    /// Whether the root matched.
    pub success: bool,
    /// Whether the root matched the entire input.
    pub full_match: bool,
    /// Input elements consumed by the match; 0 on failure.
    pub match_len: usize,
    /// Furthest input position any failure was observed at.
    pub error_pos: Option<usize>,
    /// Final value stack, bottom first.
    pub values: Vec<Value>,
    /// Per-parse state objects touched during the parse (memo tables,
    /// token caches, custom state), keyed by their owners' state keys.
    pub states: HashMap<StateKey, Box<dyn Any>>,
    /// Spans of optional whitespace consumed by string combinators.
    pub whitespace_spans: Vec<(usize, usize)>,
    /// Call stack snapshot at the furthest error, when recorded.
    pub error_call_stack: Option<Vec<CallFrame>>,
    /// Per-node metrics, when tracing was enabled.
    pub metrics: Option<Metrics>,
}

// The state map holds opaque `dyn Any` objects; summarize the unprintable
// fields by count.
impl std::fmt::Debug for ParseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseResult")
            .field("success", &self.success)
            .field("full_match", &self.full_match)
            .field("match_len", &self.match_len)
            .field("error_pos", &self.error_pos)
            .field("values", &self.values.len())
            .field("states", &self.states.len())
            .field("whitespace_spans", &self.whitespace_spans)
            .field("error_call_stack", &self.error_call_stack)
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Execution state threaded through one parse.
pub(crate) struct Engine<'g> {
    grammar: &'g Grammar,
    depth: usize,
    max_depth: usize,
    metrics: Option<Metrics>,
}

impl<'g> Engine<'g> {
    fn new(grammar: &'g Grammar, options: &ParseOptions) -> Self {
        Self {
            grammar,
            depth: 0,
            max_depth: options.max_recursion_depth,
            metrics: options.trace.then(Metrics::default),
        }
    }

    /// The invocation wrapper. On failure the position is reset and every
    /// effect the subtree applied is rolled back; the furthest-error
    /// position is updated first, while the failing frame is still on the
    /// call stack.
    pub(crate) fn attempt(
        &mut self,
        id: NodeId,
        ctx: &mut ParseContext,
    ) -> Result<bool, EngineError> {
        let pos0 = ctx.pos;
        let mark = ctx.log.mark();
        if self.depth >= self.max_depth {
            log_debug!("recursion guard tripped at node {} position {}", id, pos0);
            return Err(EngineError::RecursionOverflow {
                position: pos0,
                depth: self.depth,
            });
        }
        self.depth += 1;
        if let Some(stack) = &mut ctx.call_stack {
            stack.push(CallFrame {
                node: id,
                position: pos0,
            });
        }
        let started = self.metrics.as_ref().map(|_| Instant::now());

        let outcome = self.execute(id, ctx);

        if matches!(outcome, Ok(false)) {
            ctx.register_failure(ctx.pos);
        }
        if let Some(stack) = &mut ctx.call_stack {
            stack.pop();
        }
        self.depth -= 1;
        if let (Some(metrics), Some(started)) = (&mut self.metrics, started) {
            metrics.record(id, matches!(outcome, Ok(true)), started.elapsed());
        }

        let matched = outcome?;
        if !matched {
            ctx.pos = pos0;
            ctx.rollback(mark);
        }
        Ok(matched)
    }

    fn execute(&mut self, id: NodeId, ctx: &mut ParseContext) -> Result<bool, EngineError> {
        let grammar = self.grammar;
        match grammar.kind(id) {
            Kind::Empty => Ok(true),

            Kind::Fail => Ok(false),

            Kind::Any => {
                if ctx.pos < ctx.len() {
                    ctx.pos += 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }

            Kind::CharPred { pred, .. } => {
                if ctx.char_at(ctx.pos).is_some_and(|c| pred(c)) {
                    ctx.pos += 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }

            Kind::ObjectPred { pred, .. } => {
                let matched = ctx
                    .object_at(ctx.pos)
                    .is_some_and(|obj| pred(obj.as_ref()));
                if matched {
                    ctx.pos += 1;
                }
                Ok(matched)
            }

            Kind::ContextPred { pred, .. } => Ok(pred(ctx)),

            Kind::Str {
                literal,
                whitespace,
            } => {
                let start = ctx.pos;
                for (i, &c) in literal.iter().enumerate() {
                    if ctx.char_at(start + i) != Some(c) {
                        return Ok(false);
                    }
                }
                ctx.pos = start + literal.len();
                if let Some(ws) = *whitespace {
                    // Optional cosmetic match; it must not move the
                    // furthest error.
                    let saved = ctx.save_error();
                    let ws_start = ctx.pos;
                    if self.attempt(ws, ctx)? && ctx.pos > ws_start {
                        ctx.apply(RecordWhitespace::new(ws_start, ctx.pos));
                    }
                    ctx.restore_error(saved);
                }
                Ok(true)
            }

            Kind::Seq { children } => {
                for &child in children {
                    if !self.attempt(child, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }

            Kind::Choice { children } => {
                for &child in children {
                    if self.attempt(child, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }

            Kind::Longest { children } => {
                let pos0 = ctx.pos;
                let mark = ctx.log.mark();
                let mut best: Option<(usize, Vec<Effect>)> = None;
                for &child in children {
                    if self.attempt(child, ctx)? {
                        let end = ctx.pos;
                        // Strict improvement only: the first child wins ties.
                        if best.as_ref().map_or(true, |(b, _)| end > *b) {
                            best = Some((end, ctx.log.delta(mark)));
                        }
                        ctx.rollback(mark);
                        ctx.pos = pos0;
                    }
                }
                Ok(match best {
                    Some((end, delta)) => {
                        ctx.replay(&delta);
                        ctx.pos = end;
                        true
                    }
                    None => false,
                })
            }

            Kind::Repeat { child, min, exact } => {
                let (child, min, exact) = (*child, *min, *exact);
                for _ in 0..min {
                    if !self.attempt(child, ctx)? {
                        return Ok(false);
                    }
                }
                if !exact {
                    loop {
                        let before = ctx.pos;
                        if !self.attempt(child, ctx)? {
                            break;
                        }
                        // A repetition over a zero-width match cannot make
                        // progress; stop instead of spinning.
                        if ctx.pos == before {
                            break;
                        }
                    }
                }
                Ok(true)
            }

            Kind::Around {
                around,
                inside,
                min,
                exact,
                trailing,
            } => {
                let (around, inside) = (*around, *inside);
                let (min, exact, trailing) = (*min, *exact, *trailing);
                let mut count = 0usize;
                // Exactly zero repetitions means matching the empty form;
                // run nothing, like an exact zero-count repeat.
                if !(exact && min == 0) && self.attempt(around, ctx)? {
                    count = 1;
                    loop {
                        if exact && count == min {
                            break;
                        }
                        let mark = ctx.log.mark();
                        let before = ctx.pos;
                        if !self.attempt(inside, ctx)? {
                            break;
                        }
                        if !self.attempt(around, ctx)? {
                            if !trailing {
                                ctx.rollback(mark);
                                ctx.pos = before;
                            }
                            break;
                        }
                        count += 1;
                        if ctx.pos == before {
                            break;
                        }
                    }
                }
                if count < min {
                    return Ok(false);
                }
                if exact && trailing && count > 0 {
                    let _ = self.attempt(inside, ctx)?;
                }
                Ok(true)
            }

            Kind::Opt { child } => {
                let _ = self.attempt(*child, ctx)?;
                Ok(true)
            }

            Kind::Not { child } => {
                // Speculative: neither outcome may move the furthest error.
                let saved = ctx.save_error();
                let matched = self.attempt(*child, ctx)?;
                ctx.restore_error(saved);
                // On a child match this node fails and the wrapper rolls
                // the child's effects back along with everything else.
                Ok(!matched)
            }

            Kind::Lookahead { child } => {
                let saved = ctx.save_error();
                let pos0 = ctx.pos;
                let matched = self.attempt(*child, ctx)?;
                ctx.restore_error(saved);
                if matched {
                    ctx.pos = pos0;
                }
                Ok(matched)
            }

            Kind::Collect {
                child,
                pops,
                action,
            } => {
                let (child, pops) = (*child, *pops);
                let start = ctx.pos;
                let stack0 = ctx.state.values.len();
                if !self.attempt(child, ctx)? {
                    return Ok(false);
                }
                let items = ctx.state.values.look(stack0);
                if pops {
                    ctx.apply(Drain::new(stack0));
                }
                let scope = ActionScope {
                    start,
                    end: ctx.pos,
                    items,
                };
                action.run(ctx, &scope);
                Ok(true)
            }

            Kind::LeftRecursive { child, key } => leftrec::attempt(self, ctx, *child, *key),

            Kind::Guarded { child } => {
                let child = *child;
                let hidden = std::mem::take(&mut ctx.recursions);
                let result = self.attempt(child, ctx);
                ctx.recursions = hidden;
                result
            }

            Kind::LeftExpr(spec) => expr::attempt_left(self, ctx, spec),

            Kind::RightExpr(spec) => expr::attempt_right(self, ctx, spec),

            Kind::Memo {
                child,
                key,
                strategy,
                context,
            } => memo::attempt(self, ctx, id, *child, *key, *strategy, context.as_ref()),

            Kind::Token { set, kinds } => tokens::attempt(self, ctx, set, kinds),

            Kind::Bounded {
                coarse,
                fine,
                fallback,
            } => {
                let (coarse, fine) = (*coarse, *fine);
                let pos0 = ctx.pos;
                let mark = ctx.log.mark();
                if !self.attempt(coarse, ctx)? {
                    return Ok(false);
                }
                let end = ctx.pos;
                let coarse_delta = ctx.log.delta(mark);
                ctx.rollback(mark);
                ctx.pos = pos0;

                let saved_limit = ctx.end_limit;
                ctx.end_limit = Some(end);
                let fine_matched = self.attempt(fine, ctx);
                ctx.end_limit = saved_limit;
                let fine_matched = fine_matched?;

                if fine_matched && ctx.pos == end {
                    return Ok(true);
                }
                // The fine parse did not cover the span exactly; restore
                // the coarse outcome and let the fallback decide.
                if fine_matched {
                    ctx.rollback(mark);
                    ctx.pos = pos0;
                }
                ctx.replay(&coarse_delta);
                ctx.pos = end;
                Ok(fallback(ctx))
            }

            Kind::Ref { target } => match *target {
                Some(target) => self.attempt(target, ctx),
                None => Err(EngineError::Unresolved { node: id }),
            },

            Kind::Custom(obj) => {
                let obj = std::sync::Arc::clone(obj);
                obj.attempt(self, ctx)
            }
        }
    }
}

impl Recurse for Engine<'_> {
    fn attempt(&mut self, id: NodeId, ctx: &mut ParseContext) -> Result<bool, EngineError> {
        Engine::attempt(self, id, ctx)
    }
}

/// Parse `input` with `grammar` starting at `root`.
///
/// Ordinary failure is `Ok` with `success == false`; see
/// [`EngineError`] for the hard-failure cases. Panics from user actions
/// propagate, with the active input position reported first.
pub fn run(
    grammar: &Grammar,
    root: NodeId,
    input: impl Into<Input>,
    options: &ParseOptions,
) -> Result<ParseResult, EngineError> {
    if options.well_formedness_check {
        let report = analysis::check(grammar, root);
        if !report.is_well_formed() {
            return Err(EngineError::Malformed(report));
        }
    }
    if let Some(node) = grammar.find_unresolved(root) {
        return Err(EngineError::Unresolved { node });
    }

    let mut ctx = ParseContext::new(input.into(), options.record_call_stack);
    let mut engine = Engine::new(grammar, options);
    log_debug!("run: root {} over {} input elements", root, ctx.input.len());

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        engine.attempt(root, &mut ctx)
    }));
    let matched = match outcome {
        Ok(result) => result?,
        Err(payload) => {
            eprintln!("parse aborted by panic at input position {}", ctx.pos);
            std::panic::resume_unwind(payload);
        }
    };

    let input_len = ctx.input.len();
    Ok(ParseResult {
        success: matched,
        full_match: matched && ctx.pos == input_len,
        match_len: if matched { ctx.pos } else { 0 },
        error_pos: ctx.error_pos,
        values: ctx.state.values.into_vec(),
        states: ctx.state.map,
        whitespace_spans: ctx.state.whitespace_spans,
        error_call_stack: ctx.error_call_stack,
        metrics: engine.metrics,
    })
}

impl Grammar {
    /// Convenience wrapper over [`run`].
    pub fn run(
        &self,
        root: NodeId,
        input: impl Into<Input>,
        options: &ParseOptions,
    ) -> Result<ParseResult, EngineError> {
        run(self, root, input, options)
    }
}

//! Associative expression matchers
//!
//! Operator expressions could be written with choice and repetition, but
//! associativity-aware folding of the value stack cannot: a left fold must
//! run its step action after every operator (so the folded value is on the
//! stack for the next iteration), while a right fold must defer all steps
//! and apply them innermost-first. [`ExprSpec`] captures the operator
//! configuration once; the two node kinds built from it share it and differ
//! only in fold discipline.
//!
//! An expression matches `affix* left (infix right)*` where `affix` means
//! suffix operators for the left-associative form and prefix operators for
//! the right-associative one. Operators are tried in registration order,
//! which is their priority order.

use crate::context::ParseContext;
use crate::effect::Drain;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::grammar::{ActionScope, NodeId, StackAction};
use crate::error::GrammarError;
use std::sync::Arc;

type Step = Option<Arc<dyn StackAction>>;

/// Operator configuration shared by the two expression node kinds.
pub struct ExprSpec {
    pub(crate) left: NodeId,
    pub(crate) right: NodeId,
    pub(crate) infixes: Vec<NodeId>,
    pub(crate) infix_steps: Vec<Step>,
    pub(crate) affixes: Vec<NodeId>,
    pub(crate) affix_steps: Vec<Step>,
    pub(crate) operator_required: bool,
}

impl ExprSpec {
    /// Every grammar node the expression may invoke.
    pub(crate) fn children(&self) -> Vec<NodeId> {
        let mut children = vec![self.left, self.right];
        children.extend_from_slice(&self.infixes);
        children.extend_from_slice(&self.affixes);
        children
    }
}

/// Validated builder for expression nodes.
///
/// Finalizing without both operands or without any operator is a
/// construction error.
#[derive(Default)]
pub struct ExprBuilder {
    left: Option<NodeId>,
    right: Option<NodeId>,
    infixes: Vec<(NodeId, Step)>,
    affixes: Vec<(NodeId, Step)>,
    operator_required: bool,
}

impl ExprBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `id` as both the first and the subsequent operand parser.
    pub fn operand(mut self, id: NodeId) -> Self {
        self.left = Some(id);
        self.right = Some(id);
        self
    }

    /// The parser for the first operand.
    pub fn left_operand(mut self, id: NodeId) -> Self {
        self.left = Some(id);
        self
    }

    /// The parser for operands after an operator.
    pub fn right_operand(mut self, id: NodeId) -> Self {
        self.right = Some(id);
        self
    }

    /// Register an infix operator without a step action.
    pub fn infix(mut self, op: NodeId) -> Self {
        self.infixes.push((op, None));
        self
    }

    /// Register an infix operator with a step action.
    pub fn infix_step(mut self, op: NodeId, step: impl StackAction + 'static) -> Self {
        self.infixes.push((op, Some(Arc::new(step))));
        self
    }

    /// Register an affix operator (suffix for the left-associative form,
    /// prefix for the right-associative form) without a step action.
    pub fn affix(mut self, op: NodeId) -> Self {
        self.affixes.push((op, None));
        self
    }

    /// Register an affix operator with a step action.
    pub fn affix_step(mut self, op: NodeId, step: impl StackAction + 'static) -> Self {
        self.affixes.push((op, Some(Arc::new(step))));
        self
    }

    /// Fail the match unless at least one operator was consumed.
    pub fn require_operator(mut self) -> Self {
        self.operator_required = true;
        self
    }

    fn finish(self) -> Result<ExprSpec, GrammarError> {
        let left = self.left.ok_or(GrammarError::MissingOperand { which: "left" })?;
        let right = self
            .right
            .ok_or(GrammarError::MissingOperand { which: "right" })?;
        if self.infixes.is_empty() && self.affixes.is_empty() {
            return Err(GrammarError::NoOperators);
        }
        let (infixes, infix_steps) = self.infixes.into_iter().unzip();
        let (affixes, affix_steps) = self.affixes.into_iter().unzip();
        Ok(ExprSpec {
            left,
            right,
            infixes,
            infix_steps,
            affixes,
            affix_steps,
            operator_required: self.operator_required,
        })
    }

    /// Finalize as a left-associative expression node.
    pub fn build_left(self, g: &mut crate::grammar::Grammar) -> Result<NodeId, GrammarError> {
        let spec = self.finish()?;
        Ok(g.add(crate::grammar::Kind::LeftExpr(Box::new(spec))))
    }

    /// Finalize as a right-associative expression node.
    pub fn build_right(self, g: &mut crate::grammar::Grammar) -> Result<NodeId, GrammarError> {
        let spec = self.finish()?;
        Ok(g.add(crate::grammar::Kind::RightExpr(Box::new(spec))))
    }
}

/// Drain the values pushed since `stack0` (logged) and run the step over
/// them. A `None` step leaves the stack untouched.
fn apply_step(ctx: &mut ParseContext, step: &Step, stack0: usize, start: usize) {
    if let Some(action) = step {
        let items = ctx.state.values.look(stack0);
        ctx.apply(Drain::new(stack0));
        let scope = ActionScope {
            start,
            end: ctx.pos,
            items,
        };
        action.run(ctx, &scope);
    }
}

/// Left-associative matcher: fold immediately after every operator.
pub(crate) fn attempt_left(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    spec: &ExprSpec,
) -> Result<bool, EngineError> {
    let start = ctx.pos;
    let stack0 = ctx.state.values.len();
    if !engine.attempt(spec.left, ctx)? {
        return Ok(false);
    }
    let mut operators = 0usize;
    'grow: loop {
        for (i, &op) in spec.infixes.iter().enumerate() {
            let mark = ctx.log.mark();
            let before = ctx.pos;
            if engine.attempt(op, ctx)? {
                if engine.attempt(spec.right, ctx)? {
                    operators += 1;
                    apply_step(ctx, &spec.infix_steps[i], stack0, start);
                    continue 'grow;
                }
                // Operator without operand: drop the operator match.
                ctx.rollback(mark);
                ctx.pos = before;
            }
        }
        for (i, &op) in spec.affixes.iter().enumerate() {
            if engine.attempt(op, ctx)? {
                operators += 1;
                apply_step(ctx, &spec.affix_steps[i], stack0, start);
                continue 'grow;
            }
        }
        break;
    }
    if spec.operator_required && operators == 0 {
        return Ok(false);
    }
    Ok(true)
}

/// A step recorded while matching the chain, folded after it resolves.
struct PendingStep {
    step: Step,
    stack0: usize,
    start: usize,
    /// Log mark and position before the pair's `left`. Prefixes carry
    /// `None`: they cannot be unwound.
    pair: Option<(usize, usize)>,
}

/// Right-associative matcher: record steps while matching, fold in reverse
/// afterwards so the innermost step runs first.
pub(crate) fn attempt_right(
    engine: &mut Engine<'_>,
    ctx: &mut ParseContext,
    spec: &ExprSpec,
) -> Result<bool, EngineError> {
    let mut pending: Vec<PendingStep> = Vec::new();

    'prefix: loop {
        for (i, &op) in spec.affixes.iter().enumerate() {
            let before = ctx.pos;
            let smark = ctx.state.values.len();
            if engine.attempt(op, ctx)? {
                pending.push(PendingStep {
                    step: spec.affix_steps[i].clone(),
                    stack0: smark,
                    start: before,
                    pair: None,
                });
                continue 'prefix;
            }
        }
        break;
    }

    'pairs: loop {
        let mark = ctx.log.mark();
        let before = ctx.pos;
        let smark = ctx.state.values.len();
        if !engine.attempt(spec.left, ctx)? {
            break;
        }
        for (i, &op) in spec.infixes.iter().enumerate() {
            if engine.attempt(op, ctx)? {
                pending.push(PendingStep {
                    step: spec.infix_steps[i].clone(),
                    stack0: smark,
                    start: before,
                    pair: Some((mark, before)),
                });
                continue 'pairs;
            }
        }
        // Operand without a following operator: it is the final operand.
        ctx.rollback(mark);
        ctx.pos = before;
        break;
    }

    let mut matched = engine.attempt(spec.right, ctx)?;
    // A dangling trailing operator is not fatal: unwind the chain's infix
    // pairs newest first, retrying the final operand at each earlier
    // boundary.
    while !matched {
        let Some(PendingStep {
            pair: Some((mark, before)),
            ..
        }) = pending.last()
        else {
            break;
        };
        let (mark, before) = (*mark, *before);
        pending.pop();
        ctx.rollback(mark);
        ctx.pos = before;
        matched = engine.attempt(spec.right, ctx)?;
    }
    if !matched {
        return Ok(false);
    }
    if spec.operator_required && pending.is_empty() {
        return Ok(false);
    }
    for entry in pending.into_iter().rev() {
        apply_step(ctx, &entry.step, entry.stack0, entry.start);
    }
    Ok(true)
}

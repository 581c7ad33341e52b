//! User-defined parser nodes
//!
//! The built-in combinator set is closed, but a grammar can embed arbitrary
//! parsing behaviour through [`CustomParse`]: a capability object stored in
//! the node itself. The engine hands the object a [`Recurse`] handle so it
//! can invoke other grammar nodes through the normal invocation wrapper,
//! keeping backtracking and error bookkeeping uniform.
//!
//! Custom nodes that mutate per-parse state must do so through logged
//! effects ([`ParseContext::apply`]), like every built-in combinator.

use crate::context::ParseContext;
use crate::error::EngineError;
use crate::grammar::NodeId;

/// Handle for invoking grammar nodes from inside a custom parser.
///
/// Invocations made through this handle get the same treatment as built-in
/// children: position reset and effect rollback on failure, furthest-error
/// updates, call-stack recording, the recursion guard.
pub trait Recurse {
    /// Attempt the node at `id` in `ctx`.
    fn attempt(&mut self, id: NodeId, ctx: &mut ParseContext) -> Result<bool, EngineError>;
}

/// A user-defined parser embedded in a grammar node.
///
/// Implementations must be thread-safe; the grammar holding them is shared
/// across concurrent parses.
pub trait CustomParse: Send + Sync {
    /// Name used in diagnostics and string forms.
    fn name(&self) -> &str;

    /// Grammar nodes this parser may invoke, for traversal and analysis.
    fn children(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Attempt a match at the context's current position.
    ///
    /// Return `Ok(true)` with the position advanced past the match, or
    /// `Ok(false)` to fail; the caller restores position and effects on
    /// failure.
    fn attempt(
        &self,
        recurse: &mut dyn Recurse,
        ctx: &mut ParseContext,
    ) -> Result<bool, EngineError>;

    /// Whether this parser can succeed without consuming input, given the
    /// nullability of each node in [`Self::children`] (same order).
    ///
    /// The default treats the children as a sequence; a childless parser is
    /// assumed to consume input.
    fn nullable(&self, children_nullable: &[bool]) -> bool {
        !children_nullable.is_empty() && children_nullable.iter().all(|&n| n)
    }

    /// The children that can be invoked first, for left-recursion analysis.
    ///
    /// The default is sequence-like: every child up to and including the
    /// first non-nullable one. `children_nullable` aligns with
    /// [`Self::children`].
    fn first_children(&self, children_nullable: &[bool]) -> Vec<NodeId> {
        let children = self.children();
        let mut firsts = Vec::new();
        for (child, &nullable) in children.iter().zip(children_nullable) {
            firsts.push(*child);
            if !nullable {
                break;
            }
        }
        firsts
    }
}

//! Grammar arena and parser-node types
//!
//! A grammar is an arena of immutable [`Node`]s addressed by [`NodeId`].
//! Cyclic rules go through forward-reference nodes ([`Grammar::forward`])
//! resolved once the arena is populated, sidestepping ownership cycles.
//!
//! The closed set of built-in combinators is a tagged [`Kind`] sum type;
//! the [`Kind::Custom`] variant carries a capability object
//! ([`CustomParse`](crate::custom::CustomParse)) so external code can add
//! parser types without touching the core.
//!
//! Nodes hold no per-parse mutable state. Combinators that need some (left
//! recursion, memoization, token caches) allocate a [`StateKey`] at
//! construction time and find their state in each parse context's state
//! map.

use crate::context::{ParseContext, StateKey, Value};
use crate::custom::CustomParse;
use crate::error::GrammarError;
use crate::expr::ExprSpec;
use crate::memo::MemoStrategy;
use crate::tokens::TokenSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Handle addressing a node inside its [`Grammar`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Predicate over a single input character.
pub type CharPredFn = Arc<dyn Fn(char) -> bool + Send + Sync>;

/// Predicate over a single input token object.
pub type ObjectPredFn = Arc<dyn Fn(&dyn std::any::Any) -> bool + Send + Sync>;

/// Predicate over the parse context; consumes no input.
pub type ContextPredFn = Arc<dyn Fn(&ParseContext) -> bool + Send + Sync>;

/// Extractor computing an optional memoization context token.
pub type ContextExtractFn = Arc<dyn Fn(&ParseContext) -> u64 + Send + Sync>;

/// What a [`Kind::Collect`] node or an expression step receives: the span
/// the wrapped match covered and the values pushed since its start.
pub struct ActionScope {
    /// Input position where the match began.
    pub start: usize,
    /// Input position where the match ended.
    pub end: usize,
    /// Values pushed since the start, bottom first.
    pub items: Vec<Value>,
}

/// User action invoked on a successful match.
///
/// Actions push their results through the context (logged effects), so
/// backtracking undoes them exactly.
pub trait StackAction: Send + Sync {
    /// Run the action.
    fn run(&self, ctx: &mut ParseContext, scope: &ActionScope);
}

impl<F> StackAction for F
where
    F: Fn(&mut ParseContext, &ActionScope) + Send + Sync,
{
    fn run(&self, ctx: &mut ParseContext, scope: &ActionScope) {
        self(ctx, scope)
    }
}

/// Which token kinds a [`Kind::Token`] node accepts.
#[derive(Debug, Clone)]
pub enum TokenKinds {
    /// A single kind index into the registry.
    One(usize),
    /// A set of kind indices.
    Many(Vec<usize>),
}

impl TokenKinds {
    /// Whether `kind` is accepted.
    pub fn accepts(&self, kind: usize) -> bool {
        match self {
            Self::One(k) => *k == kind,
            Self::Many(ks) => ks.contains(&kind),
        }
    }
}

/// The combinator a node executes.
pub enum Kind {
    /// Always succeeds, consumes nothing.
    Empty,
    /// Always fails.
    Fail,
    /// Any single input element.
    Any,
    /// Single character satisfying a predicate.
    CharPred {
        /// Label used in diagnostics.
        label: Box<str>,
        /// The predicate.
        pred: CharPredFn,
    },
    /// Single token object satisfying a predicate.
    ObjectPred {
        /// Label used in diagnostics.
        label: Box<str>,
        /// The predicate.
        pred: ObjectPredFn,
    },
    /// Context test; consumes no input.
    ContextPred {
        /// Label used in diagnostics.
        label: Box<str>,
        /// The predicate.
        pred: ContextPredFn,
    },
    /// Literal character sequence, optionally followed by a whitespace
    /// sub-match whose outcome does not affect the result but whose span
    /// is recorded.
    Str {
        /// The literal, one entry per code point.
        literal: Box<[char]>,
        /// Optional whitespace sub-parser.
        whitespace: Option<NodeId>,
    },
    /// All children in order.
    Seq {
        /// The children.
        children: Vec<NodeId>,
    },
    /// First succeeding child (ordered choice).
    Choice {
        /// The children.
        children: Vec<NodeId>,
    },
    /// Furthest-reaching succeeding child; first wins ties.
    Longest {
        /// The children.
        children: Vec<NodeId>,
    },
    /// `min` mandatory repetitions, then greedy if not exact.
    Repeat {
        /// The repeated child.
        child: NodeId,
        /// Mandatory repetition count.
        min: usize,
        /// Stop at exactly `min` repetitions.
        exact: bool,
    },
    /// Alternating `around (inside around)*` with optional trailing
    /// separator; `min` counts `around` matches.
    Around {
        /// The repeated item.
        around: NodeId,
        /// The separator between items.
        inside: NodeId,
        /// Mandatory item count.
        min: usize,
        /// Stop at exactly `min` items.
        exact: bool,
        /// Permit a trailing separator.
        trailing: bool,
    },
    /// Attempt the child; succeed either way.
    Opt {
        /// The child.
        child: NodeId,
    },
    /// Succeeds iff the child fails; never advances.
    Not {
        /// The child.
        child: NodeId,
    },
    /// Succeeds iff the child succeeds; never advances.
    Lookahead {
        /// The child.
        child: NodeId,
    },
    /// Run the child, then a stack action over the values it pushed.
    Collect {
        /// The child.
        child: NodeId,
        /// Pop the collected values (as a logged effect) before the action.
        pops: bool,
        /// The action.
        action: Arc<dyn StackAction>,
    },
    /// Seed-growing left-recursive wrapper.
    LeftRecursive {
        /// The recursive body.
        child: NodeId,
        /// Key of the per-parse frame stack.
        key: StateKey,
    },
    /// Hide active left-recursion frames for the child's duration,
    /// permitting bounded middle recursion.
    Guarded {
        /// The child.
        child: NodeId,
    },
    /// Left-associative expression matcher (immediate fold).
    LeftExpr(Box<ExprSpec>),
    /// Right-associative expression matcher (deferred, reverse fold).
    RightExpr(Box<ExprSpec>),
    /// Memoized child.
    Memo {
        /// The child.
        child: NodeId,
        /// Key of the per-parse memoizer.
        key: StateKey,
        /// Which memoizer to create.
        strategy: MemoStrategy,
        /// Optional context-token extractor.
        context: Option<ContextExtractFn>,
    },
    /// Token parser backed by a shared disambiguation cache.
    Token {
        /// The registry this parser belongs to.
        set: Arc<TokenSet>,
        /// The accepted kinds.
        kinds: TokenKinds,
    },
    /// Re-run `fine` strictly within `coarse`'s span; `fallback` decides
    /// when `fine` does not consume exactly that span.
    Bounded {
        /// The coarse parser delimiting the span.
        coarse: NodeId,
        /// The fine parser re-run within the span.
        fine: NodeId,
        /// Fallback predicate, consulted with the coarse outcome restored.
        fallback: ContextPredFn,
    },
    /// Forward reference; `None` until defined.
    Ref {
        /// The resolved target.
        target: Option<NodeId>,
    },
    /// Extension point: a capability object implementing the execution
    /// and traversal contract.
    Custom(Arc<dyn CustomParse>),
}

/// A grammar node: its combinator plus an optional, set-once name.
pub struct Node {
    /// The combinator.
    pub kind: Kind,
    name: Option<Box<str>>,
}

impl Node {
    /// The assigned name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Arena of parser nodes.
///
/// Built once, then shared (immutably) across any number of parses,
/// including concurrent ones.
#[derive(Default)]
pub struct Grammar {
    nodes: Vec<Node>,
}

impl Grammar {
    /// Create an empty grammar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its handle.
    pub fn add(&mut self, kind: Kind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, name: None });
        id
    }

    /// The node behind a handle.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// The combinator behind a handle.
    #[inline]
    pub fn kind(&self, id: NodeId) -> &Kind {
        &self.nodes[id.index()].kind
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node handles, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Assign a node's name. Names are assigned at most once; a second
    /// assignment is a construction error.
    pub fn set_name(&mut self, id: NodeId, name: &str) -> Result<(), GrammarError> {
        if id.index() >= self.nodes.len() {
            return Err(GrammarError::InvalidNode { node: id });
        }
        let node = &mut self.nodes[id.index()];
        if let Some(existing) = &node.name {
            return Err(GrammarError::NameAlreadySet {
                node: id,
                existing: existing.to_string(),
            });
        }
        node.name = Some(name.into());
        Ok(())
    }

    /// Assign names from an explicit mapping of logical names to handles.
    ///
    /// This is the builder step front-ends use instead of discovering rule
    /// names by reflection.
    pub fn name_all<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = (&'a str, NodeId)>,
    ) -> Result<(), GrammarError> {
        for (name, id) in pairs {
            self.set_name(id, name)?;
        }
        Ok(())
    }

    /// The direct children of a node, for traversal and analysis.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.kind(id) {
            Kind::Empty
            | Kind::Fail
            | Kind::Any
            | Kind::CharPred { .. }
            | Kind::ObjectPred { .. }
            | Kind::ContextPred { .. } => Vec::new(),
            Kind::Str { whitespace, .. } => whitespace.iter().copied().collect(),
            Kind::Seq { children } | Kind::Choice { children } | Kind::Longest { children } => {
                children.clone()
            }
            Kind::Repeat { child, .. }
            | Kind::Opt { child }
            | Kind::Not { child }
            | Kind::Lookahead { child }
            | Kind::Collect { child, .. }
            | Kind::LeftRecursive { child, .. }
            | Kind::Guarded { child }
            | Kind::Memo { child, .. } => vec![*child],
            Kind::Around { around, inside, .. } => vec![*around, *inside],
            Kind::LeftExpr(spec) | Kind::RightExpr(spec) => spec.children(),
            Kind::Token { set, kinds } => match kinds {
                TokenKinds::One(k) => vec![set.base[*k]],
                TokenKinds::Many(ks) => ks.iter().map(|&k| set.base[k]).collect(),
            },
            Kind::Bounded { coarse, fine, .. } => vec![*coarse, *fine],
            Kind::Ref { target } => target.iter().copied().collect(),
            Kind::Custom(obj) => obj.children(),
        }
    }

    // ------------------------------------------------------------------
    // Leaf constructors
    // ------------------------------------------------------------------

    /// A parser that always succeeds without consuming input.
    pub fn empty(&mut self) -> NodeId {
        self.add(Kind::Empty)
    }

    /// A parser that always fails.
    pub fn fail(&mut self) -> NodeId {
        self.add(Kind::Fail)
    }

    /// A parser matching any single input element.
    pub fn any(&mut self) -> NodeId {
        self.add(Kind::Any)
    }

    /// A single-character predicate parser.
    pub fn char_pred(
        &mut self,
        label: &str,
        pred: impl Fn(char) -> bool + Send + Sync + 'static,
    ) -> NodeId {
        self.add(Kind::CharPred {
            label: label.into(),
            pred: Arc::new(pred),
        })
    }

    /// A single-character parser matching exactly `c`.
    pub fn chr(&mut self, c: char) -> NodeId {
        self.char_pred(&c.to_string(), move |x| x == c)
    }

    /// A single-token predicate parser over object input.
    pub fn object_pred(
        &mut self,
        label: &str,
        pred: impl Fn(&dyn std::any::Any) -> bool + Send + Sync + 'static,
    ) -> NodeId {
        self.add(Kind::ObjectPred {
            label: label.into(),
            pred: Arc::new(pred),
        })
    }

    /// A context predicate; tests the context only, consumes nothing.
    pub fn context_pred(
        &mut self,
        label: &str,
        pred: impl Fn(&ParseContext) -> bool + Send + Sync + 'static,
    ) -> NodeId {
        self.add(Kind::ContextPred {
            label: label.into(),
            pred: Arc::new(pred),
        })
    }

    /// A literal string parser (code-point exact).
    pub fn string(&mut self, literal: &str) -> NodeId {
        self.add(Kind::Str {
            literal: literal.chars().collect(),
            whitespace: None,
        })
    }

    /// A literal string parser followed by an optional whitespace
    /// sub-match whose span is recorded when it succeeds.
    pub fn string_ws(&mut self, literal: &str, whitespace: NodeId) -> NodeId {
        self.add(Kind::Str {
            literal: literal.chars().collect(),
            whitespace: Some(whitespace),
        })
    }

    // ------------------------------------------------------------------
    // Composite constructors
    // ------------------------------------------------------------------

    /// Sequence: every child in order.
    pub fn seq(&mut self, children: impl Into<Vec<NodeId>>) -> NodeId {
        self.add(Kind::Seq {
            children: children.into(),
        })
    }

    /// Ordered choice: first succeeding child.
    pub fn choice(&mut self, children: impl Into<Vec<NodeId>>) -> NodeId {
        self.add(Kind::Choice {
            children: children.into(),
        })
    }

    /// Longest match among children; first among ties.
    pub fn longest(&mut self, children: impl Into<Vec<NodeId>>) -> NodeId {
        self.add(Kind::Longest {
            children: children.into(),
        })
    }

    /// Repetition: `min` mandatory matches, then greedy unless `exact`.
    pub fn repeat(&mut self, child: NodeId, min: usize, exact: bool) -> NodeId {
        self.add(Kind::Repeat { child, min, exact })
    }

    /// Alternating repetition of `around` separated by `inside`.
    pub fn around(
        &mut self,
        around: NodeId,
        inside: NodeId,
        min: usize,
        exact: bool,
        trailing: bool,
    ) -> NodeId {
        self.add(Kind::Around {
            around,
            inside,
            min,
            exact,
            trailing,
        })
    }

    /// Optional: attempt the child, succeed either way.
    pub fn opt(&mut self, child: NodeId) -> NodeId {
        self.add(Kind::Opt { child })
    }

    /// Negation: succeed iff the child fails; never advances.
    pub fn not(&mut self, child: NodeId) -> NodeId {
        self.add(Kind::Not { child })
    }

    /// Lookahead: succeed iff the child succeeds; never advances.
    pub fn lookahead(&mut self, child: NodeId) -> NodeId {
        self.add(Kind::Lookahead { child })
    }

    /// Collect: run the child, then `action` over the values it pushed.
    /// With `pops`, the collected values are popped (logged) first.
    pub fn collect(
        &mut self,
        child: NodeId,
        pops: bool,
        action: impl StackAction + 'static,
    ) -> NodeId {
        self.add(Kind::Collect {
            child,
            pops,
            action: Arc::new(action),
        })
    }

    /// Left-recursive wrapper around `child`.
    pub fn left_recursive(&mut self, child: NodeId) -> NodeId {
        self.add(Kind::LeftRecursive {
            child,
            key: StateKey::fresh(),
        })
    }

    /// Guard permitting bounded middle recursion inside `child`.
    pub fn guarded(&mut self, child: NodeId) -> NodeId {
        self.add(Kind::Guarded { child })
    }

    /// Memoized wrapper around `child`.
    pub fn memo(
        &mut self,
        child: NodeId,
        strategy: MemoStrategy,
        context: Option<ContextExtractFn>,
    ) -> NodeId {
        self.add(Kind::Memo {
            child,
            key: StateKey::fresh(),
            strategy,
            context,
        })
    }

    /// Memoized wrapper consulting the memoizer stored under `key`.
    ///
    /// Cooperating memo nodes built over the same key share one store. With
    /// a shared strategy ([`MemoStrategy::SharedTable`],
    /// [`MemoStrategy::SharedRing`]) entries drop the parser from the key,
    /// so a node can answer from whichever sharer ran at that position.
    pub fn memo_shared(
        &mut self,
        child: NodeId,
        key: StateKey,
        strategy: MemoStrategy,
        context: Option<ContextExtractFn>,
    ) -> NodeId {
        self.add(Kind::Memo {
            child,
            key,
            strategy,
            context,
        })
    }

    /// Bounded: re-run `fine` within `coarse`'s span, `fallback` deciding
    /// inexact consumption.
    pub fn bounded(
        &mut self,
        coarse: NodeId,
        fine: NodeId,
        fallback: impl Fn(&ParseContext) -> bool + Send + Sync + 'static,
    ) -> NodeId {
        self.add(Kind::Bounded {
            coarse,
            fine,
            fallback: Arc::new(fallback),
        })
    }

    /// A custom parser node.
    pub fn custom(&mut self, obj: impl CustomParse + 'static) -> NodeId {
        self.add(Kind::Custom(Arc::new(obj)))
    }

    // ------------------------------------------------------------------
    // Forward references
    // ------------------------------------------------------------------

    /// Create an unresolved forward reference.
    pub fn forward(&mut self) -> NodeId {
        self.add(Kind::Ref { target: None })
    }

    /// Resolve a forward reference created by [`Self::forward`].
    pub fn define_forward(&mut self, id: NodeId, target: NodeId) -> Result<(), GrammarError> {
        if id.index() >= self.nodes.len() || target.index() >= self.nodes.len() {
            return Err(GrammarError::InvalidNode {
                node: if id.index() >= self.nodes.len() { id } else { target },
            });
        }
        match &mut self.nodes[id.index()].kind {
            Kind::Ref { target: slot @ None } => {
                *slot = Some(target);
                Ok(())
            }
            _ => Err(GrammarError::InvalidNode { node: id }),
        }
    }

    /// Any unresolved forward reference reachable from `root`.
    pub fn find_unresolved(&self, root: NodeId) -> Option<NodeId> {
        let mut unresolved = None;
        crate::walker::walk(self, root, &mut |id, signal| {
            if matches!(signal, crate::walker::WalkSignal::Enter)
                && matches!(self.kind(id), Kind::Ref { target: None })
                && unresolved.is_none()
            {
                unresolved = Some(id);
            }
        });
        unresolved
    }

    // ------------------------------------------------------------------
    // Token registries
    // ------------------------------------------------------------------

    /// Create a token registry over `base` parsers, one per token kind.
    pub fn token_set(&self, base: &[NodeId]) -> Result<Arc<TokenSet>, GrammarError> {
        if base.is_empty() {
            return Err(GrammarError::EmptyTokenSet);
        }
        for &id in base {
            if id.index() >= self.nodes.len() {
                return Err(GrammarError::InvalidNode { node: id });
            }
        }
        Ok(Arc::new(TokenSet::new(base.to_vec())))
    }

    /// A token parser accepting one kind of `set`.
    pub fn token(&mut self, set: &Arc<TokenSet>, kind: usize) -> Result<NodeId, GrammarError> {
        if kind >= set.base.len() {
            return Err(GrammarError::UnknownTokenKind {
                kind,
                available: set.base.len(),
            });
        }
        Ok(self.add(Kind::Token {
            set: Arc::clone(set),
            kinds: TokenKinds::One(kind),
        }))
    }

    /// A token parser accepting any of several kinds of `set`.
    pub fn token_choice(
        &mut self,
        set: &Arc<TokenSet>,
        kinds: &[usize],
    ) -> Result<NodeId, GrammarError> {
        for &kind in kinds {
            if kind >= set.base.len() {
                return Err(GrammarError::UnknownTokenKind {
                    kind,
                    available: set.base.len(),
                });
            }
        }
        Ok(self.add(Kind::Token {
            set: Arc::clone(set),
            kinds: TokenKinds::Many(kinds.to_vec()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_set_once() {
        let mut g = Grammar::new();
        let id = g.string("x");
        g.set_name(id, "x-rule").unwrap();
        let err = g.set_name(id, "other").unwrap_err();
        assert!(matches!(err, GrammarError::NameAlreadySet { .. }));
        assert_eq!(g.node(id).name(), Some("x-rule"));
    }

    #[test]
    fn name_all_assigns_mapping() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let b = g.string("b");
        g.name_all([("a-rule", a), ("b-rule", b)]).unwrap();
        assert_eq!(g.node(a).name(), Some("a-rule"));
        assert_eq!(g.node(b).name(), Some("b-rule"));
    }

    #[test]
    fn forward_defines_once() {
        let mut g = Grammar::new();
        let fwd = g.forward();
        let target = g.string("t");
        g.define_forward(fwd, target).unwrap();
        assert!(g.define_forward(fwd, target).is_err());
        assert_eq!(g.children(fwd), vec![target]);
    }

    #[test]
    fn unresolved_forward_is_found() {
        let mut g = Grammar::new();
        let fwd = g.forward();
        let root = g.seq([fwd]);
        assert_eq!(g.find_unresolved(root), Some(fwd));
        let target = g.string("t");
        g.define_forward(fwd, target).unwrap();
        assert_eq!(g.find_unresolved(root), None);
    }

    #[test]
    fn token_kind_out_of_range_is_rejected() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let set = g.token_set(&[a]).unwrap();
        assert!(g.token(&set, 0).is_ok());
        let err = g.token(&set, 1).unwrap_err();
        assert!(matches!(err, GrammarError::UnknownTokenKind { .. }));
    }

    #[test]
    fn empty_token_set_is_rejected() {
        let g = Grammar::new();
        assert!(matches!(g.token_set(&[]), Err(GrammarError::EmptyTokenSet)));
    }

    #[test]
    fn children_of_composites() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let b = g.string("b");
        let s = g.seq([a, b]);
        let r = g.repeat(s, 0, false);
        assert_eq!(g.children(s), vec![a, b]);
        assert_eq!(g.children(r), vec![s]);
        assert!(g.children(a).is_empty());
    }
}

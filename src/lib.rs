//! peglog - PEG combinator engine with logged, exactly-undoable side effects
//!
//! A parsing expression grammar engine where every mutation a parse makes
//! (values pushed, state touched, spans recorded) goes through a
//! side-effect log, so backtracking restores the exact observable state.
//! It provides:
//! - Core PEG combinators over character or token-object input
//! - Side-effect log with strict LIFO rollback and delta replay
//! - Seed-growing left recursion with guarded middle recursion
//! - Packrat memoization (unbounded tables or bounded rings)
//! - Shared token caches with longest-match disambiguation
//! - Associativity-aware expression matchers with fold actions
//! - Static well-formedness checking before parsing
//! - Graph walking, string forms, and per-node metrics
//!
//! ## Quick Start
//!
//! ```rust
//! use peglog::prelude::*;
//!
//! let mut g = Grammar::new();
//! let hello = g.string("hello");
//! let space = g.string(" ");
//! let world = g.string("world");
//! let root = g.seq([hello, space, world]);
//!
//! let result = g.run(root, "hello world", &ParseOptions::new()).unwrap();
//! assert!(result.full_match);
//! ```
//!
//! ## Left recursion
//!
//! ```rust
//! use peglog::prelude::*;
//!
//! // expr = expr "+" num | num
//! let mut g = Grammar::new();
//! let expr = g.forward();
//! let plus = g.string("+");
//! let num = g.char_pred("digit", |c| c.is_ascii_digit());
//! let rec = g.seq([expr, plus, num]);
//! let body = g.choice([rec, num]);
//! let root = g.left_recursive(body);
//! g.define_forward(expr, root).unwrap();
//!
//! let result = g.run(root, "1+2+3", &ParseOptions::new()).unwrap();
//! assert!(result.full_match);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

// Prelude module for convenient imports
pub mod prelude;

pub mod analysis;
pub mod context;
pub mod custom;
pub mod display;
pub mod effect;
pub mod engine;
pub mod error;
pub mod expr;
pub mod grammar;
pub mod memo;
pub mod tokens;
pub mod trace;
pub mod walker;

mod leftrec;
mod table;

/// Re-export commonly used types for convenience
pub use context::{CallFrame, Input, ParseContext, ParseState, StateKey, Value, ValueStack};
pub use effect::{effect, Drain, Effect, EffectLog, Push, SideEffect, Undo};
pub use engine::{run, ParseOptions, ParseResult, DEFAULT_MAX_RECURSION_DEPTH};
pub use error::{EngineError, GrammarError};
pub use grammar::{ActionScope, Grammar, Kind, Node, NodeId, StackAction};
pub use memo::MemoStrategy;
pub use tokens::TokenSet;

//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from
//! peglog. Importing this module with a wildcard import brings the core
//! types into scope:
//!
//! ```
//! use peglog::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Grammar`] - PEG grammar arena
//! - [`NodeId`] - Handle addressing a grammar node
//! - [`ParseContext`] - Mutable per-parse state
//! - [`ParseOptions`] / [`ParseResult`] - Knobs and outcome of a run
//! - [`Input`] / [`Value`] - Parse input and stack values
//!
//! ## Effects
//! - [`Effect`] / [`SideEffect`] - Reversible mutations
//! - [`Push`] / [`Drain`] - Common stack effects
//!
//! ## Combinator configuration
//! - [`ExprBuilder`] - Associative expression builder
//! - [`MemoStrategy`] - Memoizer selection
//! - [`TokenSet`] - Token registry
//! - [`StackAction`] / [`ActionScope`] - Fold actions
//!
//! ## Diagnostics
//! - [`WellFormednessReport`] - Checker output
//! - [`TreePrinter`] - Indenting pretty printer
//! - [`GrammarError`] / [`EngineError`] - Failure surfaces

pub use crate::analysis::{check, WellFormednessReport};
pub use crate::context::{CallFrame, Input, ParseContext, StateKey, Value};
pub use crate::custom::{CustomParse, Recurse};
pub use crate::display::TreePrinter;
pub use crate::effect::{effect, Drain, Effect, Push, SideEffect};
pub use crate::engine::{run, ParseOptions, ParseResult};
pub use crate::error::{EngineError, GrammarError};
pub use crate::expr::ExprBuilder;
pub use crate::grammar::{ActionScope, Grammar, Kind, NodeId, StackAction};
pub use crate::memo::MemoStrategy;
pub use crate::tokens::TokenSet;
pub use crate::trace::{Metrics, NodeStats};
pub use crate::walker::{walk, WalkSignal};

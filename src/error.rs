//! Error types for peglog
//!
//! Two distinct failure surfaces exist:
//!
//! - [`GrammarError`]: programmer mistakes made while *constructing* a
//!   grammar (duplicate names, malformed expression configuration, unknown
//!   token kinds). These fail fast at construction time.
//! - [`EngineError`]: hard failures raised by [`run`](crate::engine::run):
//!   a grammar rejected by the well-formedness checker, the recursion guard
//!   tripping, or an unresolved forward reference.
//!
//! Ordinary parse failure is *neither* of these: it is the normal
//! backtracking signal, and `run` reports it through
//! [`ParseResult`](crate::engine::ParseResult) fields instead of an error.

use crate::analysis::WellFormednessReport;
use crate::grammar::NodeId;
use std::fmt;

/// A mistake made while constructing a grammar.
///
/// All variants are detected eagerly, at the construction call that caused
/// them, never deferred to parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// A node's name was assigned twice.
    NameAlreadySet {
        /// The node whose name was already set
        node: NodeId,
        /// The name it already carries
        existing: String,
    },

    /// A `NodeId` does not refer to a node of this grammar.
    InvalidNode {
        /// The offending handle
        node: NodeId,
    },

    /// An expression builder was finalized without an operand parser.
    MissingOperand {
        /// Which operand is missing ("left" or "right")
        which: &'static str,
    },

    /// An expression builder was finalized without any operator.
    NoOperators,

    /// A token parser was requested for a kind index outside its registry.
    UnknownTokenKind {
        /// The requested kind index
        kind: usize,
        /// Number of kinds in the registry
        available: usize,
    },

    /// A token registry was created with no base parsers.
    EmptyTokenSet,
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameAlreadySet { node, existing } => {
                write!(
                    f,
                    "name of node {} already set to {:?} (names are assigned at most once)",
                    node, existing
                )
            }
            Self::InvalidNode { node } => {
                write!(f, "node {} does not belong to this grammar", node)
            }
            Self::MissingOperand { which } => {
                write!(f, "expression builder is missing its {} operand", which)
            }
            Self::NoOperators => {
                write!(f, "expression builder has no infix, prefix or suffix operators")
            }
            Self::UnknownTokenKind { kind, available } => {
                write!(
                    f,
                    "token kind {} does not exist (registry holds {} kinds)",
                    kind, available
                )
            }
            Self::EmptyTokenSet => write!(f, "token registry must hold at least one base parser"),
        }
    }
}

impl std::error::Error for GrammarError {}

/// A hard failure raised by [`run`](crate::engine::run).
#[derive(Debug, Clone)]
pub enum EngineError {
    /// The well-formedness checker rejected the grammar before parsing.
    Malformed(WellFormednessReport),

    /// The recursion guard tripped.
    ///
    /// Reached only when the well-formedness check is disabled and the
    /// grammar recurses without consuming input; reported as a likely
    /// malformed grammar rather than overflowing the host stack.
    RecursionOverflow {
        /// Input position active when the guard tripped
        position: usize,
        /// Depth at which it tripped
        depth: usize,
    },

    /// A forward reference was never defined.
    Unresolved {
        /// The undefined forward-reference node
        node: NodeId,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(report) => {
                write!(f, "grammar is not well-formed:\n{}", report)
            }
            Self::RecursionOverflow { position, depth } => {
                write!(
                    f,
                    "recursion depth {} exceeded at input position {} - grammar is likely malformed \
                     (unmanaged left recursion or nullable repetition)",
                    depth, position
                )
            }
            Self::Unresolved { node } => {
                write!(f, "forward reference {} was never defined", node)
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_error_display() {
        let err = GrammarError::NameAlreadySet {
            node: NodeId(3),
            existing: "expr".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("expr"));
        assert!(text.contains("at most once"));
    }

    #[test]
    fn engine_error_display_mentions_malformed_grammar() {
        let err = EngineError::RecursionOverflow {
            position: 17,
            depth: 1000,
        };
        let text = err.to_string();
        assert!(text.contains("position 17"));
        assert!(text.contains("likely malformed"));
    }
}

//! String forms for nodes and diagnostics
//!
//! Two forms exist: the short form (the assigned name, or the combinator
//! name when unnamed) and the canonical full form, written
//! `name[free text](child, child, ...)`. Full forms expand children
//! recursively but stop at named nodes and at cycles, printing the short
//! form there instead.

use crate::context::CallFrame;
use crate::grammar::{Grammar, Kind, NodeId, TokenKinds};
use hashbrown::HashSet;
use std::fmt::Write;

impl Grammar {
    /// The node's assigned name, or its combinator name.
    pub fn short_form(&self, id: NodeId) -> String {
        if let Some(name) = self.node(id).name() {
            return name.to_string();
        }
        operator_name(self.kind(id)).to_string()
    }

    /// The canonical structural form of the node.
    pub fn full_form(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut visiting = HashSet::new();
        self.write_form(id, true, &mut visiting, &mut out);
        out
    }

    fn write_form(
        &self,
        id: NodeId,
        top: bool,
        visiting: &mut HashSet<NodeId>,
        out: &mut String,
    ) {
        // Expansion stops at named nodes and at cycles.
        if (!top && self.node(id).name().is_some()) || !visiting.insert(id) {
            out.push_str(&self.short_form(id));
            return;
        }
        let kind = self.kind(id);
        out.push_str(operator_name(kind));
        if let Some(text) = free_text(kind) {
            let _ = write!(out, "[{}]", text);
        }
        let children = form_children(kind, self);
        if !children.is_empty() {
            out.push('(');
            for (i, child) in children.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.write_form(child, false, visiting, out);
            }
            out.push(')');
        }
        visiting.remove(&id);
    }
}

fn operator_name(kind: &Kind) -> &'static str {
    match kind {
        Kind::Empty => "empty",
        Kind::Fail => "fail",
        Kind::Any => "any",
        Kind::CharPred { .. } => "char",
        Kind::ObjectPred { .. } => "object",
        Kind::ContextPred { .. } => "pred",
        Kind::Str { .. } => "str",
        Kind::Seq { .. } => "seq",
        Kind::Choice { .. } => "choice",
        Kind::Longest { .. } => "longest",
        Kind::Repeat { .. } => "repeat",
        Kind::Around { .. } => "around",
        Kind::Opt { .. } => "opt",
        Kind::Not { .. } => "not",
        Kind::Lookahead { .. } => "lookahead",
        Kind::Collect { .. } => "collect",
        Kind::LeftRecursive { .. } => "leftrec",
        Kind::Guarded { .. } => "guard",
        Kind::LeftExpr(_) => "expr_left",
        Kind::RightExpr(_) => "expr_right",
        Kind::Memo { .. } => "memo",
        Kind::Token { .. } => "token",
        Kind::Bounded { .. } => "bounded",
        Kind::Ref { .. } => "ref",
        Kind::Custom(_) => "custom",
    }
}

fn free_text(kind: &Kind) -> Option<String> {
    match kind {
        Kind::CharPred { label, .. }
        | Kind::ObjectPred { label, .. }
        | Kind::ContextPred { label, .. } => Some(label.to_string()),
        Kind::Str { literal, .. } => Some(literal.iter().collect()),
        Kind::Repeat { min, exact, .. } => Some(if *exact {
            format!("exactly {}", min)
        } else {
            format!("min {}", min)
        }),
        Kind::Around {
            min,
            exact,
            trailing,
            ..
        } => {
            let mut text = if *exact {
                format!("exactly {}", min)
            } else {
                format!("min {}", min)
            };
            if *trailing {
                text.push_str(", trailing");
            }
            Some(text)
        }
        Kind::Collect { pops, .. } => pops.then(|| "pops".to_string()),
        Kind::Memo { strategy, .. } => Some(format!("{:?}", strategy).to_lowercase()),
        Kind::Token { kinds, .. } => Some(match kinds {
            TokenKinds::One(k) => format!("kind {}", k),
            TokenKinds::Many(ks) => {
                let parts: Vec<String> = ks.iter().map(usize::to_string).collect();
                format!("kinds {}", parts.join("|"))
            }
        }),
        Kind::Ref { target: None } => Some("unresolved".to_string()),
        Kind::Custom(obj) => Some(obj.name().to_string()),
        _ => None,
    }
}

/// Children shown in the full form. Token nodes hide their base parsers;
/// the kind indices in the free text identify them.
fn form_children(kind: &Kind, _grammar: &Grammar) -> Vec<NodeId> {
    match kind {
        Kind::Token { .. } => Vec::new(),
        Kind::Str { .. } => Vec::new(),
        Kind::LeftExpr(spec) | Kind::RightExpr(spec) => vec![spec.left, spec.right],
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
        Kind::Bounded { coarse, fine, .. } => vec![*coarse, *fine],
        Kind::Ref { target } => target.iter().copied().collect(),
        Kind::Custom(obj) => obj.children(),
        _ => Vec::new(),
    }
}

/// Indenting pretty printer for node trees and recorded call stacks.
pub struct TreePrinter {
    indent: usize,
    max_depth: usize,
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self {
            indent: 2,
            max_depth: 32,
        }
    }
}

impl TreePrinter {
    /// Printer with default indent and depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spaces per nesting level.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Depth past which subtrees print as `...`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Print the subtree rooted at `id`, one node per line.
    pub fn print(&self, grammar: &Grammar, id: NodeId) -> String {
        let mut out = String::new();
        let mut visiting = HashSet::new();
        self.print_inner(grammar, id, 0, &mut visiting, &mut out);
        out
    }

    fn print_inner(
        &self,
        grammar: &Grammar,
        id: NodeId,
        depth: usize,
        visiting: &mut HashSet<NodeId>,
        out: &mut String,
    ) {
        let pad = " ".repeat(depth * self.indent);
        if depth >= self.max_depth || !visiting.insert(id) {
            let _ = writeln!(out, "{}...", pad);
            return;
        }
        let mut line = grammar.short_form(id);
        if let Some(text) = free_text(grammar.kind(id)) {
            let _ = write!(line, "[{}]", text);
        }
        let _ = writeln!(out, "{}{}", pad, line);
        for child in grammar.children(id) {
            self.print_inner(grammar, child, depth + 1, visiting, out);
        }
        visiting.remove(&id);
    }

    /// Print a recorded call stack, outermost frame first.
    pub fn print_call_stack(&self, grammar: &Grammar, frames: &[CallFrame]) -> String {
        let mut out = String::new();
        for (depth, frame) in frames.iter().enumerate() {
            let pad = " ".repeat((depth * self.indent).min(self.max_depth * self.indent));
            let _ = writeln!(
                out,
                "{}{} at position {}",
                pad,
                grammar.short_form(frame.node),
                frame.position
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_prefers_name() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let b = g.string("b");
        g.set_name(a, "letter-a").unwrap();
        assert_eq!(g.short_form(a), "letter-a");
        assert_eq!(g.short_form(b), "str");
    }

    #[test]
    fn full_form_is_canonical() {
        let mut g = Grammar::new();
        let a = g.string("ab");
        let digit = g.char_pred("digit", |c| c.is_ascii_digit());
        let rep = g.repeat(digit, 1, false);
        let root = g.seq([a, rep]);
        assert_eq!(g.full_form(root), "seq(str[ab], repeat[min 1](char[digit]))");
    }

    #[test]
    fn full_form_stops_at_named_nodes() {
        let mut g = Grammar::new();
        let a = g.string("a");
        g.set_name(a, "letter").unwrap();
        let root = g.seq([a, a]);
        assert_eq!(g.full_form(root), "seq(letter, letter)");
        assert_eq!(g.full_form(a), "str[a]");
    }

    #[test]
    fn full_form_survives_cycles() {
        let mut g = Grammar::new();
        let fwd = g.forward();
        let a = g.string("a");
        let body = g.seq([a, fwd]);
        let root = g.choice([body, a]);
        g.define_forward(fwd, root).unwrap();
        let form = g.full_form(root);
        assert!(form.starts_with("choice("));
    }

    #[test]
    fn tree_printer_indents() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let root = g.seq([a]);
        let printed = TreePrinter::new().print(&g, root);
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines[0], "seq");
        assert_eq!(lines[1], "  str[a]");
    }
}

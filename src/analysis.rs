//! Static well-formedness checking
//!
//! Two grammar shapes send a PEG engine into unbounded work: left
//! recursion outside a managed left-recursive node, and a greedy
//! repetition over a nullable body. Both are decidable from the grammar
//! alone, so [`check`] finds them before parsing and [`run`]
//! (crate::engine::run) rejects offenders up front instead of tripping the
//! depth guard mid-parse.
//!
//! Nullability is a fixed point computed with memoization; a node whose
//! computation is already in progress is treated as non-nullable, which is
//! the correct least fixed point for PEG semantics. Left recursion is a
//! cycle in the FIRST relation (which children a node can invoke before
//! consuming input); the search does not traverse out of managed
//! left-recursive nodes, so only unprotected cycles are reported.

use crate::grammar::{Grammar, Kind, NodeId};
use crate::walker::{self, WalkSignal};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the checker found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellFormednessReport {
    /// Cycles in the FIRST relation not protected by a left-recursive node.
    pub left_recursive_cycles: Vec<Vec<NodeId>>,
    /// Greedy repetitions whose body can match without consuming input.
    pub nullable_repetitions: Vec<NodeId>,
}

impl WellFormednessReport {
    /// Whether the grammar passed.
    pub fn is_well_formed(&self) -> bool {
        self.left_recursive_cycles.is_empty() && self.nullable_repetitions.is_empty()
    }

    /// The report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for WellFormednessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_well_formed() {
            return write!(f, "grammar is well-formed");
        }
        for cycle in &self.left_recursive_cycles {
            write!(f, "unmanaged left recursion through")?;
            for node in cycle {
                write!(f, " {}", node)?;
            }
            writeln!(f)?;
        }
        for node in &self.nullable_repetitions {
            writeln!(f, "repetition {} has a nullable body", node)?;
        }
        Ok(())
    }
}

/// Check the grammar reachable from `root`.
pub fn check(grammar: &Grammar, root: NodeId) -> WellFormednessReport {
    let mut checker = Checker {
        grammar,
        nullable_memo: HashMap::new(),
        in_progress: HashSet::new(),
    };

    let mut reachable = Vec::new();
    walker::walk(grammar, root, &mut |id, signal| {
        if signal == WalkSignal::Enter {
            reachable.push(id);
        }
    });

    let mut cycles = Vec::new();
    let mut path = Vec::new();
    let mut on_path = HashSet::new();
    let mut visited = HashSet::new();
    checker.find_cycles(root, &mut path, &mut on_path, &mut visited, &mut cycles);

    let mut nullable_repetitions = Vec::new();
    for &id in &reachable {
        if checker.repetition_is_nullable(id) {
            nullable_repetitions.push(id);
        }
    }

    WellFormednessReport {
        left_recursive_cycles: cycles,
        nullable_repetitions,
    }
}

struct Checker<'g> {
    grammar: &'g Grammar,
    nullable_memo: HashMap<NodeId, bool>,
    in_progress: HashSet<NodeId>,
}

impl Checker<'_> {
    /// Whether the node can succeed without consuming input.
    fn nullable(&mut self, id: NodeId) -> bool {
        if let Some(&known) = self.nullable_memo.get(&id) {
            return known;
        }
        // In-progress nodes are non-nullable: the least fixed point.
        if !self.in_progress.insert(id) {
            return false;
        }
        let result = self.compute_nullable(id);
        self.in_progress.remove(&id);
        self.nullable_memo.insert(id, result);
        result
    }

    fn compute_nullable(&mut self, id: NodeId) -> bool {
        match self.grammar.kind(id) {
            Kind::Empty | Kind::ContextPred { .. } => true,
            Kind::Opt { .. } | Kind::Not { .. } | Kind::Lookahead { .. } => true,
            Kind::Fail | Kind::Any | Kind::CharPred { .. } | Kind::ObjectPred { .. } => false,
            Kind::Str { literal, .. } => literal.is_empty(),
            Kind::Seq { children } => {
                let children = children.clone();
                children.into_iter().all(|c| self.nullable(c))
            }
            Kind::Choice { children } | Kind::Longest { children } => {
                let children = children.clone();
                children.into_iter().any(|c| self.nullable(c))
            }
            Kind::Repeat { child, min, .. } => {
                let (child, min) = (*child, *min);
                min == 0 || self.nullable(child)
            }
            Kind::Around {
                around,
                inside,
                min,
                ..
            } => {
                let (around, inside, min) = (*around, *inside, *min);
                min == 0 || (self.nullable(around) && (min <= 1 || self.nullable(inside)))
            }
            Kind::Collect { child, .. }
            | Kind::LeftRecursive { child, .. }
            | Kind::Guarded { child }
            | Kind::Memo { child, .. } => {
                let child = *child;
                self.nullable(child)
            }
            Kind::LeftExpr(spec) => {
                let (left, required) = (spec.left, spec.operator_required);
                let base = self.nullable(left);
                base && !required
            }
            Kind::RightExpr(spec) => {
                let (right, required) = (spec.right, spec.operator_required);
                let base = self.nullable(right);
                base && !required
            }
            Kind::Token { set, .. } => {
                let base: Vec<NodeId> = set.base.clone();
                base.into_iter().any(|p| self.nullable(p))
            }
            Kind::Bounded { coarse, .. } => {
                let coarse = *coarse;
                self.nullable(coarse)
            }
            Kind::Ref { target } => match *target {
                Some(target) => self.nullable(target),
                None => false,
            },
            Kind::Custom(obj) => {
                let obj = std::sync::Arc::clone(obj);
                let children_nullable: Vec<bool> =
                    obj.children().into_iter().map(|c| self.nullable(c)).collect();
                obj.nullable(&children_nullable)
            }
        }
    }

    /// The children a node can invoke before consuming any input.
    fn firsts(&mut self, id: NodeId) -> Vec<NodeId> {
        match self.grammar.kind(id) {
            Kind::Empty
            | Kind::Fail
            | Kind::Any
            | Kind::CharPred { .. }
            | Kind::ObjectPred { .. }
            | Kind::ContextPred { .. } => Vec::new(),
            Kind::Str {
                literal,
                whitespace,
            } => {
                if literal.is_empty() {
                    whitespace.iter().copied().collect()
                } else {
                    Vec::new()
                }
            }
            Kind::Seq { children } => {
                let children = children.clone();
                let mut firsts = Vec::new();
                for child in children {
                    firsts.push(child);
                    if !self.nullable(child) {
                        break;
                    }
                }
                firsts
            }
            Kind::Choice { children } | Kind::Longest { children } => children.clone(),
            Kind::Repeat { child, .. }
            | Kind::Opt { child }
            | Kind::Not { child }
            | Kind::Lookahead { child }
            | Kind::Collect { child, .. }
            | Kind::Guarded { child }
            | Kind::Memo { child, .. } => vec![*child],
            Kind::Around { around, inside, .. } => {
                let (around, inside) = (*around, *inside);
                if self.nullable(around) {
                    vec![around, inside]
                } else {
                    vec![around]
                }
            }
            // Managed recursion: the fixed point breaks the cycle.
            Kind::LeftRecursive { .. } => Vec::new(),
            Kind::LeftExpr(spec) => {
                let (left, right) = (spec.left, spec.right);
                let infixes = spec.infixes.clone();
                let affixes = spec.affixes.clone();
                let mut firsts = vec![left];
                if self.nullable(left) {
                    let any_nullable_infix =
                        infixes.iter().any(|&op| self.nullable(op));
                    firsts.extend(infixes);
                    firsts.extend(affixes);
                    if any_nullable_infix {
                        firsts.push(right);
                    }
                }
                firsts
            }
            Kind::RightExpr(spec) => {
                let (left, right) = (spec.left, spec.right);
                let infixes = spec.infixes.clone();
                let affixes = spec.affixes.clone();
                let mut firsts = affixes;
                firsts.push(left);
                if self.nullable(left) {
                    firsts.extend(infixes);
                }
                firsts.push(right);
                firsts
            }
            Kind::Token { set, .. } => set.base.clone(),
            Kind::Bounded { coarse, fine, .. } => vec![*coarse, *fine],
            Kind::Ref { target } => target.iter().copied().collect(),
            Kind::Custom(obj) => {
                let obj = std::sync::Arc::clone(obj);
                let children_nullable: Vec<bool> =
                    obj.children().into_iter().map(|c| self.nullable(c)).collect();
                obj.first_children(&children_nullable)
            }
        }
    }

    fn find_cycles(
        &mut self,
        id: NodeId,
        path: &mut Vec<NodeId>,
        on_path: &mut HashSet<NodeId>,
        visited: &mut HashSet<NodeId>,
        cycles: &mut Vec<Vec<NodeId>>,
    ) {
        if on_path.contains(&id) {
            if let Some(start) = path.iter().position(|&n| n == id) {
                cycles.push(path[start..].to_vec());
            }
            return;
        }
        if !visited.insert(id) {
            return;
        }
        path.push(id);
        on_path.insert(id);
        for next in self.firsts(id) {
            self.find_cycles(next, path, on_path, visited, cycles);
        }
        path.pop();
        on_path.remove(&id);
    }

    /// Whether this node is a greedy repetition over a nullable body.
    fn repetition_is_nullable(&mut self, id: NodeId) -> bool {
        match self.grammar.kind(id) {
            Kind::Repeat { child, exact, .. } => {
                let (child, exact) = (*child, *exact);
                !exact && self.nullable(child)
            }
            Kind::Around {
                around,
                inside,
                exact,
                ..
            } => {
                let (around, inside, exact) = (*around, *inside, *exact);
                !exact && self.nullable(around) && self.nullable(inside)
            }
            Kind::LeftExpr(spec) => {
                let right = spec.right;
                let infixes = spec.infixes.clone();
                let affixes = spec.affixes.clone();
                let infix_loop = infixes
                    .into_iter()
                    .any(|op| self.nullable(op))
                    && self.nullable(right);
                let affix_loop = affixes.into_iter().any(|op| self.nullable(op));
                infix_loop || affix_loop
            }
            Kind::RightExpr(spec) => {
                let left = spec.left;
                let infixes = spec.infixes.clone();
                let affixes = spec.affixes.clone();
                let pair_loop = self.nullable(left)
                    && infixes.into_iter().any(|op| self.nullable(op));
                let affix_loop = affixes.into_iter().any(|op| self.nullable(op));
                pair_loop || affix_loop
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_grammar_passes() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let root = g.repeat(a, 0, false);
        assert!(check(&g, root).is_well_formed());
    }

    #[test]
    fn repetition_over_nullable_body_is_flagged() {
        let mut g = Grammar::new();
        let x = g.string("x");
        let opt = g.opt(x);
        let root = g.repeat(opt, 0, false);
        let report = check(&g, root);
        assert_eq!(report.nullable_repetitions, vec![root]);
    }

    #[test]
    fn exact_repetition_over_nullable_body_is_fine() {
        let mut g = Grammar::new();
        let x = g.string("x");
        let opt = g.opt(x);
        let root = g.repeat(opt, 3, true);
        assert!(check(&g, root).is_well_formed());
    }

    #[test]
    fn unprotected_left_recursion_is_flagged() {
        let mut g = Grammar::new();
        let fwd = g.forward();
        let plus = g.string("+");
        let num = g.char_pred("digit", |c| c.is_ascii_digit());
        let rec = g.seq([fwd, plus, num]);
        let root = g.choice([rec, num]);
        g.define_forward(fwd, root).unwrap();

        let report = check(&g, root);
        assert!(!report.left_recursive_cycles.is_empty());
    }

    #[test]
    fn managed_left_recursion_passes() {
        let mut g = Grammar::new();
        let fwd = g.forward();
        let plus = g.string("+");
        let num = g.char_pred("digit", |c| c.is_ascii_digit());
        let rec = g.seq([fwd, plus, num]);
        let body = g.choice([rec, num]);
        let root = g.left_recursive(body);
        g.define_forward(fwd, root).unwrap();

        assert!(check(&g, root).is_well_formed());
    }

    #[test]
    fn nullable_through_choice_and_seq() {
        let mut g = Grammar::new();
        let a = g.string("a");
        let empty = g.empty();
        let maybe = g.choice([a, empty]);
        let pair = g.seq([maybe, maybe]);
        let mut checker = Checker {
            grammar: &g,
            nullable_memo: HashMap::new(),
            in_progress: HashSet::new(),
        };
        assert!(checker.nullable(pair));
        assert!(!checker.nullable(a));
    }

    #[test]
    fn report_serializes() {
        let report = WellFormednessReport {
            left_recursive_cycles: vec![vec![NodeId(0), NodeId(2)]],
            nullable_repetitions: vec![NodeId(5)],
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("left_recursive_cycles"));
    }
}

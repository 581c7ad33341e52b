//! Depth-first traversal of the node graph
//!
//! The arena is a graph, not a tree: nodes are shared and forward
//! references close cycles. The walker visits each node once, telling the
//! visitor how it got there so analyses can distinguish a back edge
//! (cycle) from a cross edge (plain sharing).

use crate::grammar::{Grammar, NodeId};
use hashbrown::HashSet;

/// How the walker reached a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkSignal {
    /// First arrival; the node's children will be walked next.
    Enter,
    /// All children walked.
    Leave,
    /// Back edge: the node is on the current path (a cycle).
    Recurse,
    /// Cross edge: the node was fully walked earlier.
    Revisited,
}

/// Walk the graph reachable from `root` depth-first.
///
/// Every reachable node gets exactly one `Enter`/`Leave` pair; further
/// encounters signal `Recurse` or `Revisited` without descending.
pub fn walk<F>(grammar: &Grammar, root: NodeId, visit: &mut F)
where
    F: FnMut(NodeId, WalkSignal),
{
    let mut path = HashSet::new();
    let mut visited = HashSet::new();
    walk_inner(grammar, root, visit, &mut path, &mut visited);
}

fn walk_inner<F>(
    grammar: &Grammar,
    id: NodeId,
    visit: &mut F,
    path: &mut HashSet<NodeId>,
    visited: &mut HashSet<NodeId>,
) where
    F: FnMut(NodeId, WalkSignal),
{
    if path.contains(&id) {
        visit(id, WalkSignal::Recurse);
        return;
    }
    if !visited.insert(id) {
        visit(id, WalkSignal::Revisited);
        return;
    }
    path.insert(id);
    visit(id, WalkSignal::Enter);
    for child in grammar.children(id) {
        walk_inner(grammar, child, visit, path, visited);
    }
    visit(id, WalkSignal::Leave);
    path.remove(&id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_node_is_revisited_not_reentered() {
        let mut g = Grammar::new();
        let shared = g.string("x");
        let root = g.seq([shared, shared]);

        let mut signals = Vec::new();
        walk(&g, root, &mut |id, signal| signals.push((id, signal)));

        assert_eq!(
            signals,
            vec![
                (root, WalkSignal::Enter),
                (shared, WalkSignal::Enter),
                (shared, WalkSignal::Leave),
                (shared, WalkSignal::Revisited),
                (root, WalkSignal::Leave),
            ]
        );
    }

    #[test]
    fn cycle_signals_recurse() {
        let mut g = Grammar::new();
        let fwd = g.forward();
        let a = g.string("a");
        let body = g.seq([a, fwd]);
        let root = g.choice([body, a]);
        g.define_forward(fwd, root).unwrap();

        let mut recursed = Vec::new();
        walk(&g, root, &mut |id, signal| {
            if signal == WalkSignal::Recurse {
                recursed.push(id);
            }
        });
        assert_eq!(recursed, vec![root]);
    }
}

//! Per-node execution metrics
//!
//! Collected only when [`ParseOptions::trace`](crate::engine::ParseOptions)
//! is set; the counters ride along in
//! [`ParseResult::metrics`](crate::engine::ParseResult).

use crate::grammar::NodeId;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Invocations through the wrapper.
    pub invocations: u64,
    /// Invocations that matched.
    pub successes: u64,
    /// Total wall time spent in the node's subtree, in nanoseconds.
    /// Nested invocations count their time in every enclosing node.
    pub nanos: u64,
}

/// Metrics for one parse.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    stats: HashMap<NodeId, NodeStats>,
}

impl Metrics {
    pub(crate) fn record(&mut self, node: NodeId, success: bool, elapsed: Duration) {
        let entry = self.stats.entry(node).or_default();
        entry.invocations += 1;
        if success {
            entry.successes += 1;
        }
        entry.nanos += elapsed.as_nanos() as u64;
    }

    /// Counters for one node, if it was invoked.
    pub fn stats(&self, node: NodeId) -> Option<&NodeStats> {
        self.stats.get(&node)
    }

    /// Iterate over all recorded nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeStats)> {
        self.stats.iter().map(|(&id, stats)| (id, stats))
    }

    /// Total invocations across all nodes.
    pub fn total_invocations(&self) -> u64 {
        self.stats.values().map(|s| s.invocations).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates() {
        let mut metrics = Metrics::default();
        let node = NodeId(4);
        metrics.record(node, true, Duration::from_nanos(10));
        metrics.record(node, false, Duration::from_nanos(5));
        let stats = metrics.stats(node).unwrap();
        assert_eq!(stats.invocations, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.nanos, 15);
        assert_eq!(metrics.total_invocations(), 2);
    }
}

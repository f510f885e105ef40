//! Shortest-path routing over the static topology.
//!
//! The router is stateless: every call runs a breadth-first search from the
//! current node, expanding neighbors in the order the topology lists them.
//! BFS gives the minimum hop count and the listed order breaks ties, so the
//! chosen next hop is deterministic for a given topology.

use meshlink_core::{NodeId, Topology};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Next-hop resolver over a shared topology.
#[derive(Debug, Clone)]
pub struct Router {
    topology: Arc<Topology>,
}

impl Router {
    /// Create a router over `topology`.
    pub fn new(topology: Arc<Topology>) -> Self {
        Self { topology }
    }

    /// Topology this router searches.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Find the next hop from `current` towards `target`.
    ///
    /// Returns `None` when `current == target`, when `target` is not in the
    /// topology, or when no path exists.
    pub fn next_hop(&self, current: &str, target: &str) -> Option<NodeId> {
        self.shortest_path(current, target)
            .and_then(|path| path.into_iter().nth(1))
    }

    /// First shortest path discovered from `current` to `target`, both ends
    /// included.
    pub fn shortest_path(&self, current: &str, target: &str) -> Option<Vec<NodeId>> {
        if current == target || !self.topology.contains(target) {
            return None;
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([current]);
        let mut queue: VecDeque<&str> = VecDeque::from([current]);

        while let Some(node) = queue.pop_front() {
            if node == target {
                return Some(Self::unwind(&parents, current, target));
            }

            for neighbor in self.topology.neighbors(node) {
                if visited.insert(neighbor.as_str()) {
                    parents.insert(neighbor.as_str(), node);
                    queue.push_back(neighbor.as_str());
                }
            }
        }

        None
    }

    fn unwind(parents: &HashMap<&str, &str>, start: &str, target: &str) -> Vec<NodeId> {
        let mut path = vec![target.to_string()];
        let mut cursor = target;
        while cursor != start {
            match parents.get(cursor) {
                Some(parent) => {
                    path.push(parent.to_string());
                    cursor = parent;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}

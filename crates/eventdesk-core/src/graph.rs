//! Directed dependency graph with on-demand cycle detection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use thiserror::Error;

/// Errors raised by graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

/// Adjacency-list graph. Edges are not deduplicated and cycles are allowed
/// to exist until someone asks via [`DependencyGraph::has_cycle`].
///
/// The adjacency map is ordered so traversals are deterministic.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    adjacency: BTreeMap<N, Vec<N>>,
}

impl<N: Ord> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }
}

impl<N> DependencyGraph<N>
where
    N: Ord + Clone + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` with no outgoing edges. Returns `false` if it was
    /// already present.
    pub fn add_event(&mut self, node: N) -> bool {
        if self.adjacency.contains_key(&node) {
            return false;
        }
        self.adjacency.insert(node, Vec::new());
        true
    }

    pub fn contains(&self, node: &N) -> bool {
        self.adjacency.contains_key(node)
    }

    /// Adds the edge `from -> to`. Both ends must already be registered.
    pub fn add_dependency(&mut self, from: &N, to: &N) -> Result<(), GraphError> {
        if !self.adjacency.contains_key(to) {
            return Err(GraphError::UnknownEvent(to.to_string()));
        }
        match self.adjacency.get_mut(from) {
            Some(edges) => {
                edges.push(to.clone());
                Ok(())
            }
            None => Err(GraphError::UnknownEvent(from.to_string())),
        }
    }

    /// Drops `node` and every edge that points at it.
    pub fn remove_event(&mut self, node: &N) -> bool {
        if self.adjacency.remove(node).is_none() {
            return false;
        }
        for edges in self.adjacency.values_mut() {
            edges.retain(|target| target != node);
        }
        true
    }

    pub fn successors(&self, node: &N) -> &[N] {
        self.adjacency
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn adjacency(&self) -> &BTreeMap<N, Vec<N>> {
        &self.adjacency
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Checks whether the graph contains a directed cycle.
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Returns the nodes of the first cycle found, in edge order, starting
    /// and ending at the same node.
    pub fn find_cycle(&self) -> Option<Vec<N>> {
        let mut walk = Walk {
            visited: BTreeSet::new(),
            path: Vec::new(),
            on_path: BTreeSet::new(),
        };

        for node in self.adjacency.keys() {
            if let Some(cycle) = self.visit(node, &mut walk) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(&'a self, node: &'a N, walk: &mut Walk<'a, N>) -> Option<Vec<N>> {
        if walk.visited.contains(node) {
            if !walk.on_path.contains(node) {
                return None;
            }
            let start = walk.path.iter().position(|entry| *entry == node)?;
            let mut cycle: Vec<N> = walk.path[start..].iter().map(|n| (*n).clone()).collect();
            cycle.push(node.clone());
            return Some(cycle);
        }

        walk.visited.insert(node);
        walk.on_path.insert(node);
        walk.path.push(node);
        for next in self.successors(node) {
            if let Some(cycle) = self.visit(next, walk) {
                return Some(cycle);
            }
        }
        walk.path.pop();
        walk.on_path.remove(node);
        None
    }
}

/// DFS bookkeeping: `path` keeps the order for reporting, `on_path` answers membership.
struct Walk<'a, N> {
    visited: BTreeSet<&'a N>,
    path: Vec<&'a N>,
    on_path: BTreeSet<&'a N>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[&'static str], edges: &[(&'static str, &'static str)]) -> DependencyGraph<&'static str> {
        let mut graph = DependencyGraph::new();
        for node in nodes {
            graph.add_event(*node);
        }
        for (from, to) in edges {
            graph.add_dependency(from, to).expect("registered nodes");
        }
        graph
    }

    #[test]
    fn add_event_is_idempotent() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_event("a"));
        graph.add_dependency(&"a", &"a").expect("self edge");
        assert!(!graph.add_event("a"));
        assert_eq!(graph.successors(&"a"), ["a"]);
    }

    #[test]
    fn three_node_loop_is_a_cycle() {
        let looped = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert!(looped.has_cycle());
        assert_eq!(looped.find_cycle(), Some(vec!["a", "b", "c", "a"]));

        let chain = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert!(!chain.has_cycle());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let diamond = graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        assert!(!diamond.has_cycle());
    }

    #[test]
    fn cycle_in_disconnected_component_is_found() {
        let split = graph(&["a", "b", "x", "y"], &[("a", "b"), ("x", "y"), ("y", "x")]);
        assert_eq!(split.find_cycle(), Some(vec!["x", "y", "x"]));
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let single = graph(&["a"], &[("a", "a")]);
        assert!(single.has_cycle());
    }

    #[test]
    fn unknown_endpoint_is_rejected_without_side_effects() {
        let mut chain = graph(&["a", "b"], &[("a", "b")]);
        let before = chain.adjacency().clone();

        assert_eq!(
            chain.add_dependency(&"b", &"ghost"),
            Err(GraphError::UnknownEvent("ghost".to_string()))
        );
        assert_eq!(
            chain.add_dependency(&"ghost", &"a"),
            Err(GraphError::UnknownEvent("ghost".to_string()))
        );
        assert_eq!(chain.adjacency(), &before);
        assert!(!chain.has_cycle());
    }

    #[test]
    fn duplicate_edges_are_kept() {
        let doubled = graph(&["a", "b"], &[("a", "b"), ("a", "b")]);
        assert_eq!(doubled.edge_count(), 2);
    }

    #[test]
    fn removing_a_node_drops_incoming_edges() {
        let mut looped = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert!(looped.remove_event(&"c"));
        assert!(!looped.contains(&"c"));
        assert!(looped.successors(&"b").is_empty());
        assert!(!looped.has_cycle());
        assert!(!looped.remove_event(&"c"));
    }

    #[test]
    fn shared_prerequisites_are_walked_once() {
        // Every node points at every later node within a window, so the
        // walk meets already-finished nodes far more often than new ones.
        let mut dense = DependencyGraph::new();
        for node in 0..400u32 {
            dense.add_event(node);
        }
        for from in 0..400u32 {
            for to in (from + 1)..(from + 20).min(400) {
                dense.add_dependency(&from, &to).expect("registered nodes");
            }
        }
        assert!(!dense.has_cycle());

        dense.add_dependency(&399, &390).expect("registered nodes");
        let cycle = dense.find_cycle().expect("closing edge makes a loop");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&399) && cycle.contains(&390));
    }
}

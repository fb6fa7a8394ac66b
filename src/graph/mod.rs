//! Zone transition graphs.
//!
//! A transition graph maps a tail zone to its heads, each with the number of
//! observed direct transitions. This module exports the builder, the cycle
//! eliminator and the level assigner that turn historical routes into an
//! acyclic zone order.

pub mod builder;
pub mod cycles;
pub mod levels;

pub use builder::*;
pub use cycles::*;
pub use levels::*;

use std::collections::{BTreeMap, BTreeSet};

pub type Weight = u32;

/// tail zone -> (head zone -> transition count)
pub type TransitionGraph = BTreeMap<String, BTreeMap<String, Weight>>;

/// Increment the tail -> head transition count, creating the edge with weight 1
pub fn add_transition(graph: &mut TransitionGraph, tail: &str, head: &str) {
    *graph
        .entry(tail.to_string())
        .or_default()
        .entry(head.to_string())
        .or_insert(0) += 1;
}

/// Remove an edge, returning its weight. The tail keeps its (possibly empty) entry.
pub fn remove_edge(graph: &mut TransitionGraph, tail: &str, head: &str) -> Option<Weight> {
    graph.get_mut(tail).and_then(|heads| heads.remove(head))
}

pub fn weight(graph: &TransitionGraph, tail: &str, head: &str) -> Option<Weight> {
    graph.get(tail).and_then(|heads| heads.get(head)).copied()
}

pub fn edge_count(graph: &TransitionGraph) -> usize {
    graph.values().map(BTreeMap::len).sum()
}

/// All edges as (tail, head, weight) in key order
pub fn edges(graph: &TransitionGraph) -> impl Iterator<Item = (&str, &str, Weight)> {
    graph.iter().flat_map(|(tail, heads)| {
        heads.iter().map(move |(head, &w)| (tail.as_str(), head.as_str(), w))
    })
}

/// Every zone that appears as a tail or a head
pub fn vertices(graph: &TransitionGraph) -> BTreeSet<&str> {
    let mut set: BTreeSet<&str> = graph.keys().map(String::as_str).collect();
    set.extend(edges(graph).map(|(_, head, _)| head));
    set
}

/// Tails that are never the head of an edge, in key order
pub fn source_vertices(graph: &TransitionGraph) -> Vec<&str> {
    let heads: BTreeSet<&str> = edges(graph).map(|(_, head, _)| head).collect();
    graph
        .keys()
        .map(String::as_str)
        .filter(|v| !heads.contains(v))
        .collect()
}

/// Graph of consecutive pairs of a zone list, every edge with weight 1
pub fn from_zone_list<S: AsRef<str>>(zone_list: &[S]) -> TransitionGraph {
    let mut graph = TransitionGraph::new();
    for pair in zone_list.windows(2) {
        graph
            .entry(pair[0].as_ref().to_string())
            .or_default()
            .insert(pair[1].as_ref().to_string(), 1);
    }
    graph
}

#[cfg(test)]
pub(crate) fn graph_from_edges(edges: &[(&str, &str, Weight)]) -> TransitionGraph {
    let mut graph = TransitionGraph::new();
    for &(tail, head, w) in edges {
        graph.entry(tail.to_string()).or_default().insert(head.to_string(), w);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut graph = TransitionGraph::new();
        add_transition(&mut graph, "A", "B");
        add_transition(&mut graph, "A", "B");
        add_transition(&mut graph, "B", "C");
        assert_eq!(weight(&graph, "A", "B"), Some(2));
        assert_eq!(edge_count(&graph), 2);

        assert_eq!(remove_edge(&mut graph, "A", "B"), Some(2));
        assert_eq!(remove_edge(&mut graph, "A", "B"), None);
        assert!(graph.contains_key("A"));
        assert_eq!(edge_count(&graph), 1);
    }

    #[test]
    fn test_sources_and_vertices() {
        let graph = graph_from_edges(&[("A", "B", 1), ("B", "C", 1), ("D", "C", 1)]);
        assert_eq!(source_vertices(&graph), vec!["A", "D"]);
        assert_eq!(vertices(&graph).into_iter().collect::<Vec<_>>(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_from_zone_list() {
        let graph = from_zone_list(&["Depot", "Z1", "Z2", "Z1"]);
        assert_eq!(weight(&graph, "Depot", "Z1"), Some(1));
        assert_eq!(weight(&graph, "Z1", "Z2"), Some(1));
        assert_eq!(weight(&graph, "Z2", "Z1"), Some(1));
        assert_eq!(edge_count(&graph), 3);
    }
}

//! Cycle elimination for zone transition graphs.
//!
//! The eliminator repeatedly runs a depth-first traversal, stops at the first
//! back edge it meets and deletes either the cheapest edge of the closed cycle or
//! the whole cycle. The loop ends when a full traversal finds no back edge.

use crate::graph::{edge_count, remove_edge, source_vertices, TransitionGraph, Weight};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::HashMap;

/// What to delete once a cycle has been found
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum RemovalPolicy {
    /// Delete only the minimum-weight edge of the cycle
    MinCostEdge,
    /// Delete every edge of the cycle
    #[default]
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub tail: String,
    pub head: String,
    pub weight: Weight,
}

impl Edge {
    fn new(tail: &str, head: &str, weight: Weight) -> Self {
        Edge { tail: tail.to_string(), head: head.to_string(), weight }
    }
}

/// A closed cycle, its edges listed from the vertex the back edge returns to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub edges: Vec<Edge>,
    /// First edge of minimum weight in `edges`
    pub min_cost_edge: Edge,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Mark {
    Exploring,
    Visited,
}

type Frame<'g> = (&'g str, btree_map::Iter<'g, String, Weight>);

/// Find one cycle, or `None` if the graph is acyclic.
///
/// Traversal starts at the source vertices, then at any tail not reached from a
/// source, both in key order. Children are explored in key order.
pub fn find_cycle(graph: &TransitionGraph) -> Option<Cycle> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let roots = source_vertices(graph)
        .into_iter()
        .chain(graph.keys().map(String::as_str));

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        if let Some(cycle) = explore(graph, root, &mut marks) {
            return Some(cycle);
        }
    }
    None
}

fn explore<'g>(
    graph: &'g TransitionGraph,
    root: &'g str,
    marks: &mut HashMap<&'g str, Mark>,
) -> Option<Cycle> {
    let mut path: Vec<Frame<'g>> = Vec::new();
    if let Some((key, heads)) = graph.get_key_value(root) {
        marks.insert(key.as_str(), Mark::Exploring);
        path.push((key.as_str(), heads.iter()));
    }

    loop {
        let Some(frame) = path.last_mut() else { break };
        let vertex = frame.0;
        match frame.1.next() {
            Some((head, _)) => match marks.get(head.as_str()) {
                Some(Mark::Exploring) => return Some(close_cycle(graph, &path, vertex, head)),
                Some(Mark::Visited) => {}
                None => match graph.get_key_value(head.as_str()) {
                    Some((key, heads)) => {
                        marks.insert(key.as_str(), Mark::Exploring);
                        path.push((key.as_str(), heads.iter()));
                    }
                    // no out-edges: cannot lie on a cycle
                    None => {
                        marks.insert(head.as_str(), Mark::Visited);
                    }
                },
            },
            None => {
                marks.insert(vertex, Mark::Visited);
                path.pop();
            }
        }
    }
    None
}

/// Walk the traversal path from `head` down to `tail` and close it with the
/// back edge tail -> head.
fn close_cycle(graph: &TransitionGraph, path: &[Frame<'_>], tail: &str, head: &str) -> Cycle {
    let start = path.iter().position(|(v, _)| *v == head).unwrap_or(0);
    let mut vertices: Vec<&str> = path[start..].iter().map(|(v, _)| *v).collect();
    vertices.push(head);
    debug_assert_eq!(vertices[vertices.len() - 2], tail);

    let edges: Vec<Edge> = vertices
        .windows(2)
        .map(|pair| {
            let w = graph
                .get(pair[0])
                .and_then(|heads| heads.get(pair[1]))
                .copied()
                .unwrap_or(0);
            Edge::new(pair[0], pair[1], w)
        })
        .collect();

    let mut min_cost_edge = &edges[0];
    for edge in &edges[1..] {
        if edge.weight < min_cost_edge.weight {
            min_cost_edge = edge;
        }
    }
    let min_cost_edge = min_cost_edge.clone();

    Cycle { edges, min_cost_edge }
}

/// Outcome of a cycle-elimination run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationReport {
    /// Number of cycles found and broken
    pub iterations: usize,
    /// Deleted edges in deletion order
    pub removed: Vec<Edge>,
    /// True if the iteration cap stopped the loop
    pub capped: bool,
}

/// Reduces a transition graph to a DAG
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleEliminator {
    pub policy: RemovalPolicy,
}

impl CycleEliminator {
    pub fn new(policy: RemovalPolicy) -> Self {
        CycleEliminator { policy }
    }

    /// Delete edges until no cycle remains
    pub fn eliminate(&self, graph: &mut TransitionGraph) -> EliminationReport {
        let cap = edge_count(graph);
        let mut report = EliminationReport::default();

        while let Some(cycle) = find_cycle(graph) {
            if report.iterations >= cap {
                log::warn!("Cycle elimination stopped after {} iterations", report.iterations);
                report.capped = true;
                break;
            }
            report.iterations += 1;

            let doomed = match self.policy {
                RemovalPolicy::MinCostEdge => vec![cycle.min_cost_edge],
                RemovalPolicy::Cycle => cycle.edges,
            };
            for edge in doomed {
                if remove_edge(graph, &edge.tail, &edge.head).is_some() {
                    log::debug!("Deleting edge {} -> {} ({})", edge.tail, edge.head, edge.weight);
                    report.removed.push(edge);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{graph_from_edges, weight};
    use proptest::prelude::*;

    fn three_cycle() -> TransitionGraph {
        graph_from_edges(&[("A", "B", 1), ("B", "C", 1), ("C", "A", 5)])
    }

    #[test]
    fn test_acyclic_graph_has_no_cycle() {
        let graph = graph_from_edges(&[("A", "B", 1), ("A", "C", 1), ("B", "C", 1)]);
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn test_find_cycle_without_sources() {
        let cycle = find_cycle(&three_cycle()).unwrap();
        let pairs: Vec<(&str, &str)> = cycle
            .edges
            .iter()
            .map(|e| (e.tail.as_str(), e.head.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "B"), ("B", "C"), ("C", "A")]);
        assert_eq!(cycle.min_cost_edge, Edge::new("A", "B", 1));
    }

    #[test]
    fn test_min_cost_edge_policy() {
        let mut graph = three_cycle();
        let report = CycleEliminator::new(RemovalPolicy::MinCostEdge).eliminate(&mut graph);
        assert_eq!(report.removed, vec![Edge::new("A", "B", 1)]);
        assert_eq!(weight(&graph, "B", "C"), Some(1));
        assert_eq!(weight(&graph, "C", "A"), Some(5));
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn test_cycle_policy() {
        let mut graph = three_cycle();
        let report = CycleEliminator::new(RemovalPolicy::Cycle).eliminate(&mut graph);
        assert_eq!(report.removed.len(), 3);
        assert_eq!(report.iterations, 1);
        assert_eq!(edge_count(&graph), 0);
    }

    #[test]
    fn test_cycle_reached_from_source() {
        // S -> A -> B -> A, the two-cycle is entered from the source
        let mut graph = graph_from_edges(&[("S", "A", 3), ("A", "B", 4), ("B", "A", 2)]);
        let cycle = find_cycle(&graph).unwrap();
        assert_eq!(cycle.edges.len(), 2);
        assert_eq!(cycle.min_cost_edge, Edge::new("B", "A", 2));

        CycleEliminator::new(RemovalPolicy::MinCostEdge).eliminate(&mut graph);
        assert_eq!(weight(&graph, "S", "A"), Some(3));
        assert_eq!(weight(&graph, "A", "B"), Some(4));
        assert_eq!(weight(&graph, "B", "A"), None);
    }

    #[test]
    fn test_self_loop_is_removed() {
        let mut graph = graph_from_edges(&[("A", "A", 1), ("A", "B", 1)]);
        CycleEliminator::default().eliminate(&mut graph);
        assert_eq!(weight(&graph, "A", "A"), None);
        assert_eq!(weight(&graph, "A", "B"), Some(1));
    }

    fn arbitrary_graph() -> impl Strategy<Value = TransitionGraph> {
        prop::collection::vec((0u8..6, 0u8..6, 1u32..5), 0..20).prop_map(|edges| {
            let mut graph = TransitionGraph::new();
            for (t, h, w) in edges {
                graph
                    .entry(format!("Z{}", t))
                    .or_default()
                    .insert(format!("Z{}", h), w);
            }
            graph
        })
    }

    proptest! {
        #[test]
        fn prop_elimination_leaves_a_dag(graph in arbitrary_graph(), min_cost in any::<bool>()) {
            let policy = if min_cost { RemovalPolicy::MinCostEdge } else { RemovalPolicy::Cycle };
            let eliminator = CycleEliminator::new(policy);
            let mut graph = graph;
            let before = edge_count(&graph);

            let report = eliminator.eliminate(&mut graph);
            prop_assert!(find_cycle(&graph).is_none());
            prop_assert!(!report.capped);
            prop_assert_eq!(edge_count(&graph) + report.removed.len(), before);

            let snapshot = graph.clone();
            let again = eliminator.eliminate(&mut graph);
            prop_assert_eq!(again.iterations, 0);
            prop_assert_eq!(graph, snapshot);
        }
    }
}

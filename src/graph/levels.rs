//! Topological levels through strongly connected components.

use crate::graph::{remove_edge, TransitionGraph};
use std::collections::{BTreeMap, BTreeSet};

/// Zone -> level, levels start at 1
pub type LevelMap = BTreeMap<String, usize>;

/// Assigns levels with a two-pass (Kosaraju) component search.
///
/// Components come out of the second pass in topological order, so the
/// component counter doubles as the level: every edge between two components
/// points to a strictly higher level and zones on a common cycle share one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelAssigner;

impl LevelAssigner {
    pub fn new() -> Self {
        LevelAssigner
    }

    /// Level of every zone in `vertices` and of every zone in the graph.
    ///
    /// `vertices` fixes the visiting order of the first pass, so isolated zones
    /// that never appear in an edge still get a level.
    pub fn assign<S: AsRef<str>>(&self, vertices: &[S], graph: &TransitionGraph) -> LevelMap {
        let finish_order = finish_order(vertices, graph);
        let transpose = transpose(graph);

        let mut levels = LevelMap::new();
        let mut level = 0;
        for &root in finish_order.iter().rev() {
            if levels.contains_key(root) {
                continue;
            }
            level += 1;
            levels.insert(root.to_string(), level);
            let mut stack = vec![root];
            while let Some(vertex) = stack.pop() {
                for &pred in transpose.get(vertex).into_iter().flatten() {
                    if !levels.contains_key(pred) {
                        levels.insert(pred.to_string(), level);
                        stack.push(pred);
                    }
                }
            }
        }

        levels
    }

    /// Assign levels, then drop the edges that stay inside one level
    pub fn assign_and_prune<S: AsRef<str>>(&self, vertices: &[S], graph: &mut TransitionGraph) -> LevelMap {
        let levels = self.assign(vertices, graph);
        let pruned = prune_same_level(graph, &levels);
        if pruned > 0 {
            log::debug!("Pruned {} same-level edges", pruned);
        }
        levels
    }
}

/// First pass: vertices in order of DFS completion
fn finish_order<'a, S: AsRef<str>>(vertices: &'a [S], graph: &'a TransitionGraph) -> Vec<&'a str> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut order: Vec<&str> = Vec::new();

    let heads = graph.values().flat_map(|heads| heads.keys());
    let roots = vertices
        .iter()
        .map(AsRef::as_ref)
        .chain(graph.keys().map(String::as_str))
        .chain(heads.map(String::as_str));

    for root in roots {
        if !seen.insert(root) {
            continue;
        }
        // (vertex, index of next child)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        while let Some((vertex, next)) = stack.pop() {
            let child = graph
                .get(vertex)
                .and_then(|heads| heads.keys().nth(next))
                .map(String::as_str);
            match child {
                Some(child) => {
                    stack.push((vertex, next + 1));
                    if seen.insert(child) {
                        stack.push((child, 0));
                    }
                }
                None => order.push(vertex),
            }
        }
    }

    order
}

fn transpose(graph: &TransitionGraph) -> BTreeMap<&str, Vec<&str>> {
    let mut reversed: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (tail, heads) in graph {
        for head in heads.keys() {
            reversed.entry(head.as_str()).or_default().push(tail.as_str());
        }
    }
    reversed
}

/// Remove every edge whose endpoints share a level. Edges touching a zone
/// without a level are kept. Returns the number of removed edges.
pub fn prune_same_level(graph: &mut TransitionGraph, levels: &LevelMap) -> usize {
    let doomed: Vec<(String, String)> = graph
        .iter()
        .flat_map(|(tail, heads)| heads.keys().map(move |head| (tail, head)))
        .filter(|(tail, head)| match (levels.get(*tail), levels.get(*head)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        })
        .map(|(tail, head)| (tail.clone(), head.clone()))
        .collect();

    for (tail, head) in &doomed {
        remove_edge(graph, tail, head);
    }
    doomed.len()
}

/// Level -> zones at that level, zones in key order
pub fn level_groups(levels: &LevelMap) -> BTreeMap<usize, Vec<&str>> {
    let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (zone, &level) in levels {
        groups.entry(level).or_default().push(zone.as_str());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{edges, graph_from_edges, CycleEliminator};
    use proptest::prelude::*;

    #[test]
    fn test_chain_levels() {
        let graph = graph_from_edges(&[("B", "C", 1), ("A", "B", 1)]);
        let levels = LevelAssigner::new().assign(&["C", "B", "A"], &graph);
        assert_eq!(levels["A"], 1);
        assert_eq!(levels["B"], 2);
        assert_eq!(levels["C"], 3);
    }

    #[test]
    fn test_cycle_shares_a_level() {
        let mut graph = graph_from_edges(&[("A", "B", 1), ("B", "C", 1), ("C", "B", 1), ("C", "D", 1)]);
        let levels = LevelAssigner::new().assign_and_prune(&["A", "B", "C", "D"], &mut graph);
        assert_eq!(levels["B"], levels["C"]);
        assert!(levels["A"] < levels["B"]);
        assert!(levels["C"] < levels["D"]);
        assert!(graph["B"].is_empty());
        assert_eq!(graph["C"].keys().collect::<Vec<_>>(), vec!["D"]);
    }

    #[test]
    fn test_isolated_vertices_get_levels() {
        let graph = graph_from_edges(&[("A", "B", 1)]);
        let levels = LevelAssigner::new().assign(&["A", "B", "X"], &graph);
        assert_eq!(levels.len(), 3);
        assert!(levels["X"] >= 1);
        assert!(levels["A"] < levels["B"]);
    }

    #[test]
    fn test_heads_outside_vertex_list() {
        let graph = graph_from_edges(&[("A", "B", 1)]);
        let levels = LevelAssigner::new().assign::<&str>(&[], &graph);
        assert!(levels["A"] < levels["B"]);
    }

    #[test]
    fn test_prune_skips_unleveled_zones() {
        let mut graph = graph_from_edges(&[("A", "B", 1), ("A", "C", 1)]);
        let levels: LevelMap = [("A".to_string(), 1), ("B".to_string(), 1)].into_iter().collect();
        assert_eq!(prune_same_level(&mut graph, &levels), 1);
        assert_eq!(graph["A"].keys().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn test_level_groups() {
        let levels: LevelMap = [("A", 1), ("B", 2), ("C", 2)]
            .into_iter()
            .map(|(z, l)| (z.to_string(), l))
            .collect();
        let groups = level_groups(&levels);
        assert_eq!(groups[&1], vec!["A"]);
        assert_eq!(groups[&2], vec!["B", "C"]);
    }

    fn arbitrary_graph() -> impl Strategy<Value = TransitionGraph> {
        prop::collection::vec((0u8..8, 0u8..8), 0..24).prop_map(|pairs| {
            let mut graph = TransitionGraph::new();
            for (t, h) in pairs {
                graph.entry(format!("Z{}", t)).or_default().insert(format!("Z{}", h), 1);
            }
            graph
        })
    }

    fn reachable(graph: &TransitionGraph, from: &str) -> std::collections::BTreeSet<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(vertex) = stack.pop() {
            if let Some(heads) = graph.get(&vertex) {
                for head in heads.keys() {
                    if seen.insert(head.clone()) {
                        stack.push(head.clone());
                    }
                }
            }
        }
        seen
    }

    proptest! {
        #[test]
        fn prop_surviving_edges_climb(graph in arbitrary_graph()) {
            let mut graph = graph;
            let zones: Vec<String> = (0..8).map(|i| format!("Z{}", i)).collect();
            let levels = LevelAssigner::new().assign_and_prune(&zones, &mut graph);

            for zone in &zones {
                prop_assert!(levels[zone] >= 1);
            }
            for (tail, head, _) in edges(&graph) {
                prop_assert!(levels[tail] < levels[head]);
            }
        }

        #[test]
        fn prop_dag_levels_are_distinct_per_edge(graph in arbitrary_graph()) {
            let mut graph = graph;
            CycleEliminator::default().eliminate(&mut graph);
            let before: Vec<(String, String)> = edges(&graph)
                .map(|(t, h, _)| (t.to_string(), h.to_string()))
                .collect();

            let zones: Vec<&str> = graph.keys().map(String::as_str).collect::<Vec<_>>();
            let levels = LevelAssigner::new().assign(&zones, &graph);
            for (tail, head) in before {
                prop_assert!(levels[&tail] < levels[&head]);
            }
        }

        #[test]
        fn prop_mutually_reachable_zones_share_a_level(graph in arbitrary_graph()) {
            let zones: Vec<String> = (0..8).map(|i| format!("Z{}", i)).collect();
            let levels = LevelAssigner::new().assign(&zones, &graph);
            let reach: Vec<_> = zones.iter().map(|z| reachable(&graph, z)).collect();

            for (i, u) in zones.iter().enumerate() {
                for (j, v) in zones.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    match (reach[i].contains(v), reach[j].contains(u)) {
                        (true, true) => {
                            prop_assert_eq!(levels[u], levels[v]);
                        }
                        (true, false) => {
                            prop_assert!(levels[u] < levels[v]);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

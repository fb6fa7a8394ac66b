//! Cluster hierarchy of a target route.
//!
//! The route's zones are grouped by the cluster key, clusters by the
//! super-cluster key of their first zone, and super-clusters by the
//! top-cluster key of their first zone. Inside each group, members in natural
//! order are chained into neighbor pairs.

use crate::clustering::{ClusterKey, ZoneFormat};
use crate::zone::DEPOT;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Zone clusters and top clusters smaller than this get no neighbor chain
pub const MIN_NEIGHBOR_GROUP: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHierarchy {
    /// Cluster tokens in first-seen order; the depot is its own `Depot` cluster
    pub clusters: Vec<String>,
    /// Zone indices of each cluster
    pub cluster_zones: Vec<Vec<usize>>,
    /// Super-cluster tokens in first-seen order, depot excluded
    pub super_clusters: Vec<String>,
    /// Cluster indices of each super-cluster
    pub super_members: Vec<Vec<usize>>,
    /// Super-cluster indices of each top cluster
    pub top_members: Vec<Vec<usize>>,
    /// Zone index pairs inside clusters of at least three zones
    pub zone_neighbors: Vec<(usize, usize)>,
    /// Cluster index pairs inside each super-cluster
    pub cluster_neighbors: Vec<(usize, usize)>,
    /// Super-cluster index pairs inside top clusters of at least three members
    pub super_neighbors: Vec<(usize, usize)>,
}

impl ClusterHierarchy {
    pub fn build<F: ZoneFormat, S: AsRef<str>>(format: &F, zone_list: &[S], keys: &ClusterKey) -> Self {
        let zones: Vec<&str> = zone_list.iter().map(AsRef::as_ref).collect();

        let mut clusters = Vec::new();
        let mut cluster_zones = Vec::new();
        let mut zone_neighbors = Vec::new();
        let mut super_clusters: Vec<String> = Vec::new();
        let mut super_members: Vec<Vec<usize>> = Vec::new();
        let mut leaders: Vec<String> = Vec::new();

        for (token, members) in format.cluster_groups(&zones, &keys.cluster) {
            let names: Vec<&str> = members.iter().map(String::as_str).collect();
            zone_neighbors.extend(index_pairs(&zones, &natural_chain(&names, MIN_NEIGHBOR_GROUP)));
            cluster_zones.push(names.iter().filter_map(|z| position(&zones, z)).collect());

            let cluster = clusters.len();
            if token != DEPOT {
                let super_token = format.cluster_token(&members[0], &keys.super_cluster);
                match super_clusters.iter().position(|t| *t == super_token) {
                    Some(k) => super_members[k].push(cluster),
                    None => {
                        super_clusters.push(super_token);
                        super_members.push(vec![cluster]);
                        leaders.push(members[0].clone());
                    }
                }
            }
            clusters.push(token);
        }

        let cluster_refs: Vec<&str> = clusters.iter().map(String::as_str).collect();
        let mut cluster_neighbors = Vec::new();
        for members in &super_members {
            let names: Vec<&str> = members.iter().map(|&c| cluster_refs[c]).collect();
            cluster_neighbors.extend(index_pairs(&cluster_refs, &natural_chain(&names, 2)));
        }

        let mut top_tokens: Vec<String> = Vec::new();
        let mut top_members: Vec<Vec<usize>> = Vec::new();
        for (s, leader) in leaders.iter().enumerate() {
            let token = format.cluster_token(leader, &keys.top_cluster);
            match top_tokens.iter().position(|t| *t == token) {
                Some(k) => top_members[k].push(s),
                None => {
                    top_tokens.push(token);
                    top_members.push(vec![s]);
                }
            }
        }

        let super_refs: Vec<&str> = super_clusters.iter().map(String::as_str).collect();
        let mut super_neighbors = Vec::new();
        for members in &top_members {
            let names: Vec<&str> = members.iter().map(|&s| super_refs[s]).collect();
            super_neighbors.extend(index_pairs(&super_refs, &natural_chain(&names, MIN_NEIGHBOR_GROUP)));
        }

        ClusterHierarchy {
            clusters,
            cluster_zones,
            super_clusters,
            super_members,
            top_members,
            zone_neighbors,
            cluster_neighbors,
            super_neighbors,
        }
    }

    pub fn neighbor_count(&self) -> usize {
        self.zone_neighbors.len() + self.cluster_neighbors.len() + self.super_neighbors.len()
    }
}

/// Compares digit runs by value and everything else by character,
/// so `A-1.9B` sorts before `A-1.10B`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                match take_number(&mut a).cmp(&take_number(&mut b)) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {
                    a.next();
                    b.next();
                }
                other => return other,
            },
        }
    }
}

fn take_number(chars: &mut Peekable<Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(u64::from(digit));
        chars.next();
    }
    value
}

fn natural_chain<'a>(names: &[&'a str], min_len: usize) -> Vec<(&'a str, &'a str)> {
    if names.len() < min_len.max(2) {
        return Vec::new();
    }
    let mut sorted = names.to_vec();
    sorted.sort_by(|a, b| natural_cmp(a, b));
    sorted.windows(2).map(|w| (w[0], w[1])).collect()
}

fn position(list: &[&str], name: &str) -> Option<usize> {
    list.iter().position(|x| *x == name)
}

fn index_pairs(list: &[&str], pairs: &[(&str, &str)]) -> Vec<(usize, usize)> {
    pairs
        .iter()
        .filter_map(|&(a, b)| Some((position(list, a)?, position(list, b)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::PositionalFormat;

    fn keys() -> ClusterKey {
        ClusterKey { cluster: vec![0, 1, 3], super_cluster: vec![0, 1], top_cluster: vec![0] }
    }

    fn zones() -> Vec<&'static str> {
        vec!["Depot", "A-1.2B", "A-1.3B", "A-1.1B", "A-1.2C", "A-2.1B", "B-1.1A", "A-3.1B"]
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("A-1.9B", "A-1.10B"), Ordering::Less);
        assert_eq!(natural_cmp("A10", "A9"), Ordering::Greater);
        assert_eq!(natural_cmp("A1B", "A1C"), Ordering::Less);
        assert_eq!(natural_cmp("A1", "A1"), Ordering::Equal);
        assert_eq!(natural_cmp("A", "A1"), Ordering::Less);
    }

    #[test]
    fn test_groups() {
        let hierarchy = ClusterHierarchy::build(&PositionalFormat, &zones(), &keys());
        assert_eq!(hierarchy.clusters, vec!["Depot", "A1B", "A1C", "A2B", "B1A", "A3B"]);
        assert_eq!(hierarchy.cluster_zones, vec![vec![0], vec![1, 2, 3], vec![4], vec![5], vec![6], vec![7]]);
        assert_eq!(hierarchy.super_clusters, vec!["A1", "A2", "B1", "A3"]);
        assert_eq!(hierarchy.super_members, vec![vec![1, 2], vec![3], vec![4], vec![5]]);
        assert_eq!(hierarchy.top_members, vec![vec![0, 1, 3], vec![2]]);
    }

    #[test]
    fn test_neighbor_chains() {
        let hierarchy = ClusterHierarchy::build(&PositionalFormat, &zones(), &keys());
        // A-1.1B, A-1.2B, A-1.3B in natural order
        assert_eq!(hierarchy.zone_neighbors, vec![(3, 1), (1, 2)]);
        assert_eq!(hierarchy.cluster_neighbors, vec![(1, 2)]);
        // top cluster "A" holds A1, A2, A3
        assert_eq!(hierarchy.super_neighbors, vec![(0, 1), (1, 3)]);
        assert_eq!(hierarchy.neighbor_count(), 5);
    }

    #[test]
    fn test_small_groups_get_no_chain() {
        let zones = ["Depot", "A-1.2B", "A-1.3B", "B-1.1A"];
        let hierarchy = ClusterHierarchy::build(&PositionalFormat, &zones, &keys());
        assert!(hierarchy.zone_neighbors.is_empty());
        assert!(hierarchy.cluster_neighbors.is_empty());
        assert!(hierarchy.super_neighbors.is_empty());
        assert_eq!(hierarchy.top_members, vec![vec![0], vec![1]]);
    }
}

//! Corpus-wide selection of the cluster / super-cluster / top-cluster keys.

use crate::clustering::{FieldKey, PositionalFormat, ZoneFormat};
use crate::corpus::Corpus;
use crate::zone::{collapse_repeats, NO_ZONE};
use serde::{Deserialize, Serialize};

/// The three-tier key hierarchy: cluster ⊇ super-cluster ⊇ top-cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterKey {
    pub cluster: FieldKey,
    #[serde(rename = "superCluster")]
    pub super_cluster: FieldKey,
    #[serde(rename = "topCluster")]
    pub top_cluster: FieldKey,
}

/// Win counts of one selection round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub candidates: Vec<FieldKey>,
    pub tallies: Vec<usize>,
    /// Routes whose winning candidate still yields more than one token
    pub multi_token_routes: usize,
}

impl Vote {
    /// Candidate with the most wins, first index on ties
    pub fn winner(&self) -> &FieldKey {
        let mut best = 0;
        for (i, &count) in self.tallies.iter().enumerate() {
            if count > self.tallies[best] {
                best = i;
            }
        }
        &self.candidates[best]
    }
}

/// Majority vote over the zone orders of a corpus
#[derive(Debug, Clone, Default)]
pub struct ClusterKeySelector<F: ZoneFormat = PositionalFormat> {
    pub format: F,
}

impl ClusterKeySelector<PositionalFormat> {
    pub fn new() -> Self {
        ClusterKeySelector { format: PositionalFormat }
    }
}

impl<F: ZoneFormat> ClusterKeySelector<F> {
    pub fn with_format(format: F) -> Self {
        ClusterKeySelector { format }
    }

    /// Pick the key hierarchy for a whole corpus
    pub fn select(&self, corpus: &Corpus) -> ClusterKey {
        self.select_from_orders(&zone_orders(corpus))
    }

    /// Pick the key hierarchy from precomputed zone orders
    pub fn select_from_orders(&self, orders: &[Vec<String>]) -> ClusterKey {
        let cluster_vote = self.vote(orders, vec![vec![0, 1, 2], vec![0, 1, 3], vec![0, 2, 3], vec![1, 2, 3]]);
        let c = cluster_vote.winner().clone();

        let super_vote = self.vote(
            orders,
            vec![vec![c[0], c[1]], vec![c[0], c[2]], vec![c[1], c[2]]],
        );
        let s = super_vote.winner().clone();

        let top_vote = self.vote(orders, vec![vec![s[0]], vec![s[1]]]);
        let t = top_vote.winner().clone();

        log::info!("Routes with multiple top-level clusters: {}", top_vote.multi_token_routes);
        log::info!("Cluster tallies {:?} -> {:?}", cluster_vote.tallies, c);
        log::info!("Super-cluster tallies {:?} -> {:?}", super_vote.tallies, s);
        log::info!("Top-cluster tallies {:?} -> {:?}", top_vote.tallies, t);

        ClusterKey { cluster: c, super_cluster: s, top_cluster: t }
    }

    /// Each route votes for the candidate giving it the shortest cluster order
    /// (first candidate on ties)
    pub fn vote(&self, orders: &[Vec<String>], candidates: Vec<FieldKey>) -> Vote {
        let mut tallies = vec![0; candidates.len()];
        let mut multi_token_routes = 0;

        for order in orders {
            let mut best = 0;
            let mut best_len = usize::MAX;
            for (i, key) in candidates.iter().enumerate() {
                let len = self.format.cluster_order(order, key).len();
                if len < best_len {
                    best = i;
                    best_len = len;
                }
            }
            tallies[best] += 1;
            if best_len > 1 {
                multi_token_routes += 1;
            }
        }

        Vote { candidates, tallies, multi_token_routes }
    }
}

/// Zone order of every sequenced route: stops in visit order, the depot as
/// `Depot`, unlabeled stops as `NoZoneID`, consecutive duplicates collapsed
pub fn zone_orders(corpus: &Corpus) -> Vec<Vec<String>> {
    corpus
        .sequenced_routes()
        .into_iter()
        .map(|(_, route, sequence)| {
            let labels: Vec<&str> = route
                .visit_order(sequence)
                .into_iter()
                .map(|(_, stop)| stop.route_label().unwrap_or(NO_ZONE))
                .collect();
            collapse_repeats(&labels)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::create_test_corpus;
    use crate::corpus::RouteScore;

    fn orders(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|zones| zones.iter().map(|z| z.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_vote_prefers_fewest_tokens() {
        // Zones differ only in the last field, so every key without field 3
        // collapses the route into one cluster
        let orders = orders(&[&["Depot", "A-1.2B", "A-1.2C", "A-1.2D"]]);
        let selector = ClusterKeySelector::new();
        let vote = selector.vote(&orders, vec![vec![0, 1, 3], vec![0, 1, 2]]);
        assert_eq!(vote.tallies, vec![0, 1]);
        assert_eq!(vote.winner(), &vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let orders = orders(&[&["Depot", "A-1.2B"]]);
        let vote = ClusterKeySelector::new().vote(&orders, vec![vec![0], vec![3]]);
        assert_eq!(vote.tallies, vec![1, 0]);
        assert_eq!(vote.multi_token_routes, 0);

        let empty = ClusterKeySelector::new().vote(&[], vec![vec![0], vec![3]]);
        assert_eq!(empty.winner(), &vec![0]);
    }

    #[test]
    fn test_select_hierarchy() {
        let orders = orders(&[
            &["Depot", "A-1.2B", "A-1.2C", "A-1.3D"],
            &["Depot", "A-2.2B", "A-2.2C", "A-2.2D"],
        ]);
        let key = ClusterKeySelector::new().select_from_orders(&orders);
        assert_eq!(key.cluster, vec![0, 1, 2]);
        assert!(key.super_cluster.iter().all(|f| key.cluster.contains(f)));
        assert!(key.top_cluster.iter().all(|f| key.super_cluster.contains(f)));
        assert_eq!(key.super_cluster, vec![0, 1]);
        assert_eq!(key.top_cluster, vec![0]);
    }

    #[test]
    fn test_select_is_deterministic() {
        let corpus = create_test_corpus(&[
            ("r1", "S1", RouteScore::High, &[Some("A-1.2B"), Some("A-1.3B"), None]),
            ("r2", "S1", RouteScore::Low, &[Some("B-2.2C"), Some("A-1.2B")]),
        ]);
        let selector = ClusterKeySelector::new();
        assert_eq!(selector.select(&corpus), selector.select(&corpus));
    }

    #[test]
    fn test_zone_orders_mark_unlabeled_stops() {
        let corpus = create_test_corpus(&[(
            "r1",
            "S1",
            RouteScore::High,
            &[Some("A-1.2B"), Some("A-1.2B"), None],
        )]);
        assert_eq!(zone_orders(&corpus), vec![vec!["Depot", "A-1.2B", "NoZoneID"]]);
    }

    #[test]
    fn test_serde_names() {
        let key = ClusterKey { cluster: vec![0, 1, 2], super_cluster: vec![0, 1], top_cluster: vec![0] };
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"cluster":[0,1,2],"superCluster":[0,1],"topCluster":[0]}"#);
    }
}

//! Per-station super-cluster tables and super-cluster precedence transfer.

use crate::clustering::ZoneFormat;
use crate::corpus::{Corpus, RouteScore};
use crate::zone::{collapse_repeats, DEPOT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Super-cluster footprint of one historical route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperSet {
    /// Distinct tokens, first-seen order, depot excluded
    #[serde(rename = "superList")]
    pub super_list: Vec<String>,
    /// Tokens in visit order, consecutive duplicates collapsed
    #[serde(rename = "superOrder")]
    pub super_order: Vec<String>,
}

/// Best reference route for a target's super-cluster order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperMatch {
    pub reference: String,
    /// Tokens shared with the reference route
    pub shared: usize,
    /// Precedence pairs as indices into the target token list
    pub edges: Vec<(usize, usize)>,
}

/// station -> route -> super set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuperSets {
    pub stations: BTreeMap<String, BTreeMap<String, SuperSet>>,
}

impl SuperSets {
    /// Tables for every sequenced route not scored `Low`
    pub fn build<F: ZoneFormat>(corpus: &Corpus, format: &F, key: &[usize]) -> Self {
        let mut stations: BTreeMap<String, BTreeMap<String, SuperSet>> = BTreeMap::new();

        for (id, route, sequence) in corpus.sequenced_routes() {
            if route.route_score == Some(RouteScore::Low) {
                continue;
            }

            let mut super_list: Vec<String> = Vec::new();
            for zone in route.zone_labels().zones.iter().filter(|z| *z != DEPOT) {
                let token = format.cluster_token(zone, key);
                if !super_list.contains(&token) {
                    super_list.push(token);
                }
            }

            let labels: Vec<&str> = route.zone_sequence(sequence).into_iter().flatten().collect();
            let super_order = format.cluster_order(&collapse_repeats(&labels), key);

            stations
                .entry(route.station().to_string())
                .or_default()
                .insert(id.to_string(), SuperSet { super_list, super_order });
        }

        SuperSets { stations }
    }

    pub fn station(&self, station: &str) -> Option<&BTreeMap<String, SuperSet>> {
        self.stations.get(station)
    }

    pub fn len(&self) -> usize {
        self.stations.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Choose the reference route of `station` sharing the most tokens with
    /// `target_tokens`, preferring more precedence edges on equal sharing.
    ///
    /// `target_tokens` is the target's distinct token list (see
    /// [`ZoneFormat::cluster_tokens`]); `target_id` is never chosen.
    pub fn match_super_order(&self, station: &str, target_id: &str, target_tokens: &[String]) -> Option<SuperMatch> {
        let routes = self.stations.get(station)?;
        let mut best: Option<SuperMatch> = None;
        let mut card: i64 = -1;

        for (id, set) in routes {
            if id == target_id {
                continue;
            }
            let shared = target_tokens.iter().filter(|t| set.super_list.contains(t)).count();
            if shared as i64 >= card {
                let edges = precedence_edges(&set.super_order, target_tokens);
                let more_edges = best.as_ref().map_or(true, |b| edges.len() > b.edges.len());
                if shared as i64 > card || more_edges {
                    card = shared as i64;
                    best = Some(SuperMatch { reference: id.clone(), shared, edges });
                }
            }
        }

        best
    }
}

/// Consecutive pairs of a reference order whose tokens both occur in `tokens`
/// and each occur exactly once in the order, as indices into `tokens`
pub fn precedence_edges(order: &[String], tokens: &[String]) -> Vec<(usize, usize)> {
    let occurrences = |token: &String| order.iter().filter(|t| *t == token).count();
    let index = |token: &String| tokens.iter().position(|t| t == token);

    order
        .windows(2)
        .filter_map(|pair| match (index(&pair[0]), index(&pair[1])) {
            (Some(a), Some(b)) if occurrences(&pair[0]) == 1 && occurrences(&pair[1]) == 1 => Some((a, b)),
            _ => None,
        })
        .collect()
}

/// Target token list of a zone list under the cluster key
pub fn target_tokens<F: ZoneFormat, S: AsRef<str>>(format: &F, zones: &[S], key: &[usize]) -> Vec<String> {
    format.cluster_tokens(zones, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::PositionalFormat;
    use crate::corpus::tests::create_test_corpus;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_skips_low_routes() {
        let corpus = create_test_corpus(&[
            ("r1", "S1", RouteScore::High, &[Some("A-1.2B"), Some("A-1.3B"), Some("A-1.2C")]),
            ("r2", "S1", RouteScore::Low, &[Some("A-1.2B")]),
            ("r3", "S2", RouteScore::Medium, &[Some("B-1.2B")]),
        ]);
        let sets = SuperSets::build(&corpus, &PositionalFormat, &[0, 1, 2]);
        assert_eq!(sets.len(), 2);

        let r1 = &sets.station("S1").unwrap()["r1"];
        assert_eq!(r1.super_list, strings(&["A12", "A13"]));
        assert_eq!(r1.super_order, strings(&["A12", "A13", "A12"]));
        assert!(sets.station("S1").unwrap().get("r2").is_none());
    }

    #[test]
    fn test_precedence_edges_need_single_occurrence() {
        let tokens = strings(&["Depot", "X", "Y", "Z"]);
        // Y repeats, so neither X->Y nor Y->Z qualifies
        let order = strings(&["X", "Y", "Z", "Y"]);
        assert!(precedence_edges(&order, &tokens).is_empty());

        let order = strings(&["X", "Z", "Y", "W"]);
        assert_eq!(precedence_edges(&order, &tokens), vec![(1, 3), (3, 2)]);
    }

    #[test]
    fn test_match_prefers_shared_tokens_then_edges() {
        let mut routes = BTreeMap::new();
        routes.insert(
            "a".to_string(),
            SuperSet { super_list: strings(&["X", "Y"]), super_order: strings(&["Y", "X"]) },
        );
        routes.insert(
            "b".to_string(),
            SuperSet { super_list: strings(&["X", "Y"]), super_order: strings(&["X", "Q", "Y"]) },
        );
        routes.insert(
            "target".to_string(),
            SuperSet { super_list: strings(&["X", "Y", "Q"]), super_order: strings(&["X", "Y", "Q"]) },
        );
        routes.insert(
            "c".to_string(),
            SuperSet { super_list: strings(&["X"]), super_order: strings(&["X"]) },
        );
        let mut sets = SuperSets::default();
        sets.stations.insert("S1".to_string(), routes);

        let tokens = strings(&["Depot", "X", "Y"]);
        let found = sets.match_super_order("S1", "target", &tokens).unwrap();
        // a and b share two tokens; a yields Y->X, b yields nothing
        assert_eq!(found.reference, "a");
        assert_eq!(found.shared, 2);
        assert_eq!(found.edges, vec![(2, 1)]);

        assert!(sets.match_super_order("S9", "target", &tokens).is_none());
    }

    #[test]
    fn test_target_tokens_keep_depot() {
        let zones = strings(&["Depot", "A-1.2B", "A-1.2C"]);
        assert_eq!(target_tokens(&PositionalFormat, &zones, &vec![0, 1, 2]), strings(&["Depot", "A12"]));
    }
}

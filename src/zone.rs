//! Zone identifiers and per-route zone summaries.
//!
//! Zone IDs are opaque strings. Two sentinels are reserved: [`DEPOT`] labels the
//! station stop of a route and [`NO_ZONE`] stands in for a stop without a label
//! when every stop must carry one.

use crate::corpus::{ActualSequence, RouteRecord, RouteScore};
use crate::graph::levels::{LevelAssigner, LevelMap};
use crate::graph::{self, TransitionGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEPOT: &str = "Depot";
pub const NO_ZONE: &str = "NoZoneID";

/// Collapse consecutive duplicates, keeping the run length of each entry
pub fn collapse_runs<S: AsRef<str>>(sequence: &[S]) -> Vec<(String, usize)> {
    let mut runs: Vec<(String, usize)> = Vec::new();
    for zone in sequence.iter().map(AsRef::as_ref) {
        match runs.last_mut() {
            Some((last, count)) if last.as_str() == zone => *count += 1,
            _ => runs.push((zone.to_string(), 1)),
        }
    }
    runs
}

/// Collapse consecutive duplicates
pub fn collapse_repeats<S: AsRef<str>>(sequence: &[S]) -> Vec<String> {
    collapse_runs(sequence).into_iter().map(|(zone, _)| zone).collect()
}

/// Distinct zones of a route in stop order, plus the zone index of every stop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteZones {
    pub zones: Vec<String>,
    /// `None` for stops without a label
    pub stop_index: Vec<Option<usize>>,
}

impl RouteZones {
    /// Index of `zone`, appending it if unseen
    pub fn intern(&mut self, zone: &str) -> usize {
        match self.position(zone) {
            Some(i) => i,
            None => {
                self.zones.push(zone.to_string());
                self.zones.len() - 1
            }
        }
    }

    pub fn position(&self, zone: &str) -> Option<usize> {
        self.zones.iter().position(|z| z == zone)
    }
}

/// Zone summary of one historical route, built once and read by the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteZoneInfo {
    /// Visited zones with consecutive duplicates collapsed
    pub zone_list: Vec<String>,
    /// Same sequence with run lengths
    pub accumulated_zone_list: Vec<(String, usize)>,
    /// Transitions of `zone_list`, pruned of same-level edges
    pub zone_graph: TransitionGraph,
    pub route_score: Option<RouteScore>,
    /// Zone -> level
    pub full_components: LevelMap,
}

impl RouteZoneInfo {
    pub fn from_zone_sequence<S: AsRef<str>>(sequence: &[S], route_score: Option<RouteScore>) -> Self {
        let accumulated_zone_list = collapse_runs(sequence);
        let zone_list: Vec<String> = accumulated_zone_list.iter().map(|(z, _)| z.clone()).collect();

        let mut zone_graph = graph::from_zone_list(&zone_list);
        let assigner = LevelAssigner::new();
        let full_components = assigner.assign_and_prune(&zone_list, &mut zone_graph);

        RouteZoneInfo {
            zone_list,
            accumulated_zone_list,
            zone_graph,
            route_score,
            full_components,
        }
    }

    /// Build the summary of a route from its realized sequence. Unlabeled stops
    /// are skipped.
    pub fn from_route(route: &RouteRecord, sequence: &ActualSequence) -> Self {
        let labels: Vec<&str> = route.zone_sequence(sequence).into_iter().flatten().collect();
        Self::from_zone_sequence(&labels, route.route_score)
    }

    /// Total number of stops per zone, summed over all runs
    pub fn zone_totals(&self) -> BTreeMap<&str, usize> {
        let mut totals = BTreeMap::new();
        for (zone, count) in &self.accumulated_zone_list {
            *totals.entry(zone.as_str()).or_insert(0) += count;
        }
        totals
    }

    pub fn level(&self, zone: &str) -> Option<usize> {
        self.full_components.get(zone).copied()
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.zone_list.iter().any(|z| z == zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_runs() {
        let seq = ["Depot", "Z1", "Z1", "Z2", "Z1"];
        assert_eq!(
            collapse_runs(&seq),
            vec![
                ("Depot".to_string(), 1),
                ("Z1".to_string(), 2),
                ("Z2".to_string(), 1),
                ("Z1".to_string(), 1)
            ]
        );
        assert_eq!(collapse_repeats(&seq), vec!["Depot", "Z1", "Z2", "Z1"]);
        assert!(collapse_runs::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_route_zone_info_from_sequence() {
        let info = RouteZoneInfo::from_zone_sequence(&["Depot", "Z1", "Z1", "Z2", "Z1"], Some(RouteScore::High));
        assert_eq!(info.zone_list, vec!["Depot", "Z1", "Z2", "Z1"]);
        assert_eq!(info.zone_totals()["Z1"], 3);

        // Z1 and Z2 form a cycle, so they share a level above the depot
        let depot = info.level("Depot").unwrap();
        assert_eq!(info.level("Z1"), info.level("Z2"));
        assert!(depot < info.level("Z1").unwrap());
        assert!(info.zone_graph["Z1"].is_empty());
        assert!(info.zone_graph["Depot"].contains_key("Z1"));
    }

    #[test]
    fn test_levels_follow_linear_order() {
        let info = RouteZoneInfo::from_zone_sequence(&["Depot", "A", "B", "C"], None);
        assert_eq!(info.level("Depot"), Some(1));
        assert_eq!(info.level("A"), Some(2));
        assert_eq!(info.level("B"), Some(3));
        assert_eq!(info.level("C"), Some(4));
    }

    #[test]
    fn test_route_zones_intern() {
        let mut zones = RouteZones::default();
        assert_eq!(zones.intern("A"), 0);
        assert_eq!(zones.intern("B"), 1);
        assert_eq!(zones.intern("A"), 0);
        assert_eq!(zones.position("C"), None);
    }
}

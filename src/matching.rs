//! Best-match selection of a historical route for a target route.
//!
//! A target route without its own history borrows the level map of the most
//! similar historical route of its station. Candidates are compared on three
//! scores in lexicographic order:
//! - forward: target zones found in the candidate, weighted by route quality
//! - backward: candidate zone visits that hit a target zone, same weight
//! - size: per common zone, the smaller of the two stop counts

use crate::corpus::RouteScore;
use crate::zone::RouteZoneInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// route id -> zone summary, for one station
pub type StationRouteInfos = BTreeMap<String, RouteZoneInfo>;

/// Weight of a candidate's zone matches by its quality score
pub fn route_weight(score: Option<RouteScore>) -> f64 {
    match score {
        Some(RouteScore::High) => 2.0,
        Some(RouteScore::Medium) => 1.5,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub forward: f64,
    pub backward: f64,
    pub size: usize,
}

impl MatchScore {
    /// Lexicographically at least as good, with `>=` on the size score
    fn reaches(&self, best: &MatchScore) -> bool {
        self.forward > best.forward
            || (self.forward == best.forward && self.backward > best.backward)
            || (self.forward == best.forward && self.backward == best.backward && self.size >= best.size)
    }

    /// Lexicographically better
    fn beats(&self, best: &MatchScore) -> bool {
        self.forward > best.forward
            || (self.forward == best.forward && self.backward > best.backward)
            || (self.forward == best.forward && self.backward == best.backward && self.size > best.size)
    }
}

/// Selected historical route
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route_id: &'a str,
    pub info: &'a RouteZoneInfo,
    pub score: MatchScore,
    /// Every candidate that reached the running best when scanned, in scan order
    pub best_match_list: Vec<&'a str>,
}

/// Ranks the historical routes of one station against a target
#[derive(Debug, Clone, Copy)]
pub struct RouteMatcher<'a> {
    infos: &'a StationRouteInfos,
}

impl<'a> RouteMatcher<'a> {
    pub fn new(infos: &'a StationRouteInfos) -> Self {
        RouteMatcher { infos }
    }

    /// Score one candidate.
    ///
    /// `zone_list` holds the target's distinct zones and `zone_counts` its
    /// number of stops per zone.
    pub fn score(&self, candidate: &RouteZoneInfo, zone_list: &[String], zone_counts: &BTreeMap<String, usize>) -> MatchScore {
        let weight = route_weight(candidate.route_score);
        let forward = zone_list.iter().filter(|z| candidate.contains(z)).count();
        let backward = candidate.zone_list.iter().filter(|z| zone_list.contains(z)).count();

        let totals = candidate.zone_totals();
        let size = zone_counts
            .iter()
            .filter_map(|(zone, &count)| totals.get(zone.as_str()).map(|&total| count.min(total)))
            .sum();

        MatchScore { forward: forward as f64 * weight, backward: backward as f64 * weight, size }
    }

    /// Best candidate for `target_id`, never the target itself. `None` if no
    /// candidate scores above zero on any criterion.
    pub fn find_best(
        &self,
        target_id: &str,
        zone_list: &[String],
        zone_counts: &BTreeMap<String, usize>,
    ) -> Option<RouteMatch<'a>> {
        let mut best_score = MatchScore::default();
        let mut best: Option<(&'a str, &'a RouteZoneInfo)> = None;
        let mut best_match_list = Vec::new();

        for (id, info) in self.infos {
            if id == target_id {
                continue;
            }
            let score = self.score(info, zone_list, zone_counts);
            if score.reaches(&best_score) {
                best_match_list.push(id.as_str());
                if score.beats(&best_score) {
                    best = Some((id.as_str(), info));
                    best_score = score;
                }
            }
        }

        best.map(|(route_id, info)| RouteMatch { route_id, info, score: best_score, best_match_list })
    }
}

//! Zone precedence constraints for a target route.
//!
//! Constraints are derived from the level map of the matched historical route
//! and expressed as pairs of 0-based indices into the target's zone list. Zones
//! of the target without a level are left unconstrained.

use crate::graph::LevelMap;
use crate::zone::DEPOT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Levels holding more zones than this get no disjunctive pairs
pub const MAX_DISJUNCTIVE_LEVEL: usize = 4;

/// Which constraint families to derive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintConfig {
    /// Every zone precedes every higher-level zone, instead of only the next level up
    pub transitive: bool,
    pub disjunctive: bool,
    pub paths: bool,
    pub neighbors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConstraints {
    /// (tail, head): tail must be visited before head
    pub precedence: Vec<(usize, usize)>,
    /// (a, b): either a before b or b before a
    pub disjunctive: Vec<(usize, usize)>,
    /// Zones of consecutive singleton levels, visited back to back
    pub paths: Vec<(usize, usize)>,
    /// The two zones of a two-zone level
    pub neighbors: Vec<(usize, usize)>,
}

impl ZoneConstraints {
    pub fn is_empty(&self) -> bool {
        self.precedence.is_empty() && self.disjunctive.is_empty() && self.paths.is_empty() && self.neighbors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.precedence.len() + self.disjunctive.len() + self.paths.len() + self.neighbors.len()
    }
}

/// Derive the configured constraint families
pub fn derive_constraints(config: &ConstraintConfig, zone_list: &[String], levels: &LevelMap) -> ZoneConstraints {
    let precedence = if config.transitive {
        transitive_precedence(zone_list, levels)
    } else {
        next_level_precedence(zone_list, levels)
    };

    ZoneConstraints {
        precedence,
        disjunctive: if config.disjunctive { disjunctive_pairs(zone_list, levels) } else { Vec::new() },
        paths: if config.paths { level_paths(zone_list, levels) } else { Vec::new() },
        neighbors: if config.neighbors { level_neighbors(zone_list, levels) } else { Vec::new() },
    }
}

fn leveled<'a>(zone_list: &'a [String], levels: &'a LevelMap) -> impl Iterator<Item = (usize, usize)> + 'a {
    zone_list
        .iter()
        .enumerate()
        .filter_map(move |(i, zone)| levels.get(zone).map(|&level| (i, level)))
}

/// Each zone precedes the zones at the lowest level above its own
pub fn next_level_precedence(zone_list: &[String], levels: &LevelMap) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (tail, tail_level) in leveled(zone_list, levels) {
        let next = leveled(zone_list, levels)
            .map(|(_, level)| level)
            .filter(|&level| level > tail_level)
            .min();
        if let Some(next) = next {
            pairs.extend(
                leveled(zone_list, levels)
                    .filter(|&(_, level)| level == next)
                    .map(|(head, _)| (tail, head)),
            );
        }
    }
    pairs
}

/// Each zone precedes every zone at a higher level
pub fn transitive_precedence(zone_list: &[String], levels: &LevelMap) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (tail, tail_level) in leveled(zone_list, levels) {
        pairs.extend(
            leveled(zone_list, levels)
                .filter(|&(_, level)| level > tail_level)
                .map(|(head, _)| (tail, head)),
        );
    }
    pairs
}

/// Target zones grouped by level, zones in key order
fn target_level_groups(zone_list: &[String], levels: &LevelMap) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (zone, &level) in levels {
        if let Some(i) = zone_list.iter().position(|z| z == zone) {
            groups.entry(level).or_default().push(i);
        }
    }
    groups
}

/// Unordered pairs within each small level
pub fn disjunctive_pairs(zone_list: &[String], levels: &LevelMap) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for members in target_level_groups(zone_list, levels).values() {
        if members.len() > MAX_DISJUNCTIVE_LEVEL {
            continue;
        }
        for (k, &a) in members.iter().enumerate() {
            for &b in &members[k + 1..] {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

/// Links between consecutive singleton levels. The depot frames the level
/// sequence below the first level and above the last one.
pub fn level_paths(zone_list: &[String], levels: &LevelMap) -> Vec<(usize, usize)> {
    let mut groups: BTreeMap<usize, Vec<&str>> = crate::graph::level_groups(levels);
    let top = groups.keys().next_back().copied().unwrap_or(0) + 1;
    groups.insert(0, vec![DEPOT]);
    groups.insert(top, vec![DEPOT]);

    let index = |zone: &str| zone_list.iter().position(|z| z == zone);
    let mut pairs = Vec::new();
    for level in 1..=top {
        let (Some(lower), Some(upper)) = (groups.get(&(level - 1)), groups.get(&level)) else {
            continue;
        };
        if lower.len() != 1 || upper.len() != 1 {
            continue;
        }
        if let (Some(a), Some(b)) = (index(lower[0]), index(upper[0])) {
            if a != b {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

/// The two zones of every level holding exactly two zones
pub fn level_neighbors(zone_list: &[String], levels: &LevelMap) -> Vec<(usize, usize)> {
    let index = |zone: &str| zone_list.iter().position(|z| z == zone);
    crate::graph::level_groups(levels)
        .values()
        .filter(|members| members.len() == 2)
        .filter_map(|members| Some((index(members[0])?, index(members[1])?)))
        .collect()
}

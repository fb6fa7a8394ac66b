//! Module for loading and representing the historical route corpus.
//!
//! A corpus is the set of route records (station, stops, quality score) together
//! with the realized visit order of every route. This module also carries the
//! hygiene pass that runs before any zone inference: routes without a depot stop
//! are dropped and missing station codes are synthesized.

use crate::error::{Result, ZoneOrderError};
use crate::zone::{RouteZones, DEPOT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Categorical quality score attached to a historical route
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RouteScore {
    High,
    Medium,
    Low,
}

/// Kind of stop within a route
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum StopType {
    /// The depot the route departs from and returns to
    Station,
    #[default]
    Dropoff,
    #[serde(other)]
    Other,
}

/// A single stop of a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    /// Latitude (0.0 when absent from the record)
    #[serde(default)]
    pub lat: f64,
    /// Longitude (0.0 when absent from the record)
    #[serde(default)]
    pub lng: f64,
    #[serde(rename = "type", default)]
    pub stop_type: StopType,
    /// Zone label, possibly missing
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl Stop {
    pub fn new(lat: f64, lng: f64, stop_type: StopType, zone_id: Option<&str>) -> Self {
        Stop { lat, lng, stop_type, zone_id: zone_id.map(str::to_string) }
    }

    pub fn is_station(&self) -> bool {
        self.stop_type == StopType::Station
    }

    /// The stop's own zone label. Empty labels count as missing.
    pub fn zone(&self) -> Option<&str> {
        self.zone_id.as_deref().filter(|z| !z.is_empty())
    }

    /// Label used when ordering zones along a route: the depot is always `Depot`.
    pub fn route_label(&self) -> Option<&str> {
        if self.is_station() {
            Some(DEPOT)
        } else {
            self.zone()
        }
    }
}

/// Realized visit order of a route: stop id -> position
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActualSequence {
    pub actual: BTreeMap<String, usize>,
}

impl ActualSequence {
    pub fn from_order(stops: &[&str]) -> Self {
        ActualSequence {
            actual: stops.iter().enumerate().map(|(i, s)| (s.to_string(), i)).collect(),
        }
    }
}

/// A historical (or target) route record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(default)]
    pub station_code: Option<String>,
    #[serde(default)]
    pub route_score: Option<RouteScore>,
    pub stops: BTreeMap<String, Stop>,
}

impl RouteRecord {
    /// Station code, or the empty string before the hygiene pass filled it in
    pub fn station(&self) -> &str {
        self.station_code.as_deref().unwrap_or("")
    }

    pub fn has_station_stop(&self) -> bool {
        self.stops.values().any(Stop::is_station)
    }

    /// Stops sorted by their realized visit position. Sequence entries that name
    /// stops unknown to this route are ignored.
    pub fn visit_order<'a>(&'a self, sequence: &ActualSequence) -> Vec<(&'a str, &'a Stop)> {
        let mut ordered: Vec<(usize, &'a str, &'a Stop)> = sequence
            .actual
            .iter()
            .filter_map(|(id, &pos)| {
                self.stops.get_key_value(id).map(|(key, stop)| (pos, key.as_str(), stop))
            })
            .collect();
        ordered.sort_by_key(|&(pos, id, _)| (pos, id));
        ordered.into_iter().map(|(_, id, stop)| (id, stop)).collect()
    }

    /// Zone label of every stop in visit order (missing labels stay `None`)
    pub fn zone_sequence(&self, sequence: &ActualSequence) -> Vec<Option<&str>> {
        self.visit_order(sequence)
            .into_iter()
            .map(|(_, stop)| stop.route_label())
            .collect()
    }

    /// Distinct zones of the route in stop order, with each stop's index into them
    pub fn zone_labels(&self) -> RouteZones {
        let mut zones = RouteZones::default();
        for stop in self.stops.values() {
            let index = stop.route_label().map(|label| zones.intern(label));
            zones.stop_index.push(index);
        }
        zones
    }

    /// Number of stops per zone label
    pub fn zone_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in self.stops.values().filter_map(Stop::route_label) {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

pub type RouteTable = BTreeMap<String, RouteRecord>;
pub type SequenceTable = BTreeMap<String, ActualSequence>;

/// Read any JSON document from disk
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ZoneOrderError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ZoneOrderError::json(path, e))
}

/// Fill in missing station codes and drop routes that have no depot stop.
///
/// Returns the ids of the removed routes.
pub fn sanitize_routes(routes: &mut RouteTable, station_prefix: &str) -> Vec<String> {
    let mut counter = 1;
    let mut removed = Vec::new();

    for (id, route) in routes.iter_mut() {
        if route.station_code.is_none() {
            route.station_code = Some(format!("{}{}", station_prefix, counter));
            counter += 1;
        }
        if !route.has_station_stop() {
            removed.push(id.clone());
        }
    }

    for id in &removed {
        log::error!("Route {} has no station stop, excluding it", id);
        routes.remove(id);
    }

    removed
}

/// Historical routes together with their realized sequences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub routes: RouteTable,
    pub sequences: SequenceTable,
}

impl Corpus {
    pub fn new(routes: RouteTable, sequences: SequenceTable) -> Self {
        Corpus { routes, sequences }
    }

    /// Load a corpus from a route file and an actual-sequence file
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(routes: P, sequences: Q) -> Result<Self> {
        let routes: RouteTable = read_json(routes)?;
        let sequences: SequenceTable = read_json(sequences)?;
        Ok(Corpus { routes, sequences })
    }

    pub fn sanitize(&mut self, station_prefix: &str) -> Vec<String> {
        sanitize_routes(&mut self.routes, station_prefix)
    }

    pub fn route(&self, id: &str) -> Result<&RouteRecord> {
        self.routes.get(id).ok_or_else(|| ZoneOrderError::UnknownRoute(id.to_string()))
    }

    pub fn sequence(&self, id: &str) -> Result<&ActualSequence> {
        self.sequences.get(id).ok_or_else(|| ZoneOrderError::MissingSequence(id.to_string()))
    }

    /// Sorted list of distinct station codes
    pub fn stations(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.routes.values().map(RouteRecord::station).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Routes that have a sequence record
    pub fn sequenced_routes(&self) -> Vec<(&str, &RouteRecord, &ActualSequence)> {
        self.routes
            .iter()
            .filter_map(|(id, route)| self.sequences.get(id).map(|seq| (id.as_str(), route, seq)))
            .collect()
    }

    /// Routes without a sequence record; every sequence-driven step skips them
    pub fn unsequenced_routes(&self) -> Vec<&str> {
        self.routes
            .keys()
            .filter(|id| !self.sequences.contains_key(id.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Get statistics about the corpus
    pub fn statistics(&self) -> CorpusStatistics {
        let mut zones: BTreeSet<&str> = BTreeSet::new();
        let mut num_stops = 0;
        let mut unlabeled_stops = 0;
        let mut scores = [0usize; 4];
        let mut zones_per_route: Vec<f64> = Vec::with_capacity(self.routes.len());

        for route in self.routes.values() {
            num_stops += route.stops.len();
            unlabeled_stops += route
                .stops
                .values()
                .filter(|s| !s.is_station() && s.zone().is_none())
                .count();
            zones.extend(route.stops.values().filter_map(Stop::zone));
            zones_per_route.push(route.zone_labels().zones.len() as f64);

            let slot = match route.route_score {
                Some(RouteScore::High) => 0,
                Some(RouteScore::Medium) => 1,
                Some(RouteScore::Low) => 2,
                None => 3,
            };
            scores[slot] += 1;
        }

        let (avg_zones, std_zones) = match zones_per_route.len() {
            0 => (0.0, 0.0),
            1 => (zones_per_route[0], 0.0),
            _ => (zones_per_route.iter().mean(), zones_per_route.iter().std_dev()),
        };

        CorpusStatistics {
            num_routes: self.routes.len(),
            num_sequences: self.sequences.len(),
            num_stations: self.stations().len(),
            num_stops,
            unlabeled_stops,
            distinct_zones: zones.len(),
            high_routes: scores[0],
            medium_routes: scores[1],
            low_routes: scores[2],
            unscored_routes: scores[3],
            avg_zones_per_route: avg_zones,
            std_zones_per_route: std_zones,
        }
    }
}

/// Statistics about a route corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub num_routes: usize,
    pub num_sequences: usize,
    pub num_stations: usize,
    pub num_stops: usize,
    pub unlabeled_stops: usize,
    pub distinct_zones: usize,
    pub high_routes: usize,
    pub medium_routes: usize,
    pub low_routes: usize,
    pub unscored_routes: usize,
    pub avg_zones_per_route: f64,
    pub std_zones_per_route: f64,
}

impl std::fmt::Display for CorpusStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Corpus: {} routes ({} with sequences)", self.num_routes, self.num_sequences)?;
        writeln!(f, "  Stations: {}", self.num_stations)?;
        writeln!(f, "  Stops: {} ({} without zone label)", self.num_stops, self.unlabeled_stops)?;
        writeln!(f, "  Distinct zones: {}", self.distinct_zones)?;
        writeln!(
            f,
            "  Route scores: {} high, {} medium, {} low, {} unscored",
            self.high_routes, self.medium_routes, self.low_routes, self.unscored_routes
        )?;
        writeln!(
            f,
            "  Zones per route: {:.2} avg (std {:.2})",
            self.avg_zones_per_route, self.std_zones_per_route
        )
    }
}

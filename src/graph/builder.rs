//! Per-station zone transition graphs from historical visit orders.

use crate::corpus::Corpus;
use crate::graph::{add_transition, TransitionGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accumulates the transition graph of every station
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneGraphBuilder {
    graphs: BTreeMap<String, TransitionGraph>,
    transitions: BTreeMap<String, usize>,
}

impl ZoneGraphBuilder {
    pub fn new() -> Self {
        ZoneGraphBuilder::default()
    }

    /// Build the graphs of all sequenced routes of a corpus
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let mut builder = ZoneGraphBuilder::new();
        for (_, route, sequence) in corpus.sequenced_routes() {
            builder.add_route(route.station(), route.zone_sequence(sequence));
        }
        builder
    }

    /// Record the transitions of one route.
    ///
    /// `visits` is the zone label of every stop in visit order. The first entry is
    /// the departure stop and never contributes a transition; the first labeled
    /// zone after it only seeds the walk. Unlabeled stops are skipped.
    /// Returns the number of transitions recorded.
    pub fn add_route<'a, I>(&mut self, station: &str, visits: I) -> usize
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let graph = self.graphs.entry(station.to_string()).or_default();
        let mut last_zone: Option<&str> = None;
        let mut recorded = 0;

        for zone in visits.into_iter().skip(1).flatten() {
            if let Some(last) = last_zone {
                if last != zone {
                    add_transition(graph, last, zone);
                    recorded += 1;
                }
            }
            last_zone = Some(zone);
        }

        *self.transitions.entry(station.to_string()).or_insert(0) += recorded;
        recorded
    }

    pub fn graph(&self, station: &str) -> Option<&TransitionGraph> {
        self.graphs.get(station)
    }

    /// Total transitions recorded for a station
    pub fn transition_count(&self, station: &str) -> usize {
        self.transitions.get(station).copied().unwrap_or(0)
    }

    pub fn stations(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn into_graphs(self) -> BTreeMap<String, TransitionGraph> {
        self.graphs
    }
}

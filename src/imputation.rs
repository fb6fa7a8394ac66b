//! Nearest-neighbor filling of missing zone labels.

use crate::corpus::RouteTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Initial search radius; candidates farther away on either axis are skipped
pub const SEARCH_RADIUS: f64 = 100000.0;

/// A stop that carries a zone label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub lat: f64,
    pub lng: f64,
    pub zone: String,
}

/// Outcome of an imputation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub filled: usize,
    /// (route id, stop id) of stops left without a label
    pub unresolved: Vec<(String, String)>,
}

/// Labels unlabeled stops with the zone of the closest labeled stop of the
/// same station
#[derive(Debug, Clone, Default)]
pub struct ZoneImputer {
    reference: BTreeMap<String, Vec<LabeledPoint>>,
}

impl ZoneImputer {
    pub fn new() -> Self {
        ZoneImputer::default()
    }

    /// Reference points from the routes to impute plus optional extra routes
    pub fn from_routes(routes: &RouteTable, secondary: Option<&RouteTable>) -> Self {
        let mut imputer = ZoneImputer::new();
        imputer.add_reference(routes);
        if let Some(extra) = secondary {
            imputer.add_reference(extra);
        }
        imputer
    }

    /// Add every labeled stop of `routes` to its station's reference set
    pub fn add_reference(&mut self, routes: &RouteTable) {
        for route in routes.values() {
            let points = self.reference.entry(route.station().to_string()).or_default();
            for stop in route.stops.values() {
                if let Some(zone) = stop.zone() {
                    points.push(LabeledPoint { lat: stop.lat, lng: stop.lng, zone: zone.to_string() });
                }
            }
        }
    }

    pub fn reference_size(&self, station: &str) -> usize {
        self.reference.get(station).map_or(0, Vec::len)
    }

    /// Zone of the labeled point closest to (lat, lng) in Euclidean distance.
    /// The first point wins on equal distance.
    pub fn nearest_zone(&self, station: &str, lat: f64, lng: f64) -> Option<&str> {
        let points = self.reference.get(station)?;
        let mut dmin = SEARCH_RADIUS;
        let mut zone = None;

        for point in points {
            let dx = (lat - point.lat).abs();
            let dy = (lng - point.lng).abs();
            if dx > dmin || dy > dmin {
                continue;
            }
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < dmin {
                dmin = dist;
                zone = Some(point.zone.as_str());
            }
        }

        zone
    }

    /// Fill every unlabeled non-station stop of `routes`. Stops with no labeled
    /// neighbor keep their missing label.
    pub fn impute(&self, routes: &mut RouteTable) -> ImputationReport {
        let mut report = ImputationReport::default();

        for (route_id, route) in routes.iter_mut() {
            let station = route.station().to_string();
            for (stop_id, stop) in route.stops.iter_mut() {
                if stop.is_station() || stop.zone().is_some() {
                    continue;
                }
                match self.nearest_zone(&station, stop.lat, stop.lng) {
                    Some(zone) => {
                        stop.zone_id = Some(zone.to_string());
                        report.filled += 1;
                    }
                    None => {
                        log::warn!("No labeled stop near {} in route {}", stop_id, route_id);
                        report.unresolved.push((route_id.clone(), stop_id.clone()));
                    }
                }
            }
        }

        if report.filled > 0 {
            log::info!("Imputed {} missing zone labels", report.filled);
        }
        report
    }
}

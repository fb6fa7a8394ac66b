//! Package records: failed deliveries and parcels listed at several stops.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Scan status marking a failed delivery
pub const DELIVERY_ATTEMPTED: &str = "DELIVERY_ATTEMPTED";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub scan_status: Option<String>,
}

impl Package {
    pub fn failed(&self) -> bool {
        self.scan_status.as_deref() == Some(DELIVERY_ATTEMPTED)
    }
}

/// stop id -> package id -> package
pub type RoutePackages = BTreeMap<String, BTreeMap<String, Package>>;
/// route id -> packages of the route
pub type PackageTable = BTreeMap<String, RoutePackages>;

/// A parcel id listed under more than one stop of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateParcel {
    pub route: String,
    pub parcel: String,
    pub stops: Vec<String>,
}

/// Routes with at least one failed delivery
pub fn failed_routes(packages: &PackageTable) -> BTreeSet<String> {
    packages
        .iter()
        .filter(|(_, stops)| stops.values().flat_map(BTreeMap::values).any(Package::failed))
        .map(|(id, _)| id.clone())
        .collect()
}

/// Parcels that appear at several stops of the same route. Such routes are
/// suspect; they are reported but stay in the batch.
pub fn duplicate_parcels(packages: &PackageTable) -> Vec<DuplicateParcel> {
    let mut duplicates = Vec::new();

    for (route, stops) in packages {
        let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (stop, parcels) in stops {
            for parcel in parcels.keys() {
                seen.entry(parcel.as_str()).or_default().push(stop.clone());
            }
        }
        for (parcel, stops) in seen {
            if stops.len() > 1 {
                log::warn!("Suspect route {}: parcel {} listed at {} stops", route, parcel, stops.len());
                duplicates.push(DuplicateParcel { route: route.clone(), parcel: parcel.to_string(), stops });
            }
        }
    }

    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PackageTable {
        serde_json::from_str(
            r#"{
                "R1": {
                    "AA": {"P1": {"scan_status": "DELIVERED", "planned_service_time_seconds": 30}},
                    "BB": {"P2": {"scan_status": "DELIVERY_ATTEMPTED"}}
                },
                "R2": {
                    "AA": {"P3": {"scan_status": "DELIVERED"}, "P4": {}},
                    "CC": {"P3": {"scan_status": "DELIVERED"}}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_failed_routes() {
        let failed = failed_routes(&table());
        assert_eq!(failed.into_iter().collect::<Vec<_>>(), vec!["R1".to_string()]);
    }

    #[test]
    fn test_duplicate_parcels() {
        let duplicates = duplicate_parcels(&table());
        assert_eq!(
            duplicates,
            vec![DuplicateParcel {
                route: "R2".into(),
                parcel: "P3".into(),
                stops: vec!["AA".into(), "CC".into()],
            }]
        );
    }
}

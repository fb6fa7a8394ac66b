//! End-to-end zone order pipeline.
//!
//! Builds the zone order model from a historical corpus (hygiene, imputation,
//! station graphs, cycle elimination, levels, cluster keys, super sets), selects
//! and samples routes, and plans target routes against a model.

use crate::clustering::{
    target_tokens, ClusterHierarchy, ClusterKey, ClusterKeySelector, PositionalFormat, SuperMatch, SuperSets,
};
use crate::constraints::{derive_constraints, ConstraintConfig, ZoneConstraints};
use crate::corpus::{read_json, sanitize_routes, Corpus, RouteRecord, RouteScore, RouteTable};
use crate::error::{Result, ZoneOrderError};
use crate::graph::{CycleEliminator, Edge, LevelAssigner, LevelMap, RemovalPolicy, TransitionGraph, ZoneGraphBuilder};
use crate::imputation::{ImputationReport, ZoneImputer};
use crate::matching::{MatchScore, RouteMatcher, StationRouteInfos};
use crate::zone::RouteZoneInfo;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// What cycle elimination deletes
    pub removal_policy: RemovalPolicy,
    /// Restrict everything to one station
    pub station_code: Option<String>,
    /// Only select `High` routes
    pub prune_low_scores: bool,
    /// Skip routes with a failed delivery
    pub prune_failed: bool,
    /// Number of routes to sample (0 = all)
    pub sample: usize,
    /// Sampling seed
    pub seed: u64,
    /// Process stations in parallel
    pub parallel: bool,
    pub constraints: ConstraintConfig,
    /// Prefix of synthesized station codes
    pub missing_station_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            removal_policy: RemovalPolicy::Cycle,
            station_code: None,
            prune_low_scores: true,
            prune_failed: true,
            sample: 0,
            seed: 99,
            parallel: true,
            constraints: ConstraintConfig::default(),
            missing_station_prefix: "ATLANTIS_R".to_string(),
        }
    }
}

/// Acyclic zone order of one station
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationOrder {
    pub graph: TransitionGraph,
    pub levels: LevelMap,
    pub removed_edges: Vec<Edge>,
}

/// Everything a target route needs to be planned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneOrderModel {
    /// station -> route -> zone summary
    pub station_infos: BTreeMap<String, StationRouteInfos>,
    #[serde(rename = "clusterKeys")]
    pub cluster_keys: ClusterKey,
    #[serde(rename = "superSets")]
    pub super_sets: SuperSets,
    #[serde(default)]
    pub station_graphs: BTreeMap<String, StationOrder>,
}

impl ZoneOrderModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ZoneOrderError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| ZoneOrderError::json(path, e))
    }

    pub fn num_routes(&self) -> usize {
        self.station_infos.values().map(BTreeMap::len).sum()
    }
}

/// Disjoint or independent build and apply route samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSplit {
    pub build: Vec<String>,
    pub apply: Vec<String>,
}

/// Planning result of one target route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub route_id: String,
    pub station: String,
    /// Distinct zones of the route, indices of all constraint pairs refer to it
    pub zone_list: Vec<String>,
    pub matched_route: Option<String>,
    pub match_score: Option<MatchScore>,
    pub constraints: ZoneConstraints,
    pub super_match: Option<SuperMatch>,
    /// Cluster groups of the route under the model's key hierarchy
    pub hierarchy: ClusterHierarchy,
}

/// One CSV row per planned route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub route_id: String,
    pub station: String,
    pub zones: usize,
    pub matched_route: Option<String>,
    pub forward: Option<f64>,
    pub backward: Option<f64>,
    pub size: Option<usize>,
    pub precedence: usize,
    pub disjunctive: usize,
    pub paths: usize,
    pub neighbors: usize,
    pub super_reference: Option<String>,
    pub super_edges: usize,
    pub clusters: usize,
    pub super_clusters: usize,
    pub hierarchy_neighbors: usize,
}

impl From<&RoutePlan> for PlanSummary {
    fn from(plan: &RoutePlan) -> Self {
        PlanSummary {
            route_id: plan.route_id.clone(),
            station: plan.station.clone(),
            zones: plan.zone_list.len(),
            matched_route: plan.matched_route.clone(),
            forward: plan.match_score.map(|s| s.forward),
            backward: plan.match_score.map(|s| s.backward),
            size: plan.match_score.map(|s| s.size),
            precedence: plan.constraints.precedence.len(),
            disjunctive: plan.constraints.disjunctive.len(),
            paths: plan.constraints.paths.len(),
            neighbors: plan.constraints.neighbors.len(),
            super_reference: plan.super_match.as_ref().map(|m| m.reference.clone()),
            super_edges: plan.super_match.as_ref().map_or(0, |m| m.edges.len()),
            clusters: plan.hierarchy.clusters.len(),
            super_clusters: plan.hierarchy.super_clusters.len(),
            hierarchy_neighbors: plan.hierarchy.neighbor_count(),
        }
    }
}

/// Zone order pipeline
pub struct ZoneOrderPipeline {
    config: PipelineConfig,
}

impl ZoneOrderPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        ZoneOrderPipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Hygiene and imputation of a route table. `secondary` routes only serve as
    /// extra labeled reference stops.
    pub fn prepare_routes(&self, routes: &mut RouteTable, secondary: Option<&RouteTable>) -> ImputationReport {
        sanitize_routes(routes, &self.config.missing_station_prefix);
        if let Some(station) = &self.config.station_code {
            routes.retain(|_, route| route.station() == station);
        }
        let imputer = ZoneImputer::from_routes(routes, secondary);
        imputer.impute(routes)
    }

    /// Build the zone order model of a corpus
    pub fn build(&self, corpus: &mut Corpus, secondary: Option<&RouteTable>) -> ZoneOrderModel {
        let imputation = self.prepare_routes(&mut corpus.routes, secondary);
        if !imputation.unresolved.is_empty() {
            log::warn!("{} stops left without a zone label", imputation.unresolved.len());
        }
        for id in corpus.unsequenced_routes() {
            log::warn!("Route {} has no sequence record, skipping it", id);
        }
        log::info!("Building zone order model from {} routes", corpus.routes.len());

        let station_graphs = self.station_orders(corpus, ZoneGraphBuilder::from_corpus(corpus));

        let mut station_infos: BTreeMap<String, StationRouteInfos> = BTreeMap::new();
        for (id, route, sequence) in corpus.sequenced_routes() {
            station_infos
                .entry(route.station().to_string())
                .or_default()
                .insert(id.to_string(), RouteZoneInfo::from_route(route, sequence));
        }

        let cluster_keys = ClusterKeySelector::new().select(corpus);
        let super_sets = SuperSets::build(corpus, &PositionalFormat, &cluster_keys.cluster);

        ZoneOrderModel { station_infos, cluster_keys, super_sets, station_graphs }
    }

    /// Cycle elimination and level assignment of every station graph
    pub fn station_orders(&self, corpus: &Corpus, builder: ZoneGraphBuilder) -> BTreeMap<String, StationOrder> {
        let mut station_zones: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for route in corpus.routes.values() {
            station_zones
                .entry(route.station())
                .or_default()
                .extend(route.stops.values().filter_map(|s| s.zone()));
        }

        let graphs: Vec<(String, TransitionGraph, Vec<String>)> = builder
            .into_graphs()
            .into_iter()
            .map(|(station, graph)| {
                let zones = station_zones
                    .get(station.as_str())
                    .map(|set| set.iter().map(|z| z.to_string()).collect::<Vec<String>>())
                    .unwrap_or_default();
                (station, graph, zones)
            })
            .collect();

        let eliminator = CycleEliminator::new(self.config.removal_policy);
        let order_station = |(station, mut graph, zones): (String, TransitionGraph, Vec<String>)| {
            let report = eliminator.eliminate(&mut graph);
            let levels = LevelAssigner::new().assign_and_prune(&zones, &mut graph);
            log::debug!(
                "Station {}: {} cycles broken, {} levels",
                station,
                report.iterations,
                levels.values().max().copied().unwrap_or(0)
            );
            (station, StationOrder { graph, levels, removed_edges: report.removed })
        };

        if self.config.parallel {
            graphs.into_par_iter().map(order_station).collect()
        } else {
            graphs.into_iter().map(order_station).collect()
        }
    }

    fn in_scope(&self, route: &RouteRecord) -> bool {
        match &self.config.station_code {
            Some(station) => route.station() == station,
            None => true,
        }
    }

    fn eligible(&self, id: &str, route: &RouteRecord, failed: &BTreeSet<String>) -> bool {
        (!self.config.prune_failed || !failed.contains(id))
            && (!self.config.prune_low_scores || route.route_score == Some(RouteScore::High))
    }

    /// Route ids eligible for planning, sampled if configured, in id order
    pub fn select_routes(&self, routes: &RouteTable, failed: &BTreeSet<String>) -> Vec<String> {
        let ids: Vec<String> = routes
            .iter()
            .filter(|(id, route)| self.in_scope(route) && self.eligible(id, route, failed))
            .map(|(id, _)| id.clone())
            .collect();

        if self.config.sample == 0 {
            return ids;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut sampled: Vec<String> = ids.choose_multiple(&mut rng, self.config.sample.min(ids.len())).cloned().collect();
        sampled.sort();
        sampled
    }

    /// Sample build and apply route sets.
    ///
    /// With `disjoint`, both samples are drawn from one sample of the routes in
    /// scope, sized in proportion to the requested counts. Otherwise the build
    /// sample comes from all routes in scope and the apply sample from the
    /// eligible ones, independently.
    pub fn split_build_apply(
        &self,
        routes: &RouteTable,
        failed: &BTreeSet<String>,
        build_size: usize,
        apply_size: usize,
        disjoint: bool,
    ) -> SampleSplit {
        let route_list: Vec<String> = routes
            .iter()
            .filter(|(_, route)| self.in_scope(route))
            .map(|(id, _)| id.clone())
            .collect();
        let apply_list: Vec<String> = route_list
            .iter()
            .filter(|id| routes.get(id.as_str()).map_or(false, |route| self.eligible(id, route, failed)))
            .cloned()
            .collect();

        if apply_size == 0 {
            return SampleSplit { build: route_list, apply: apply_list };
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let (mut build, mut apply): (Vec<String>, Vec<String>) = if disjoint {
            let total = build_size + apply_size;
            let available = route_list.len();
            let n_apply = apply_size.min(available * apply_size / total);
            let n_build = build_size.min(available * build_size / total).min(available - n_apply);

            let sample: Vec<String> = route_list.choose_multiple(&mut rng, n_build + n_apply).cloned().collect();
            let apply: Vec<String> = sample.choose_multiple(&mut rng, n_apply).cloned().collect();
            let build = sample.into_iter().filter(|id| !apply.contains(id)).collect();
            (build, apply)
        } else {
            let apply = apply_list
                .choose_multiple(&mut rng, apply_size.min(apply_list.len()))
                .cloned()
                .collect();
            let build = route_list
                .choose_multiple(&mut rng, build_size.min(route_list.len()))
                .cloned()
                .collect();
            (build, apply)
        };

        build.sort();
        apply.sort();
        log::info!("Sampled {} build and {} apply routes", build.len(), apply.len());
        SampleSplit { build, apply }
    }

    /// Match a target route against the model and derive its constraints
    pub fn plan_route(&self, model: &ZoneOrderModel, route_id: &str, route: &RouteRecord) -> RoutePlan {
        let station = route.station();
        let zone_list = route.zone_labels().zones;
        let zone_counts = route.zone_counts();

        let best = model
            .station_infos
            .get(station)
            .and_then(|infos| RouteMatcher::new(infos).find_best(route_id, &zone_list, &zone_counts));

        let (matched_route, match_score, constraints) = match best {
            Some(found) => (
                Some(found.route_id.to_string()),
                Some(found.score),
                derive_constraints(&self.config.constraints, &zone_list, &found.info.full_components),
            ),
            None => {
                log::info!("No historical match for route {}, skipping zone constraints", route_id);
                (None, None, ZoneConstraints::default())
            }
        };

        let tokens = target_tokens(&PositionalFormat, &zone_list, &model.cluster_keys.cluster);
        let super_match = model.super_sets.match_super_order(station, route_id, &tokens);
        let hierarchy = ClusterHierarchy::build(&PositionalFormat, &zone_list, &model.cluster_keys);

        RoutePlan {
            route_id: route_id.to_string(),
            station: station.to_string(),
            zone_list,
            matched_route,
            match_score,
            constraints,
            super_match,
            hierarchy,
        }
    }

    /// Plan several routes; unknown ids are reported as errors
    pub fn plan_routes(&self, model: &ZoneOrderModel, routes: &RouteTable, ids: &[String]) -> Result<Vec<RoutePlan>> {
        let plan_one = |id: &String| -> Result<RoutePlan> {
            let route = routes.get(id).ok_or_else(|| ZoneOrderError::UnknownRoute(id.clone()))?;
            Ok(self.plan_route(model, id, route))
        };

        if self.config.parallel {
            ids.par_iter().map(plan_one).collect()
        } else {
            ids.iter().map(plan_one).collect()
        }
    }
}

/// Write one summary row per plan
pub fn export_plans_csv<P: AsRef<Path>>(plans: &[RoutePlan], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| ZoneOrderError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);

    for plan in plans {
        writer.serialize(PlanSummary::from(plan))?;
    }

    writer.flush().map_err(|e| ZoneOrderError::io(path, e))?;
    Ok(())
}

/// Human-readable summary of a model and the plans derived from it
pub fn generate_report(model: &ZoneOrderModel, plans: &[RoutePlan]) -> String {
    let mut report = String::new();

    report.push_str("========================================\n");
    report.push_str("        Zone Precedence Report\n");
    report.push_str("========================================\n");
    report.push_str(&format!("Generated: {}\n\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));

    report.push_str(&format!(
        "Cluster keys: cluster {:?}, super {:?}, top {:?}\n",
        model.cluster_keys.cluster, model.cluster_keys.super_cluster, model.cluster_keys.top_cluster
    ));
    report.push_str(&format!("Historical routes: {}\n\n", model.num_routes()));

    report.push_str("Station Orders:\n");
    report.push_str("-".repeat(60).as_str());
    report.push('\n');
    report.push_str(&format!("{:<16} {:>8} {:>8} {:>8} {:>10}\n", "Station", "Routes", "Zones", "Levels", "Removed"));
    report.push_str("-".repeat(60).as_str());
    report.push('\n');
    for (station, order) in &model.station_graphs {
        let routes = model.station_infos.get(station).map_or(0, BTreeMap::len);
        let levels = order.levels.values().max().copied().unwrap_or(0);
        report.push_str(&format!(
            "{:<16} {:>8} {:>8} {:>8} {:>10}\n",
            station,
            routes,
            order.levels.len(),
            levels,
            order.removed_edges.len()
        ));
    }
    report.push_str("-".repeat(60).as_str());
    report.push('\n');

    if !plans.is_empty() {
        let matched = plans.iter().filter(|p| p.matched_route.is_some()).count();
        let constraints: usize = plans.iter().map(|p| p.constraints.len()).sum();
        let super_matched = plans.iter().filter(|p| p.super_match.is_some()).count();
        report.push_str(&format!("\nPlanned routes: {}\n", plans.len()));
        report.push_str(&format!("  with historical match: {}\n", matched));
        report.push_str(&format!("  with super-cluster match: {}\n", super_matched));
        let neighbors: usize = plans.iter().map(|p| p.hierarchy.neighbor_count()).sum();
        report.push_str(&format!("  zone constraints: {}\n", constraints));
        report.push_str(&format!("  cluster neighbor pairs: {}\n", neighbors));
    }

    report
}

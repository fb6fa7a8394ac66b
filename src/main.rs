//! Zone Precedence - Command Line Interface
//!
//! Builds zone order models from historical delivery routes and applies them to
//! new routes.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use zone_precedence::clustering::ClusterKeySelector;
use zone_precedence::constraints::ConstraintConfig;
use zone_precedence::corpus::{read_json, Corpus, RouteTable};
use zone_precedence::graph::RemovalPolicy;
use zone_precedence::packages::{duplicate_parcels, failed_routes, PackageTable};
use zone_precedence::pipeline::{export_plans_csv, generate_report, PipelineConfig, ZoneOrderModel, ZoneOrderPipeline};
use zone_precedence::Result;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "zone-precedence")]
#[command(version = "1.0")]
#[command(about = "Infers zone precedence structures from historical delivery routes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a zone order model from historical routes
    Build {
        /// Route data file
        #[arg(short, long, default_value = "route_data.json")]
        routes: PathBuf,

        /// Actual sequence file
        #[arg(short, long, default_value = "actual_sequences.json")]
        sequences: PathBuf,

        /// Extra route data used only as labeled reference stops
        #[arg(long)]
        secondary: Option<PathBuf>,

        /// What cycle elimination deletes
        #[arg(long, value_enum, default_value = "cycle")]
        policy: Policy,

        /// Only build for this station
        #[arg(long)]
        station: Option<String>,

        /// Process stations one at a time
        #[arg(long)]
        sequential: bool,

        /// Output model file
        #[arg(short, long, default_value = "zone_model.json")]
        output: PathBuf,
    },

    /// Plan routes against a zone order model
    Apply {
        /// Model file produced by `build`
        #[arg(short, long)]
        model: PathBuf,

        /// Route data file of the routes to plan
        #[arg(short, long)]
        routes: PathBuf,

        /// Historical route data used as labeled reference stops
        #[arg(long)]
        secondary: Option<PathBuf>,

        /// Package data, used to skip routes with failed deliveries
        #[arg(short, long)]
        packages: Option<PathBuf>,

        /// Plan every route, not only the `High` ones
        #[arg(long)]
        no_prune: bool,

        /// Number of routes to sample (0 = all)
        #[arg(long, default_value = "0")]
        sample: usize,

        /// Random seed
        #[arg(long, default_value = "99")]
        seed: u64,

        /// Only plan routes of this station
        #[arg(long)]
        station: Option<String>,

        /// Emit the transitive closure of the precedence order
        #[arg(long)]
        transitive: bool,

        /// Emit disjunctive pairs within small levels
        #[arg(long)]
        disjunctive: bool,

        /// Emit paths between consecutive singleton levels
        #[arg(long)]
        paths: bool,

        /// Emit neighbor pairs of two-zone levels
        #[arg(long)]
        neighbors: bool,

        /// Output CSV summary
        #[arg(short, long, default_value = "plans.csv")]
        output: PathBuf,

        /// Full plans as JSON
        #[arg(long)]
        plans: Option<PathBuf>,
    },

    /// Select the cluster key hierarchy of a corpus
    Keys {
        #[arg(short, long, default_value = "route_data.json")]
        routes: PathBuf,

        #[arg(short, long, default_value = "actual_sequences.json")]
        sequences: PathBuf,
    },

    /// Print corpus statistics
    Analyze {
        #[arg(short, long, default_value = "route_data.json")]
        routes: PathBuf,

        #[arg(short, long, default_value = "actual_sequences.json")]
        sequences: PathBuf,
    },

    /// Split routes into build and apply samples
    Split {
        #[arg(short, long, default_value = "route_data.json")]
        routes: PathBuf,

        /// Package data, used to keep failed routes out of the apply sample
        #[arg(short, long)]
        packages: Option<PathBuf>,

        #[arg(long, default_value = "10000")]
        build_sample: usize,

        #[arg(long, default_value = "6000")]
        apply_sample: usize,

        /// Draw the two samples independently
        #[arg(long)]
        overlapping: bool,

        #[arg(long)]
        station: Option<String>,

        #[arg(long, default_value = "99")]
        seed: u64,

        /// Output file with the two id lists
        #[arg(short, long, default_value = "split.json")]
        output: PathBuf,
    },

    /// Report failed deliveries and parcels listed at several stops
    CheckPackages {
        #[arg(short, long, default_value = "package_data.json")]
        packages: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Policy {
    /// Delete the cheapest edge of each cycle
    MinCostEdge,
    /// Delete every edge of each cycle
    Cycle,
}

impl From<Policy> for RemovalPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::MinCostEdge => RemovalPolicy::MinCostEdge,
            Policy::Cycle => RemovalPolicy::Cycle,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { routes, sequences, secondary, policy, station, sequential, output } => {
            build_model(&routes, &sequences, secondary.as_deref(), policy, station, sequential, &output);
        }

        Commands::Apply {
            model,
            routes,
            secondary,
            packages,
            no_prune,
            sample,
            seed,
            station,
            transitive,
            disjunctive,
            paths,
            neighbors,
            output,
            plans,
        } => {
            let config = PipelineConfig {
                station_code: station,
                prune_low_scores: !no_prune,
                prune_failed: packages.is_some(),
                sample,
                seed,
                constraints: ConstraintConfig { transitive, disjunctive, paths, neighbors },
                ..Default::default()
            };
            apply_model(&model, &routes, secondary.as_deref(), packages.as_deref(), config, &output, plans.as_deref());
        }

        Commands::Keys { routes, sequences } => {
            let corpus = or_exit(Corpus::from_files(&routes, &sequences), "loading corpus");
            let keys = ClusterKeySelector::new().select(&corpus);
            match serde_json::to_string_pretty(&keys) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing keys: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Analyze { routes, sequences } => {
            let corpus = or_exit(Corpus::from_files(&routes, &sequences), "loading corpus");
            println!("========== Corpus Analysis ==========\n");
            println!("{}", corpus.statistics());
        }

        Commands::Split { routes, packages, build_sample, apply_sample, overlapping, station, seed, output } => {
            split_routes(&routes, packages.as_deref(), build_sample, apply_sample, !overlapping, station, seed, &output);
        }

        Commands::CheckPackages { packages } => {
            check_packages(&packages);
        }
    }
}

fn or_exit<T>(result: Result<T>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error {}: {}", what, e);
            std::process::exit(1);
        }
    }
}

fn load_failed(packages: Option<&Path>) -> BTreeSet<String> {
    match packages {
        Some(path) => {
            let table: PackageTable = or_exit(read_json(path), "loading packages");
            failed_routes(&table)
        }
        None => BTreeSet::new(),
    }
}

fn build_model(
    routes: &Path,
    sequences: &Path,
    secondary: Option<&Path>,
    policy: Policy,
    station: Option<String>,
    sequential: bool,
    output: &Path,
) {
    println!("Loading corpus from {:?} and {:?}...", routes, sequences);
    let mut corpus = or_exit(Corpus::from_files(routes, sequences), "loading corpus");
    let secondary: Option<RouteTable> = secondary.map(|path| or_exit(read_json(path), "loading secondary routes"));

    let config = PipelineConfig {
        removal_policy: policy.into(),
        station_code: station,
        parallel: !sequential,
        ..Default::default()
    };
    let pipeline = ZoneOrderPipeline::new(config);

    let start = Instant::now();
    let model = pipeline.build(&mut corpus, secondary.as_ref());
    println!(
        "Built model for {} stations ({} routes) in {:.2}s",
        model.station_infos.len(),
        model.num_routes(),
        start.elapsed().as_secs_f64()
    );
    println!("Cluster keys: {:?}", model.cluster_keys);

    or_exit(model.save(output), "saving model");
    println!("Model saved to {:?}", output);
}

fn apply_model(
    model_path: &Path,
    routes_path: &Path,
    secondary: Option<&Path>,
    packages: Option<&Path>,
    config: PipelineConfig,
    output: &Path,
    plans_path: Option<&Path>,
) {
    let model = or_exit(ZoneOrderModel::load(model_path), "loading model");
    let mut routes: RouteTable = or_exit(read_json(routes_path), "loading routes");
    let secondary: Option<RouteTable> = secondary.map(|path| or_exit(read_json(path), "loading secondary routes"));
    let failed = load_failed(packages);

    let pipeline = ZoneOrderPipeline::new(config);
    let imputation = pipeline.prepare_routes(&mut routes, secondary.as_ref());
    println!("Imputed {} zone labels ({} unresolved)", imputation.filled, imputation.unresolved.len());

    let ids = pipeline.select_routes(&routes, &failed);
    println!("Planning {} routes...", ids.len());

    let pb = ProgressBar::new(ids.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut plans = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(route) = routes.get(id) {
            plans.push(pipeline.plan_route(&model, id, route));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    or_exit(export_plans_csv(&plans, output), "exporting plans");
    println!("Plan summary exported to {:?}", output);

    if let Some(path) = plans_path {
        let json = match serde_json::to_string_pretty(&plans) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error serializing plans: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("Error writing {:?}: {}", path, e);
            std::process::exit(1);
        }
        println!("Plans saved to {:?}", path);
    }

    println!("\n{}", generate_report(&model, &plans));
}

#[allow(clippy::too_many_arguments)]
fn split_routes(
    routes_path: &Path,
    packages: Option<&Path>,
    build_sample: usize,
    apply_sample: usize,
    disjoint: bool,
    station: Option<String>,
    seed: u64,
    output: &Path,
) {
    let routes: RouteTable = or_exit(read_json(routes_path), "loading routes");
    let failed = load_failed(packages);

    let pipeline = ZoneOrderPipeline::new(PipelineConfig {
        station_code: station,
        prune_failed: packages.is_some(),
        seed,
        ..Default::default()
    });
    let split = pipeline.split_build_apply(&routes, &failed, build_sample, apply_sample, disjoint);
    println!("Build sample: {} routes, apply sample: {} routes", split.build.len(), split.apply.len());

    let json = match serde_json::to_string_pretty(&split) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing split: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(output, json) {
        eprintln!("Error writing {:?}: {}", output, e);
        std::process::exit(1);
    }
    println!("Split saved to {:?}", output);
}

fn check_packages(path: &Path) {
    let table: PackageTable = or_exit(read_json(path), "loading packages");

    let failed = failed_routes(&table);
    println!("Routes: {}", table.len());
    println!("Routes with failed deliveries: {}", failed.len());

    let duplicates = duplicate_parcels(&table);
    let suspect: BTreeSet<&str> = duplicates.iter().map(|d| d.route.as_str()).collect();
    println!("Suspect routes (parcel at several stops): {}", suspect.len());
    for duplicate in &duplicates {
        println!("  {}: parcel {} at {}", duplicate.route, duplicate.parcel, duplicate.stops.join(", "));
    }
}

//! Zone Precedence Library
//!
//! Infers an acyclic visiting order over delivery zones from historical routes,
//! to constrain a downstream routing solver.
//!
//! # Features
//!
//! - Per-station zone transition graphs built from realized stop sequences
//! - Cycle elimination (cheapest edge or whole cycle) down to a DAG
//! - Topological zone levels through strongly connected components
//! - Corpus-wide selection of cluster / super-cluster / top-cluster keys
//! - Nearest-neighbor imputation of missing zone labels
//! - Best-match transfer of a historical zone order to a new route
//! - Precedence, disjunctive, path and neighbor constraint derivation
//! - Cluster / super-cluster / top-cluster grouping of a route with neighbor chains
//!
//! # Example
//!
//! ```no_run
//! use zone_precedence::corpus::Corpus;
//! use zone_precedence::pipeline::{PipelineConfig, ZoneOrderPipeline};
//!
//! // Load the historical routes and their realized sequences
//! let mut corpus = Corpus::from_files("route_data.json", "actual_sequences.json").unwrap();
//!
//! // Build the zone order model
//! let pipeline = ZoneOrderPipeline::new(PipelineConfig::default());
//! let model = pipeline.build(&mut corpus, None);
//!
//! // Plan one route against it
//! let route = corpus.route("RouteID_0001").unwrap();
//! let plan = pipeline.plan_route(&model, "RouteID_0001", route);
//! println!("{} precedence pairs", plan.constraints.precedence.len());
//! ```

pub mod error;
pub mod zone;
pub mod corpus;
pub mod graph;
pub mod clustering;
pub mod imputation;
pub mod matching;
pub mod constraints;
pub mod packages;
pub mod pipeline;

pub use corpus::Corpus;
pub use error::{Result, ZoneOrderError};
pub use pipeline::{ZoneOrderModel, ZoneOrderPipeline};

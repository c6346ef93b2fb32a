//! Concept graph: aggregation of the accepted corpus into
//! (domain, subdomain, difficulty) nodes with prerequisite edges, plus the
//! constrained path search that turns it into learning orders.

mod builder;
mod config;
mod paths;
mod snapshot;
mod types;

pub use builder::{BuildReport, ConceptGraphBuilder, DifficultyProgression, PrerequisiteStrategy};
pub use config::{GraphConfig, PathConfig};
pub use paths::{LearningPlan, PathOutcome, PathRequest, PathResolver, PlanStep, ResolvedPath};
pub use snapshot::GraphSnapshots;
pub use types::*;

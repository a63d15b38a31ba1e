//! Simulation engine driving Brood populations.
//!
//! Provides the top-level [`Simulation`] that owns a [`GridWorld`],
//! a population of learning agents, a pool of decision workers and an
//! optional background persistence service. Each call to
//! [`Simulation::tick`] decides every agent's action from the
//! start-of-tick world, then moves, feeds, breeds, kills, rewards and
//! trains them one at a time in spawn order.
//!
//! [`GridWorld`]: brood_space::GridWorld

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod collision;
pub mod config;
pub mod metrics;
pub mod pool;
pub mod population;
pub mod reproduction;
pub mod reward;
pub mod simulation;

pub use agent::Agent;
pub use collision::{CollisionResolver, DeathCause, MoveOutcome};
pub use config::{
    ConfigError, FoodConfig, GridConfig, PopulationConfig, ReproductionConfig, RespawnMode,
    SimConfig,
};
pub use metrics::{
    Birth, Death, DiversityMetrics, FitnessMetrics, PopulationMetrics, ScoreStats, TickReport,
};
pub use pool::{Decision, DecisionPool, DecisionTask};
pub use population::{PolicySource, PopulationManager};
pub use reproduction::{Offspring, ReproductionEngine};
pub use reward::{DistanceShaping, RewardEvent, RewardShaper};
pub use simulation::{AgentSnapshot, RunSummary, Simulation, WorldSnapshot};

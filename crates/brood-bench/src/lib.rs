//! Benchmark profiles for Brood.
//!
//! Provides pre-built [`SimConfig`] profiles for benchmarks and the
//! headless training example:
//!
//! - [`reference_profile`]: 32x32 grid, 24 tabular agents
//! - [`stress_profile`]: 96x96 grid, 256 tabular agents
//! - [`approximate_profile`]: the reference grid with network policies

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use brood_engine::SimConfig;
use brood_policy::{ApproximateConfig, PolicyConfig};

/// Reference profile: 32x32 grid (1K cells), 24 agents, tabular policies.
pub fn reference_profile(seed: u64) -> SimConfig {
    let mut config = SimConfig::default()
        .with_grid(32, 32)
        .with_agents(24)
        .with_seed(seed);
    config.population.min_population = 12;
    config.population.max_population = 96;
    config.metrics_interval = 0;
    config.autosave_interval = 0;
    config
}

/// Stress profile: 96x96 grid (~9K cells), 256 agents.
pub fn stress_profile(seed: u64) -> SimConfig {
    let mut config = reference_profile(seed).with_grid(96, 96).with_agents(256);
    config.population.min_population = 128;
    config.population.max_population = 1024;
    config
}

/// The reference grid with one-hidden-layer network policies.
pub fn approximate_profile(seed: u64) -> SimConfig {
    reference_profile(seed).with_policy(PolicyConfig::Approximate(ApproximateConfig {
        hidden: 32,
        ..ApproximateConfig::default()
    }))
}

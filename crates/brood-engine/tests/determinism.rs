//! Runs are reproducible from the seed, and the decision pool produces
//! exactly the run the inline path does.

use brood_engine::{SimConfig, Simulation};
use brood_policy::{ApproximateConfig, PolicyConfig};

fn run_snapshots(config: SimConfig, ticks: u64) -> Vec<brood_engine::WorldSnapshot> {
    let mut sim = Simulation::new(config).unwrap();
    (0..ticks)
        .map(|_| {
            sim.tick().unwrap();
            sim.snapshot()
        })
        .collect()
}

fn tabular() -> SimConfig {
    let mut config = SimConfig::default().with_grid(16, 16).with_agents(10).with_seed(41);
    config.reproduction.maturity_age = 5;
    config.reproduction.cooldown = 5;
    config.metrics_interval = 25;
    config
}

#[test]
fn same_seed_same_run() {
    assert_eq!(run_snapshots(tabular(), 150), run_snapshots(tabular(), 150));
}

#[test]
fn pool_matches_inline_tabular() {
    let inline = run_snapshots(tabular(), 150);
    for workers in [1, 4] {
        let pooled = run_snapshots(tabular().with_workers(workers), 150);
        assert_eq!(pooled, inline, "{workers} workers");
    }
}

#[test]
fn pool_matches_inline_approximate() {
    let approximate = || {
        tabular().with_policy(PolicyConfig::Approximate(ApproximateConfig {
            hidden: 16,
            batch_size: 8,
            replay_capacity: 64,
            ..ApproximateConfig::default()
        }))
    };
    let inline = run_snapshots(approximate(), 60);
    let pooled = run_snapshots(approximate().with_workers(3), 60);
    assert_eq!(pooled, inline);
}

#[test]
fn shared_brain_pool_matches_inline() {
    let shared = || {
        let mut config = tabular();
        config.population.shared_brain = true;
        config
    };
    let inline = run_snapshots(shared(), 100);
    let pooled = run_snapshots(shared().with_workers(2), 100);
    assert_eq!(pooled, inline);
}

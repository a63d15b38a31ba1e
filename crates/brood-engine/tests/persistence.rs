//! Learned state survives a restart; unreadable state is discarded.

use brood_engine::{SimConfig, Simulation};
use brood_persist::PersistConfig;
use brood_policy::PolicyDocument;

fn config(dir: &std::path::Path) -> SimConfig {
    let mut config = SimConfig::default()
        .with_grid(14, 14)
        .with_agents(6)
        .with_seed(5)
        .with_persist(PersistConfig::in_dir(dir));
    config.autosave_interval = 20;
    config
}

#[test]
fn shutdown_saves_and_restart_restores() {
    let dir = tempfile::tempdir().unwrap();
    let persist = PersistConfig::in_dir(dir.path());

    let mut sim = Simulation::new(config(dir.path())).unwrap();
    for _ in 0..120 {
        sim.tick().unwrap();
    }
    let high = sim.stats().all_time_high();
    let recorded = sim.session().recorded();
    sim.request_shutdown();

    assert!(persist.policy_path().exists());
    assert!(persist.session_path().exists());
    let text = std::fs::read_to_string(persist.policy_path()).unwrap();
    let doc: PolicyDocument = serde_json::from_str(&text).unwrap();

    let restored = Simulation::new(config(dir.path())).unwrap();
    assert_eq!(restored.stats().all_time_high(), high);
    assert_eq!(restored.session().recorded(), recorded);
    for (_, agent) in restored.population().iter() {
        let policy = agent.policy().read().unwrap();
        assert_eq!(policy.epsilon(), doc.epsilon);
    }
}

#[test]
fn unreadable_policy_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let persist = PersistConfig::in_dir(dir.path());
    std::fs::write(persist.policy_path(), b"{ not json").unwrap();
    std::fs::write(persist.session_path(), b"[]").unwrap();

    let mut sim = Simulation::new(config(dir.path())).unwrap();
    assert_eq!(sim.population().len(), 6);
    assert_eq!(sim.stats().all_time_high(), 0);
    sim.tick().unwrap();
}

#[test]
fn mismatched_encoder_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut sim = Simulation::new(config(dir.path())).unwrap();
    for _ in 0..10 {
        sim.tick().unwrap();
    }
    sim.request_shutdown();

    let mut changed = config(dir.path());
    changed.perception = changed.perception.with_distance_buckets(4);
    let fresh = Simulation::new(changed).unwrap();
    let start = fresh.config().policy.epsilon().start;
    for (_, agent) in fresh.population().iter() {
        assert_eq!(agent.policy().read().unwrap().epsilon(), start);
    }
}

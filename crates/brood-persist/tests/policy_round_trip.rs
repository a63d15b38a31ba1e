//! A policy saved through the service and restored from disk acts
//! exactly as it did before saving.

use brood_obs::{EncodedState, StateKey};
use brood_persist::{PersistConfig, PersistenceService};
use brood_policy::{ApproximateConfig, Policy, PolicyConfig, TabularConfig, Transition};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FINGERPRINT: u64 = 0xb00d;
const WIDTH: usize = 6;

fn state(key: u64, rng: &mut ChaCha8Rng) -> EncodedState {
    EncodedState {
        key: StateKey(key),
        features: (0..WIDTH).map(|_| rng.random_range(-1.0..1.0)).collect(),
    }
}

/// Train `policy` on a small random trajectory and return the states it saw.
fn train(policy: &mut dyn Policy, rng: &mut ChaCha8Rng) -> Vec<EncodedState> {
    let states: Vec<EncodedState> = (0..40).map(|k| state(k, rng)).collect();
    for (i, s) in states.iter().enumerate() {
        let next = states.get(i + 1).cloned();
        let transition = Transition {
            state: s.clone(),
            action: i % policy.action_count(),
            reward: rng.random_range(-1.0..1.0),
            next,
        };
        policy.observe(transition, rng);
        if i % 10 == 9 {
            policy.end_episode();
        }
    }
    states
}

fn round_trip(config: PolicyConfig) {
    let dir = tempfile::tempdir().unwrap();
    let service = PersistenceService::spawn(PersistConfig::in_dir(dir.path())).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let mut policy = config.build(WIDTH, 3, &mut rng);
    let states = train(policy.as_mut(), &mut rng);

    service.save_policy(policy.to_document(FINGERPRINT));
    service.flush();
    let doc = service.load_policy().expect("saved document");
    let restored = config.restore(doc, FINGERPRINT, WIDTH, 3).unwrap();

    assert_eq!(restored.epsilon(), policy.epsilon());
    for s in &states {
        assert_eq!(restored.greedy_action(s), policy.greedy_action(s), "state {}", s.key);
    }
    service.shutdown();
}

#[test]
fn tabular_round_trip() {
    round_trip(PolicyConfig::Tabular(TabularConfig::default()));
}

#[test]
fn approximate_round_trip() {
    round_trip(PolicyConfig::Approximate(ApproximateConfig {
        hidden: 8,
        batch_size: 4,
        replay_capacity: 32,
        ..ApproximateConfig::default()
    }));
}

#[test]
fn foreign_fingerprint_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let service = PersistenceService::spawn(PersistConfig::in_dir(dir.path())).unwrap();
    let config = PolicyConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let policy = config.build(WIDTH, 3, &mut rng);
    service.save_policy(policy.to_document(FINGERPRINT));
    service.flush();
    let doc = service.load_policy().unwrap();
    assert!(config.restore(doc, FINGERPRINT + 1, WIDTH, 3).is_err());
}

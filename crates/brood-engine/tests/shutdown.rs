//! Cooperative shutdown and decision worker failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use brood_core::{Heading, Position, SimError};
use brood_engine::{SimConfig, Simulation};
use brood_test_utils::{body, PanickingPolicy};

#[test]
fn tick_after_shutdown_fails() {
    let mut sim = Simulation::create(10, 10, 2).unwrap();
    sim.tick().unwrap();
    sim.request_shutdown();
    assert_eq!(sim.tick(), Err(SimError::ShuttingDown));
    assert!(sim.run(&AtomicBool::new(false), Some(3)).is_err());
}

#[test]
fn stop_flag_ends_run_between_ticks() {
    let mut sim = Simulation::create(12, 12, 4).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        flag.store(true, Ordering::Relaxed);
    });
    let summary = sim.run(&stop, None).unwrap();
    setter.join().unwrap();
    assert!(summary.stopped);
    assert!(summary.ticks > 0);
    assert!(sim.is_shut_down());
    assert_eq!(sim.tick_id().0, summary.ticks);
}

#[test]
fn lost_workers_fall_back_to_inline() {
    let mut config = SimConfig::default().with_grid(10, 10).with_agents(0).with_workers(2);
    config.population.min_population = 0;
    let mut sim = Simulation::new(config).unwrap();
    sim.clear_food();
    let h = sim
        .spawn_agent(
            &body(&[(1, 5)]),
            Heading::East,
            Some(Box::new(PanickingPolicy::new(1, 3))),
        )
        .unwrap();
    for _ in 0..3 {
        sim.tick().unwrap();
    }
    assert_eq!(sim.population().get(h).unwrap().head(), Position::new(4, 5));
}

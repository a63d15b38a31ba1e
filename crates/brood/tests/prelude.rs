//! The facade prelude is enough to script a world end to end.

use brood::prelude::*;
use brood_test_utils::FixedPolicy;

#[test]
fn single_agent_eats_through_the_prelude() {
    let mut config = SimConfig::default().with_grid(10, 10).with_agents(0);
    config.population.min_population = 0;
    let mut sim = Simulation::new(config).unwrap();
    sim.clear_food();

    let h: AgentHandle = sim
        .spawn_agent(
            &[Position::new(5, 5)],
            Heading::East,
            Some(Box::new(FixedPolicy::straight())),
        )
        .unwrap();
    sim.place_food(Position::new(6, 5)).unwrap();

    let report: TickReport = sim.tick().unwrap();
    assert_eq!(report.food_eaten, 1);

    let snap: WorldSnapshot = sim.snapshot();
    let agent = snap.agents.iter().find(|a| a.handle == h).unwrap();
    assert_eq!(agent.body, vec![Position::new(5, 5), Position::new(6, 5)]);
    assert_eq!(snap.food.len(), 1);
    assert!(!agent.body.contains(&snap.food[0]));
}

#[test]
fn config_errors_surface_before_start() {
    let err = Simulation::new(SimConfig::default().with_grid(0, 3)).unwrap_err();
    assert!(matches!(err, ConfigError::Space(SpaceError::EmptySpace)));
}

//! Breeding: eligibility, pairing geometry, and offspring construction.

use brood_core::{AgentHandle, Heading, Position, TickId};
use brood_policy::Policy;
use brood_space::GridWorld;
use rand::{Rng, RngCore};
use slotmap::SlotMap;
use tracing::warn;

use crate::agent::{read_policy, Agent};
use crate::config::ReproductionConfig;

/// Everything needed to spawn a child.
#[derive(Debug)]
pub struct Offspring {
    /// Cell the child occupies.
    pub position: Position,
    /// Initial heading, perpendicular to the parents' axis.
    pub heading: Heading,
    /// `max(parent generations) + 1`.
    pub generation: u32,
    /// Cosmetic hue.
    pub hue: f32,
    /// The bred policy, or `None` when the child joins the shared brain.
    pub policy: Option<Box<dyn Policy>>,
}

/// Decides whether two agents may breed and builds their child.
#[derive(Clone, Debug)]
pub struct ReproductionEngine {
    config: ReproductionConfig,
    shared_brain: bool,
}

impl ReproductionEngine {
    /// An engine breeding under `config`. Under `shared_brain` children
    /// act through their parents' shared policy and no crossover happens.
    pub fn new(config: ReproductionConfig, shared_brain: bool) -> Self {
        Self {
            config,
            shared_brain,
        }
    }

    /// Breeding parameters.
    pub fn config(&self) -> &ReproductionConfig {
        &self.config
    }

    /// Mature, and out of cooldown. An agent that never bred counts its
    /// cooldown from birth.
    pub fn eligible(&self, agent: &Agent, now: TickId) -> bool {
        let since = now.since(agent.last_reproduction.unwrap_or(agent.birth));
        agent.age >= self.config.maturity_age && since >= self.config.cooldown
    }

    /// Both eligible, heads one cell apart, headings directly opposed.
    pub fn compatible(&self, world: &GridWorld, a: &Agent, b: &Agent, now: TickId) -> bool {
        self.eligible(a, now)
            && self.eligible(b, now)
            && world.manhattan(a.head(), b.head()) == 1
            && a.heading.opposes(b.heading)
    }

    /// Breed `a` with `b` if they are [`compatible`](Self::compatible).
    ///
    /// On success both parents are stamped with `now` as their last
    /// reproduction. Returns `None`, leaving both untouched, when the
    /// pair is incompatible, no free cell remains, or the policies
    /// cannot be crossed.
    pub fn try_reproduce(
        &self,
        world: &GridWorld,
        agents: &mut SlotMap<AgentHandle, Agent>,
        a: AgentHandle,
        b: AgentHandle,
        now: TickId,
        rng: &mut dyn RngCore,
    ) -> Option<Offspring> {
        if a == b {
            return None;
        }
        let (pa, pb) = (agents.get(a)?, agents.get(b)?);
        if !self.compatible(world, pa, pb, now) {
            return None;
        }
        let position = world.nearest_free(world.midpoint(pa.head(), pb.head()))?;
        let policy = if self.shared_brain {
            None
        } else {
            let left = read_policy(&pa.policy);
            let right = read_policy(&pb.policy);
            match left.breed(&**right, &self.config.mutation, rng) {
                Ok(child) => Some(child),
                Err(error) => {
                    warn!(%error, "parents cannot be crossed");
                    return None;
                }
            }
        };
        let (dx, _) = world.displacement(pa.head(), pb.head());
        let heading = match (dx != 0, rng.random_bool(0.5)) {
            (true, true) => Heading::North,
            (true, false) => Heading::South,
            (false, true) => Heading::East,
            (false, false) => Heading::West,
        };
        let offspring = Offspring {
            position,
            heading,
            generation: pa.generation.max(pb.generation) + 1,
            hue: self.child_hue(pa.hue, pb.hue, rng),
            policy,
        };
        for parent in [a, b] {
            if let Some(p) = agents.get_mut(parent) {
                p.last_reproduction = Some(now);
                p.children += 1;
            }
        }
        Some(offspring)
    }

    /// Circular mean of the parents' hues, jittered.
    fn child_hue(&self, a: f32, b: f32, rng: &mut dyn RngCore) -> f32 {
        let delta = (b - a + 0.5).rem_euclid(1.0) - 0.5;
        let jitter = self.config.hue_jitter;
        let shift = if jitter > 0.0 {
            rng.random_range(-jitter..=jitter)
        } else {
            0.0
        };
        (a + delta / 2.0 + shift).rem_euclid(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brood_core::SpawnSeq;
    use brood_obs::StateKey;
    use brood_policy::{share, MutationConfig, TabularConfig, TabularQPolicy};
    use brood_space::EdgeBehavior;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::VecDeque;

    fn engine() -> ReproductionEngine {
        ReproductionEngine::new(
            ReproductionConfig {
                maturity_age: 5,
                cooldown: 10,
                mutation: MutationConfig::none(),
                hue_jitter: 0.0,
            },
            false,
        )
    }

    fn agent(head: (i32, i32), heading: Heading, age: u64, q: f64) -> Agent {
        let mut policy = TabularQPolicy::new(TabularConfig::default(), 3);
        policy.learn(StateKey(1), 0, q, None);
        let body: VecDeque<Position> = [head.into()].into_iter().collect();
        let mut a = Agent::new(SpawnSeq(0), body, heading, TickId(0), share(Box::new(policy)));
        a.age = age;
        a
    }

    type Pair = (SlotMap<AgentHandle, Agent>, AgentHandle, AgentHandle);

    fn pair(world: &mut GridWorld, a: Agent, b: Agent) -> Pair {
        let mut agents = SlotMap::with_key();
        let (ha_pos, hb_pos) = (a.head(), b.head());
        let ha = agents.insert(a);
        let hb = agents.insert(b);
        world.occupy(ha_pos, ha).unwrap();
        world.occupy(hb_pos, hb).unwrap();
        (agents, ha, hb)
    }

    #[test]
    fn eligibility_needs_maturity_and_cooldown() {
        let e = engine();
        let mut a = agent((0, 0), Heading::East, 4, 0.0);
        assert!(!e.eligible(&a, TickId(20)));
        a.age = 5;
        assert!(e.eligible(&a, TickId(20)));
        // Cooldown counts from birth when the agent never bred.
        assert!(!e.eligible(&a, TickId(9)));
        a.last_reproduction = Some(TickId(15));
        assert!(!e.eligible(&a, TickId(24)));
        assert!(e.eligible(&a, TickId(25)));
    }

    #[test]
    fn opposing_adjacent_pair_breeds_between_them() {
        let e = engine();
        let mut world = GridWorld::new(10, 10, EdgeBehavior::Absorb).unwrap();
        let (mut agents, a, b) = pair(
            &mut world,
            agent((4, 5), Heading::East, 20, 1.0),
            agent((5, 5), Heading::West, 20, 3.0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let child = e
            .try_reproduce(&world, &mut agents, a, b, TickId(30), &mut rng)
            .expect("child");
        // The midpoint (4,5) is a parent's head; nearest free in row-major
        // ring order is (4,4).
        assert_eq!(child.position, Position::new(4, 4));
        assert!(matches!(child.heading, Heading::North | Heading::South));
        assert_eq!(child.generation, 1);
        assert_eq!(agents[a].last_reproduction, Some(TickId(30)));
        assert_eq!(agents[b].children, 1);

        let policy = child.policy.expect("bred policy");
        let tabular = policy
            .as_any()
            .downcast_ref::<TabularQPolicy>()
            .expect("tabular child");
        let q = tabular.values(StateKey(1)).expect("known state")[0];
        let qa = 0.4 * 1.0;
        let qb = 0.4 * 3.0;
        assert!(q >= qa - 1e-12 && q <= qb + 1e-12, "{qa} <= {q} <= {qb}");
    }

    #[test]
    fn pair_meeting_across_the_seam_breeds_beside_them() {
        let e = engine();
        let mut world = GridWorld::new(10, 10, EdgeBehavior::Wrap).unwrap();
        let (mut agents, a, b) = pair(
            &mut world,
            agent((9, 5), Heading::East, 20, 1.0),
            agent((0, 5), Heading::West, 20, 1.0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let child = e
            .try_reproduce(&world, &mut agents, a, b, TickId(30), &mut rng)
            .expect("child");
        assert_eq!(child.position, Position::new(9, 4));
        assert_eq!(world.manhattan(child.position, agents[a].head()), 1);
        assert!(world.manhattan(child.position, agents[b].head()) <= 2);
    }

    #[test]
    fn same_facing_pair_is_refused() {
        let e = engine();
        let mut world = GridWorld::new(10, 10, EdgeBehavior::Absorb).unwrap();
        let (mut agents, a, b) = pair(
            &mut world,
            agent((4, 5), Heading::East, 20, 1.0),
            agent((5, 5), Heading::East, 20, 1.0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(e.try_reproduce(&world, &mut agents, a, b, TickId(30), &mut rng).is_none());
        assert_eq!(agents[a].last_reproduction, None);
    }

    #[test]
    fn distant_pair_is_refused() {
        let e = engine();
        let mut world = GridWorld::new(10, 10, EdgeBehavior::Absorb).unwrap();
        let (mut agents, a, b) = pair(
            &mut world,
            agent((3, 5), Heading::East, 20, 1.0),
            agent((5, 5), Heading::West, 20, 1.0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(e.try_reproduce(&world, &mut agents, a, b, TickId(30), &mut rng).is_none());
    }

    #[test]
    fn shared_brain_child_has_no_policy() {
        let e = ReproductionEngine::new(engine().config().clone(), true);
        let mut world = GridWorld::new(10, 10, EdgeBehavior::Absorb).unwrap();
        let (mut agents, a, b) = pair(
            &mut world,
            agent((5, 4), Heading::South, 20, 1.0),
            agent((5, 5), Heading::North, 20, 1.0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let child = e
            .try_reproduce(&world, &mut agents, a, b, TickId(30), &mut rng)
            .expect("child");
        assert!(child.policy.is_none());
        assert!(matches!(child.heading, Heading::East | Heading::West));
    }

    #[test]
    fn hue_is_circular_mean() {
        let e = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!((e.child_hue(0.2, 0.4, &mut rng) - 0.3).abs() < 1e-6);
        let wrapped = e.child_hue(0.9, 0.1, &mut rng);
        assert!(wrapped < 1e-6 || wrapped > 1.0 - 1e-6, "{wrapped}");
    }
}

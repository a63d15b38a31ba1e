//! The simulation boundary.
//!
//! [`Simulation`] owns the grid, the population, the decision pool and
//! the persistence service, and exposes the four operations a renderer
//! or CLI needs: [`create`](Simulation::create), [`tick`](Simulation::tick),
//! [`snapshot`](Simulation::snapshot) and
//! [`request_shutdown`](Simulation::request_shutdown).
//!
//! # Ownership model
//!
//! `Simulation` is [`Send`] but is driven through `&mut self`; one thread
//! ticks it at a time. Decision workers only ever see a cloned
//! start-of-tick world. The persistence worker only sees documents
//! handed to it.
//!
//! # Shutdown
//!
//! [`request_shutdown`](Simulation::request_shutdown) queues a final
//! save, waits for every queued write, stops the workers, and makes
//! every later [`tick`](Simulation::tick) return
//! [`SimError::ShuttingDown`]. Dropping a `Simulation` without asking
//! still drains the persistence queue but skips the final save.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use brood_core::{AgentHandle, Heading, Position, SimError, SpawnSeq, TickId};
use brood_obs::PerceptionEncoder;
use brood_persist::{PersistenceService, SessionLog};
use brood_policy::{share, MutationConfig, Policy};
use brood_space::{EdgeBehavior, GridWorld, SpaceError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::agent::read_policy;
use crate::config::{ConfigError, SimConfig};
use crate::metrics::{ScoreStats, TickReport};
use crate::pool::{self, mix, Decision, DecisionContext, DecisionPool, DecisionTask};
use crate::population::{PolicySource, PopulationManager, TickContext};
use crate::reproduction::ReproductionEngine;
use crate::reward::RewardShaper;

const WORLD_STREAM: u64 = 0x5752_4c44;
const LEARN_STREAM: u64 = 0x4c52_4e52;

// Compile-time assertion: Simulation can be moved to a driver thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
    }
};

// ── Snapshots ────────────────────────────────────────────────────

/// Read-only view of one agent for drawing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentSnapshot {
    /// Handle, stable while the agent lives.
    pub handle: AgentHandle,
    /// Spawn order.
    pub seq: SpawnSeq,
    /// Body cells, tail first.
    pub body: Vec<Position>,
    /// Current heading.
    pub heading: Heading,
    /// Food eaten.
    pub score: u64,
    /// Ticks lived.
    pub age: u64,
    /// Breeding depth.
    pub generation: u32,
    /// Cosmetic hue in `[0, 1)`.
    pub hue: f32,
}

/// Read-only view of the whole world for drawing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorldSnapshot {
    /// Last completed tick.
    pub tick: TickId,
    /// Grid width.
    pub width: u32,
    /// Grid height.
    pub height: u32,
    /// Edge rule.
    pub edge: EdgeBehavior,
    /// Living agents in processing order.
    pub agents: Vec<AgentSnapshot>,
    /// Food cells.
    pub food: Vec<Position>,
    /// Best final score this run.
    pub session_high: u64,
    /// Best final score ever.
    pub all_time_high: u64,
    /// Mean of recent final scores.
    pub mean_score: f64,
}

/// Totals over one [`Simulation::run`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Children born.
    pub births: u64,
    /// Agents that died.
    pub deaths: u64,
    /// Food consumed.
    pub food_eaten: u64,
    /// Whether the stop flag ended the run (and shut the world down).
    pub stopped: bool,
}

// ── Simulation ───────────────────────────────────────────────────

/// A running Brood world.
///
/// # Examples
///
/// ```
/// use brood_engine::Simulation;
///
/// let mut sim = Simulation::create(12, 12, 4).unwrap();
/// let report = sim.tick().unwrap();
/// assert_eq!(report.tick.0, 1);
///
/// let snap = sim.snapshot();
/// assert_eq!((snap.width, snap.height), (12, 12));
/// assert!(!snap.food.is_empty());
///
/// sim.request_shutdown();
/// assert!(sim.tick().is_err());
/// ```
pub struct Simulation {
    config: SimConfig,
    world: GridWorld,
    encoder: PerceptionEncoder,
    population: PopulationManager,
    reproduction: ReproductionEngine,
    policies: PolicySource,
    shaper: Box<dyn RewardShaper>,
    rng: ChaCha8Rng,
    session: SessionLog,
    pool: Option<DecisionPool>,
    persistence: Option<PersistenceService>,
    tick: TickId,
    shut_down: bool,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("living", &self.population.len())
            .field("food", &self.world.food_count())
            .field("pool", &self.pool)
            .field("persistence", &self.persistence.is_some())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

impl Simulation {
    /// Build a world from `config`.
    ///
    /// Validates the configuration, starts the persistence service and
    /// restores any saved policy and session log, spawns the initial
    /// population, places food, and starts the decision pool.
    ///
    /// A saved policy seeds every initial agent (or becomes the shared
    /// brain). A saved policy that does not fit the configuration is
    /// discarded with a warning.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from validation, or
    /// [`ConfigError::ThreadSpawnFailed`] if a worker cannot start.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut world = GridWorld::new(config.grid.width, config.grid.height, config.grid.edge)?;
        let encoder = PerceptionEncoder::new(config.perception.clone());
        let input_width = encoder.feature_width();
        let action_count = config.action_space.action_count();
        let mut rng = ChaCha8Rng::seed_from_u64(mix(config.seed ^ WORLD_STREAM));

        let persistence = match &config.persist {
            Some(p) => Some(PersistenceService::spawn(p.clone()).map_err(|e| {
                ConfigError::ThreadSpawnFailed {
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let mut template: Option<Box<dyn Policy>> = None;
        if let Some(doc) = persistence.as_ref().and_then(PersistenceService::load_policy) {
            match config
                .policy
                .restore(doc, encoder.fingerprint(), input_width, action_count)
            {
                Ok(policy) => {
                    info!(
                        episodes = policy.episodes(),
                        epsilon = policy.epsilon(),
                        "restored saved policy"
                    );
                    template = Some(policy);
                }
                Err(error) => warn!(%error, "discarding saved policy, starting cold"),
            }
        }

        let session = match (&persistence, &config.persist) {
            (Some(service), Some(p)) => service
                .load_session()
                .unwrap_or_else(|| SessionLog::new(p.session_raw_cap, p.session_bucket_size)),
            _ => SessionLog::default(),
        };

        let shared = if config.population.shared_brain {
            Some(share(match template.take() {
                Some(policy) => policy,
                None => config.policy.build(input_width, action_count, &mut rng),
            }))
        } else {
            None
        };
        let policies = PolicySource::new(
            config.policy.clone(),
            input_width,
            action_count,
            config.reproduction.mutation.clone(),
            shared,
        );

        let mut population = PopulationManager::new(config.population.clone());
        population
            .stats_mut()
            .seed_all_time_high(session.all_time_high());
        for _ in 0..config.population.initial {
            let policy = match &template {
                Some(t) => share(t.mutated(&MutationConfig::none(), &mut rng)),
                None => policies.fresh(&mut rng),
            };
            if population
                .spawn_random(&mut world, TickId(0), policy, &mut rng)
                .is_none()
            {
                warn!(spawned = population.len(), "grid full, initial population truncated");
                break;
            }
        }
        population.replenish_food(&mut world, &config.food, &mut rng);

        let pool = if config.workers > 0 {
            Some(DecisionPool::new(config.workers)?)
        } else {
            None
        };

        info!(
            width = world.width(),
            height = world.height(),
            agents = population.len(),
            workers = config.workers,
            seed = config.seed,
            "simulation created"
        );

        Ok(Self {
            reproduction: ReproductionEngine::new(
                config.reproduction.clone(),
                config.population.shared_brain,
            ),
            shaper: Box::new(config.reward.clone()),
            config,
            world,
            encoder,
            population,
            policies,
            rng,
            session,
            pool,
            persistence,
            tick: TickId(0),
            shut_down: false,
        })
    }

    /// A `width` x `height` world with `agents` initial agents and
    /// default settings otherwise.
    ///
    /// The population cap is raised to at least `agents` (limited by the
    /// cell count) and the respawn floor lowered to at most `agents`.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new).
    pub fn create(width: u32, height: u32, agents: usize) -> Result<Self, ConfigError> {
        let cells = (width as usize).saturating_mul(height as usize);
        let mut config = SimConfig::default()
            .with_grid(width, height)
            .with_agents(agents);
        let p = &mut config.population;
        p.max_population = p.max_population.max(agents).min(cells.max(1));
        p.min_population = p.min_population.min(agents);
        Self::new(config)
    }

    /// Replace the reward function.
    pub fn with_reward_shaper(mut self, shaper: impl RewardShaper + 'static) -> Self {
        self.shaper = Box::new(shaper);
        self
    }

    // ── Ticking ─────────────────────────────────────────────────

    /// Advance the world by one tick.
    ///
    /// Decisions are computed from the start-of-tick world (on the pool
    /// when configured), then applied agent by agent. Afterwards the
    /// population is topped up, food replenished, and on their intervals
    /// metrics recomputed and a background save queued.
    ///
    /// # Errors
    ///
    /// [`SimError::ShuttingDown`] after [`request_shutdown`](Self::request_shutdown).
    pub fn tick(&mut self) -> Result<TickReport, SimError> {
        if self.shut_down {
            return Err(SimError::ShuttingDown);
        }
        let now = self.tick.next();
        let tasks = self.population.tasks();
        let decisions = self.decide(now, &tasks);

        let mut report = TickReport {
            tick: now,
            ..TickReport::default()
        };
        let mut learn_rng =
            ChaCha8Rng::seed_from_u64(mix(self.config.seed ^ LEARN_STREAM ^ mix(now.0)));
        let mut ctx = TickContext {
            now,
            world: &mut self.world,
            action_space: self.config.action_space,
            reproduction: &self.reproduction,
            shaper: self.shaper.as_ref(),
            policies: &self.policies,
            rng: &mut self.rng,
            learn_rng: &mut learn_rng,
            session: &mut self.session,
        };
        self.population.step(&mut ctx, &decisions, &mut report);
        report.respawned = self.population.respawn(&mut ctx);
        self.population
            .replenish_food(ctx.world, &self.config.food, ctx.rng);
        report.living = self.population.len();
        self.tick = now;

        let interval = self.config.metrics_interval;
        if interval > 0 && now.0 % interval == 0 {
            let m = self.population.metrics(now);
            let stats = self.population.stats();
            info!(
                tick = now.0,
                living = m.living,
                epsilon = m.mean_epsilon,
                divergence = m.diversity.mean_divergence,
                patterns = m.diversity.behavior_patterns,
                best_fitness = m.fitness.best_fitness,
                survival = m.fitness.survival_rate,
                session_high = stats.session_high(),
                mean_score = stats.mean(),
                "population metrics"
            );
            report.metrics = Some(m);
        }
        let interval = self.config.autosave_interval;
        if interval > 0 && now.0 % interval == 0 {
            self.save();
        }
        Ok(report)
    }

    fn decide(&self, now: TickId, tasks: &[DecisionTask]) -> Vec<Decision> {
        if let Some(pool) = &self.pool {
            let ctx = Arc::new(DecisionContext {
                world: self.world.clone(),
                encoder: self.encoder.clone(),
                seed: self.config.seed,
                tick: now,
            });
            match pool.decide_all(ctx, tasks) {
                Ok(decisions) => return decisions,
                Err(error) => warn!(%error, "deciding inline this tick"),
            }
        }
        pool::decide_inline(tasks, &self.world, &self.encoder, self.config.seed, now)
    }

    /// Tick until `stop` is raised or `max_ticks` ticks have run.
    ///
    /// `stop` is checked between ticks. When it ends the run the world
    /// is shut down as by [`request_shutdown`](Self::request_shutdown).
    ///
    /// # Errors
    ///
    /// [`SimError::ShuttingDown`] if the world was already shut down.
    pub fn run(&mut self, stop: &AtomicBool, max_ticks: Option<u64>) -> Result<RunSummary, SimError> {
        let mut summary = RunSummary::default();
        loop {
            if stop.load(Ordering::Relaxed) {
                summary.stopped = true;
                break;
            }
            if max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }
            let report = self.tick()?;
            summary.ticks += 1;
            summary.births += report.births.len() as u64;
            summary.deaths += report.deaths.len() as u64;
            summary.food_eaten += u64::from(report.food_eaten);
        }
        if summary.stopped {
            self.request_shutdown();
        }
        Ok(summary)
    }

    // ── Persistence & shutdown ──────────────────────────────────

    /// Queue a background save of the learned policy and session log.
    ///
    /// The shared policy is saved in shared-brain runs, otherwise the
    /// fittest living agent's. Without persistence this does nothing.
    pub fn save(&self) {
        let Some(service) = &self.persistence else {
            return;
        };
        let policy = match self.policies.shared() {
            Some(shared) => Some(Arc::clone(shared)),
            None => self
                .population
                .best()
                .and_then(|h| self.population.get(h))
                .map(|a| Arc::clone(a.policy())),
        };
        if let Some(policy) = policy {
            service.save_policy(read_policy(&policy).to_document(self.encoder.fingerprint()));
        }
        service.save_session(self.session.clone());
        debug!(tick = self.tick.0, "save queued");
    }

    /// Save, wait for queued writes, and stop ticking.
    ///
    /// Idempotent.
    pub fn request_shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.save();
        if let Some(service) = self.persistence.take() {
            service.flush();
            let stats = service.stats();
            service.shutdown();
            info!(
                written = stats.written,
                retried = stats.retried,
                dropped = stats.dropped,
                "persistence drained"
            );
        }
        self.pool = None;
        self.shut_down = true;
        info!(tick = self.tick.0, living = self.population.len(), "simulation shut down");
    }

    /// Whether [`request_shutdown`](Self::request_shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ── Views ───────────────────────────────────────────────────

    /// Agents and food as of the last completed tick.
    pub fn snapshot(&self) -> WorldSnapshot {
        let stats = self.population.stats();
        WorldSnapshot {
            tick: self.tick,
            width: self.world.width(),
            height: self.world.height(),
            edge: self.world.edge(),
            agents: self
                .population
                .iter()
                .map(|(handle, a)| AgentSnapshot {
                    handle,
                    seq: a.seq(),
                    body: a.body().collect(),
                    heading: a.heading(),
                    score: a.score(),
                    age: a.age(),
                    generation: a.generation(),
                    hue: a.hue(),
                })
                .collect(),
            food: self.world.food().collect(),
            session_high: stats.session_high(),
            all_time_high: stats.all_time_high(),
            mean_score: stats.mean(),
        }
    }

    /// Last completed tick.
    pub fn tick_id(&self) -> TickId {
        self.tick
    }

    /// The grid.
    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    /// The living population.
    pub fn population(&self) -> &PopulationManager {
        &self.population
    }

    /// Running score statistics.
    pub fn stats(&self) -> &ScoreStats {
        self.population.stats()
    }

    /// Completed episodes.
    pub fn session(&self) -> &SessionLog {
        &self.session
    }

    /// The configuration the world was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The state encoder.
    pub fn encoder(&self) -> &PerceptionEncoder {
        &self.encoder
    }

    // ── Scenario setup ──────────────────────────────────────────

    /// Place an agent with `body` (tail first, head last).
    ///
    /// Without a `policy` the agent gets a fresh one (or the shared
    /// brain).
    ///
    /// # Errors
    ///
    /// [`SpaceError`] if a body cell is off-grid or not free.
    pub fn spawn_agent(
        &mut self,
        body: &[Position],
        heading: Heading,
        policy: Option<Box<dyn Policy>>,
    ) -> Result<AgentHandle, SpaceError> {
        let policy = match policy {
            Some(p) => share(p),
            None => self.policies.fresh(&mut self.rng),
        };
        self.population
            .spawn(&mut self.world, body, heading, self.tick, policy)
    }

    /// Put food on a free cell.
    ///
    /// # Errors
    ///
    /// [`SpaceError`] if the cell is off-grid or not free.
    pub fn place_food(&mut self, pos: Position) -> Result<(), SpaceError> {
        self.world.place_food(pos)
    }

    /// Remove all food.
    pub fn clear_food(&mut self) {
        let food: Vec<Position> = self.world.food().collect();
        for pos in food {
            self.world.take_food(pos);
        }
    }
}

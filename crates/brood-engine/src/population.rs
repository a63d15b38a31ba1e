//! The living population and the per-tick agent pass.
//!
//! # Update order
//!
//! Agents are processed one at a time in ascending spawn sequence. Each
//! tick:
//!
//! 1. every living agent ages by one;
//! 2. last tick's pending transitions are completed with this tick's
//!    start-of-tick states and fed to their policies;
//! 3. each agent, in order, turns, has its move resolved against the
//!    grid as it stands at that moment, and receives its reward. The
//!    reward becomes a pending transition, or a terminal one on death.
//!
//! Head-to-head meetings go to the [`ReproductionEngine`] first. A
//! refused meeting kills both agents.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use brood_core::{ActionSpace, AgentHandle, Heading, Position, SpawnSeq, TickId};
use brood_obs::EncodedState;
use brood_persist::{EpisodeRecord, SessionLog};
use brood_policy::{share, MutationConfig, PolicyConfig, SharedPolicy, Transition};
use brood_space::{GridWorld, SpaceError};
use rand::{Rng, RngCore};
use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::agent::{read_policy, write_policy, Agent, PendingStep};
use crate::collision::{CollisionResolver, DeathCause, Intents, MoveOutcome};
use crate::config::{FoodConfig, PopulationConfig, RespawnMode};
use crate::metrics::{self, Birth, Death, FitnessMetrics, PopulationMetrics, ScoreStats, TickReport};
use crate::pool::{Decision, DecisionTask};
use crate::reproduction::ReproductionEngine;
use crate::reward::{RewardEvent, RewardShaper};

/// Agents compared pairwise when measuring policy divergence.
const DIVERSITY_SAMPLE: usize = 32;

/// Attempts at drawing a random free cell before scanning the grid.
const RANDOM_CELL_TRIES: usize = 32;

// ── PolicySource ─────────────────────────────────────────────────

/// Where new agents get their policies.
#[derive(Debug)]
pub struct PolicySource {
    config: PolicyConfig,
    input_width: usize,
    action_count: usize,
    mutation: MutationConfig,
    shared: Option<SharedPolicy>,
}

impl PolicySource {
    /// Build fresh policies from `config`. With `shared` set, every
    /// request returns that one policy instead.
    pub fn new(
        config: PolicyConfig,
        input_width: usize,
        action_count: usize,
        mutation: MutationConfig,
        shared: Option<SharedPolicy>,
    ) -> Self {
        Self {
            config,
            input_width,
            action_count,
            mutation,
            shared,
        }
    }

    /// The shared-brain policy, if the run has one.
    pub fn shared(&self) -> Option<&SharedPolicy> {
        self.shared.as_ref()
    }

    /// A newly initialized policy, or the shared one.
    pub fn fresh(&self, rng: &mut dyn RngCore) -> SharedPolicy {
        match &self.shared {
            Some(s) => Arc::clone(s),
            None => share(self.config.build(self.input_width, self.action_count, rng)),
        }
    }

    /// A mutated copy of `parent`, or the shared one.
    pub fn mutant_of(&self, parent: &SharedPolicy, rng: &mut dyn RngCore) -> SharedPolicy {
        match &self.shared {
            Some(s) => Arc::clone(s),
            None => share(read_policy(parent).mutated(&self.mutation, rng)),
        }
    }
}

// ── TickContext ──────────────────────────────────────────────────

/// Everything the agent pass reads or mutates besides the population.
pub struct TickContext<'a> {
    /// The tick being executed.
    pub now: TickId,
    /// The grid.
    pub world: &'a mut GridWorld,
    /// Action interpretation.
    pub action_space: ActionSpace,
    /// Breeding rules.
    pub reproduction: &'a ReproductionEngine,
    /// Reward function.
    pub shaper: &'a dyn RewardShaper,
    /// Policy factory.
    pub policies: &'a PolicySource,
    /// Draws for breeding and spawning.
    pub rng: &'a mut dyn RngCore,
    /// Draws for learning updates.
    pub learn_rng: &'a mut dyn RngCore,
    /// Completed episodes.
    pub session: &'a mut SessionLog,
}

#[derive(Clone, Copy, Debug, Default)]
struct Window {
    start: TickId,
    living_at_start: usize,
    births: u64,
    deaths: u64,
    reproductions: u64,
}

// ── PopulationManager ────────────────────────────────────────────

/// Owns the living agents and drives their per-tick updates.
#[derive(Debug)]
pub struct PopulationManager {
    config: PopulationConfig,
    agents: SlotMap<AgentHandle, Agent>,
    order: Vec<AgentHandle>,
    next_seq: u64,
    stats: ScoreStats,
    window: Window,
}

impl PopulationManager {
    /// An empty population.
    pub fn new(config: PopulationConfig) -> Self {
        Self {
            config,
            agents: SlotMap::with_key(),
            order: Vec::new(),
            next_seq: 0,
            stats: ScoreStats::default(),
            window: Window::default(),
        }
    }

    /// Population limits.
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Living agents.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nobody is alive.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up an agent.
    pub fn get(&self, handle: AgentHandle) -> Option<&Agent> {
        self.agents.get(handle)
    }

    /// Living agents in ascending spawn sequence.
    pub fn iter(&self) -> impl Iterator<Item = (AgentHandle, &Agent)> + '_ {
        self.order
            .iter()
            .filter_map(|&h| self.agents.get(h).map(|a| (h, a)))
    }

    /// Running score statistics.
    pub fn stats(&self) -> &ScoreStats {
        &self.stats
    }

    /// Mutable score statistics.
    pub fn stats_mut(&mut self) -> &mut ScoreStats {
        &mut self.stats
    }

    /// The fittest living agent, lowest spawn sequence on ties.
    pub fn best(&self) -> Option<AgentHandle> {
        let mut best: Option<(AgentHandle, f64)> = None;
        for (h, a) in self.iter() {
            let f = metrics::fitness(a);
            if best.is_none_or(|(_, bf)| f > bf) {
                best = Some((h, f));
            }
        }
        best.map(|(h, _)| h)
    }

    /// One decision request per living agent, in processing order.
    pub fn tasks(&self) -> Vec<DecisionTask> {
        self.iter()
            .map(|(handle, a)| DecisionTask {
                handle,
                seq: a.seq,
                view: a.view(),
                policy: Arc::clone(&a.policy),
            })
            .collect()
    }

    // ── Spawning ────────────────────────────────────────────────

    /// Place a new agent with `body` (tail first) on the grid.
    ///
    /// # Errors
    ///
    /// [`SpaceError::OutOfBounds`] or [`SpaceError::Occupied`] if a body
    /// cell is off-grid or not free; nothing is placed in that case.
    pub fn spawn(
        &mut self,
        world: &mut GridWorld,
        body: &[Position],
        heading: Heading,
        now: TickId,
        policy: SharedPolicy,
    ) -> Result<AgentHandle, SpaceError> {
        let Some(&head) = body.last() else {
            return Err(SpaceError::EmptySpace);
        };
        for (i, &p) in body.iter().enumerate() {
            if !world.contains(p) {
                return Err(SpaceError::OutOfBounds {
                    position: p,
                    bounds: format!("[0, {}) x [0, {})", world.width(), world.height()),
                });
            }
            if !world.is_free(p) || body[..i].contains(&p) {
                return Err(SpaceError::Occupied { position: p });
            }
        }
        let seq = SpawnSeq(self.next_seq);
        self.next_seq += 1;
        let cells: VecDeque<Position> = body.iter().copied().collect();
        let handle = self
            .agents
            .insert(Agent::new(seq, cells, heading, now, policy));
        for &p in body {
            world.occupy(p, handle)?;
        }
        self.order.push(handle);
        self.window.births += 1;
        debug!(%seq, %head, %heading, "spawned");
        Ok(handle)
    }

    /// Spawn an agent on a random free cell with a random heading,
    /// extending its body behind the head up to the configured length
    /// while cells are free.
    pub fn spawn_random(
        &mut self,
        world: &mut GridWorld,
        now: TickId,
        policy: SharedPolicy,
        rng: &mut dyn RngCore,
    ) -> Option<AgentHandle> {
        let head = random_free_cell(world, rng)?;
        let heading = Heading::ALL[rng.random_range(0..4)];
        let mut body = VecDeque::from([head]);
        while body.len() < self.config.initial_length {
            let tail = body[0];
            match CollisionResolver::target(world, tail, heading.reverse()) {
                Some(p) if world.is_free(p) && !body.contains(&p) => body.push_front(p),
                _ => break,
            }
        }
        let body: Vec<Position> = body.into();
        self.spawn(world, &body, heading, now, policy).ok()
    }

    /// Top the population up to `min_population`. Returns how many
    /// agents were spawned.
    pub fn respawn(&mut self, ctx: &mut TickContext<'_>) -> u32 {
        let mut spawned = 0;
        while self.len() < self.config.min_population {
            let policy = match (self.config.respawn, self.best()) {
                (RespawnMode::CloneElite, Some(elite)) => {
                    let parent = Arc::clone(&self.agents[elite].policy);
                    ctx.policies.mutant_of(&parent, ctx.rng)
                }
                _ => ctx.policies.fresh(ctx.rng),
            };
            match self.spawn_random(ctx.world, ctx.now, policy, ctx.rng) {
                Some(_) => spawned += 1,
                None => break,
            }
        }
        if spawned > 0 {
            info!(spawned, living = self.len(), "respawned");
        }
        spawned
    }

    /// Top food up to the configured target. Returns how much was placed.
    pub fn replenish_food(
        &self,
        world: &mut GridWorld,
        food: &FoodConfig,
        rng: &mut dyn RngCore,
    ) -> usize {
        let target = food.target(self.len());
        let mut placed = 0;
        while world.food_count() < target {
            let Some(p) = random_free_cell(world, rng) else {
                break;
            };
            if world.place_food(p).is_err() {
                break;
            }
            placed += 1;
        }
        placed
    }

    // ── The agent pass ──────────────────────────────────────────

    /// Apply one tick of `decisions` (in processing order).
    pub fn step(&mut self, ctx: &mut TickContext<'_>, decisions: &[Decision], report: &mut TickReport) {
        for &h in &self.order {
            if let Some(a) = self.agents.get_mut(h) {
                a.age += 1;
            }
        }

        // Complete last tick's transitions.
        for d in decisions {
            let Some(agent) = self.agents.get_mut(d.handle) else {
                continue;
            };
            if let Some(p) = agent.pending.take() {
                let transition = Transition {
                    state: p.state,
                    action: p.action,
                    reward: p.reward,
                    next: Some(d.state.clone()),
                };
                write_policy(&agent.policy).observe(transition, ctx.learn_rng);
            }
        }

        // Turn every agent and record where it means to go.
        let mut intents = Intents::new();
        let mut headings: Vec<Heading> = Vec::with_capacity(decisions.len());
        let mut index: HashMap<AgentHandle, usize> = HashMap::with_capacity(decisions.len());
        for (i, d) in decisions.iter().enumerate() {
            index.insert(d.handle, i);
            let Some(agent) = self.agents.get(d.handle) else {
                headings.push(Heading::North);
                continue;
            };
            let requested = ctx.action_space.requested_heading(agent.heading, d.action);
            let heading = CollisionResolver::effective_heading(agent.heading, requested);
            headings.push(heading);
            if let Some(t) = CollisionResolver::target(ctx.world, agent.head(), heading) {
                intents.insert(d.handle, t);
            }
        }

        let mut processed: HashSet<AgentHandle> = HashSet::with_capacity(decisions.len());
        for (d, &heading) in decisions.iter().zip(&headings) {
            let h = d.handle;
            if !processed.insert(h) || !self.agents.contains_key(h) {
                intents.shift_remove(&h);
                continue;
            }
            let keep = self.config.action_history;
            let before = {
                let Some(agent) = self.agents.get_mut(h) else {
                    continue;
                };
                agent.heading = heading;
                agent.push_action(d.action, keep);
                nearest_food_distance(ctx.world, agent.head())
            };
            let outcome = CollisionResolver.resolve(ctx.world, &self.agents, h, heading, &intents);
            intents.shift_remove(&h);

            match outcome {
                MoveOutcome::Blocked => {
                    let reward = ctx.shaper.reward(&RewardEvent::Blocked);
                    self.set_pending(h, &d.state, d.action, reward);
                }
                MoveOutcome::Moved(p) => {
                    self.advance(ctx.world, h, p, false);
                    let after = nearest_food_distance(ctx.world, p);
                    let reward = ctx.shaper.reward(&RewardEvent::Moved { before, after });
                    self.set_pending(h, &d.state, d.action, reward);
                }
                MoveOutcome::MovedAndAte(p) => {
                    ctx.world.take_food(p);
                    self.advance(ctx.world, h, p, true);
                    report.food_eaten += 1;
                    let reward = ctx.shaper.reward(&RewardEvent::Ate);
                    self.set_pending(h, &d.state, d.action, reward);
                }
                MoveOutcome::Died(cause) => {
                    self.kill(ctx, h, Some((&d.state, d.action)), cause, report);
                }
                MoveOutcome::HeadToHead { other } => {
                    let partner = index.get(&other).map(|&i| &decisions[i]);
                    let partner_moved = processed.contains(&other);
                    self.meet(ctx, (h, d), (other, partner, partner_moved), report);
                    processed.insert(other);
                    intents.shift_remove(&other);
                }
            }
        }
        report.living = self.len();
    }

    /// Resolve a head-to-head meeting between mover `a` and `b`.
    fn meet(
        &mut self,
        ctx: &mut TickContext<'_>,
        (a, da): (AgentHandle, &Decision),
        (b, db, b_moved): (AgentHandle, Option<&Decision>, bool),
        report: &mut TickReport,
    ) {
        let b_step = if b_moved { None } else { db.map(|d| (&d.state, d.action)) };
        if self.len() >= self.config.max_population {
            report.refused += 1;
            info!(
                living = self.len(),
                cap = self.config.max_population,
                "reproduction refused: population full"
            );
            self.kill(ctx, a, Some((&da.state, da.action)), DeathCause::HeadOn(b), report);
            self.kill(ctx, b, b_step, DeathCause::HeadOn(a), report);
            return;
        }
        let child = ctx
            .reproduction
            .try_reproduce(ctx.world, &mut self.agents, a, b, ctx.now, ctx.rng);
        let Some(offspring) = child else {
            self.kill(ctx, a, Some((&da.state, da.action)), DeathCause::HeadOn(b), report);
            self.kill(ctx, b, b_step, DeathCause::HeadOn(a), report);
            return;
        };

        let policy = match (offspring.policy, ctx.policies.shared()) {
            (Some(p), _) => share(p),
            (None, Some(shared)) => Arc::clone(shared),
            (None, None) => Arc::clone(&self.agents[a].policy),
        };
        let spawned = self.spawn(
            ctx.world,
            &[offspring.position],
            offspring.heading,
            ctx.now,
            policy,
        );
        let child = match spawned {
            Ok(child) => child,
            Err(error) => {
                debug!(%error, "child placement failed");
                return;
            }
        };
        if let Some(c) = self.agents.get_mut(child) {
            c.generation = offspring.generation;
            c.hue = offspring.hue;
        }
        self.window.reproductions += 1;

        let reward = ctx.shaper.reward(&RewardEvent::Reproduced);
        self.set_pending(a, &da.state, da.action, reward);
        match b_step {
            Some((state, action)) => self.set_pending(b, state, action, reward),
            None => {
                if let Some(p) = self.agents.get_mut(b).and_then(|p| p.pending.as_mut()) {
                    p.reward += reward;
                }
            }
        }
        let seq = self.agents[child].seq;
        debug!(%seq, generation = offspring.generation, position = %offspring.position, "born");
        report.births.push(Birth {
            child,
            seq,
            parents: (a, b),
            position: offspring.position,
            generation: offspring.generation,
        });
    }

    /// Move `h`'s head to `to`, retracting the tail unless it ate.
    fn advance(&mut self, world: &mut GridWorld, h: AgentHandle, to: Position, ate: bool) {
        let Some(agent) = self.agents.get_mut(h) else {
            return;
        };
        if ate {
            agent.score += 1;
        } else if let Some(tail) = agent.body.pop_front() {
            world.vacate(tail, h);
        }
        agent.body.push_back(to);
        // The resolver only lets a move into a free cell or our own
        // retracted tail.
        let placed = world.occupy(to, h);
        debug_assert!(placed.is_ok(), "advance into an occupied cell: {placed:?}");
        if let Err(error) = placed {
            warn!(%error, seq = %agent.seq, "occupancy out of step with bodies");
        }
    }

    fn set_pending(&mut self, h: AgentHandle, state: &EncodedState, action: usize, reward: f32) {
        if let Some(agent) = self.agents.get_mut(h) {
            agent.pending = Some(PendingStep {
                state: state.clone(),
                action,
                reward,
            });
        }
    }

    /// Remove a dead agent: feed its terminal transition, close its
    /// episode, and fold its score into the statistics.
    fn kill(
        &mut self,
        ctx: &mut TickContext<'_>,
        h: AgentHandle,
        step: Option<(&EncodedState, usize)>,
        cause: DeathCause,
        report: &mut TickReport,
    ) {
        let Some(mut agent) = self.remove(ctx.world, h) else {
            return;
        };
        {
            let death = ctx.shaper.reward(&RewardEvent::Died(cause));
            // An agent that already moved this tick ends on that move.
            let last = match (step, agent.pending.take()) {
                (Some((state, action)), _) => Some((state.clone(), action, death)),
                (None, Some(p)) => Some((p.state, p.action, p.reward + death)),
                (None, None) => None,
            };
            let mut policy = write_policy(&agent.policy);
            if let Some((state, action, reward)) = last {
                let transition = Transition {
                    state,
                    action,
                    reward,
                    next: None,
                };
                policy.observe(transition, ctx.learn_rng);
            }
            policy.end_episode();
        }
        self.stats.record(agent.score);
        self.window.deaths += 1;
        ctx.session.record(EpisodeRecord {
            start: agent.birth,
            end: ctx.now,
            score: agent.score,
            length: agent.length(),
        });
        debug!(seq = %agent.seq, ?cause, score = agent.score, age = agent.age, "died");
        report.deaths.push(Death {
            agent: h,
            seq: agent.seq,
            cause,
            score: agent.score,
            length: agent.length(),
            age: agent.age,
        });
    }

    fn remove(&mut self, world: &mut GridWorld, h: AgentHandle) -> Option<Agent> {
        let agent = self.agents.remove(h)?;
        for &p in &agent.body {
            world.vacate(p, h);
        }
        self.order.retain(|&o| o != h);
        Some(agent)
    }

    // ── Metrics ─────────────────────────────────────────────────

    /// Recompute population metrics and start a new measurement window.
    pub fn metrics(&mut self, now: TickId) -> PopulationMetrics {
        let living: Vec<&Agent> = self.iter().map(|(_, a)| a).collect();
        let diversity = metrics::diversity(
            living.iter().copied(),
            self.config.action_history,
            DIVERSITY_SAMPLE,
        );

        let fitness: Vec<f64> = living.iter().map(|a| metrics::fitness(a)).collect();
        let w = self.window;
        let exposed = w.living_at_start as u64 + w.births;
        let fitness = FitnessMetrics {
            mean_fitness: mean(&fitness),
            best_fitness: fitness.iter().copied().fold(0.0, f64::max),
            survival_rate: if exposed == 0 {
                1.0
            } else {
                (1.0 - w.deaths as f64 / exposed as f64).max(0.0)
            },
            reproduction_rate: w.reproductions as f64 / now.since(w.start).max(1) as f64,
        };

        let mut seen: Vec<&SharedPolicy> = Vec::new();
        for a in &living {
            if !seen.iter().any(|p| Arc::ptr_eq(p, &a.policy)) {
                seen.push(&a.policy);
            }
        }
        let epsilons: Vec<f64> = seen.iter().map(|p| read_policy(p).epsilon()).collect();

        let out = PopulationMetrics {
            tick: now,
            living: living.len(),
            mean_epsilon: mean(&epsilons),
            diversity,
            fitness,
        };
        self.window = Window {
            start: now,
            living_at_start: self.len(),
            ..Window::default()
        };
        out
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn nearest_food_distance(world: &GridWorld, from: Position) -> Option<u32> {
    world.nearest_food(from).map(|f| world.manhattan(from, f))
}

fn random_free_cell(world: &GridWorld, rng: &mut dyn RngCore) -> Option<Position> {
    let cells = world.cell_count();
    for _ in 0..RANDOM_CELL_TRIES {
        let p = world.position(rng.random_range(0..cells));
        if world.is_free(p) {
            return Some(p);
        }
    }
    let free = world.free_cells();
    if free.is_empty() {
        None
    } else {
        Some(free[rng.random_range(0..free.len())])
    }
}

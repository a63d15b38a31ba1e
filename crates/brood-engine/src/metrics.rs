//! Score statistics, population metrics, and per-tick reports.
//!
//! Everything here is observational: nothing in the simulation reads
//! these values back to make decisions.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use brood_core::{AgentHandle, Position, SpawnSeq, TickId};

use crate::agent::{read_policy, Agent};
use crate::collision::DeathCause;

// ── ScoreStats ───────────────────────────────────────────────────

/// Running statistics over final scores of dead agents.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreStats {
    session_high: u64,
    all_time_high: u64,
    history: VecDeque<u64>,
    history_cap: usize,
    mean: f64,
    deaths: u64,
}

impl Default for ScoreStats {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ScoreStats {
    /// Empty statistics keeping the last `history_cap` scores.
    pub fn new(history_cap: usize) -> Self {
        Self {
            session_high: 0,
            all_time_high: 0,
            history: VecDeque::new(),
            history_cap: history_cap.max(1),
            mean: 0.0,
            deaths: 0,
        }
    }

    /// Raise the all-time high to at least `high`, e.g. from a loaded
    /// session log.
    pub fn seed_all_time_high(&mut self, high: u64) {
        self.all_time_high = self.all_time_high.max(high);
    }

    /// Fold in one final score.
    pub fn record(&mut self, score: u64) {
        self.deaths += 1;
        self.session_high = self.session_high.max(score);
        self.all_time_high = self.all_time_high.max(score);
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(score);
        self.mean = self.history.iter().sum::<u64>() as f64 / self.history.len() as f64;
    }

    /// Best score this run.
    pub fn session_high(&self) -> u64 {
        self.session_high
    }

    /// Best score ever, including earlier runs.
    pub fn all_time_high(&self) -> u64 {
        self.all_time_high
    }

    /// Mean of the trailing history.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Trailing scores, oldest first.
    pub fn history(&self) -> impl Iterator<Item = u64> + '_ {
        self.history.iter().copied()
    }

    /// Deaths recorded this run.
    pub fn deaths(&self) -> u64 {
        self.deaths
    }
}

// ── Population metrics ───────────────────────────────────────────

/// How different the living agents are from one another.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DiversityMetrics {
    /// Mean pairwise policy divergence over compared pairs.
    pub mean_divergence: f64,
    /// Pairs of distinct, comparable policies that were compared.
    pub compared_pairs: usize,
    /// Distinct trailing action sequences among agents with a full history.
    pub behavior_patterns: usize,
}

/// How well the population is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FitnessMetrics {
    /// Mean fitness of living agents. Fitness is food eaten plus
    /// children produced.
    pub mean_fitness: f64,
    /// Best fitness among living agents.
    pub best_fitness: f64,
    /// Fraction of agents alive at the window start or born during it
    /// that did not die during it.
    pub survival_rate: f64,
    /// Children per tick over the window.
    pub reproduction_rate: f64,
}

/// Periodic snapshot of population health.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PopulationMetrics {
    /// Tick the metrics were taken.
    pub tick: TickId,
    /// Living agents.
    pub living: usize,
    /// Mean exploration rate across distinct policies.
    pub mean_epsilon: f64,
    /// Diversity.
    pub diversity: DiversityMetrics,
    /// Fitness.
    pub fitness: FitnessMetrics,
}

/// Fitness of one agent.
pub fn fitness(agent: &Agent) -> f64 {
    agent.score as f64 + agent.children as f64
}

/// Diversity over `agents`, comparing at most the first `max_agents`
/// agents' policies pairwise.
pub fn diversity<'a>(
    agents: impl IntoIterator<Item = &'a Agent>,
    history_len: usize,
    max_agents: usize,
) -> DiversityMetrics {
    let agents: Vec<&Agent> = agents.into_iter().collect();
    let mut patterns: HashSet<Vec<u8>> = HashSet::new();
    for a in &agents {
        if history_len > 0 && a.recent_actions.len() == history_len {
            patterns.insert(a.recent_actions.iter().copied().collect());
        }
    }

    let sample = &agents[..agents.len().min(max_agents)];
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in sample.iter().enumerate() {
        for b in &sample[i + 1..] {
            if Arc::ptr_eq(&a.policy, &b.policy) {
                continue;
            }
            let pa = read_policy(&a.policy);
            let pb = read_policy(&b.policy);
            if let Some(d) = pa.divergence(&**pb) {
                total += d;
                pairs += 1;
            }
        }
    }
    DiversityMetrics {
        mean_divergence: if pairs == 0 { 0.0 } else { total / pairs as f64 },
        compared_pairs: pairs,
        behavior_patterns: patterns.len(),
    }
}

// ── TickReport ───────────────────────────────────────────────────

/// A child born this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Birth {
    /// The child.
    pub child: AgentHandle,
    /// The child's spawn order.
    pub seq: SpawnSeq,
    /// Its parents.
    pub parents: (AgentHandle, AgentHandle),
    /// Where it was placed.
    pub position: Position,
    /// Its generation.
    pub generation: u32,
}

/// An agent that died this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Death {
    /// The dead agent's former handle.
    pub agent: AgentHandle,
    /// Its spawn order.
    pub seq: SpawnSeq,
    /// What killed it.
    pub cause: DeathCause,
    /// Final score.
    pub score: u64,
    /// Final length.
    pub length: usize,
    /// Age at death.
    pub age: u64,
}

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// The tick that was executed.
    pub tick: TickId,
    /// Children born.
    pub births: Vec<Birth>,
    /// Agents that died.
    pub deaths: Vec<Death>,
    /// Food cells consumed.
    pub food_eaten: u32,
    /// Head-to-head meetings refused because the population was full.
    pub refused: u32,
    /// Fresh agents spawned to restore the minimum population.
    pub respawned: u32,
    /// Living agents after the tick.
    pub living: usize,
    /// Population metrics, on ticks where they were recomputed.
    pub metrics: Option<PopulationMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_is_empty() {
        let r = TickReport::default();
        assert_eq!(r.tick, TickId(0));
        assert!(r.births.is_empty());
        assert!(r.deaths.is_empty());
        assert_eq!(r.food_eaten, 0);
        assert_eq!(r.refused, 0);
        assert!(r.metrics.is_none());
    }

    #[test]
    fn score_stats_track_highs_and_mean() {
        let mut s = ScoreStats::new(3);
        s.seed_all_time_high(7);
        for score in [1, 5, 3, 9] {
            s.record(score);
        }
        assert_eq!(s.session_high(), 9);
        assert_eq!(s.all_time_high(), 9);
        assert_eq!(s.history().collect::<Vec<_>>(), vec![5, 3, 9]);
        assert!((s.mean() - 17.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.deaths(), 4);
    }

    #[test]
    fn seeded_high_survives_lower_scores() {
        let mut s = ScoreStats::default();
        s.seed_all_time_high(12);
        s.record(4);
        assert_eq!(s.session_high(), 4);
        assert_eq!(s.all_time_high(), 12);
    }
}

//! Run configuration, validation, and error types.
//!
//! [`SimConfig`] is the builder-input for [`Simulation::new`](crate::Simulation::new).
//! It is validated once at construction; a world never starts from an
//! invalid configuration.

use std::error::Error;
use std::fmt;
use std::path::Path;

use brood_core::ActionSpace;
use brood_obs::PerceptionConfig;
use brood_persist::PersistConfig;
use brood_policy::{MutationConfig, PolicyConfig};
use brood_space::{EdgeBehavior, GridWorld, SpaceError};
use serde::{Deserialize, Serialize};

use crate::reward::DistanceShaping;

// ── GridConfig ───────────────────────────────────────────────────

/// Grid dimensions and edge behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
    /// What happens at the boundary.
    pub edge: EdgeBehavior,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 24,
            height: 24,
            edge: EdgeBehavior::Absorb,
        }
    }
}

// ── FoodConfig ───────────────────────────────────────────────────

/// Food replenishment targets.
///
/// After every tick the world is topped up to
/// `max(min_count, ceil(per_agent * living))` food cells, limited by the
/// number of free cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodConfig {
    /// Food cells per living agent.
    pub per_agent: f64,
    /// Absolute minimum food count.
    pub min_count: usize,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            per_agent: 1.0,
            min_count: 1,
        }
    }
}

impl FoodConfig {
    /// Food count to maintain for `living` agents.
    pub fn target(&self, living: usize) -> usize {
        let ratio = (self.per_agent * living as f64).ceil();
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio as usize
        } else {
            0
        };
        ratio.max(self.min_count)
    }
}

// ── ReproductionConfig ───────────────────────────────────────────

/// Breeding eligibility and mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    /// Minimum age, in ticks, before an agent may breed.
    pub maturity_age: u64,
    /// Ticks that must pass between two reproductions of one agent.
    pub cooldown: u64,
    /// Mutation applied to a child's crossed policy.
    pub mutation: MutationConfig,
    /// Maximum random shift of a child's hue away from its parents'.
    pub hue_jitter: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            maturity_age: 40,
            cooldown: 80,
            mutation: MutationConfig::default(),
            hue_jitter: 0.05,
        }
    }
}

// ── PopulationConfig ─────────────────────────────────────────────

/// Where the policy of a respawned agent comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespawnMode {
    /// A freshly initialized policy.
    #[default]
    Fresh,
    /// A mutated copy of the best living agent's policy, falling back to
    /// a fresh one when nobody is alive.
    CloneElite,
}

/// Population size limits and policy sharing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Agents spawned when the world is created.
    pub initial: usize,
    /// Respawn tops the population up to this count after every tick.
    pub min_population: usize,
    /// Reproduction that would exceed this count is refused.
    pub max_population: usize,
    /// Respawn policy source.
    pub respawn: RespawnMode,
    /// All agents act through, and learn into, one policy.
    pub shared_brain: bool,
    /// Body length of spawned agents, where free cells allow.
    pub initial_length: usize,
    /// Trailing actions kept per agent for behavioral diversity.
    pub action_history: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial: 8,
            min_population: 4,
            max_population: 48,
            respawn: RespawnMode::Fresh,
            shared_brain: false,
            initial_length: 3,
            action_history: 8,
        }
    }
}

// ── SimConfig ────────────────────────────────────────────────────

/// Complete configuration of one run.
///
/// # Examples
///
/// ```
/// use brood_engine::SimConfig;
///
/// let config = SimConfig::default().with_grid(10, 10).with_seed(7);
/// assert!(config.validate().is_ok());
/// assert!(SimConfig::default().with_grid(0, 10).validate().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed. Every random draw in a run derives from it.
    pub seed: u64,
    /// Grid geometry.
    pub grid: GridConfig,
    /// Food replenishment.
    pub food: FoodConfig,
    /// State encoding.
    pub perception: PerceptionConfig,
    /// Interpretation of action indices.
    pub action_space: ActionSpace,
    /// Policy family and hyperparameters.
    pub policy: PolicyConfig,
    /// Breeding.
    pub reproduction: ReproductionConfig,
    /// Population limits.
    pub population: PopulationConfig,
    /// Reward magnitudes for the default shaper.
    pub reward: DistanceShaping,
    /// Decision workers. `0` computes decisions on the ticking thread.
    pub workers: usize,
    /// Ticks between population metric recomputations. `0` disables.
    pub metrics_interval: u64,
    /// Ticks between background saves. `0` disables.
    pub autosave_interval: u64,
    /// Where learned state is kept, if anywhere.
    pub persist: Option<PersistConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            grid: GridConfig::default(),
            food: FoodConfig::default(),
            perception: PerceptionConfig::default(),
            action_space: ActionSpace::default(),
            policy: PolicyConfig::default(),
            reproduction: ReproductionConfig::default(),
            population: PopulationConfig::default(),
            reward: DistanceShaping::default(),
            workers: 0,
            metrics_interval: 100,
            autosave_interval: 500,
            persist: None,
        }
    }
}

impl SimConfig {
    /// Set the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the grid dimensions.
    pub fn with_grid(mut self, width: u32, height: u32) -> Self {
        self.grid.width = width;
        self.grid.height = height;
        self
    }

    /// Set the edge behavior.
    pub fn with_edge(mut self, edge: EdgeBehavior) -> Self {
        self.grid.edge = edge;
        self
    }

    /// Set the initial population.
    pub fn with_agents(mut self, initial: usize) -> Self {
        self.population.initial = initial;
        self
    }

    /// Set the policy family.
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Set the decision worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the persistence location.
    pub fn with_persist(mut self, persist: PersistConfig) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Read a configuration from a JSON file. Missing keys take their
    /// defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] if the file cannot be read or parsed, or
    /// any validation error.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_err = |reason: String| ConfigError::Load {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let config: SimConfig = serde_json::from_str(&text).map_err(|e| load_err(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// The first violated invariant, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. The grid must be constructible.
        GridWorld::new(self.grid.width, self.grid.height, self.grid.edge)?;
        let cells = self.grid.width as usize * self.grid.height as usize;

        // 2. Population bounds must be ordered and fit the grid.
        let p = &self.population;
        if p.max_population == 0 {
            return Err(ConfigError::InvalidPopulation {
                reason: "max_population must be at least 1".into(),
            });
        }
        if p.min_population > p.max_population || p.initial > p.max_population {
            return Err(ConfigError::InvalidPopulation {
                reason: format!(
                    "initial ({}) and min_population ({}) must not exceed max_population ({})",
                    p.initial, p.min_population, p.max_population,
                ),
            });
        }
        if p.max_population > cells {
            return Err(ConfigError::InvalidPopulation {
                reason: format!(
                    "max_population ({}) exceeds the {cells} grid cells",
                    p.max_population
                ),
            });
        }
        if p.initial_length == 0 {
            return Err(ConfigError::InvalidPopulation {
                reason: "initial_length must be at least 1".into(),
            });
        }

        // 3. Food ratio must be finite and non-negative.
        if !self.food.per_agent.is_finite() || self.food.per_agent < 0.0 {
            return Err(ConfigError::InvalidFood {
                reason: format!("per_agent must be finite and >= 0, got {}", self.food.per_agent),
            });
        }

        // 4. Policy hyperparameters.
        validate_policy(&self.policy)?;

        // 5. Mutation parameters.
        let m = &self.reproduction.mutation;
        if !(0.0..=1.0).contains(&m.rate) || !(m.scale >= 0.0) || !(m.min_magnitude >= 0.0) {
            return Err(ConfigError::InvalidReproduction {
                reason: format!(
                    "mutation rate must be in [0, 1] and scales >= 0, got rate {} scale {} min {}",
                    m.rate, m.scale, m.min_magnitude,
                ),
            });
        }
        if !(self.reproduction.hue_jitter >= 0.0) {
            return Err(ConfigError::InvalidReproduction {
                reason: format!("hue_jitter must be >= 0, got {}", self.reproduction.hue_jitter),
            });
        }

        // 6. Reward magnitudes must be finite.
        self.reward.validate()?;

        // 7. Persistence limits.
        if let Some(persist) = &self.persist {
            if persist.session_raw_cap == 0 || persist.session_bucket_size == 0 {
                return Err(ConfigError::InvalidPersist {
                    reason: "session_raw_cap and session_bucket_size must be at least 1".into(),
                });
            }
        }
        Ok(())
    }
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    let invalid = |reason: String| Err(ConfigError::InvalidPolicy { reason });
    let unit = |v: f64| v > 0.0 && v <= 1.0;
    let eps = policy.epsilon();
    if !(0.0..=1.0).contains(&eps.start)
        || !(0.0..=1.0).contains(&eps.floor)
        || eps.floor > eps.start
        || !unit(eps.decay)
    {
        return invalid(format!(
            "epsilon needs 0 <= floor <= start <= 1 and decay in (0, 1], got start {} floor {} decay {}",
            eps.start, eps.floor, eps.decay,
        ));
    }
    match policy {
        PolicyConfig::Tabular(c) => {
            if !unit(c.learning_rate) || !(0.0..=1.0).contains(&c.discount) {
                return invalid(format!(
                    "tabular learning_rate must be in (0, 1] and discount in [0, 1], got {} and {}",
                    c.learning_rate, c.discount,
                ));
            }
        }
        PolicyConfig::Approximate(c) => {
            if c.hidden == 0 || c.batch_size == 0 || c.train_every == 0 {
                return invalid("hidden, batch_size and train_every must be at least 1".into());
            }
            if c.replay_capacity < c.batch_size {
                return invalid(format!(
                    "replay_capacity ({}) must hold at least one batch ({})",
                    c.replay_capacity, c.batch_size,
                ));
            }
            if !(c.learning_rate > 0.0 && c.learning_rate.is_finite())
                || !(0.0..1.0).contains(&c.momentum)
                || !(0.0..=1.0).contains(&c.discount)
                || !(c.grad_clip > 0.0)
                || !(c.tau > 0.0 && c.tau <= 1.0)
            {
                return invalid(format!(
                    "approximate hyperparameters out of range: lr {} momentum {} discount {} clip {} tau {}",
                    c.learning_rate, c.momentum, c.discount, c.grad_clip, c.tau,
                ));
            }
        }
    }
    Ok(())
}

// ── ConfigError ──────────────────────────────────────────────────

/// Errors detected during [`SimConfig::validate()`] or world construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The grid could not be built.
    Space(SpaceError),
    /// Population bounds are inconsistent.
    InvalidPopulation {
        /// Description of the violation.
        reason: String,
    },
    /// Food settings are invalid.
    InvalidFood {
        /// Description of the violation.
        reason: String,
    },
    /// Policy hyperparameters are out of range.
    InvalidPolicy {
        /// Description of the violation.
        reason: String,
    },
    /// Reproduction settings are out of range.
    InvalidReproduction {
        /// Description of the violation.
        reason: String,
    },
    /// Reward magnitudes are not finite.
    InvalidReward {
        /// Description of the violation.
        reason: String,
    },
    /// Persistence limits are invalid.
    InvalidPersist {
        /// Description of the violation.
        reason: String,
    },
    /// A configuration file could not be read or parsed.
    Load {
        /// File path.
        path: String,
        /// Underlying error message.
        reason: String,
    },
    /// A background thread could not be started.
    ThreadSpawnFailed {
        /// OS error description.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space(e) => write!(f, "grid: {e}"),
            Self::InvalidPopulation { reason } => write!(f, "invalid population: {reason}"),
            Self::InvalidFood { reason } => write!(f, "invalid food: {reason}"),
            Self::InvalidPolicy { reason } => write!(f, "invalid policy: {reason}"),
            Self::InvalidReproduction { reason } => write!(f, "invalid reproduction: {reason}"),
            Self::InvalidReward { reason } => write!(f, "invalid reward: {reason}"),
            Self::InvalidPersist { reason } => write!(f, "invalid persistence: {reason}"),
            Self::Load { path, reason } => write!(f, "cannot load config {path}: {reason}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Space(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SpaceError> for ConfigError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brood_policy::{ApproximateConfig, TabularConfig};

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_empty_grid_fails() {
        match SimConfig::default().with_grid(0, 5).validate() {
            Err(ConfigError::Space(SpaceError::EmptySpace)) => {}
            other => panic!("expected Space(EmptySpace), got {other:?}"),
        }
    }

    #[test]
    fn validate_inverted_population_fails() {
        let mut config = SimConfig::default();
        config.population.min_population = 10;
        config.population.max_population = 5;
        config.population.initial = 2;
        match config.validate() {
            Err(ConfigError::InvalidPopulation { .. }) => {}
            other => panic!("expected InvalidPopulation, got {other:?}"),
        }
    }

    #[test]
    fn validate_population_larger_than_grid_fails() {
        let mut config = SimConfig::default().with_grid(3, 3);
        config.population.initial = 1;
        config.population.min_population = 1;
        config.population.max_population = 10;
        match config.validate() {
            Err(ConfigError::InvalidPopulation { reason }) => assert!(reason.contains("9")),
            other => panic!("expected InvalidPopulation, got {other:?}"),
        }
    }

    #[test]
    fn validate_epsilon_floor_above_start_fails() {
        let mut tabular = TabularConfig::default();
        tabular.epsilon.floor = 0.9;
        tabular.epsilon.start = 0.1;
        let config = SimConfig::default().with_policy(PolicyConfig::Tabular(tabular));
        match config.validate() {
            Err(ConfigError::InvalidPolicy { .. }) => {}
            other => panic!("expected InvalidPolicy, got {other:?}"),
        }
    }

    #[test]
    fn validate_small_replay_fails() {
        let approx = ApproximateConfig {
            replay_capacity: 4,
            batch_size: 8,
            ..ApproximateConfig::default()
        };
        let config = SimConfig::default().with_policy(PolicyConfig::Approximate(approx));
        match config.validate() {
            Err(ConfigError::InvalidPolicy { reason }) => assert!(reason.contains("replay")),
            other => panic!("expected InvalidPolicy, got {other:?}"),
        }
    }

    #[test]
    fn validate_nan_reward_fails() {
        let mut config = SimConfig::default();
        config.reward.death = f32::NAN;
        match config.validate() {
            Err(ConfigError::InvalidReward { .. }) => {}
            other => panic!("expected InvalidReward, got {other:?}"),
        }
    }

    #[test]
    fn food_target_respects_minimum() {
        let food = FoodConfig {
            per_agent: 0.5,
            min_count: 2,
        };
        assert_eq!(food.target(0), 2);
        assert_eq!(food.target(3), 2);
        assert_eq!(food.target(7), 4);
    }

    #[test]
    fn json_fills_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{"seed": 9, "grid": {"width": 12}}"#).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.grid.width, 12);
        assert_eq!(config.grid.height, GridConfig::default().height);
        assert_eq!(config.population, PopulationConfig::default());
    }

    #[test]
    fn from_json_file_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        match SimConfig::from_json_file(&path) {
            Err(ConfigError::Load { path: p, .. }) => assert!(p.contains("missing.json")),
            other => panic!("expected Load, got {other:?}"),
        }
    }

    #[test]
    fn from_json_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let config = SimConfig::default().with_seed(42).with_grid(16, 12);
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(SimConfig::from_json_file(&path).unwrap(), config);
    }
}

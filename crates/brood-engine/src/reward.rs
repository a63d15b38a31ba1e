//! Reward shaping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collision::DeathCause;
use crate::config::ConfigError;

/// What happened to an agent on one tick, as seen by the reward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardEvent {
    /// Moved without eating. Distances are Manhattan distances from the
    /// head to the nearest food before and after the move.
    Moved {
        /// Distance before the move, if any food existed.
        before: Option<u32>,
        /// Distance after the move, if any food exists.
        after: Option<u32>,
    },
    /// Moved onto food.
    Ate,
    /// Ran into a clamping wall and stayed put.
    Blocked,
    /// Died.
    Died(DeathCause),
    /// Produced a child.
    Reproduced,
}

/// Maps a tick's [`RewardEvent`] to a scalar reward.
pub trait RewardShaper: Send + Sync + fmt::Debug {
    /// Reward for `event`.
    fn reward(&self, event: &RewardEvent) -> f32;
}

/// Default shaper: a small bonus for closing on food, a small penalty
/// for drifting away, a large bonus for eating and a large penalty for
/// dying.
///
/// # Examples
///
/// ```
/// use brood_engine::{DistanceShaping, RewardEvent, RewardShaper};
///
/// let shaping = DistanceShaping::default();
/// let closer = RewardEvent::Moved { before: Some(4), after: Some(3) };
/// assert!(shaping.reward(&closer) > 0.0);
/// assert!(shaping.reward(&RewardEvent::Ate) > shaping.reward(&closer));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceShaping {
    /// Reward for eating.
    pub food: f32,
    /// Reward for dying (negative).
    pub death: f32,
    /// Reward for a move that reduces the distance to food.
    pub closer: f32,
    /// Reward for a move that increases it.
    pub farther: f32,
    /// Added to every non-terminal step.
    pub step: f32,
    /// Reward for a blocked move.
    pub blocked: f32,
    /// Reward to each parent for producing a child.
    pub reproduce: f32,
}

impl Default for DistanceShaping {
    fn default() -> Self {
        Self {
            food: 10.0,
            death: -10.0,
            closer: 0.1,
            farther: -0.15,
            step: 0.0,
            blocked: -0.2,
            reproduce: 5.0,
        }
    }
}

impl DistanceShaping {
    /// Check every magnitude is finite.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidReward`] naming the first non-finite field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("food", self.food),
            ("death", self.death),
            ("closer", self.closer),
            ("farther", self.farther),
            ("step", self.step),
            ("blocked", self.blocked),
            ("reproduce", self.reproduce),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::InvalidReward {
                    reason: format!("{name} must be finite, got {value}"),
                });
            }
        }
        Ok(())
    }
}

impl RewardShaper for DistanceShaping {
    fn reward(&self, event: &RewardEvent) -> f32 {
        match *event {
            RewardEvent::Ate => self.food,
            RewardEvent::Died(_) => self.death,
            RewardEvent::Blocked => self.blocked + self.step,
            RewardEvent::Reproduced => self.reproduce,
            RewardEvent::Moved { before, after } => {
                let shaping = match (before, after) {
                    (Some(b), Some(a)) if a < b => self.closer,
                    (Some(b), Some(a)) if a > b => self.farther,
                    _ => 0.0,
                };
                shaping + self.step
            }
        }
    }
}

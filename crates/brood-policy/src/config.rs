//! Policy hyperparameters.

use crate::approximate::ApproximateQPolicy;
use crate::document::PolicyDocument;
use crate::error::PolicyError;
use crate::policy::Policy;
use crate::tabular::TabularQPolicy;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Exploration schedule parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonConfig {
    /// Initial exploration rate.
    pub start: f64,
    /// Multiplicative decay applied per completed episode.
    pub decay: f64,
    /// Exploration never drops below this.
    pub floor: f64,
}

impl Default for EpsilonConfig {
    fn default() -> Self {
        Self {
            start: 0.3,
            decay: 0.9985,
            floor: 0.05,
        }
    }
}

/// Hyperparameters for [`TabularQPolicy`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    /// Learning rate α.
    pub learning_rate: f64,
    /// Discount γ.
    pub discount: f64,
    /// Exploration schedule.
    pub epsilon: EpsilonConfig,
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.4,
            discount: 0.95,
            epsilon: EpsilonConfig::default(),
        }
    }
}

/// Hyperparameters for [`ApproximateQPolicy`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproximateConfig {
    /// Hidden layer width.
    pub hidden: usize,
    /// SGD learning rate.
    pub learning_rate: f32,
    /// SGD momentum coefficient.
    pub momentum: f32,
    /// Discount γ.
    pub discount: f32,
    /// Per-component gradient clip magnitude.
    pub grad_clip: f32,
    /// Polyak coefficient τ for the target network.
    pub tau: f32,
    /// Minibatch size.
    pub batch_size: usize,
    /// Replay buffer capacity.
    pub replay_capacity: usize,
    /// Train once every this many observed transitions.
    pub train_every: usize,
    /// Exploration schedule.
    pub epsilon: EpsilonConfig,
}

impl Default for ApproximateConfig {
    fn default() -> Self {
        Self {
            hidden: 32,
            learning_rate: 0.005,
            momentum: 0.9,
            discount: 0.95,
            grad_clip: 1.0,
            tau: 0.01,
            batch_size: 32,
            replay_capacity: 10_000,
            train_every: 4,
            epsilon: EpsilonConfig::default(),
        }
    }
}

/// Which policy family a run uses, with its hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Tabular Q-learning.
    Tabular(TabularConfig),
    /// Function approximation with replay.
    Approximate(ApproximateConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Tabular(TabularConfig::default())
    }
}

impl PolicyConfig {
    /// Exploration schedule of the configured family.
    pub fn epsilon(&self) -> &EpsilonConfig {
        match self {
            PolicyConfig::Tabular(c) => &c.epsilon,
            PolicyConfig::Approximate(c) => &c.epsilon,
        }
    }

    /// Build a fresh policy.
    pub fn build(
        &self,
        input_width: usize,
        action_count: usize,
        rng: &mut dyn RngCore,
    ) -> Box<dyn Policy> {
        match self {
            PolicyConfig::Tabular(c) => Box::new(TabularQPolicy::new(c.clone(), action_count)),
            PolicyConfig::Approximate(c) => Box::new(ApproximateQPolicy::new(
                c.clone(),
                input_width,
                action_count,
                rng,
            )),
        }
    }

    /// Restore a policy from a persisted document.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] if the document's version, fingerprint,
    /// family, or shapes do not fit this configuration.
    pub fn restore(
        &self,
        doc: PolicyDocument,
        fingerprint: u64,
        input_width: usize,
        action_count: usize,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        doc.check_header(fingerprint)?;
        match self {
            PolicyConfig::Tabular(c) => Ok(Box::new(TabularQPolicy::from_document(
                c.clone(),
                action_count,
                doc,
            )?)),
            PolicyConfig::Approximate(c) => Ok(Box::new(ApproximateQPolicy::from_document(
                c.clone(),
                input_width,
                action_count,
                doc,
            )?)),
        }
    }
}

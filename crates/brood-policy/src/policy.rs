//! The policy abstraction shared by every learner.

use crate::breed::MutationConfig;
use crate::document::PolicyDocument;
use crate::error::PolicyError;
use crate::replay::Transition;
use brood_obs::EncodedState;
use rand::RngCore;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Identifies a policy family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PolicyKind(&'static str);

impl PolicyKind {
    /// Tabular Q-learning.
    pub const TABULAR: PolicyKind = PolicyKind::new("q.tabular");
    /// Function approximation with replay.
    pub const APPROXIMATE: PolicyKind = PolicyKind::new("q.approximate");

    /// Construct a kind from a static identifier.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The identifier.
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A policy that one or more agents act through.
///
/// In shared-brain runs many agents hold the same handle.
pub type SharedPolicy = Arc<RwLock<Box<dyn Policy>>>;

/// Wrap a policy for sharing.
pub fn share(policy: Box<dyn Policy>) -> SharedPolicy {
    Arc::new(RwLock::new(policy))
}

/// An action-value learner.
///
/// Action selection takes `&self` so decisions for many agents can be
/// computed concurrently from one snapshot; all learning goes through
/// `&mut self` and is applied sequentially.
pub trait Policy: Send + Sync + fmt::Debug {
    /// Family identifier.
    fn kind(&self) -> PolicyKind;

    /// Number of discrete actions.
    fn action_count(&self) -> usize;

    /// ε-greedy action for `state`.
    fn select_action(&self, state: &EncodedState, rng: &mut dyn RngCore) -> usize;

    /// Greedy action for `state`, lowest index on ties.
    fn greedy_action(&self, state: &EncodedState) -> usize;

    /// Feed one step of experience.
    fn observe(&mut self, transition: Transition, rng: &mut dyn RngCore);

    /// Record a completed episode and decay exploration.
    fn end_episode(&mut self);

    /// Current exploration rate.
    fn epsilon(&self) -> f64;

    /// Completed episodes.
    fn episodes(&self) -> u64;

    /// Snapshot learned state for persistence.
    fn to_document(&self, fingerprint: u64) -> PolicyDocument;

    /// Behavioral distance to another policy in `[0, ∞)`, or `None` if
    /// the two are not comparable.
    fn divergence(&self, other: &dyn Policy) -> Option<f64>;

    /// Cross with `other` and mutate the result.
    ///
    /// # Errors
    ///
    /// [`PolicyError::KindMismatch`] if `other` is a different family.
    fn breed(
        &self,
        other: &dyn Policy,
        mutation: &MutationConfig,
        rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError>;

    /// A mutated copy of this policy.
    fn mutated(&self, mutation: &MutationConfig, rng: &mut dyn RngCore) -> Box<dyn Policy>;

    /// Downcast support for breeding.
    fn as_any(&self) -> &dyn Any;
}

/// Index of the largest value, lowest index on ties. NaN never wins.
pub fn greedy_index<T>(values: &[T]) -> usize
where
    T: Copy + PartialOrd,
{
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] || values[best].partial_cmp(&values[best]).is_none() {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_ties_go_low() {
        assert_eq!(greedy_index(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(greedy_index(&[0.0f64, 0.0, 0.0]), 0);
        assert_eq!(greedy_index(&[-1.0f32, -2.0, -0.5, -0.5]), 2);
    }

    #[test]
    fn greedy_skips_nan() {
        assert_eq!(greedy_index(&[f64::NAN, 0.5, 0.1]), 1);
        assert_eq!(greedy_index(&[0.2, f64::NAN, 0.1]), 0);
    }

    #[test]
    fn kind_display() {
        assert_eq!(PolicyKind::TABULAR.to_string(), "q.tabular");
    }
}

//! Tabular Q-learning.

use crate::breed::{cross_value, mutate_value, MutationConfig};
use crate::config::TabularConfig;
use crate::document::{PolicyBody, PolicyDocument, DOCUMENT_VERSION};
use crate::epsilon::EpsilonSchedule;
use crate::error::PolicyError;
use crate::policy::{greedy_index, Policy, PolicyKind};
use crate::replay::Transition;
use brood_obs::{EncodedState, StateKey};
use indexmap::IndexMap;
use rand::{Rng, RngCore};
use std::any::Any;

/// A state-key to action-value table with ε-greedy selection.
///
/// Unknown states read as all-zero vectors and are inserted on their
/// first learning update. Table iteration follows first-seen order.
#[derive(Clone, Debug)]
pub struct TabularQPolicy {
    config: TabularConfig,
    action_count: usize,
    table: IndexMap<StateKey, Vec<f64>>,
    epsilon: EpsilonSchedule,
    episodes: u64,
}

impl TabularQPolicy {
    /// An empty table.
    pub fn new(config: TabularConfig, action_count: usize) -> Self {
        let epsilon = EpsilonSchedule::new(&config.epsilon);
        Self {
            config,
            action_count: action_count.max(1),
            table: IndexMap::new(),
            epsilon,
            episodes: 0,
        }
    }

    /// Restore from a document whose header has already been checked.
    ///
    /// # Errors
    ///
    /// [`PolicyError::KindMismatch`] for a non-tabular body, or
    /// [`PolicyError::ShapeMismatch`] if any vector has the wrong length.
    pub fn from_document(
        config: TabularConfig,
        action_count: usize,
        doc: PolicyDocument,
    ) -> Result<Self, PolicyError> {
        let PolicyBody::Tabular { table } = doc.body else {
            return Err(PolicyError::KindMismatch {
                expected: PolicyKind::TABULAR.as_str(),
                got: PolicyKind::APPROXIMATE.as_str(),
            });
        };
        if doc.action_count != action_count {
            return Err(PolicyError::ShapeMismatch {
                name: "action_count".into(),
                expected: format!("{action_count} actions, found {}", doc.action_count),
            });
        }
        if let Some((key, _)) = table.iter().find(|(_, v)| v.len() != action_count) {
            return Err(PolicyError::ShapeMismatch {
                name: key.to_string(),
                expected: format!("{action_count} values"),
            });
        }
        let mut policy = Self::new(config, action_count);
        policy.table = table;
        policy.epsilon.set(doc.epsilon);
        policy.episodes = doc.episodes;
        Ok(policy)
    }

    /// Stored values for `key`, if the state has been learned.
    pub fn values(&self, key: StateKey) -> Option<&[f64]> {
        self.table.get(&key).map(Vec::as_slice)
    }

    /// Number of known states.
    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    /// Known state keys in first-seen order.
    pub fn states(&self) -> impl Iterator<Item = StateKey> + '_ {
        self.table.keys().copied()
    }

    /// Apply one Q-learning update.
    ///
    /// `next` of `None` marks a terminal transition, whose target is the
    /// reward alone.
    pub fn learn(&mut self, state: StateKey, action: usize, reward: f64, next: Option<StateKey>) {
        if action >= self.action_count {
            return;
        }
        let future = match next {
            Some(n) => {
                let row = self.row_mut(n);
                row.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
            None => 0.0,
        };
        let target = reward + self.config.discount * future;
        let alpha = self.config.learning_rate;
        let q = &mut self.row_mut(state)[action];
        *q += alpha * (target - *q);
    }

    fn row_mut(&mut self, key: StateKey) -> &mut Vec<f64> {
        let n = self.action_count;
        self.table.entry(key).or_insert_with(|| vec![0.0; n])
    }

    fn greedy_for(&self, key: StateKey) -> usize {
        self.table.get(&key).map_or(0, |v| greedy_index(v))
    }

    /// Cross two tables.
    ///
    /// The child knows the union of both parents' states. Values of a
    /// state both know go through [`cross_value`], so averaged values
    /// carry `mutation` noise. A state only one parent knows is copied
    /// from that parent unperturbed.
    pub fn crossover(
        &self,
        other: &TabularQPolicy,
        mutation: &MutationConfig,
        rng: &mut dyn RngCore,
    ) -> TabularQPolicy {
        let mut child = TabularQPolicy::new(self.config.clone(), self.action_count);
        for (key, a) in &self.table {
            let row = match other.table.get(key) {
                Some(b) => a
                    .iter()
                    .zip(b)
                    .map(|(&x, &y)| cross_value(x, y, mutation, rng))
                    .collect(),
                None => a.clone(),
            };
            child.table.insert(*key, row);
        }
        for (key, b) in &other.table {
            if !child.table.contains_key(key) {
                child.table.insert(*key, b.clone());
            }
        }
        child
            .epsilon
            .set((self.epsilon.value() + other.epsilon.value()) / 2.0);
        child
    }

    fn mutate(&mut self, mutation: &MutationConfig, rng: &mut dyn RngCore) {
        for row in self.table.values_mut() {
            for v in row.iter_mut() {
                *v = mutate_value(*v, mutation, rng);
            }
        }
    }
}

impl Policy for TabularQPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::TABULAR
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn select_action(&self, state: &EncodedState, rng: &mut dyn RngCore) -> usize {
        if rng.random::<f64>() < self.epsilon.value() {
            rng.random_range(0..self.action_count)
        } else {
            self.greedy_for(state.key)
        }
    }

    fn greedy_action(&self, state: &EncodedState) -> usize {
        self.greedy_for(state.key)
    }

    fn observe(&mut self, transition: Transition, _rng: &mut dyn RngCore) {
        self.learn(
            transition.state.key,
            transition.action,
            transition.reward as f64,
            transition.next.map(|n| n.key),
        );
    }

    fn end_episode(&mut self) {
        self.episodes += 1;
        self.epsilon.decay();
    }

    fn epsilon(&self) -> f64 {
        self.epsilon.value()
    }

    fn episodes(&self) -> u64 {
        self.episodes
    }

    fn to_document(&self, fingerprint: u64) -> PolicyDocument {
        PolicyDocument {
            version: DOCUMENT_VERSION,
            fingerprint,
            action_count: self.action_count,
            epsilon: self.epsilon.value(),
            episodes: self.episodes,
            body: PolicyBody::Tabular {
                table: self.table.clone(),
            },
        }
    }

    /// Fraction of jointly-known states on which the greedy actions differ.
    fn divergence(&self, other: &dyn Policy) -> Option<f64> {
        let other = other.as_any().downcast_ref::<TabularQPolicy>()?;
        let mut total = 0usize;
        let mut differ = 0usize;
        for key in self.table.keys().chain(other.table.keys().filter(|k| !self.table.contains_key(*k))) {
            total += 1;
            if self.greedy_for(*key) != other.greedy_for(*key) {
                differ += 1;
            }
        }
        Some(if total == 0 {
            0.0
        } else {
            differ as f64 / total as f64
        })
    }

    fn breed(
        &self,
        other: &dyn Policy,
        mutation: &MutationConfig,
        rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        let other = other
            .as_any()
            .downcast_ref::<TabularQPolicy>()
            .ok_or(PolicyError::KindMismatch {
                expected: PolicyKind::TABULAR.as_str(),
                got: other.kind().as_str(),
            })?;
        Ok(Box::new(self.crossover(other, mutation, rng)))
    }

    fn mutated(&self, mutation: &MutationConfig, rng: &mut dyn RngCore) -> Box<dyn Policy> {
        let mut child = self.clone();
        child.episodes = 0;
        child.mutate(mutation, rng);
        Box::new(child)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

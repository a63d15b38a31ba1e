//! Deterministic policy fixtures.
//!
//! Three stand-ins for engine testing:
//!
//! - [`FixedPolicy`]: always the same action; counts what it is fed.
//! - [`ScriptedPolicy`]: replays a list of actions, cycling.
//! - [`PanickingPolicy`]: panics when asked to decide on a decision
//!   worker thread, and acts like [`FixedPolicy`] elsewhere.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

use brood_obs::EncodedState;
use brood_policy::{
    MutationConfig, Policy, PolicyBody, PolicyDocument, PolicyError, PolicyKind, Transition,
    DOCUMENT_VERSION,
};
use indexmap::IndexMap;
use rand::RngCore;

/// Thread name prefix of the engine's decision workers.
pub const DECISION_THREAD_PREFIX: &str = "brood-decide";

fn empty_document(fingerprint: u64, action_count: usize, episodes: u64) -> PolicyDocument {
    PolicyDocument {
        version: DOCUMENT_VERSION,
        fingerprint,
        action_count,
        epsilon: 0.0,
        episodes,
        body: PolicyBody::Tabular {
            table: IndexMap::new(),
        },
    }
}

fn same_kind<T: 'static>(me: PolicyKind, other: &dyn Policy) -> Result<(), PolicyError> {
    if other.as_any().is::<T>() {
        Ok(())
    } else {
        Err(PolicyError::KindMismatch {
            expected: me.as_str(),
            got: other.kind().as_str(),
        })
    }
}

// ── FixedPolicy ─────────────────────────────────────────────────

/// Always chooses `action`. Records every transition it observes.
#[derive(Clone, Debug)]
pub struct FixedPolicy {
    pub action: usize,
    pub action_count: usize,
    pub observed: Vec<Transition>,
    pub episodes: u64,
}

impl FixedPolicy {
    pub const KIND: PolicyKind = PolicyKind::new("test.fixed");

    pub fn new(action: usize, action_count: usize) -> Self {
        Self {
            action,
            action_count,
            observed: Vec::new(),
            episodes: 0,
        }
    }

    /// Relative "straight ahead" over three actions.
    pub fn straight() -> Self {
        Self::new(1, 3)
    }

    /// Transitions observed with no next state.
    pub fn terminals(&self) -> usize {
        self.observed.iter().filter(|t| t.next.is_none()).count()
    }
}

impl Policy for FixedPolicy {
    fn kind(&self) -> PolicyKind {
        Self::KIND
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn select_action(&self, _state: &EncodedState, _rng: &mut dyn RngCore) -> usize {
        self.action
    }

    fn greedy_action(&self, _state: &EncodedState) -> usize {
        self.action
    }

    fn observe(&mut self, transition: Transition, _rng: &mut dyn RngCore) {
        self.observed.push(transition);
    }

    fn end_episode(&mut self) {
        self.episodes += 1;
    }

    fn epsilon(&self) -> f64 {
        0.0
    }

    fn episodes(&self) -> u64 {
        self.episodes
    }

    fn to_document(&self, fingerprint: u64) -> PolicyDocument {
        empty_document(fingerprint, self.action_count, self.episodes)
    }

    fn divergence(&self, other: &dyn Policy) -> Option<f64> {
        let other = other.as_any().downcast_ref::<FixedPolicy>()?;
        Some(if other.action == self.action { 0.0 } else { 1.0 })
    }

    fn breed(
        &self,
        other: &dyn Policy,
        _mutation: &MutationConfig,
        _rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        same_kind::<FixedPolicy>(Self::KIND, other)?;
        Ok(Box::new(FixedPolicy::new(self.action, self.action_count)))
    }

    fn mutated(&self, _mutation: &MutationConfig, _rng: &mut dyn RngCore) -> Box<dyn Policy> {
        Box::new(FixedPolicy::new(self.action, self.action_count))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── ScriptedPolicy ──────────────────────────────────────────────

/// Replays `script`, one action per decision, wrapping at the end.
#[derive(Debug)]
pub struct ScriptedPolicy {
    pub script: Vec<usize>,
    pub action_count: usize,
    cursor: AtomicUsize,
}

impl ScriptedPolicy {
    pub const KIND: PolicyKind = PolicyKind::new("test.scripted");

    pub fn new(script: Vec<usize>, action_count: usize) -> Self {
        assert!(!script.is_empty(), "script must not be empty");
        Self {
            script,
            action_count,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Decisions made so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl Clone for ScriptedPolicy {
    fn clone(&self) -> Self {
        Self::new(self.script.clone(), self.action_count)
    }
}

impl Policy for ScriptedPolicy {
    fn kind(&self) -> PolicyKind {
        Self::KIND
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn select_action(&self, _state: &EncodedState, _rng: &mut dyn RngCore) -> usize {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.script[i % self.script.len()]
    }

    fn greedy_action(&self, _state: &EncodedState) -> usize {
        self.script[self.calls() % self.script.len()]
    }

    fn observe(&mut self, _transition: Transition, _rng: &mut dyn RngCore) {}

    fn end_episode(&mut self) {}

    fn epsilon(&self) -> f64 {
        0.0
    }

    fn episodes(&self) -> u64 {
        0
    }

    fn to_document(&self, fingerprint: u64) -> PolicyDocument {
        empty_document(fingerprint, self.action_count, 0)
    }

    fn divergence(&self, _other: &dyn Policy) -> Option<f64> {
        None
    }

    fn breed(
        &self,
        other: &dyn Policy,
        _mutation: &MutationConfig,
        _rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        same_kind::<ScriptedPolicy>(Self::KIND, other)?;
        Ok(Box::new(self.clone()))
    }

    fn mutated(&self, _mutation: &MutationConfig, _rng: &mut dyn RngCore) -> Box<dyn Policy> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── PanickingPolicy ─────────────────────────────────────────────

/// Panics on decision worker threads; chooses `action` elsewhere.
#[derive(Clone, Debug)]
pub struct PanickingPolicy {
    pub action: usize,
    pub action_count: usize,
}

impl PanickingPolicy {
    pub const KIND: PolicyKind = PolicyKind::new("test.panicking");

    pub fn new(action: usize, action_count: usize) -> Self {
        Self {
            action,
            action_count,
        }
    }
}

impl Policy for PanickingPolicy {
    fn kind(&self) -> PolicyKind {
        Self::KIND
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn select_action(&self, _state: &EncodedState, _rng: &mut dyn RngCore) -> usize {
        let thread = std::thread::current();
        if thread
            .name()
            .is_some_and(|n| n.starts_with(DECISION_THREAD_PREFIX))
        {
            panic!("PanickingPolicy asked to decide on {:?}", thread.name());
        }
        self.action
    }

    fn greedy_action(&self, _state: &EncodedState) -> usize {
        self.action
    }

    fn observe(&mut self, _transition: Transition, _rng: &mut dyn RngCore) {}

    fn end_episode(&mut self) {}

    fn epsilon(&self) -> f64 {
        0.0
    }

    fn episodes(&self) -> u64 {
        0
    }

    fn to_document(&self, fingerprint: u64) -> PolicyDocument {
        empty_document(fingerprint, self.action_count, 0)
    }

    fn divergence(&self, _other: &dyn Policy) -> Option<f64> {
        None
    }

    fn breed(
        &self,
        other: &dyn Policy,
        _mutation: &MutationConfig,
        _rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        same_kind::<PanickingPolicy>(Self::KIND, other)?;
        Ok(Box::new(self.clone()))
    }

    fn mutated(&self, _mutation: &MutationConfig, _rng: &mut dyn RngCore) -> Box<dyn Policy> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brood_obs::StateKey;

    struct Zero;
    impl RngCore for Zero {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn state() -> EncodedState {
        EncodedState {
            key: StateKey(0),
            features: Default::default(),
        }
    }

    #[test]
    fn scripted_cycles() {
        let p = ScriptedPolicy::new(vec![0, 2], 3);
        let picks: Vec<usize> = (0..5).map(|_| p.select_action(&state(), &mut Zero)).collect();
        assert_eq!(picks, vec![0, 2, 0, 2, 0]);
        assert_eq!(p.calls(), 5);
    }

    #[test]
    fn fixed_counts_terminals() {
        let mut p = FixedPolicy::straight();
        p.observe(
            Transition {
                state: state(),
                action: 1,
                reward: -1.0,
                next: None,
            },
            &mut Zero,
        );
        assert_eq!(p.terminals(), 1);
    }

    #[test]
    fn mixed_kinds_do_not_breed() {
        let a = FixedPolicy::straight();
        let b = PanickingPolicy::new(1, 3);
        assert!(a.breed(&b, &MutationConfig::none(), &mut Zero).is_err());
    }

    #[test]
    fn panicking_policy_is_calm_off_workers() {
        assert_eq!(PanickingPolicy::new(2, 3).select_action(&state(), &mut Zero), 2);
    }
}

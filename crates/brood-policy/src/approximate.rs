//! Q-learning with function approximation and experience replay.

use crate::breed::{cross_value, mutate_value, MutationConfig};
use crate::config::ApproximateConfig;
use crate::document::{PolicyBody, PolicyDocument, DOCUMENT_VERSION};
use crate::epsilon::EpsilonSchedule;
use crate::error::PolicyError;
use crate::mlp::{Mlp, SgdMomentum};
use crate::policy::{greedy_index, Policy, PolicyKind};
use crate::replay::{ReplayBuffer, Transition};
use brood_obs::EncodedState;
use rand::{Rng, RngCore};
use std::any::Any;
use tracing::debug;

/// An online network, a Polyak-averaged target network, and a replay
/// buffer.
///
/// Every `train_every` observed transitions, once the buffer holds at
/// least one minibatch, a batch is sampled uniformly with replacement
/// and the online network takes one clipped SGD-with-momentum step on
/// the mean-squared TD error. The target network then moves toward the
/// online network by τ.
#[derive(Clone, Debug)]
pub struct ApproximateQPolicy {
    config: ApproximateConfig,
    action_count: usize,
    online: Mlp,
    target: Mlp,
    optimizer: SgdMomentum,
    replay: ReplayBuffer<Transition>,
    epsilon: EpsilonSchedule,
    episodes: u64,
    observed: u64,
    train_steps: u64,
    last_loss: Option<f32>,
}

impl ApproximateQPolicy {
    /// A freshly initialized network.
    pub fn new(
        config: ApproximateConfig,
        input_width: usize,
        action_count: usize,
        rng: &mut dyn RngCore,
    ) -> Self {
        let action_count = action_count.max(1);
        let online = Mlp::new(input_width, config.hidden.max(1), action_count, rng);
        Self::assemble(config, action_count, online.clone(), online)
    }

    fn assemble(config: ApproximateConfig, action_count: usize, online: Mlp, target: Mlp) -> Self {
        Self {
            optimizer: SgdMomentum::new(config.learning_rate, config.momentum, config.grad_clip),
            replay: ReplayBuffer::new(config.replay_capacity),
            epsilon: EpsilonSchedule::new(&config.epsilon),
            config,
            action_count,
            online,
            target,
            episodes: 0,
            observed: 0,
            train_steps: 0,
            last_loss: None,
        }
    }

    /// Restore from a document whose header has already been checked.
    ///
    /// The replay buffer is not persisted and starts empty.
    ///
    /// # Errors
    ///
    /// [`PolicyError::KindMismatch`] for a non-approximate body, or
    /// [`PolicyError::ShapeMismatch`] if the tensors do not fit.
    pub fn from_document(
        config: ApproximateConfig,
        input_width: usize,
        action_count: usize,
        doc: PolicyDocument,
    ) -> Result<Self, PolicyError> {
        let PolicyBody::Approximate { online, target } = doc.body else {
            return Err(PolicyError::KindMismatch {
                expected: PolicyKind::APPROXIMATE.as_str(),
                got: PolicyKind::TABULAR.as_str(),
            });
        };
        if doc.action_count != action_count {
            return Err(PolicyError::ShapeMismatch {
                name: "action_count".into(),
                expected: format!("{action_count} actions, found {}", doc.action_count),
            });
        }
        let online = Mlp::from_tensors(&online, input_width, action_count)?;
        let target = Mlp::from_tensors(&target, input_width, action_count)?;
        if online.hidden() != target.hidden() {
            return Err(PolicyError::ShapeMismatch {
                name: "target".into(),
                expected: format!("hidden width {}", online.hidden()),
            });
        }
        let mut policy = Self::assemble(config, action_count, online, target);
        policy.epsilon.set(doc.epsilon);
        policy.episodes = doc.episodes;
        Ok(policy)
    }

    /// The online network.
    pub fn online(&self) -> &Mlp {
        &self.online
    }

    /// The target network.
    pub fn target(&self) -> &Mlp {
        &self.target
    }

    /// The replay buffer.
    pub fn replay(&self) -> &ReplayBuffer<Transition> {
        &self.replay
    }

    /// Number of optimizer steps taken.
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    /// Loss of the most recent training step.
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    /// Run one training step if the buffer holds a full minibatch.
    ///
    /// Returns the batch loss when a step was taken.
    pub fn learn(&mut self, rng: &mut dyn RngCore) -> Option<f32> {
        let batch_size = self.config.batch_size.max(1);
        if self.replay.len() < batch_size {
            return None;
        }
        let gamma = self.config.discount;
        let mut targets = Vec::with_capacity(batch_size);
        for t in self.replay.sample(batch_size, rng) {
            let future = match &t.next {
                None => 0.0,
                Some(next) => match self.target.forward(&next.features) {
                    Ok(q) => q.into_iter().fold(f32::NEG_INFINITY, f32::max),
                    Err(_) => continue,
                },
            };
            targets.push((&t.state.features[..], t.action, t.reward + gamma * future));
        }
        let (grads, loss) = self.online.gradients(&targets);
        if !loss.is_finite() {
            debug!(loss, "skipping non-finite training step");
            return None;
        }
        self.optimizer.step(&mut self.online, &grads);
        self.target.polyak_from(&self.online, self.config.tau);
        self.train_steps += 1;
        self.last_loss = Some(loss);
        Some(loss)
    }

    /// Cross two networks without mutation.
    ///
    /// # Errors
    ///
    /// [`PolicyError::ShapeMismatch`] if the networks differ in shape.
    pub fn crossover(
        &self,
        other: &ApproximateQPolicy,
        rng: &mut dyn RngCore,
    ) -> Result<ApproximateQPolicy, PolicyError> {
        let mut online = self.online.clone();
        for (name_idx, (t, o)) in online
            .params_mut()
            .iter_mut()
            .zip(other.online.params())
            .enumerate()
        {
            if t.shape != o.shape {
                return Err(PolicyError::ShapeMismatch {
                    name: crate::mlp::PARAM_NAMES[name_idx].to_string(),
                    expected: format!("{:?}", t.shape),
                });
            }
            for (a, &b) in t.data.iter_mut().zip(&o.data) {
                *a = cross_value(*a as f64, b as f64, &MutationConfig::none(), rng) as f32;
            }
        }
        let mut child = Self::assemble(self.config.clone(), self.action_count, online.clone(), online);
        child
            .epsilon
            .set((self.epsilon.value() + other.epsilon.value()) / 2.0);
        Ok(child)
    }

    fn mutate(&mut self, mutation: &MutationConfig, rng: &mut dyn RngCore) {
        for t in self.online.params_mut() {
            for v in &mut t.data {
                *v = mutate_value(*v as f64, mutation, rng) as f32;
            }
        }
        self.target = self.online.clone();
        self.optimizer.reset();
    }

    fn random_action(&self, rng: &mut dyn RngCore) -> usize {
        rng.random_range(0..self.action_count)
    }
}

impl Policy for ApproximateQPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::APPROXIMATE
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn select_action(&self, state: &EncodedState, rng: &mut dyn RngCore) -> usize {
        if rng.random::<f64>() < self.epsilon.value() {
            return self.random_action(rng);
        }
        match self.online.forward(&state.features) {
            Ok(q) => greedy_index(&q),
            Err(error) => {
                debug!(%error, "inference failed, acting randomly");
                self.random_action(rng)
            }
        }
    }

    fn greedy_action(&self, state: &EncodedState) -> usize {
        self.online
            .forward(&state.features)
            .map_or(0, |q| greedy_index(&q))
    }

    fn observe(&mut self, transition: Transition, rng: &mut dyn RngCore) {
        self.replay.push(transition);
        self.observed += 1;
        let every = self.config.train_every.max(1) as u64;
        if self.observed % every == 0 {
            self.learn(rng);
        }
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
            body: PolicyBody::Approximate {
                online: self.online.to_tensors(),
                target: self.target.to_tensors(),
            },
        }
    }

    /// Mean absolute difference of online parameters.
    fn divergence(&self, other: &dyn Policy) -> Option<f64> {
        let other = other.as_any().downcast_ref::<ApproximateQPolicy>()?;
        self.online.distance(&other.online)
    }

    fn breed(
        &self,
        other: &dyn Policy,
        mutation: &MutationConfig,
        rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        let other = other
            .as_any()
            .downcast_ref::<ApproximateQPolicy>()
            .ok_or(PolicyError::KindMismatch {
                expected: PolicyKind::APPROXIMATE.as_str(),
                got: other.kind().as_str(),
            })?;
        let mut child = self.crossover(other, rng)?;
        child.mutate(mutation, rng);
        Ok(Box::new(child))
    }

    fn mutated(&self, mutation: &MutationConfig, rng: &mut dyn RngCore) -> Box<dyn Policy> {
        let mut child = Self::assemble(
            self.config.clone(),
            self.action_count,
            self.online.clone(),
            self.online.clone(),
        );
        child.epsilon = self.epsilon.clone();
        child.mutate(mutation, rng);
        Box::new(child)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EpsilonConfig;
    use brood_obs::StateKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use smallvec::SmallVec;

    const WIDTH: usize = 6;

    fn config() -> ApproximateConfig {
        ApproximateConfig {
            hidden: 8,
            batch_size: 4,
            replay_capacity: 16,
            train_every: 1,
            epsilon: EpsilonConfig {
                start: 0.0,
                decay: 1.0,
                floor: 0.0,
            },
            ..ApproximateConfig::default()
        }
    }

    fn state(hot: usize) -> EncodedState {
        let mut features: SmallVec<[f32; 24]> = SmallVec::from_elem(0.0, WIDTH);
        features[hot % WIDTH] = 1.0;
        EncodedState {
            key: StateKey(hot as u64),
            features,
        }
    }

    fn transition(hot: usize, action: usize, reward: f32, terminal: bool) -> Transition {
        Transition {
            state: state(hot),
            action,
            reward,
            next: (!terminal).then(|| state(hot + 1)),
        }
    }

    fn policy(seed: u64) -> ApproximateQPolicy {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        ApproximateQPolicy::new(config(), WIDTH, 3, &mut rng)
    }

    #[test]
    fn target_starts_equal_to_online() {
        let p = policy(1);
        assert_eq!(p.online(), p.target());
    }

    #[test]
    fn no_training_before_a_full_batch() {
        let mut p = policy(1);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for i in 0..3 {
            p.observe(transition(i, 0, 1.0, false), &mut rng);
        }
        assert_eq!(p.train_steps(), 0);
        p.observe(transition(3, 0, 1.0, false), &mut rng);
        assert_eq!(p.train_steps(), 1);
        assert_ne!(p.online(), p.target());
    }

    #[test]
    fn learning_moves_target_by_tau() {
        let mut cfg = config();
        cfg.train_every = 1_000;
        cfg.tau = 0.25;
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut p = ApproximateQPolicy::new(cfg, WIDTH, 3, &mut rng);
        for i in 0..4 {
            p.observe(transition(i, i % 3, 1.0, false), &mut rng);
        }
        assert_eq!(p.train_steps(), 0);
        p.learn(&mut rng).expect("first step");
        let old_target = p.target().clone();
        p.learn(&mut rng).expect("second step");

        for ((t, o), old) in p
            .target()
            .params()
            .iter()
            .zip(p.online().params())
            .zip(old_target.params())
        {
            for ((&t, &o), &old) in t.data.iter().zip(&o.data).zip(&old.data) {
                let expected = 0.25 * o + 0.75 * old;
                assert!((t - expected).abs() < 1e-6, "{t} != {expected}");
            }
        }
    }

    #[test]
    fn replay_is_bounded() {
        let mut p = policy(1);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for i in 0..40 {
            p.observe(transition(i, i % 3, 0.0, i % 7 == 0), &mut rng);
        }
        assert_eq!(p.replay().len(), 16);
    }

    #[test]
    fn wrong_width_falls_back_to_random() {
        let p = policy(1);
        let bad = EncodedState {
            key: StateKey(0),
            features: SmallVec::from_elem(0.0, WIDTH + 1),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut seen = [false; 3];
        for _ in 0..100 {
            seen[p.select_action(&bad, &mut rng)] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn learns_terminal_reward() {
        let mut cfg = config();
        cfg.learning_rate = 0.05;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut p = ApproximateQPolicy::new(cfg, WIDTH, 3, &mut rng);
        for _ in 0..400 {
            p.observe(transition(0, 2, 1.0, true), &mut rng);
        }
        let q = p.online().forward(&state(0).features).unwrap();
        assert!((q[2] - 1.0).abs() < 0.2, "q = {q:?}");
    }

    #[test]
    fn crossover_lies_between_parents() {
        let a = policy(1);
        let b = policy(2);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let child = a.crossover(&b, &mut rng).unwrap();
        assert!(child.replay().is_empty());
        assert_eq!(child.online(), child.target());
        for ((c, x), y) in child
            .online()
            .params()
            .iter()
            .zip(a.online().params())
            .zip(b.online().params())
        {
            for ((&cv, &xv), &yv) in c.data.iter().zip(&x.data).zip(&y.data) {
                assert!(cv >= xv.min(yv) - 1e-6 && cv <= xv.max(yv) + 1e-6);
            }
        }
    }

    #[test]
    fn breed_with_tabular_is_rejected() {
        let a = policy(1);
        let t = crate::tabular::TabularQPolicy::new(Default::default(), 3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            a.breed(&t, &MutationConfig::default(), &mut rng),
            Err(PolicyError::KindMismatch { .. })
        ));
    }

    #[test]
    fn document_round_trip() {
        let mut p = policy(8);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for i in 0..12 {
            p.observe(transition(i, i % 3, 0.5, false), &mut rng);
        }
        p.end_episode();
        let json = serde_json::to_string(&p.to_document(5)).unwrap();
        let doc: PolicyDocument = serde_json::from_str(&json).unwrap();
        let q = ApproximateQPolicy::from_document(config(), WIDTH, 3, doc).unwrap();
        assert_eq!(q.online(), p.online());
        assert_eq!(q.target(), p.target());
        assert_eq!(q.epsilon(), p.epsilon());
        for i in 0..WIDTH {
            assert_eq!(q.greedy_action(&state(i)), p.greedy_action(&state(i)));
        }
    }

    #[test]
    fn divergence_zero_for_clone() {
        let p = policy(1);
        let c = p.clone();
        assert_eq!(p.divergence(&c), Some(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let m = p.mutated(
            &MutationConfig {
                rate: 1.0,
                scale: 0.5,
                min_magnitude: 0.1,
            },
            &mut rng,
        );
        assert!(p.divergence(m.as_ref()).unwrap_or(0.0) > 0.0);
    }
}

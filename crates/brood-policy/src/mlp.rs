//! A one-hidden-layer ReLU network and its optimizer.

use crate::document::Tensor;
use crate::error::PolicyError;
use indexmap::IndexMap;
use rand::{Rng, RngCore};

/// Parameter names, in storage order.
pub const PARAM_NAMES: [&str; 4] = ["w1", "b1", "w2", "b2"];

/// `inputs -> hidden (ReLU) -> outputs (linear)`.
///
/// Weights are row-major: `w1` is `[hidden, inputs]` and `w2` is
/// `[outputs, hidden]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Mlp {
    inputs: usize,
    hidden: usize,
    outputs: usize,
    params: [Tensor; 4],
}

/// One training example: input, action taken, regression target.
pub type Sample<'a> = (&'a [f32], usize, f32);

impl Mlp {
    /// Xavier-uniform weights, zero biases.
    pub fn new(inputs: usize, hidden: usize, outputs: usize, rng: &mut dyn RngCore) -> Self {
        let mut w1 = Tensor::zeros(&[hidden, inputs]);
        let mut w2 = Tensor::zeros(&[outputs, hidden]);
        let l1 = (6.0 / (inputs + hidden).max(1) as f32).sqrt();
        let l2 = (6.0 / (hidden + outputs).max(1) as f32).sqrt();
        for w in &mut w1.data {
            *w = rng.random_range(-l1..=l1);
        }
        for w in &mut w2.data {
            *w = rng.random_range(-l2..=l2);
        }
        Self {
            inputs,
            hidden,
            outputs,
            params: [w1, Tensor::zeros(&[hidden]), w2, Tensor::zeros(&[outputs])],
        }
    }

    /// Rebuild from named tensors.
    ///
    /// # Errors
    ///
    /// [`PolicyError::ShapeMismatch`] if a tensor is missing or does not
    /// fit `inputs`/`outputs`.
    pub fn from_tensors(
        tensors: &IndexMap<String, Tensor>,
        inputs: usize,
        outputs: usize,
    ) -> Result<Self, PolicyError> {
        let get = |name: &str| {
            tensors.get(name).filter(|t| t.is_consistent()).ok_or_else(|| {
                PolicyError::ShapeMismatch {
                    name: name.to_string(),
                    expected: "a consistent tensor".into(),
                }
            })
        };
        let w1 = get("w1")?;
        let hidden = w1.shape.first().copied().unwrap_or(0);
        let expect = [
            vec![hidden, inputs],
            vec![hidden],
            vec![outputs, hidden],
            vec![outputs],
        ];
        let mut params: [Tensor; 4] = Default::default();
        for (i, name) in PARAM_NAMES.iter().enumerate() {
            let t = get(name)?;
            if t.shape != expect[i] {
                return Err(PolicyError::ShapeMismatch {
                    name: name.to_string(),
                    expected: format!("{:?}", expect[i]),
                });
            }
            params[i] = t.clone();
        }
        Ok(Self {
            inputs,
            hidden,
            outputs,
            params,
        })
    }

    /// Named tensors in storage order.
    pub fn to_tensors(&self) -> IndexMap<String, Tensor> {
        PARAM_NAMES
            .iter()
            .zip(&self.params)
            .map(|(n, t)| (n.to_string(), t.clone()))
            .collect()
    }

    /// Input width.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Hidden width.
    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// Output width.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Parameter tensors in storage order.
    pub fn params(&self) -> &[Tensor; 4] {
        &self.params
    }

    /// Mutable parameter tensors in storage order.
    pub fn params_mut(&mut self) -> &mut [Tensor; 4] {
        &mut self.params
    }

    /// Forward pass.
    ///
    /// # Errors
    ///
    /// [`PolicyError::InputWidth`] on a width mismatch and
    /// [`PolicyError::NonFinite`] if any output is NaN or infinite.
    pub fn forward(&self, x: &[f32]) -> Result<Vec<f32>, PolicyError> {
        if x.len() != self.inputs {
            return Err(PolicyError::InputWidth {
                expected: self.inputs,
                got: x.len(),
            });
        }
        let (_, _, out) = self.forward_cached(x);
        if out.iter().all(|v| v.is_finite()) {
            Ok(out)
        } else {
            Err(PolicyError::NonFinite)
        }
    }

    fn forward_cached(&self, x: &[f32]) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let [w1, b1, w2, b2] = &self.params;
        let pre: Vec<f32> = (0..self.hidden)
            .map(|j| {
                let row = &w1.data[j * self.inputs..(j + 1) * self.inputs];
                b1.data[j] + row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>()
            })
            .collect();
        let act: Vec<f32> = pre.iter().map(|&v| v.max(0.0)).collect();
        let out = (0..self.outputs)
            .map(|k| {
                let row = &w2.data[k * self.hidden..(k + 1) * self.hidden];
                b2.data[k] + row.iter().zip(&act).map(|(w, h)| w * h).sum::<f32>()
            })
            .collect();
        (pre, act, out)
    }

    /// Mean-squared-error gradients over a minibatch, regressing only the
    /// taken action's output toward its target.
    ///
    /// Returns gradients in storage order and the batch loss. Samples
    /// with a mismatched width or out-of-range action are skipped.
    pub fn gradients(&self, batch: &[Sample<'_>]) -> ([Tensor; 4], f32) {
        let mut grads: [Tensor; 4] = [
            self.params[0].zeros_like(),
            self.params[1].zeros_like(),
            self.params[2].zeros_like(),
            self.params[3].zeros_like(),
        ];
        let valid: Vec<&Sample<'_>> = batch
            .iter()
            .filter(|(x, a, _)| x.len() == self.inputs && *a < self.outputs)
            .collect();
        if valid.is_empty() {
            return (grads, 0.0);
        }
        let n = valid.len() as f32;
        let w2 = &self.params[2];
        let mut loss = 0.0;
        for &&(x, a, y) in &valid {
            let (pre, act, out) = self.forward_cached(x);
            let err = out[a] - y;
            loss += err * err / n;
            let dq = 2.0 * err / n;

            let [gw1, gb1, gw2, gb2] = &mut grads;
            gb2.data[a] += dq;
            for j in 0..self.hidden {
                gw2.data[a * self.hidden + j] += dq * act[j];
                if pre[j] > 0.0 {
                    let dh = w2.data[a * self.hidden + j] * dq;
                    gb1.data[j] += dh;
                    let row = &mut gw1.data[j * self.inputs..(j + 1) * self.inputs];
                    for (g, v) in row.iter_mut().zip(x) {
                        *g += dh * v;
                    }
                }
            }
        }
        (grads, loss)
    }

    /// `self ← τ·online + (1−τ)·self`.
    pub fn polyak_from(&mut self, online: &Mlp, tau: f32) {
        for (t, o) in self.params.iter_mut().zip(&online.params) {
            for (tv, ov) in t.data.iter_mut().zip(&o.data) {
                *tv = tau * ov + (1.0 - tau) * *tv;
            }
        }
    }

    /// Mean absolute parameter difference, or `None` if shapes differ.
    pub fn distance(&self, other: &Mlp) -> Option<f64> {
        if self.params.iter().zip(&other.params).any(|(a, b)| a.shape != b.shape) {
            return None;
        }
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for (a, b) in self.params.iter().zip(&other.params) {
            for (x, y) in a.data.iter().zip(&b.data) {
                sum += (x - y).abs() as f64;
                count += 1;
            }
        }
        Some(if count == 0 { 0.0 } else { sum / count as f64 })
    }
}

/// SGD with momentum and per-component gradient clipping.
///
/// - `v = momentum * v + clip(grad)`
/// - `θ = θ - lr * v`
#[derive(Clone, Debug)]
pub struct SgdMomentum {
    /// Learning rate.
    pub learning_rate: f32,
    /// Momentum coefficient.
    pub momentum: f32,
    /// Gradient components are clipped to `[-clip, clip]`.
    pub clip: f32,
    velocities: Vec<Tensor>,
}

impl SgdMomentum {
    /// A fresh optimizer with zero velocity.
    pub fn new(learning_rate: f32, momentum: f32, clip: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            clip,
            velocities: Vec::new(),
        }
    }

    /// Apply one step to `net`.
    pub fn step(&mut self, net: &mut Mlp, grads: &[Tensor; 4]) {
        if self.velocities.len() != grads.len() {
            self.velocities = net.params().iter().map(Tensor::zeros_like).collect();
        }
        let clip = self.clip.abs();
        for ((param, grad), velocity) in net
            .params_mut()
            .iter_mut()
            .zip(grads)
            .zip(self.velocities.iter_mut())
        {
            for (v, g) in velocity.data.iter_mut().zip(&grad.data) {
                *v = self.momentum * *v + g.clamp(-clip, clip);
            }
            for (p, v) in param.data.iter_mut().zip(&velocity.data) {
                *p -= self.learning_rate * v;
            }
        }
    }

    /// Drop accumulated velocity.
    pub fn reset(&mut self) {
        self.velocities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn net(seed: u64) -> Mlp {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Mlp::new(4, 8, 3, &mut rng)
    }

    #[test]
    fn shapes() {
        let m = net(1);
        let shapes: Vec<_> = m.params().iter().map(|t| t.shape.clone()).collect();
        assert_eq!(shapes, vec![vec![8, 4], vec![8], vec![3, 8], vec![3]]);
    }

    #[test]
    fn forward_rejects_wrong_width() {
        let m = net(1);
        assert_eq!(
            m.forward(&[0.0; 3]),
            Err(PolicyError::InputWidth {
                expected: 4,
                got: 3
            })
        );
    }

    #[test]
    fn forward_flags_non_finite() {
        let mut m = net(1);
        m.params_mut()[3].data[0] = f32::NAN;
        assert_eq!(m.forward(&[0.0; 4]), Err(PolicyError::NonFinite));
    }

    #[test]
    fn training_reduces_loss() {
        let mut m = net(2);
        let mut opt = SgdMomentum::new(0.05, 0.5, 1.0);
        let x = [1.0, 0.0, 0.5, 0.0];
        let batch = [(&x[..], 1usize, 2.0f32)];
        let (_, before) = m.gradients(&batch);
        for _ in 0..50 {
            let (g, _) = m.gradients(&batch);
            opt.step(&mut m, &g);
        }
        let (_, after) = m.gradients(&batch);
        assert!(after < before, "loss {before} -> {after}");
    }

    #[test]
    fn step_clips_each_gradient_component() {
        let mut m = net(7);
        let before = m.clone();
        let grads = m.params().clone().map(|mut t| {
            for (i, g) in t.data.iter_mut().enumerate() {
                *g = match i % 3 {
                    0 => 100.0,
                    1 => -100.0,
                    _ => 0.1,
                };
            }
            t
        });
        let (lr, clip) = (0.1f32, 0.5f32);
        let mut opt = SgdMomentum::new(lr, 0.0, clip);
        opt.step(&mut m, &grads);
        for (after, (was, grad)) in m.params().iter().zip(before.params().iter().zip(&grads)) {
            for ((&p, &p0), &g) in after.data.iter().zip(&was.data).zip(&grad.data) {
                let moved = p0 - p;
                assert!(moved.abs() <= lr * clip + 1e-6, "moved {moved} for grad {g}");
                let expected = lr * g.clamp(-clip, clip);
                assert!((moved - expected).abs() < 1e-6, "moved {moved}, expected {expected}");
            }
        }
    }

    #[test]
    fn polyak_full_copies() {
        let online = net(3);
        let mut target = net(4);
        target.polyak_from(&online, 1.0);
        assert_eq!(target, online);
    }

    #[test]
    fn polyak_zero_keeps() {
        let online = net(3);
        let mut target = net(4);
        let before = target.clone();
        target.polyak_from(&online, 0.0);
        assert_eq!(target, before);
    }

    #[test]
    fn tensor_round_trip() {
        let m = net(5);
        let back = Mlp::from_tensors(&m.to_tensors(), 4, 3).unwrap();
        assert_eq!(back, m);
        assert!(Mlp::from_tensors(&m.to_tensors(), 5, 3).is_err());
    }

    #[test]
    fn distance_is_zero_to_self() {
        let m = net(6);
        assert_eq!(m.distance(&m), Some(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let other = Mlp::new(4, 9, 3, &mut rng);
        assert_eq!(m.distance(&other), None);
    }
}

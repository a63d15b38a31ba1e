//! Per-parameter crossover and mutation.
//!
//! Crossover picks, independently for every value, either one parent's
//! value or the mean of both. The mean is perturbed with Gaussian noise
//! scaled to its magnitude; with [`MutationConfig::none`] there is no
//! noise and a crossed value always lies between its parents'.
//!
//! [`mutate_value`] perturbs a random subset of values and is used where
//! a single parent is copied, e.g. when cloning an elite.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Mutation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Probability that any single value is perturbed.
    pub rate: f64,
    /// Noise standard deviation relative to the value's magnitude.
    pub scale: f64,
    /// Magnitude used for values near zero, so they can still move.
    pub min_magnitude: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rate: 0.1,
            scale: 0.1,
            min_magnitude: 0.01,
        }
    }
}

impl MutationConfig {
    /// No mutation at all.
    pub fn none() -> Self {
        Self {
            rate: 0.0,
            scale: 0.0,
            min_magnitude: 0.0,
        }
    }
}

/// Cross two parent values: a coin flip between their noisy mean and
/// one of the two values as-is.
pub fn cross_value(a: f64, b: f64, cfg: &MutationConfig, rng: &mut dyn RngCore) -> f64 {
    if rng.random_bool(0.5) {
        let mean = (a + b) / 2.0;
        if cfg.scale <= 0.0 {
            return mean;
        }
        mean + gaussian(rng) * cfg.scale * mean.abs().max(cfg.min_magnitude)
    } else if rng.random_bool(0.5) {
        a
    } else {
        b
    }
}

/// Possibly perturb one value.
pub fn mutate_value(v: f64, cfg: &MutationConfig, rng: &mut dyn RngCore) -> f64 {
    if cfg.rate <= 0.0 || !rng.random_bool(cfg.rate.min(1.0)) {
        return v;
    }
    let magnitude = v.abs().max(cfg.min_magnitude);
    v + gaussian(rng) * cfg.scale * magnitude
}

/// Standard normal sample (Box-Muller).
pub fn gaussian(rng: &mut dyn RngCore) -> f64 {
    let u1 = rng.random::<f64>().clamp(f64::MIN_POSITIVE, 1.0);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn no_mutation_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for v in [-2.0, 0.0, 5.5] {
            assert_eq!(mutate_value(v, &MutationConfig::none(), &mut rng), v);
        }
    }

    #[test]
    fn full_rate_moves_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let cfg = MutationConfig {
            rate: 1.0,
            scale: 1.0,
            min_magnitude: 0.5,
        };
        let moved = (0..16).any(|_| mutate_value(0.0, &cfg, &mut rng) != 0.0);
        assert!(moved);
    }

    #[test]
    fn averaged_branch_is_always_perturbed() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let cfg = MutationConfig {
            rate: 0.0,
            scale: 0.5,
            min_magnitude: 0.01,
        };
        let picks: Vec<f64> = (0..64).map(|_| cross_value(1.0, 3.0, &cfg, &mut rng)).collect();
        let copied = picks.iter().filter(|&&v| v == 1.0 || v == 3.0).count();
        assert!(copied > 0, "some values are taken from one parent");
        assert!(copied < picks.len(), "some values are averaged");
        assert!(picks.iter().all(|&v| v != 2.0), "bare mean leaked through");
    }

    proptest! {
        #[test]
        fn crossover_lies_between(a in -100.0f64..100.0, b in -100.0f64..100.0, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let c = cross_value(a, b, &MutationConfig::none(), &mut rng);
            prop_assert!(c >= a.min(b) && c <= a.max(b));
        }
    }
}

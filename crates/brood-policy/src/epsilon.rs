//! Geometric exploration decay with a floor.

use crate::config::EpsilonConfig;

/// Exploration rate that decays per completed episode toward a floor.
///
/// The rate is non-increasing and never drops below the floor, so
/// exploration never fully stops.
#[derive(Clone, Debug, PartialEq)]
pub struct EpsilonSchedule {
    value: f64,
    decay: f64,
    floor: f64,
}

impl EpsilonSchedule {
    /// Start a schedule from its configuration.
    pub fn new(config: &EpsilonConfig) -> Self {
        let floor = config.floor.clamp(0.0, 1.0);
        Self {
            value: config.start.clamp(floor, 1.0),
            decay: config.decay.clamp(0.0, 1.0),
            floor,
        }
    }

    /// Current exploration rate.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Configured floor.
    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Apply one episode's decay.
    pub fn decay(&mut self) {
        self.value = (self.value * self.decay).max(self.floor);
    }

    /// Overwrite the current rate (e.g. from a persisted document),
    /// clamped into `[floor, 1]`.
    pub fn set(&mut self, value: f64) {
        self.value = if value.is_finite() {
            value.clamp(self.floor, 1.0)
        } else {
            self.floor.max(self.value)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn start_below_floor_is_raised() {
        let s = EpsilonSchedule::new(&EpsilonConfig {
            start: 0.01,
            decay: 0.9,
            floor: 0.1,
        });
        assert_eq!(s.value(), 0.1);
    }

    #[test]
    fn set_clamps() {
        let mut s = EpsilonSchedule::new(&EpsilonConfig::default());
        s.set(2.0);
        assert_eq!(s.value(), 1.0);
        s.set(0.0);
        assert_eq!(s.value(), s.floor());
    }

    proptest! {
        #[test]
        fn non_increasing_and_floored(
            start in 0.0f64..=1.0,
            decay in 0.0f64..=1.0,
            floor in 0.0f64..=0.5,
            episodes in 0usize..500,
        ) {
            let mut s = EpsilonSchedule::new(&EpsilonConfig { start, decay, floor });
            let mut prev = s.value();
            for _ in 0..episodes {
                s.decay();
                prop_assert!(s.value() <= prev);
                prop_assert!(s.value() >= floor);
                prev = s.value();
            }
        }
    }
}

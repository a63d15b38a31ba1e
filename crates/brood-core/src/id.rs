//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

slotmap::new_key_type! {
    /// Stable generational handle of an agent in the population slot table.
    ///
    /// Handles are never reused while stale copies exist: a freed slot gets
    /// a new generation, so a handle to a dead agent resolves to nothing
    /// instead of to its successor.
    pub struct AgentHandle;
}

/// Monotonically increasing tick counter.
///
/// Incremented each time the simulation advances one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickId(pub u64);

impl TickId {
    /// Ticks elapsed since `earlier`, saturating at zero.
    pub fn since(self, earlier: TickId) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The following tick.
    pub fn next(self) -> TickId {
        TickId(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Spawn order of an agent within a run.
///
/// Assigned from a counter at spawn time and never reused. The
/// population processes agents in ascending `SpawnSeq`, which keeps the
/// per-tick update order stable regardless of slot reuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpawnSeq(pub u64);

impl fmt::Display for SpawnSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_since_saturates() {
        assert_eq!(TickId(10).since(TickId(4)), 6);
        assert_eq!(TickId(4).since(TickId(10)), 0);
    }

    #[test]
    fn tick_next_increments() {
        assert_eq!(TickId(7).next(), TickId(8));
    }

    #[test]
    fn spawn_seq_orders_numerically() {
        let mut seqs = vec![SpawnSeq(3), SpawnSeq(1), SpawnSeq(2)];
        seqs.sort();
        assert_eq!(seqs, vec![SpawnSeq(1), SpawnSeq(2), SpawnSeq(3)]);
    }
}

//! Fixed-capacity FIFO experience replay.

use brood_obs::EncodedState;
use rand::{Rng, RngCore};

/// One step of experience.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// State the action was chosen in.
    pub state: EncodedState,
    /// Action index taken.
    pub action: usize,
    /// Reward received.
    pub reward: f32,
    /// Resulting state, or `None` if the step was terminal.
    pub next: Option<EncodedState>,
}

impl Transition {
    /// Whether the episode ended on this step.
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// A fixed-capacity ring of transitions.
///
/// The write position is monotonically increasing; slot index is
/// `pos % capacity`. Once full, each push evicts exactly the oldest
/// stored entry.
#[derive(Clone, Debug)]
pub struct ReplayBuffer<T = Transition> {
    slots: Vec<T>,
    write_pos: u64,
    capacity: usize,
}

impl<T> ReplayBuffer<T> {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity.min(4096)),
            write_pos: 0,
            capacity,
        }
    }

    /// Maximum number of stored entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the buffer holds nothing.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total number of entries ever pushed.
    pub fn pushed(&self) -> u64 {
        self.write_pos
    }

    /// Store `item`, returning the evicted oldest entry once full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let idx = (self.write_pos % self.capacity as u64) as usize;
        self.write_pos += 1;
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[idx], item))
        }
    }

    /// The `i`-th stored entry, oldest first.
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.slots.len() {
            return None;
        }
        let oldest = if self.slots.len() < self.capacity {
            0
        } else {
            (self.write_pos % self.capacity as u64) as usize
        };
        self.slots.get((oldest + i) % self.capacity)
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Sample `n` entries uniformly with replacement.
    pub fn sample<'a>(&'a self, n: usize, rng: &mut dyn RngCore) -> Vec<&'a T> {
        if self.slots.is_empty() {
            return Vec::new();
        }
        (0..n)
            .map(|_| &self.slots[rng.random_range(0..self.slots.len())])
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.write_pos = 0;
    }
}

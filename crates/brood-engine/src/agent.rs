//! A single agent: body, heading, bookkeeping, and its policy handle.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

use brood_core::{Heading, Position, SpawnSeq, TickId};
use brood_obs::{AgentView, EncodedState};
use brood_policy::{Policy, SharedPolicy};

/// Read access to a shared policy. A poisoned lock still yields the
/// policy.
pub(crate) fn read_policy(policy: &SharedPolicy) -> RwLockReadGuard<'_, Box<dyn Policy>> {
    policy.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write access to a shared policy.
pub(crate) fn write_policy(policy: &SharedPolicy) -> RwLockWriteGuard<'_, Box<dyn Policy>> {
    policy.write().unwrap_or_else(PoisonError::into_inner)
}

/// A transition waiting for its next state.
///
/// Rewards are known right after the move, but the next state is only
/// encoded at the start of the following tick, from the same snapshot
/// that drives the next decision.
#[derive(Clone, Debug)]
pub(crate) struct PendingStep {
    pub(crate) state: EncodedState,
    pub(crate) action: usize,
    pub(crate) reward: f32,
}

/// One living agent.
///
/// The body is never empty; its last element is the head.
#[derive(Debug)]
pub struct Agent {
    pub(crate) seq: SpawnSeq,
    pub(crate) body: VecDeque<Position>,
    pub(crate) heading: Heading,
    pub(crate) score: u64,
    pub(crate) age: u64,
    pub(crate) birth: TickId,
    pub(crate) last_reproduction: Option<TickId>,
    pub(crate) generation: u32,
    pub(crate) children: u32,
    pub(crate) hue: f32,
    pub(crate) recent_actions: VecDeque<u8>,
    pub(crate) pending: Option<PendingStep>,
    pub(crate) policy: SharedPolicy,
}

impl Agent {
    pub(crate) fn new(
        seq: SpawnSeq,
        body: VecDeque<Position>,
        heading: Heading,
        birth: TickId,
        policy: SharedPolicy,
    ) -> Self {
        debug_assert!(!body.is_empty());
        Self {
            seq,
            body,
            heading,
            score: 0,
            age: 0,
            birth,
            last_reproduction: None,
            generation: 0,
            children: 0,
            hue: 0.0,
            recent_actions: VecDeque::new(),
            pending: None,
            policy,
        }
    }

    /// Spawn order.
    pub fn seq(&self) -> SpawnSeq {
        self.seq
    }

    /// Head cell.
    pub fn head(&self) -> Position {
        // Bodies are never empty; the fallback is unreachable.
        self.body.back().copied().unwrap_or(Position::new(0, 0))
    }

    /// Tail cell.
    pub fn tail(&self) -> Position {
        self.body.front().copied().unwrap_or(Position::new(0, 0))
    }

    /// Body cells, tail first.
    pub fn body(&self) -> impl ExactSizeIterator<Item = Position> + '_ {
        self.body.iter().copied()
    }

    /// Body length in cells.
    pub fn length(&self) -> usize {
        self.body.len()
    }

    /// Current heading.
    pub fn heading(&self) -> Heading {
        self.heading
    }

    /// Food eaten.
    pub fn score(&self) -> u64 {
        self.score
    }

    /// Ticks lived.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Tick of birth.
    pub fn birth(&self) -> TickId {
        self.birth
    }

    /// Tick of the last successful reproduction.
    pub fn last_reproduction(&self) -> Option<TickId> {
        self.last_reproduction
    }

    /// Breeding depth: 0 for spawned agents, parents' max + 1 for children.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Children produced.
    pub fn children(&self) -> u32 {
        self.children
    }

    /// Cosmetic hue in `[0, 1)`.
    pub fn hue(&self) -> f32 {
        self.hue
    }

    /// Most recent actions, oldest first.
    pub fn recent_actions(&self) -> impl Iterator<Item = u8> + '_ {
        self.recent_actions.iter().copied()
    }

    /// The policy this agent acts through.
    pub fn policy(&self) -> &SharedPolicy {
        &self.policy
    }

    /// What the perception encoder sees of this agent.
    pub fn view(&self) -> AgentView {
        AgentView {
            head: self.head(),
            heading: self.heading,
            length: self.length(),
        }
    }

    pub(crate) fn push_action(&mut self, action: usize, keep: usize) {
        if keep == 0 {
            return;
        }
        while self.recent_actions.len() >= keep {
            self.recent_actions.pop_front();
        }
        self.recent_actions.push_back(action.min(u8::MAX as usize) as u8);
    }
}

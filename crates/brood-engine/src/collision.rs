//! Move resolution.
//!
//! [`CollisionResolver::resolve`] is a pure query: it classifies one
//! agent's intended move against the current grid without mutating
//! anything. The population applies the outcome.
//!
//! Checks run in a fixed precedence:
//!
//! 1. the boundary (lethal under `Absorb`, blocking under `Clamp`);
//! 2. the mover's own body, except the current tail when the move does
//!    not eat (the tail retracts in the same step);
//! 3. other agents' bodies, excluding their head cells;
//! 4. other agents' heads, and the intended heads of agents that have
//!    not moved yet this tick.

use brood_core::{AgentHandle, Heading, Position};
use brood_space::{GridWorld, StepOutcome};
use indexmap::IndexMap;
use slotmap::SlotMap;

use crate::agent::Agent;

/// Why an agent died.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeathCause {
    /// Left the grid through an absorbing edge.
    Wall,
    /// Ran into its own body.
    SelfCollision,
    /// Ran into another agent's body.
    Body(AgentHandle),
    /// Met another agent head-on without producing a child.
    HeadOn(AgentHandle),
}

/// Classification of one intended move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// A clamping wall stopped the move.
    Blocked,
    /// The head advances to the cell; the tail retracts.
    Moved(Position),
    /// The head advances onto food; the tail stays.
    MovedAndAte(Position),
    /// The move is lethal.
    Died(DeathCause),
    /// The mover's head meets `other`'s head.
    HeadToHead {
        /// The agent met.
        other: AgentHandle,
    },
}

/// Intended head cells of agents that have not moved yet this tick,
/// in processing order.
pub type Intents = IndexMap<AgentHandle, Position>;

/// Classifies intended moves.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollisionResolver;

impl CollisionResolver {
    /// The heading an agent actually takes when it asks for `requested`.
    ///
    /// An exact reversal is rejected and the current heading kept.
    pub fn effective_heading(current: Heading, requested: Heading) -> Heading {
        if requested.opposes(current) {
            current
        } else {
            requested
        }
    }

    /// Cell the agent at `head` would enter moving in `heading`, if the
    /// move stays on the grid.
    pub fn target(world: &GridWorld, head: Position, heading: Heading) -> Option<Position> {
        match world.step(head, heading) {
            StepOutcome::Inside(p) => Some(p),
            StepOutcome::Blocked | StepOutcome::OutOfBounds => None,
        }
    }

    /// Classify `mover`'s move in `heading`.
    ///
    /// `intents` may contain the mover itself; it is ignored.
    pub fn resolve(
        &self,
        world: &GridWorld,
        agents: &SlotMap<AgentHandle, Agent>,
        mover: AgentHandle,
        heading: Heading,
        intents: &Intents,
    ) -> MoveOutcome {
        let Some(agent) = agents.get(mover) else {
            return MoveOutcome::Blocked;
        };
        let target = match world.step(agent.head(), heading) {
            StepOutcome::Inside(p) => p,
            StepOutcome::Blocked => return MoveOutcome::Blocked,
            StepOutcome::OutOfBounds => return MoveOutcome::Died(DeathCause::Wall),
        };
        let eats = world.has_food(target);

        match world.occupant(target) {
            Some(owner) if owner == mover => {
                let retracting_tail = !eats && target == agent.tail() && agent.length() > 1;
                if !retracting_tail {
                    return MoveOutcome::Died(DeathCause::SelfCollision);
                }
            }
            Some(owner) => {
                let is_head = agents.get(owner).is_some_and(|a| a.head() == target);
                return if is_head {
                    MoveOutcome::HeadToHead { other: owner }
                } else {
                    MoveOutcome::Died(DeathCause::Body(owner))
                };
            }
            None => {}
        }

        if let Some((&other, _)) = intents
            .iter()
            .find(|&(&h, &p)| h != mover && p == target && agents.contains_key(h))
        {
            return MoveOutcome::HeadToHead { other };
        }

        if eats {
            MoveOutcome::MovedAndAte(target)
        } else {
            MoveOutcome::Moved(target)
        }
    }
}

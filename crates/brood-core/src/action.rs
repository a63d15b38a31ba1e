//! Action spaces mapping a policy's action index to a requested heading.

use crate::geometry::Heading;
use serde::{Deserialize, Serialize};

/// How a policy's discrete action index is interpreted.
///
/// The action space is fixed for a run: a policy's value vectors have
/// exactly [`action_count()`](ActionSpace::action_count) entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSpace {
    /// Three actions relative to the current heading: left, straight, right.
    #[default]
    Relative,
    /// Four absolute headings in clockwise order (N, E, S, W).
    ///
    /// A request for the reversal of the current heading is rejected by
    /// the collision resolver and replaced with the current heading.
    Absolute,
}

impl ActionSpace {
    /// Number of discrete actions.
    pub fn action_count(self) -> usize {
        match self {
            ActionSpace::Relative => 3,
            ActionSpace::Absolute => 4,
        }
    }

    /// Heading requested by `action` for an agent currently facing `current`.
    ///
    /// Out-of-range indices request the current heading.
    pub fn requested_heading(self, current: Heading, action: usize) -> Heading {
        match (self, action) {
            (ActionSpace::Relative, 0) => current.left(),
            (ActionSpace::Relative, 2) => current.right(),
            (ActionSpace::Absolute, a) if a < 4 => Heading::ALL[a],
            _ => current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_actions_turn_around_current() {
        let s = ActionSpace::Relative;
        assert_eq!(s.requested_heading(Heading::North, 0), Heading::West);
        assert_eq!(s.requested_heading(Heading::North, 1), Heading::North);
        assert_eq!(s.requested_heading(Heading::North, 2), Heading::East);
    }

    #[test]
    fn absolute_actions_ignore_current() {
        let s = ActionSpace::Absolute;
        assert_eq!(s.requested_heading(Heading::North, 3), Heading::West);
        assert_eq!(s.requested_heading(Heading::East, 0), Heading::North);
    }

    #[test]
    fn out_of_range_keeps_heading() {
        assert_eq!(ActionSpace::Relative.requested_heading(Heading::South, 9), Heading::South);
        assert_eq!(ActionSpace::Absolute.requested_heading(Heading::South, 4), Heading::South);
    }

    #[test]
    fn counts() {
        assert_eq!(ActionSpace::Relative.action_count(), 3);
        assert_eq!(ActionSpace::Absolute.action_count(), 4);
    }
}

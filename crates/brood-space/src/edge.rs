//! Grid edge (boundary) behavior.

use serde::{Deserialize, Serialize};

/// What happens when a move would leave the grid.
///
/// Chosen once per [`GridWorld`](crate::GridWorld) and never changed.
///
/// # Examples
///
/// ```
/// use brood_core::Position;
/// use brood_space::{EdgeBehavior, GridWorld};
///
/// let wrap = GridWorld::new(4, 4, EdgeBehavior::Wrap).unwrap();
/// assert_eq!(wrap.resolve(Position::new(-1, 0)), Some(Position::new(3, 0)));
///
/// let wall = GridWorld::new(4, 4, EdgeBehavior::Absorb).unwrap();
/// assert_eq!(wall.resolve(Position::new(-1, 0)), None);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeBehavior {
    /// Out-of-bounds moves are clamped back onto the boundary cell: the
    /// agent is blocked and stays where it is.
    Clamp,
    /// Out-of-bounds moves wrap to the opposite side (torus).
    Wrap,
    /// Out-of-bounds moves leave the world: a lethal wall.
    #[default]
    Absorb,
}

impl EdgeBehavior {
    /// Whether the grid is toroidal.
    pub fn wraps(self) -> bool {
        matches!(self, EdgeBehavior::Wrap)
    }
}

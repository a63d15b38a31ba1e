//! Grid positions and headings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer cell coordinate on the grid.
///
/// `x` grows eastward and `y` grows southward, so `(0, 0)` is the
/// north-west corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position displaced by `(dx, dy)`, without any boundary handling.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Unbounded Manhattan (L1) distance.
    pub fn manhattan(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Cardinal heading of an agent.
///
/// Discriminants run clockwise, which makes rotation a modular add.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Heading {
    /// Toward row - 1.
    North = 0,
    /// Toward column + 1.
    East = 1,
    /// Toward row + 1.
    South = 2,
    /// Toward column - 1.
    West = 3,
}

impl Heading {
    /// All headings in clockwise order starting from north.
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    /// Unit displacement `(dx, dy)` for this heading.
    pub fn vector(self) -> (i32, i32) {
        match self {
            Heading::North => (0, -1),
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
        }
    }

    /// The exact reversal of this heading.
    pub fn reverse(self) -> Heading {
        Self::from_index(self as u8 + 2)
    }

    /// Heading after a 90° counter-clockwise turn.
    pub fn left(self) -> Heading {
        Self::from_index(self as u8 + 3)
    }

    /// Heading after a 90° clockwise turn.
    pub fn right(self) -> Heading {
        Self::from_index(self as u8 + 1)
    }

    /// Whether `other` is the exact reversal of `self`.
    pub fn opposes(self, other: Heading) -> bool {
        self.reverse() == other
    }

    /// Clockwise index in `0..4`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Heading for a clockwise index; wraps modulo 4.
    pub fn from_index(i: u8) -> Heading {
        Self::ALL[(i % 4) as usize]
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Heading::North => "N",
            Heading::East => "E",
            Heading::South => "S",
            Heading::West => "W",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reverse_pairs() {
        assert_eq!(Heading::North.reverse(), Heading::South);
        assert_eq!(Heading::East.reverse(), Heading::West);
        assert!(Heading::East.opposes(Heading::West));
        assert!(!Heading::East.opposes(Heading::North));
    }

    #[test]
    fn rotations_are_clockwise() {
        assert_eq!(Heading::North.right(), Heading::East);
        assert_eq!(Heading::North.left(), Heading::West);
        assert_eq!(Heading::West.right(), Heading::North);
    }

    #[test]
    fn east_moves_along_x() {
        let p = Position::new(5, 5);
        let (dx, dy) = Heading::East.vector();
        assert_eq!(p.offset(dx, dy), Position::new(6, 5));
    }

    #[test]
    fn position_serializes_as_object() {
        let json = serde_json::to_string(&Position::new(3, -1)).unwrap();
        assert_eq!(json, r#"{"x":3,"y":-1}"#);
    }

    proptest! {
        #[test]
        fn reversal_vectors_cancel(i in 0u8..4) {
            let h = Heading::from_index(i);
            let (ax, ay) = h.vector();
            let (bx, by) = h.reverse().vector();
            prop_assert_eq!((ax + bx, ay + by), (0, 0));
            prop_assert_eq!(h.left().right(), h);
        }

        #[test]
        fn manhattan_is_symmetric(ax in -50i32..50, ay in -50i32..50, bx in -50i32..50, by in -50i32..50) {
            let a = Position::new(ax, ay);
            let b = Position::new(bx, by);
            prop_assert_eq!(a.manhattan(b), b.manhattan(a));
        }
    }
}

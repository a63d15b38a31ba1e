//! Error types for grid construction and queries.

use brood_core::Position;
use std::fmt;

/// Errors arising from grid construction or spatial queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceError {
    /// A position is outside the bounds of the grid.
    OutOfBounds {
        /// The offending position.
        position: Position,
        /// Human-readable description of the valid range.
        bounds: String,
    },
    /// Attempted to construct a grid with zero cells.
    EmptySpace,
    /// A dimension exceeds the representable coordinate range.
    DimensionTooLarge {
        /// Which dimension (`"width"` or `"height"`).
        name: &'static str,
        /// The requested value.
        value: u32,
        /// The maximum allowed value.
        max: u32,
    },
    /// A cell is already occupied by an agent or food.
    Occupied {
        /// The contested cell.
        position: Position,
    },
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { position, bounds } => {
                write!(f, "position {position} out of bounds: {bounds}")
            }
            Self::EmptySpace => write!(f, "grid must have at least one cell"),
            Self::DimensionTooLarge { name, value, max } => {
                write!(f, "{name} {value} exceeds maximum of {max}")
            }
            Self::Occupied { position } => write!(f, "cell {position} is occupied"),
        }
    }
}

impl std::error::Error for SpaceError {}

//! The 2D grid world: geometry plus body and food occupancy.

use crate::edge::EdgeBehavior;
use crate::error::SpaceError;
use brood_core::{AgentHandle, Heading, Position};
use indexmap::IndexSet;
use smallvec::SmallVec;

/// Result of stepping one cell from a position in some heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The target cell is on the grid (possibly after wrapping).
    Inside(Position),
    /// The move ran into a clamping wall; the mover stays put.
    Blocked,
    /// The move left a lethal (absorbing) boundary.
    OutOfBounds,
}

/// A fixed-size rectangular grid with per-cell body occupancy and food.
///
/// Cell `(x, y)` is valid for `0 <= x < width` and `0 <= y < height`.
/// Occupancy tracks which agent's body covers a cell; the agents
/// themselves (and which of their cells is the head) live in the
/// population that drives this grid.
///
/// Food is kept in insertion order so that iteration, and therefore
/// nearest-food tie-breaking, is deterministic.
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: u32,
    height: u32,
    edge: EdgeBehavior,
    occupants: Vec<Option<AgentHandle>>,
    food: IndexSet<Position>,
}

impl GridWorld {
    /// Maximum dimension size: coordinates use `i32`, so each axis must fit.
    pub const MAX_DIM: u32 = i32::MAX as u32;

    /// Create an empty `width * height` grid.
    ///
    /// # Errors
    ///
    /// [`SpaceError::EmptySpace`] if either dimension is 0 and
    /// [`SpaceError::DimensionTooLarge`] if either exceeds `i32::MAX`.
    pub fn new(width: u32, height: u32, edge: EdgeBehavior) -> Result<Self, SpaceError> {
        if width == 0 || height == 0 {
            return Err(SpaceError::EmptySpace);
        }
        for (name, value) in [("width", width), ("height", height)] {
            if value > Self::MAX_DIM {
                return Err(SpaceError::DimensionTooLarge {
                    name,
                    value,
                    max: Self::MAX_DIM,
                });
            }
        }
        let cells = (width as usize) * (height as usize);
        Ok(Self {
            width,
            height,
            edge,
            occupants: vec![None; cells],
            food: IndexSet::new(),
        })
    }

    /// Number of columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Edge behavior.
    pub fn edge(&self) -> EdgeBehavior {
        self.edge
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.occupants.len()
    }

    /// Whether `pos` lies on the grid.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    /// Row-major cell index, or `None` off-grid.
    pub fn index(&self, pos: Position) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos.y as usize) * (self.width as usize) + (pos.x as usize))
    }

    /// Position of a row-major cell index.
    pub fn position(&self, index: usize) -> Position {
        let w = self.width as usize;
        Position::new((index % w) as i32, (index / w) as i32)
    }

    /// Map an arbitrary position onto the grid under the edge behavior.
    ///
    /// `Wrap` folds the position onto the torus, `Clamp` pins it to the
    /// nearest boundary cell, and `Absorb` returns `None` off-grid.
    pub fn resolve(&self, pos: Position) -> Option<Position> {
        let x = resolve_axis(pos.x, self.width, self.edge)?;
        let y = resolve_axis(pos.y, self.height, self.edge)?;
        Some(Position::new(x, y))
    }

    /// Step one cell from `from` in `heading`.
    pub fn step(&self, from: Position, heading: Heading) -> StepOutcome {
        let (dx, dy) = heading.vector();
        let raw = from.offset(dx, dy);
        if self.contains(raw) {
            return StepOutcome::Inside(raw);
        }
        match self.edge {
            EdgeBehavior::Wrap => match self.resolve(raw) {
                Some(p) => StepOutcome::Inside(p),
                None => StepOutcome::OutOfBounds,
            },
            EdgeBehavior::Clamp => StepOutcome::Blocked,
            EdgeBehavior::Absorb => StepOutcome::OutOfBounds,
        }
    }

    /// Signed displacement from `a` to `b`, taking the short way round on
    /// a torus.
    pub fn displacement(&self, a: Position, b: Position) -> (i32, i32) {
        (
            axis_delta(a.x, b.x, self.width, self.edge),
            axis_delta(a.y, b.y, self.height, self.edge),
        )
    }

    /// Manhattan distance, wrap-aware.
    pub fn manhattan(&self, a: Position, b: Position) -> u32 {
        let (dx, dy) = self.displacement(a, b);
        dx.unsigned_abs() + dy.unsigned_abs()
    }

    /// The 4-connected neighbours of `pos` that exist under the edge
    /// behavior, in N, E, S, W order.
    pub fn neighbours(&self, pos: Position) -> SmallVec<[Position; 4]> {
        Heading::ALL
            .iter()
            .filter_map(|&h| match self.step(pos, h) {
                StepOutcome::Inside(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Integer midpoint of two cells along their shortest displacement,
    /// rounding toward negative infinity. On a wrapping grid the result
    /// is folded back onto the grid.
    pub fn midpoint(&self, a: Position, b: Position) -> Position {
        let (dx, dy) = self.displacement(a, b);
        let mid = a.offset(dx.div_euclid(2), dy.div_euclid(2));
        self.resolve(mid).unwrap_or(mid)
    }

    // ── Occupancy ───────────────────────────────────────────────

    /// Agent whose body covers `pos`, if any.
    pub fn occupant(&self, pos: Position) -> Option<AgentHandle> {
        self.index(pos).and_then(|i| self.occupants[i])
    }

    /// Whether any body covers `pos`. Off-grid positions count as occupied.
    pub fn is_occupied(&self, pos: Position) -> bool {
        match self.index(pos) {
            Some(i) => self.occupants[i].is_some(),
            None => true,
        }
    }

    /// Whether `pos` is on the grid and holds neither a body nor food.
    pub fn is_free(&self, pos: Position) -> bool {
        !self.is_occupied(pos) && !self.food.contains(&pos)
    }

    /// Mark `pos` as covered by `agent`.
    ///
    /// # Errors
    ///
    /// [`SpaceError::OutOfBounds`] off-grid, or [`SpaceError::Occupied`]
    /// if a different agent already covers the cell.
    pub fn occupy(&mut self, pos: Position, agent: AgentHandle) -> Result<(), SpaceError> {
        let i = self.index(pos).ok_or_else(|| self.out_of_bounds(pos))?;
        match self.occupants[i] {
            Some(other) if other != agent => Err(SpaceError::Occupied { position: pos }),
            _ => {
                self.occupants[i] = Some(agent);
                Ok(())
            }
        }
    }

    /// Clear `pos` if it is covered by `agent`. Returns whether it was.
    pub fn vacate(&mut self, pos: Position, agent: AgentHandle) -> bool {
        match self.index(pos) {
            Some(i) if self.occupants[i] == Some(agent) => {
                self.occupants[i] = None;
                true
            }
            _ => false,
        }
    }

    /// Number of cells covered by bodies.
    pub fn occupied_count(&self) -> usize {
        self.occupants.iter().filter(|o| o.is_some()).count()
    }

    // ── Food ────────────────────────────────────────────────────

    /// Whether `pos` holds food.
    pub fn has_food(&self, pos: Position) -> bool {
        self.food.contains(&pos)
    }

    /// Place food on a free cell.
    ///
    /// # Errors
    ///
    /// [`SpaceError::OutOfBounds`] off-grid, or [`SpaceError::Occupied`]
    /// if a body or food already covers the cell.
    pub fn place_food(&mut self, pos: Position) -> Result<(), SpaceError> {
        if !self.contains(pos) {
            return Err(self.out_of_bounds(pos));
        }
        if !self.is_free(pos) {
            return Err(SpaceError::Occupied { position: pos });
        }
        self.food.insert(pos);
        Ok(())
    }

    /// Remove food at `pos`. Returns whether there was any.
    pub fn take_food(&mut self, pos: Position) -> bool {
        self.food.shift_remove(&pos)
    }

    /// Food cells in placement order.
    pub fn food(&self) -> impl Iterator<Item = Position> + '_ {
        self.food.iter().copied()
    }

    /// Number of food cells.
    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    /// Nearest food to `from` by wrap-aware Manhattan distance.
    ///
    /// Ties go to the food placed earliest.
    pub fn nearest_food(&self, from: Position) -> Option<Position> {
        self.food
            .iter()
            .copied()
            .min_by_key(|&f| self.manhattan(from, f))
    }

    // ── Free-cell search ────────────────────────────────────────

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.cell_count()).map(|i| self.position(i))
    }

    /// All free cells in row-major order.
    pub fn free_cells(&self) -> Vec<Position> {
        self.cells().filter(|&p| self.is_free(p)).collect()
    }

    /// The free cell closest to `origin`.
    ///
    /// Searches Manhattan rings of increasing radius; within a ring the
    /// first free cell in row-major order wins, so the result is
    /// deterministic. Returns `None` when the grid is full.
    pub fn nearest_free(&self, origin: Position) -> Option<Position> {
        let max_radius = (self.width + self.height) as i32;
        for r in 0..=max_radius {
            let mut ring: SmallVec<[Position; 16]> = SmallVec::new();
            for dy in -r..=r {
                let span = r - dy.abs();
                for dx in [-span, span] {
                    if let Some(p) = self.ring_cell(origin.offset(dx, dy)) {
                        if !ring.contains(&p) {
                            ring.push(p);
                        }
                    }
                    if span == 0 {
                        break;
                    }
                }
            }
            ring.sort_by_key(|p| (p.y, p.x));
            if let Some(&p) = ring.iter().find(|&&p| self.is_free(p)) {
                return Some(p);
            }
        }
        None
    }

    fn ring_cell(&self, raw: Position) -> Option<Position> {
        if self.contains(raw) {
            Some(raw)
        } else if self.edge.wraps() {
            self.resolve(raw)
        } else {
            None
        }
    }

    fn out_of_bounds(&self, pos: Position) -> SpaceError {
        SpaceError::OutOfBounds {
            position: pos,
            bounds: format!("[0, {}) x [0, {})", self.width, self.height),
        }
    }
}

/// Resolve a single axis value under the given edge behavior.
/// Returns `Some(value)` on-grid or `None` for Absorb out-of-bounds.
fn resolve_axis(val: i32, len: u32, edge: EdgeBehavior) -> Option<i32> {
    let n = len as i32;
    if val >= 0 && val < n {
        return Some(val);
    }
    match edge {
        EdgeBehavior::Absorb => None,
        EdgeBehavior::Clamp => Some(val.clamp(0, n - 1)),
        EdgeBehavior::Wrap => Some(val.rem_euclid(n)),
    }
}

/// Signed shortest delta from `a` to `b` along one axis.
fn axis_delta(a: i32, b: i32, len: u32, edge: EdgeBehavior) -> i32 {
    let diff = b - a;
    match edge {
        EdgeBehavior::Wrap => {
            let n = len as i32;
            let d = diff.rem_euclid(n);
            if d > n / 2 {
                d - n
            } else {
                d
            }
        }
        EdgeBehavior::Absorb | EdgeBehavior::Clamp => diff,
    }
}

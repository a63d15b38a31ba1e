//! Test utilities and scripted policies for Brood development.
//!
//! Provides deterministic [`Policy`](brood_policy::Policy) stand-ins in
//! [`fixtures`] and a [`TestWorldBuilder`] for laying out grids.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{FixedPolicy, PanickingPolicy, ScriptedPolicy};

use brood_core::Position;
use brood_space::{EdgeBehavior, GridWorld};

/// Builder for grids with food already placed.
///
/// # Panics
///
/// [`build`](TestWorldBuilder::build) panics on invalid dimensions or
/// duplicate food cells; it is meant for tests only.
#[derive(Clone, Debug)]
pub struct TestWorldBuilder {
    width: u32,
    height: u32,
    edge: EdgeBehavior,
    food: Vec<Position>,
}

impl TestWorldBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            edge: EdgeBehavior::Absorb,
            food: Vec::new(),
        }
    }

    pub fn edge(mut self, edge: EdgeBehavior) -> Self {
        self.edge = edge;
        self
    }

    pub fn food(mut self, x: i32, y: i32) -> Self {
        self.food.push(Position::new(x, y));
        self
    }

    pub fn build(self) -> GridWorld {
        let mut world = GridWorld::new(self.width, self.height, self.edge).unwrap();
        for pos in self.food {
            world.place_food(pos).unwrap();
        }
        world
    }
}

/// Body cells from `(x, y)` pairs, tail first.
pub fn body(cells: &[(i32, i32)]) -> Vec<Position> {
    cells.iter().map(|&(x, y)| Position::new(x, y)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_places_food() {
        let world = TestWorldBuilder::new(5, 4).food(1, 1).food(3, 2).build();
        assert_eq!(world.width(), 5);
        assert_eq!(world.food_count(), 2);
        assert!(world.has_food(Position::new(3, 2)));
    }

    #[test]
    fn body_keeps_order() {
        assert_eq!(
            body(&[(0, 0), (1, 0)]),
            vec![Position::new(0, 0), Position::new(1, 0)]
        );
    }
}

//! Grid geometry and occupancy for the Brood training environment.
//!
//! [`GridWorld`] is the single spatial backend: a fixed-size rectangle
//! whose boundary either wraps, blocks, or kills (see [`EdgeBehavior`]).
//! It tracks which agent's body covers each cell and where food lies,
//! and answers the neighbourhood and distance queries that perception
//! and collision resolution need.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod edge;
pub mod error;
pub mod grid;

pub use edge::EdgeBehavior;
pub use error::SpaceError;
pub use grid::{GridWorld, StepOutcome};

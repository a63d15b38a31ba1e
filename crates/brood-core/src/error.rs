//! Top-level error for the simulation boundary.

use std::error::Error;
use std::fmt;

/// Errors from driving the simulation through its public boundary.
///
/// Nothing inside a tick is fatal: collisions, refused reproductions,
/// inference failures, and persistence I/O are all absorbed. The only
/// error a caller sees from `tick()` is an attempt to advance a world
/// that has been shut down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// The world has been asked to shut down and no longer ticks.
    ShuttingDown,
    /// A worker in the decision pool disconnected before replying.
    WorkerLost {
        /// Number of decisions that were never answered.
        missing: usize,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShuttingDown => write!(f, "world is shutting down"),
            Self::WorkerLost { missing } => {
                write!(f, "decision pool lost {missing} pending decisions")
            }
        }
    }
}

impl Error for SimError {}

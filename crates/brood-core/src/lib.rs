//! Core types for the Brood self-play training environment.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary shared by every other Brood crate:
//! tick and agent identifiers, grid geometry, action spaces, and the
//! top-level simulation error.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod error;
pub mod geometry;
pub mod id;

pub use action::ActionSpace;
pub use error::SimError;
pub use geometry::{Heading, Position};
pub use id::{AgentHandle, SpawnSeq, TickId};

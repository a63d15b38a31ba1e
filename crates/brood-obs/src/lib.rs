//! Perception encoding for Brood agents.
//!
//! A [`PerceptionEncoder`] turns an agent's view of the grid into an
//! [`EncodedState`]: a compact symbolic [`StateKey`] for tabular
//! policies and a fixed-width feature vector for approximate ones.
//! The encoding is a pure function of the agent and the world, and is
//! identified by a [`fingerprint`](PerceptionEncoder::fingerprint) so
//! that learned state can be tied to the encoding that produced it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod encoder;

pub use config::{DangerMode, PerceptionConfig};
pub use encoder::{AgentView, EncodedState, FoodSector, PerceptionEncoder, StateKey};

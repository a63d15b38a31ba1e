//! Q-learning policies, experience replay, and policy breeding.
//!
//! Two interchangeable [`Policy`] implementations are provided:
//!
//! - [`TabularQPolicy`]: a state-key to action-value table.
//! - [`ApproximateQPolicy`]: a one-hidden-layer network with a Polyak
//!   target network and a fixed-capacity [`ReplayBuffer`].
//!
//! Policies cross and mutate through [`Policy::breed`], and round-trip
//! through [`PolicyDocument`] for persistence.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod approximate;
pub mod breed;
pub mod config;
pub mod document;
pub mod epsilon;
pub mod error;
pub mod mlp;
pub mod policy;
pub mod replay;
pub mod tabular;

pub use approximate::ApproximateQPolicy;
pub use breed::MutationConfig;
pub use config::{ApproximateConfig, EpsilonConfig, PolicyConfig, TabularConfig};
pub use document::{PolicyBody, PolicyDocument, Tensor, DOCUMENT_VERSION};
pub use epsilon::EpsilonSchedule;
pub use error::PolicyError;
pub use mlp::{Mlp, SgdMomentum};
pub use policy::{greedy_index, share, Policy, PolicyKind, SharedPolicy};
pub use replay::{ReplayBuffer, Transition};
pub use tabular::TabularQPolicy;

//! Brood: a grid self-play environment where learning agents feed,
//! breed, and die.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Brood sub-crates. For most users, adding `brood` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use brood::prelude::*;
//!
//! let config = SimConfig::default()
//!     .with_grid(16, 16)
//!     .with_agents(6)
//!     .with_edge(EdgeBehavior::Wrap)
//!     .with_seed(7);
//! let mut sim = Simulation::new(config).unwrap();
//!
//! for _ in 0..50 {
//!     let report = sim.tick().unwrap();
//!     for death in &report.deaths {
//!         assert!(sim.population().get(death.agent).is_none());
//!     }
//! }
//! let snap = sim.snapshot();
//! assert_eq!(snap.tick, TickId(50));
//! sim.request_shutdown();
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `brood-core` | Handles, positions, headings, tick ids, `SimError` |
//! | [`space`] | `brood-space` | `GridWorld`, edge rules, occupancy and food |
//! | [`obs`] | `brood-obs` | Perception encoding |
//! | [`policy`] | `brood-policy` | Q-learning policies, replay, breeding, documents |
//! | [`persist`] | `brood-persist` | Background persistence and the session log |
//! | [`engine`] | `brood-engine` | Population, collisions, reproduction, `Simulation` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and IDs (`brood-core`).
pub use brood_core as types;

/// The grid (`brood-space`).
///
/// [`space::GridWorld`] tracks occupancy and food; [`space::EdgeBehavior`]
/// decides what happens at its border.
pub use brood_space as space;

/// Perception encoding (`brood-obs`).
pub use brood_obs as obs;

/// Learners (`brood-policy`).
///
/// The [`policy::Policy`] trait with [`policy::TabularQPolicy`] and
/// [`policy::ApproximateQPolicy`] implementations.
pub use brood_policy as policy;

/// Persistence (`brood-persist`).
pub use brood_persist as persist;

/// The simulation engine (`brood-engine`).
pub use brood_engine as engine;

/// Common imports for typical Brood usage.
///
/// ```rust
/// use brood::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use brood_core::{ActionSpace, AgentHandle, Heading, Position, SimError, TickId};

    // Space
    pub use brood_space::{EdgeBehavior, GridWorld, SpaceError};

    // Perception
    pub use brood_obs::{EncodedState, PerceptionConfig, PerceptionEncoder};

    // Policies
    pub use brood_policy::{
        ApproximateConfig, EpsilonConfig, MutationConfig, Policy, PolicyConfig, TabularConfig,
    };

    // Persistence
    pub use brood_persist::{PersistConfig, SessionLog};

    // Engine
    pub use brood_engine::{
        ConfigError, DistanceShaping, RewardShaper, Simulation, SimConfig, TickReport,
        WorldSnapshot,
    };
}

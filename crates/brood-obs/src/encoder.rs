//! The perception encoder.

use crate::config::{DangerMode, PerceptionConfig};
use brood_core::{Heading, Position};
use brood_space::GridWorld;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Number of food-direction slots: eight sectors plus "no food".
pub const FOOD_SECTORS: usize = 9;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Bumped whenever the encoding layout changes.
const ENCODING_REVISION: u8 = 1;

/// Opaque symbolic state key for tabular policies.
///
/// Packs the food sector, danger bits, optional buckets, and optional
/// heading into disjoint bit ranges, so distinct perceptions always
/// produce distinct keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(pub u64);

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for StateKey {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Direction of the nearest food relative to the agent's heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FoodSector {
    /// Straight ahead.
    Ahead = 0,
    /// Ahead and to the right.
    AheadRight = 1,
    /// Directly to the right.
    Right = 2,
    /// Behind and to the right.
    BehindRight = 3,
    /// Directly behind.
    Behind = 4,
    /// Behind and to the left.
    BehindLeft = 5,
    /// Directly to the left.
    Left = 6,
    /// Ahead and to the left.
    AheadLeft = 7,
    /// No food on the grid.
    None = 8,
}

impl FoodSector {
    /// Classify a displacement `(forward, rightward)` in the agent frame.
    pub fn from_frame(forward: i32, rightward: i32) -> FoodSector {
        use std::cmp::Ordering::*;
        match (forward.cmp(&0), rightward.cmp(&0)) {
            (Greater, Equal) | (Equal, Equal) => FoodSector::Ahead,
            (Greater, Greater) => FoodSector::AheadRight,
            (Equal, Greater) => FoodSector::Right,
            (Less, Greater) => FoodSector::BehindRight,
            (Less, Equal) => FoodSector::Behind,
            (Less, Less) => FoodSector::BehindLeft,
            (Equal, Less) => FoodSector::Left,
            (Greater, Less) => FoodSector::AheadLeft,
        }
    }

    /// Slot index in `0..FOOD_SECTORS`.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// What the encoder needs to know about the perceiving agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentView {
    /// Head cell.
    pub head: Position,
    /// Current heading.
    pub heading: Heading,
    /// Body length in cells.
    pub length: usize,
}

/// One encoded perception.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedState {
    /// Symbolic key for tabular policies.
    pub key: StateKey,
    /// Fixed-width feature vector for approximate policies.
    pub features: SmallVec<[f32; 24]>,
}

/// Maps an agent and the world to an [`EncodedState`].
///
/// # Examples
///
/// ```
/// use brood_core::{Heading, Position};
/// use brood_obs::{AgentView, FoodSector, PerceptionConfig, PerceptionEncoder};
/// use brood_space::{EdgeBehavior, GridWorld};
///
/// let mut world = GridWorld::new(10, 10, EdgeBehavior::Absorb).unwrap();
/// world.place_food(Position::new(6, 5)).unwrap();
///
/// let enc = PerceptionEncoder::new(PerceptionConfig::default());
/// let view = AgentView { head: Position::new(5, 5), heading: Heading::East, length: 1 };
/// assert_eq!(enc.food_sector(&view, &world), FoodSector::Ahead);
///
/// let state = enc.encode(&view, &world);
/// assert_eq!(state.features.len(), enc.feature_width());
/// ```
#[derive(Clone, Debug)]
pub struct PerceptionEncoder {
    config: PerceptionConfig,
    fingerprint: u64,
}

impl PerceptionEncoder {
    /// Build an encoder for `config`.
    pub fn new(config: PerceptionConfig) -> Self {
        let fingerprint = fingerprint_of(&config);
        Self {
            config,
            fingerprint,
        }
    }

    /// The configuration this encoder was built from.
    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// Width of every feature vector this encoder emits.
    pub fn feature_width(&self) -> usize {
        self.config.feature_width()
    }

    /// Stable identifier of this encoding's output space.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Encode `agent`'s perception of `world`.
    pub fn encode(&self, agent: &AgentView, world: &GridWorld) -> EncodedState {
        let cfg = &self.config;
        let mut features: SmallVec<[f32; 24]> = SmallVec::with_capacity(self.feature_width());

        let sector = self.food_sector(agent, world);
        for i in 0..FOOD_SECTORS {
            features.push(if i == sector.index() { 1.0 } else { 0.0 });
        }
        let mut key = sector.index() as u64;

        let danger = self.danger(agent, world);
        let mut danger_bits = 0u64;
        for (i, &d) in danger.iter().enumerate() {
            features.push(if d { 1.0 } else { 0.0 });
            if d {
                danger_bits |= 1 << i;
            }
        }
        key |= danger_bits << 4;

        if cfg.length_buckets > 0 {
            let norm = agent.length as f32 / world.cell_count() as f32;
            features.push(norm.min(1.0));
            key |= (bucket(norm, cfg.length_buckets) as u64) << 12;
        }

        if cfg.distance_buckets > 0 {
            let norm = match world.nearest_food(agent.head) {
                Some(food) => world.manhattan(agent.head, food) as f32 / max_distance(world),
                None => 1.0,
            };
            features.push(norm.min(1.0));
            key |= (bucket(norm, cfg.distance_buckets) as u64) << 20;
        }

        if cfg.include_heading {
            for h in Heading::ALL {
                features.push(if h == agent.heading { 1.0 } else { 0.0 });
            }
            key |= (agent.heading.index() as u64) << 28;
        }

        EncodedState {
            key: StateKey(key),
            features,
        }
    }

    /// Direction of the nearest food in the agent's frame.
    pub fn food_sector(&self, agent: &AgentView, world: &GridWorld) -> FoodSector {
        let Some(food) = world.nearest_food(agent.head) else {
            return FoodSector::None;
        };
        let (dx, dy) = world.displacement(agent.head, food);
        let (fx, fy) = agent.heading.vector();
        let (rx, ry) = agent.heading.right().vector();
        FoodSector::from_frame(dx * fx + dy * fy, dx * rx + dy * ry)
    }

    /// Danger indicators in the configured neighbourhood.
    ///
    /// A cell is dangerous if it holds a body or lies beyond a
    /// non-wrapping edge.
    pub fn danger(&self, agent: &AgentView, world: &GridWorld) -> SmallVec<[bool; 8]> {
        let f = agent.heading.vector();
        let r = agent.heading.right().vector();
        // Offsets in (forward, rightward) units.
        let frame: &[(i32, i32)] = match self.config.danger {
            DangerMode::Relative3 => &[(1, 0), (0, -1), (0, 1)],
            DangerMode::Neighbourhood8 => &[
                (1, 0),
                (1, 1),
                (0, 1),
                (-1, 1),
                (-1, 0),
                (-1, -1),
                (0, -1),
                (1, -1),
            ],
        };
        frame
            .iter()
            .map(|&(fwd, right)| {
                let dx = fwd * f.0 + right * r.0;
                let dy = fwd * f.1 + right * r.1;
                cell_is_dangerous(world, agent.head.offset(dx, dy))
            })
            .collect()
    }
}

fn cell_is_dangerous(world: &GridWorld, raw: Position) -> bool {
    if world.contains(raw) {
        return world.is_occupied(raw);
    }
    if world.edge().wraps() {
        return world.resolve(raw).is_none_or(|p| world.is_occupied(p));
    }
    true
}

fn max_distance(world: &GridWorld) -> f32 {
    let (w, h) = (world.width(), world.height());
    let d = if world.edge().wraps() {
        w / 2 + h / 2
    } else {
        (w - 1) + (h - 1)
    };
    d.max(1) as f32
}

fn bucket(norm: f32, buckets: u8) -> u8 {
    let b = (norm.clamp(0.0, 1.0) * buckets as f32) as u32;
    b.min(buckets as u32 - 1) as u8
}

fn fingerprint_of(config: &PerceptionConfig) -> u64 {
    let bytes = [
        ENCODING_REVISION,
        config.danger.width() as u8,
        config.length_buckets,
        config.distance_buckets,
        config.include_heading as u8,
    ];
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

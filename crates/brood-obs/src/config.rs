//! Perception configuration.

use serde::{Deserialize, Serialize};

/// Which cells around the head are checked for danger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerMode {
    /// Ahead, left, and right of the current heading.
    #[default]
    Relative3,
    /// All eight surrounding cells, starting ahead and going clockwise.
    Neighbourhood8,
}

impl DangerMode {
    /// Number of danger indicators produced.
    pub fn width(self) -> usize {
        match self {
            DangerMode::Relative3 => 3,
            DangerMode::Neighbourhood8 => 8,
        }
    }
}

/// Shape of the perception encoding.
///
/// Must stay fixed for the lifetime of a run: learned tables and
/// weights are only meaningful for the encoding that produced them.
///
/// # Examples
///
/// ```
/// use brood_obs::{DangerMode, PerceptionConfig};
///
/// let cfg = PerceptionConfig::default()
///     .with_danger(DangerMode::Neighbourhood8)
///     .with_length_buckets(4);
/// assert_eq!(cfg.feature_width(), 9 + 8 + 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Danger neighbourhood.
    pub danger: DangerMode,
    /// Buckets for normalized body length in the key; 0 disables the
    /// length component.
    pub length_buckets: u8,
    /// Buckets for normalized food distance in the key; 0 disables the
    /// distance component.
    pub distance_buckets: u8,
    /// Include the absolute heading. Needed when actions are absolute,
    /// since the other components are heading-relative.
    pub include_heading: bool,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            danger: DangerMode::Relative3,
            length_buckets: 0,
            distance_buckets: 0,
            include_heading: false,
        }
    }
}

impl PerceptionConfig {
    /// Set the danger neighbourhood.
    pub fn with_danger(mut self, danger: DangerMode) -> Self {
        self.danger = danger;
        self
    }

    /// Set the number of body-length buckets.
    pub fn with_length_buckets(mut self, buckets: u8) -> Self {
        self.length_buckets = buckets;
        self
    }

    /// Set the number of food-distance buckets.
    pub fn with_distance_buckets(mut self, buckets: u8) -> Self {
        self.distance_buckets = buckets;
        self
    }

    /// Include the absolute heading in the encoding.
    pub fn with_heading(mut self, include: bool) -> Self {
        self.include_heading = include;
        self
    }

    /// Width of the feature vector this configuration produces.
    pub fn feature_width(&self) -> usize {
        let mut width = crate::encoder::FOOD_SECTORS + self.danger.width();
        if self.length_buckets > 0 {
            width += 1;
        }
        if self.distance_buckets > 0 {
            width += 1;
        }
        if self.include_heading {
            width += 4;
        }
        width
    }
}

use std::sync::Arc;

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    core::{Obstacle, ObstacleDescriptor, WorldConfig},
    engine::stream::{ObstacleStream, rightmost_edge, scroll_obstacles},
};

/// Number of obstacles in a generated level.
pub const DEFAULT_LEVEL_LENGTH: usize = 220;

/// How far beyond the right border of the world the next obstacle may be
/// placed before spawning pauses.
const SPAWN_LOOKAHEAD: f64 = 80.0;

/// Seed for deterministic level generation.
///
/// Serialized as a 16-character hexadecimal string.
///
/// # Example
///
/// ```
/// use dinorun_engine::{Level, LevelSeed, WorldConfig};
///
/// let world = WorldConfig::default();
/// let seed = LevelSeed::new(1);
/// assert_eq!(Level::generate(seed, 10, &world), Level::generate(seed, 10, &world));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelSeed(u64);

impl LevelSeed {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Serialize for LevelSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:016x}", self.0))
    }
}

impl<'de> Deserialize<'de> for LevelSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.is_empty() || hex_str.len() > 16 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 1 to 16 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u64::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self(num))
    }
}

impl Distribution<LevelSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> LevelSeed {
        LevelSeed(rng.random())
    }
}

/// A fixed, replayable sequence of obstacle descriptors.
///
/// Every agent of a generation, and every run of the same numbered level,
/// sees exactly the same layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    descriptors: Vec<ObstacleDescriptor>,
}

impl Level {
    /// Numbered levels and the seeds they are generated from.
    pub const NUMBERED: [(u8, LevelSeed); 3] =
        [(1, LevelSeed(1)), (2, LevelSeed(2)), (3, LevelSeed(3))];

    #[must_use]
    pub fn new(descriptors: Vec<ObstacleDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Generates `count` descriptors from `seed`.
    ///
    /// Gaps, sizes and ground offsets are drawn uniformly from the ranges in
    /// `world` and rounded to whole units. The first gap is always zero since
    /// the first obstacle enters at the right border of the world.
    #[must_use]
    pub fn generate(seed: LevelSeed, count: usize, world: &WorldConfig) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed.0);
        let mut uniform = |min: f64, max: f64| min + rng.random::<f64>() * (max - min);
        let descriptors = (0..count)
            .map(|i| {
                let gap = if i == 0 {
                    0.0
                } else {
                    uniform(world.spawn_gap_min, world.spawn_gap_max)
                };
                let width = uniform(world.obstacle_min_width, world.obstacle_max_width);
                let height = uniform(world.obstacle_min_height, world.obstacle_max_height);
                let ground_offset = uniform(0.0, world.obstacle_max_ground_offset);
                ObstacleDescriptor {
                    gap_before_next: gap.round(),
                    width: width.round(),
                    height: height.round(),
                    ground_offset: ground_offset.round(),
                }
            })
            .collect();
        Self { descriptors }
    }

    /// Returns numbered level `number` (1 to 3), or `None` if no such level
    /// exists.
    #[must_use]
    pub fn numbered(number: u8, world: &WorldConfig) -> Option<Self> {
        Self::NUMBERED
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, seed)| Self::generate(*seed, DEFAULT_LEVEL_LENGTH, world))
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ObstacleDescriptor] {
        &self.descriptors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Replays a [`Level`].
///
/// Obstacles are spawned as long as the next slot lies within a small margin
/// beyond the right border of the world. Once every descriptor has been used
/// no new obstacles appear.
#[derive(Debug, Clone)]
pub struct LevelStream {
    world: WorldConfig,
    level: Arc<Level>,
    next_index: usize,
    obstacles: Vec<Obstacle>,
    passed: u64,
}

impl LevelStream {
    #[must_use]
    pub fn new(world: WorldConfig, level: impl Into<Arc<Level>>) -> Self {
        Self {
            world,
            level: level.into(),
            next_index: 0,
            obstacles: Vec::new(),
            passed: 0,
        }
    }

    #[must_use]
    pub fn level(&self) -> &Level {
        &self.level
    }

    fn spawn(&mut self) {
        let mut right_edge = rightmost_edge(&self.obstacles);
        while let Some(desc) = self.level.descriptors.get(self.next_index) {
            let x = if self.obstacles.is_empty() {
                self.world.world_width
            } else {
                right_edge + desc.gap_before_next
            };
            if !self.obstacles.is_empty() && x > self.world.world_width + SPAWN_LOOKAHEAD {
                break;
            }
            self.obstacles.push(desc.place(x, &self.world));
            right_edge = x + desc.width;
            self.next_index += 1;
        }
    }
}

impl ObstacleStream for LevelStream {
    fn advance(&mut self, scroll_speed: f64) -> Vec<Obstacle> {
        self.passed += scroll_obstacles(&mut self.obstacles, scroll_speed, &self.world);
        self.spawn();
        self.obstacles.clone()
    }

    fn reset(&mut self) {
        self.obstacles.clear();
        self.next_index = 0;
        self.passed = 0;
    }

    fn passed(&self) -> u64 {
        self.passed
    }

    fn is_exhausted(&self) -> bool {
        self.next_index >= self.level.len() && self.obstacles.is_empty()
    }
}

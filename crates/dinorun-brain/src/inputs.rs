//! Encoding of an agent's sensed state into a network input vector.
//!
//! Every feature is clamped into a bounded range before it reaches a network.
//! Trained weights are only meaningful relative to this scaling, so the
//! encoding is versioned: each [`InputSchema`] fixes the number, order and
//! normalization of its features forever.
//!
//! | index | feature                   | range     | v1 | v2 | v3 |
//! |-------|---------------------------|-----------|----|----|----|
//! | 0     | distance to next obstacle | `[0, 1]`  | x  | x  | x  |
//! | 1     | vertical velocity         | `[-1, 1]` | x  | x  | x  |
//! | 2     | on ground                 | `{0, 1}`  | x  | x  | x  |
//! | 3     | next obstacle width       | `[0, 1]`  | x  | x  | x  |
//! | 4     | next obstacle height      | `[0, 1]`  |    | x  | x  |
//! | 5     | next obstacle ground gap  | `[0, 1]`  |    | x  | x  |
//! | 6     | frames since last jump    | `[0, 1]`  |    |    | x  |
//!
//! When nothing is ahead the distance reads as `1` (far away) and the obstacle
//! size features read as `0`.
//!
//! Two calling conventions exist. [`isolated_inputs`] uses what the agent
//! sensed at the end of its previous frame in its own world, and
//! [`shared_inputs`] looks the next obstacle up in the frame's shared
//! obstacle snapshot.

use dinorun_engine::{Agent, NextObstacle, Obstacle, WorldConfig};
use serde::{Deserialize, Serialize};

/// Vertical speed mapped to `±1`.
const VELOCITY_SCALE: f64 = 15.0;

/// Frames since the last jump mapped to `1`.
const JUMP_COOLDOWN_SCALE: f64 = 60.0;

const LABELS: [&str; 7] = [
    "dist",
    "velY",
    "onGround",
    "width",
    "height",
    "groundDist",
    "sinceJump",
];

/// An input schema version is not known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown input schema version {version}")]
pub struct UnknownSchemaError {
    pub version: u32,
}

/// Versioned input encoding.
///
/// Serialized as its version number.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum InputSchema {
    /// Distance, velocity, on-ground and width.
    V1,
    /// Adds the next obstacle's height and its distance above the ground.
    V2,
    /// Adds the number of frames since the last jump.
    #[default]
    V3,
}

impl InputSchema {
    pub const ALL: [Self; 3] = [Self::V1, Self::V2, Self::V3];

    #[must_use]
    pub const fn version(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// Number of features, which is also the network's input size.
    #[must_use]
    pub const fn input_size(self) -> usize {
        match self {
            Self::V1 => 4,
            Self::V2 => 6,
            Self::V3 => 7,
        }
    }

    /// Short names of the features, for visualizers.
    #[must_use]
    pub fn labels(self) -> &'static [&'static str] {
        &LABELS[..self.input_size()]
    }

    /// The schema whose input size is `input_size`, if any.
    #[must_use]
    pub fn from_input_size(input_size: usize) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|schema| schema.input_size() == input_size)
    }
}

impl TryFrom<u32> for InputSchema {
    type Error = UnknownSchemaError;

    fn try_from(version: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|schema| schema.version() == version)
            .ok_or(UnknownSchemaError { version })
    }
}

impl From<InputSchema> for u32 {
    fn from(schema: InputSchema) -> Self {
        schema.version()
    }
}

fn encode(
    schema: InputSchema,
    agent: &Agent,
    next: Option<&NextObstacle>,
    world: &WorldConfig,
) -> Vec<f64> {
    let distance = next.map_or(1.0, |n| (n.distance / world.world_width).clamp(0.0, 1.0));
    let velocity = (agent.velocity_y() / VELOCITY_SCALE).clamp(-1.0, 1.0);
    let on_ground = if agent.on_ground() { 1.0 } else { 0.0 };
    let width = next.map_or(0.0, |n| (n.width / world.world_width).clamp(0.0, 1.0));
    let height = next.map_or(0.0, |n| (n.height / world.world_height).clamp(0.0, 1.0));
    let ground_gap = next.map_or(0.0, |n| {
        (n.ground_offset / world.world_height).clamp(0.0, 1.0)
    });
    let since_jump =
        (f64::from(agent.frames_since_jump()) / JUMP_COOLDOWN_SCALE).clamp(0.0, 1.0);

    let features = [
        distance, velocity, on_ground, width, height, ground_gap, since_jump,
    ];
    features[..schema.input_size()].to_vec()
}

/// Which obstacle view a network reads its inputs from.
///
/// Weights trained under one convention see the world one frame apart from
/// the other, so the convention is stored alongside persisted models.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensing {
    /// The next obstacle in the snapshot of the frame being played.
    #[default]
    Shared,
    /// What the agent sensed at the end of its previous frame.
    Isolated,
}

impl Sensing {
    /// Encodes the inputs for the frame whose obstacles are `obstacles`.
    #[must_use]
    pub fn inputs(
        self,
        agent: &Agent,
        obstacles: &[Obstacle],
        world: &WorldConfig,
        schema: InputSchema,
    ) -> Vec<f64> {
        match self {
            Self::Shared => shared_inputs(agent, obstacles, world, schema),
            Self::Isolated => isolated_inputs(agent, world, schema),
        }
    }
}

/// Encodes the obstacle the agent sensed in its own world.
///
/// # Example
///
/// ```
/// use dinorun_brain::{InputSchema, isolated_inputs};
/// use dinorun_engine::{Agent, WorldConfig};
///
/// let world = WorldConfig::default();
/// let agent = Agent::new(&world);
/// assert_eq!(isolated_inputs(&agent, &world, InputSchema::V1), [1.0, 0.0, 1.0, 0.0]);
/// ```
#[must_use]
pub fn isolated_inputs(agent: &Agent, world: &WorldConfig, schema: InputSchema) -> Vec<f64> {
    encode(schema, agent, agent.sensed(), world)
}

/// Encodes the next obstacle ahead in a shared obstacle snapshot.
#[must_use]
pub fn shared_inputs(
    agent: &Agent,
    obstacles: &[Obstacle],
    world: &WorldConfig,
    schema: InputSchema,
) -> Vec<f64> {
    let next = NextObstacle::find(obstacles, world);
    encode(schema, agent, next.as_ref(), world)
}
